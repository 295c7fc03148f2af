//! MongoDB connection bootstrap and the Mongo-backed document store.
//!
//! This module provides:
//! - A one-time connection routine with bounded, exponential-backoff retries
//! - [`MongoStore`], the production [`DocumentStore`] implementation

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    Client, Database,
    bson::{self, Document, doc},
    options::ClientOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    config::Config,
    error::StartupError,
    models::document::StoredDocument,
    store::{DocumentStore, StoreError},
};

/// First retry delay; doubles on every further attempt.
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Upper bound for a single retry delay.
const BACKOFF_CAP: Duration = Duration::from_secs(10);

/// Connect to MongoDB and verify the connection with a `ping`.
///
/// # Process
///
/// 1. Parse `ATLAS_URI` (an unparseable URI fails immediately, no retry)
/// 2. Apply connect and server-selection timeouts from configuration
/// 3. Ping the database, retrying with exponential backoff
/// 4. Log readiness on the first successful ping
///
/// The database name is taken from the URI path, falling back to
/// `DATABASE_NAME`.
///
/// # Errors
///
/// - [`StartupError::InvalidConfiguration`] if the URI cannot be parsed
/// - [`StartupError::DatabaseConnectFailure`] once every attempt has failed
pub async fn connect(config: &Config) -> Result<Database, StartupError> {
    let mut options = ClientOptions::parse(config.atlas_uri.as_str())
        .await
        .map_err(|err| StartupError::InvalidConfiguration(format!("ATLAS_URI: {err}")))?;

    options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
    options.connect_timeout = Some(config.db_connect_timeout());
    options.server_selection_timeout = Some(config.db_connect_timeout());

    let database_name = options
        .default_database
        .clone()
        .unwrap_or_else(|| config.database_name.clone());

    let client = Client::with_options(options)
        .map_err(|err| StartupError::InvalidConfiguration(format!("ATLAS_URI: {err}")))?;
    let database = client.database(&database_name);

    let mut attempt = 0;
    loop {
        attempt += 1;
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => {
                tracing::info!(
                    database = %database_name,
                    attempt,
                    "MongoDB database connection established successfully"
                );
                return Ok(database);
            }
            Err(err) if attempt < config.db_connect_attempts => {
                let delay = backoff(attempt);
                tracing::warn!(
                    error = %err,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    "MongoDB connection attempt failed"
                );
                tokio::time::sleep(delay).await;
            }
            Err(source) => {
                return Err(StartupError::DatabaseConnectFailure {
                    attempts: attempt,
                    source,
                });
            }
        }
    }
}

/// Delay before retry number `attempt` (1-based): base * 2^(attempt-1), capped.
fn backoff(attempt: u32) -> Duration {
    let pow = 1u32 << attempt.saturating_sub(1).min(10);
    BACKOFF_BASE.saturating_mul(pow).min(BACKOFF_CAP)
}

/// [`DocumentStore`] over a MongoDB database.
///
/// The driver pools connections internally, so one `MongoStore` is shared by
/// every in-flight request.
#[derive(Debug, Clone)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

/// Persisted shape of a [`StoredDocument`].
///
/// `created_at` is a BSON datetime so that sorting on it in the database
/// follows time order. Millisecond precision, the same as the model.
#[derive(Debug, Serialize, Deserialize)]
struct MongoDocument {
    #[serde(rename = "_id")]
    id: String,
    created_at: bson::DateTime,
    data: Map<String, Value>,
}

fn encode(document: &StoredDocument) -> Result<Document, StoreError> {
    let persisted = MongoDocument {
        id: document.id.clone(),
        created_at: bson::DateTime::from_millis(document.created_at.timestamp_millis()),
        data: document.data.clone(),
    };
    bson::to_document(&persisted).map_err(|err| StoreError::Encoding(err.to_string()))
}

fn decode(document: Document) -> Result<StoredDocument, StoreError> {
    let persisted: MongoDocument =
        bson::from_document(document).map_err(|err| StoreError::Encoding(err.to_string()))?;
    let millis = persisted.created_at.timestamp_millis();
    let created_at = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        StoreError::Encoding(format!("created_at out of range: {millis}"))
    })?;

    Ok(StoredDocument {
        id: persisted.id,
        created_at,
        data: persisted.data,
    })
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn insert(
        &self,
        collection: &str,
        document: StoredDocument,
    ) -> Result<StoredDocument, StoreError> {
        self.collection(collection)
            .insert_one(encode(&document)?)
            .await?;
        Ok(document)
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        let cursor = self
            .collection(collection)
            .find(doc! {})
            .sort(doc! { "created_at": -1, "_id": -1 })
            .await?;

        let raw: Vec<Document> = cursor.try_collect().await?;
        raw.into_iter().map(decode).collect()
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        self.collection(collection)
            .find_one(doc! { "_id": id })
            .await?
            .map(decode)
            .transpose()
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let result = self
            .collection(collection)
            .delete_one(doc! { "_id": id })
            .await?;
        Ok(result.deleted_count > 0)
    }
}
