//! Document store port.
//!
//! Route handlers only see [`DocumentStore`]. Production wires in
//! [`crate::db::MongoStore`]; tests and local experiments use [`MemoryStore`].

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::models::document::StoredDocument;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    /// A document could not be converted to or from its stored representation.
    #[error("Document encoding error: {0}")]
    Encoding(String),
}

/// Collection-oriented persistence used by every route group.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert(
        &self,
        collection: &str,
        document: StoredDocument,
    ) -> Result<StoredDocument, StoreError>;

    /// All documents in a collection, newest first.
    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>, StoreError>;

    /// Returns `true` when a document was removed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;
}

/// In-process store keyed by collection name.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<DashMap<String, Vec<StoredDocument>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert(
        &self,
        collection: &str,
        document: StoredDocument,
    ) -> Result<StoredDocument, StoreError> {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());
        Ok(document)
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .map(|docs| docs.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id).cloned()))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|doc| doc.id != id);
        Ok(docs.len() != before)
    }
}
