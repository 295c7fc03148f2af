//! Stored document model.
//!
//! Every route group persists the same shape: a generated identifier, a
//! creation timestamp and the object the client sent.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A document as it lives in a collection and as it is returned to clients.
///
/// # JSON Example
///
/// ```json
/// {
///   "_id": "550e8400-e29b-41d4-a716-446655440000",
///   "created_at": "2025-12-20T10:00:00Z",
///   "data": { "product_id": "sku-42", "quantity": 2 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// UUID v4 rendered as a string, used as the collection primary key
    #[serde(rename = "_id")]
    pub id: String,

    /// Millisecond precision, matching what the database keeps
    pub created_at: DateTime<Utc>,

    /// Client payload, always a JSON object
    pub data: Map<String, Value>,
}

impl StoredDocument {
    /// Wrap a freshly parsed payload with a new identifier and timestamp.
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now().trunc_subsecs(3),
            data,
        }
    }
}
