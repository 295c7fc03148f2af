//! Data models shared by the route groups and the document store.

/// Persisted document shape
pub mod document;
