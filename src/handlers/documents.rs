//! Document resource handlers.
//!
//! Every mounted route group serves the same four endpoints over its own
//! collection:
//! - GET `<prefix>` - List documents, newest first
//! - POST `<prefix>` - Create a document from the request body
//! - GET `<prefix>/{id}` - Fetch one document
//! - DELETE `<prefix>/{id}` - Delete one document
//!
//! The collection is injected by the route table as an [`Extension`].

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError, extract::Payload, models::document::StoredDocument, server::AppState,
};

/// Name of the collection backing a route group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection(pub &'static str);

/// List all documents in the group's collection.
///
/// # Response (200 OK)
///
/// ```json
/// [
///   {
///     "_id": "550e8400-e29b-41d4-a716-446655440000",
///     "created_at": "2025-12-20T10:00:00Z",
///     "data": { "product_id": "sku-42", "quantity": 2 }
///   }
/// ]
/// ```
pub async fn list_documents(
    State(state): State<AppState>,
    Extension(Collection(collection)): Extension<Collection>,
) -> Result<Json<Vec<StoredDocument>>, AppError> {
    let documents = state.store.list(collection).await?;
    Ok(Json(documents))
}

/// Create a document.
///
/// # Request Body
///
/// A JSON object, or URL-encoded form fields.
///
/// # Response
///
/// - **201 Created**: the stored document
/// - **400**: body is not a JSON object or does not parse
/// - **413**: body exceeds the configured limit
/// - **415**: body is neither JSON nor form data
pub async fn create_document(
    State(state): State<AppState>,
    Extension(Collection(collection)): Extension<Collection>,
    Payload(data): Payload,
) -> Result<impl IntoResponse, AppError> {
    let document = state
        .store
        .insert(collection, StoredDocument::new(data))
        .await?;

    tracing::info!(collection, id = %document.id, "document created");
    Ok((StatusCode::CREATED, Json(document)))
}

/// Fetch a document by id.
///
/// Returns 404 if the id is unknown in this group's collection, even when
/// another collection holds a document with that id.
pub async fn get_document(
    State(state): State<AppState>,
    Extension(Collection(collection)): Extension<Collection>,
    Path(id): Path<String>,
) -> Result<Json<StoredDocument>, AppError> {
    let document = state
        .store
        .get(collection, &id)
        .await?
        .ok_or(AppError::DocumentNotFound)?;

    Ok(Json(document))
}

/// Delete a document by id.
///
/// # Response
///
/// Returns 204 No Content on success, 404 if nothing was deleted.
pub async fn delete_document(
    State(state): State<AppState>,
    Extension(Collection(collection)): Extension<Collection>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete(collection, &id).await? {
        return Err(AppError::DocumentNotFound);
    }

    tracing::info!(collection, %id, "document deleted");
    Ok(StatusCode::NO_CONTENT)
}
