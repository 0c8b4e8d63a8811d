use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::agents::knowledge::Document;
use crate::api::errors::ApiError;
use crate::api::state::AppState;

#[derive(Debug, Serialize)]
pub struct AddDocumentResponse {
    pub document_count: usize,
}

/// Add a document to the knowledge agent's store
///
/// POST /api/knowledge/documents
pub async fn add_document(
    State(state): State<AppState>,
    Json(document): Json<Document>,
) -> Result<(StatusCode, Json<AddDocumentResponse>), ApiError> {
    if document.content.trim().is_empty() {
        return Err(ApiError::bad_request("Document content cannot be empty"));
    }

    let knowledge = state
        .manager()
        .knowledge()
        .ok_or_else(|| ApiError::not_found("Knowledge agent not initialised"))?;

    let document_count = knowledge
        .add_document(document.content, document.metadata)
        .await;

    Ok((StatusCode::CREATED, Json(AddDocumentResponse { document_count })))
}
