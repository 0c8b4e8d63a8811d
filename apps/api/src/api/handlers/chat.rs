use axum::{extract::State, Json};
use serde::Deserialize;

use crate::agents::customer_service::ChatReply;
use crate::api::errors::ApiError;
use crate::api::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

/// Ask the package advisor for a recommendation
///
/// POST /api/chat
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let advisor = state
        .manager()
        .customer_service()
        .ok_or_else(|| ApiError::not_found("Customer service agent not initialised"))?;

    Ok(Json(advisor.advise(&req.message).await?))
}
