use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use crate::agents::state::AgentStatus;
use crate::api::errors::ApiError;
use crate::api::state::AppState;

/// Status of every registered agent
///
/// GET /api/agents
pub async fn list_agents(State(state): State<AppState>) -> Json<HashMap<String, AgentStatus>> {
    Json(state.manager().agent_status())
}

/// Reset every agent to idle with empty memory
///
/// POST /api/agents/reset
pub async fn reset_agents(State(state): State<AppState>) -> StatusCode {
    state.manager().reset_all();
    StatusCode::NO_CONTENT
}

/// Run one agent's raw input -> output transform
///
/// POST /api/agents/:name/process
pub async fn process(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(input): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let agent = state
        .manager()
        .get_agent(&name)
        .ok_or_else(|| ApiError::not_found(format!("Agent not found: {}", name)))?;

    let output = agent.process(input).await?;
    Ok(Json(output))
}
