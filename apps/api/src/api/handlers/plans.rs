use axum::{extract::State, Json};
use serde::Deserialize;

use crate::agents::types::{Plan, Task};
use crate::api::errors::ApiError;
use crate::api::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    pub instruction: String,
}

/// Decompose an instruction without executing it
///
/// POST /api/plans
pub async fn create_plan(
    State(state): State<AppState>,
    Json(req): Json<CreatePlanRequest>,
) -> Result<Json<Plan>, ApiError> {
    let plan = state.executor.plan(&Task::new(req.instruction)).await?;
    Ok(Json(plan))
}
