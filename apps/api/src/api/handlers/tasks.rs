use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agents::types::{EvaluatorSpec, ExecutionReport, ExecutionStatus, Task};
use crate::api::errors::ApiError;
use crate::api::state::AppState;
use crate::domain::run::{RunEvent, RunStatus, TaskRun};

/// Request body for submitting a task
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub instruction: String,
    pub max_steps: Option<u32>,
    pub evaluator: Option<EvaluatorSpec>,
}

/// A task run as returned by the API
#[derive(Debug, Serialize)]
pub struct TaskRunResponse {
    pub id: Uuid,
    pub instruction: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ExecutionReport>,
}

impl From<&TaskRun> for TaskRunResponse {
    fn from(run: &TaskRun) -> Self {
        Self {
            id: run.id(),
            instruction: run.instruction().to_string(),
            status: run.status(),
            created_at: run.created_at(),
            started_at: run.started_at(),
            finished_at: run.finished_at(),
            error: run.error().map(str::to_string),
            report: run.report().cloned(),
        }
    }
}

/// Run the full pipeline for an instruction and store the outcome
///
/// POST /api/tasks
pub async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskRunResponse>), ApiError> {
    let (mut run, events) = TaskRun::new(req.instruction, req.max_steps).map_err(ApiError::bad_request)?;
    events.iter().for_each(log_event);
    log_event(&run.start()?);
    state.runs.save(&run).await?;

    let task = Task {
        instruction: run.instruction().to_string(),
        max_steps: run.max_steps(),
        evaluator: req.evaluator,
    };
    let report = state.executor.execute(&task).await;

    let event = match report.status {
        ExecutionStatus::Completed => run.complete(report)?,
        ExecutionStatus::Error => {
            let reason = report
                .message
                .clone()
                .unwrap_or_else(|| "Task execution failed".to_string());
            run.fail(reason, Some(report))?
        }
    };
    log_event(&event);
    tracing::info!(run_id = %run.id(), status = %run.status(), "task run finished");

    state.runs.save(&run).await?;

    Ok((StatusCode::CREATED, Json(TaskRunResponse::from(&run))))
}

fn log_event(event: &RunEvent) {
    tracing::debug!(run_id = %event.run_id(), event = event.name(), "task run event");
}

/// List stored runs, newest first
///
/// GET /api/tasks
pub async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<TaskRunResponse>>, ApiError> {
    let runs = state.runs.list().await?;
    Ok(Json(runs.iter().map(TaskRunResponse::from).collect()))
}

/// Get a run by ID
///
/// GET /api/tasks/:id
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskRunResponse>, ApiError> {
    let run = state
        .runs
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Task run not found: {}", id)))?;

    Ok(Json(TaskRunResponse::from(&run)))
}

/// Delete a run
///
/// DELETE /api/tasks/:id
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.runs.delete(id).await.map_err(|e| {
        if e.contains("not found") {
            ApiError::not_found(e)
        } else {
            ApiError::internal_server_error(format!("Failed to delete task run: {}", e))
        }
    })?;

    Ok(StatusCode::NO_CONTENT)
}
