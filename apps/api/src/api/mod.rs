// API layer module (adapters for controllers)
// Follows Hexagonal Architecture - API is an adapter

pub mod errors;
pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};

use handlers::{agents, chat, knowledge, plans, tasks};
pub use state::AppState;

/// All routes, without middleware layers
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Task runs
        .route("/api/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route("/api/tasks/:id", get(tasks::get_task).delete(tasks::delete_task))
        .route("/api/plans", post(plans::create_plan))
        // Agents
        .route("/api/agents", get(agents::list_agents))
        .route("/api/agents/reset", post(agents::reset_agents))
        .route("/api/agents/:name/process", post(agents::process))
        .route("/api/knowledge/documents", post(knowledge::add_document))
        .route("/api/chat", post(chat::chat))
        .with_state(state)
}
