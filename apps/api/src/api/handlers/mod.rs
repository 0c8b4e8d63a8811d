pub mod agents;
pub mod chat;
pub mod knowledge;
pub mod plans;
pub mod tasks;

/// Health check endpoint
///
/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}
