use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::run::TaskRun;

/// Repository trait for the TaskRun aggregate
#[async_trait]
pub trait TaskRunRepository: Send + Sync {
    /// Save a run (insert or update)
    async fn save(&self, run: &TaskRun) -> Result<(), String>;

    /// Find a run by its ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<TaskRun>, String>;

    /// All runs, newest first
    async fn list(&self) -> Result<Vec<TaskRun>, String>;

    /// Delete a run by ID; errors with "not found" for unknown IDs
    async fn delete(&self, id: Uuid) -> Result<(), String>;
}
