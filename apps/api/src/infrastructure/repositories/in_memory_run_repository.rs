use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::repositories::TaskRunRepository;
use crate::domain::run::TaskRun;

/// Process-local implementation of TaskRunRepository
///
/// Runs live for the lifetime of the server process.
#[derive(Default)]
pub struct InMemoryTaskRunRepository {
    runs: RwLock<HashMap<Uuid, TaskRun>>,
}

impl InMemoryTaskRunRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRunRepository for InMemoryTaskRunRepository {
    async fn save(&self, run: &TaskRun) -> Result<(), String> {
        self.runs.write().await.insert(run.id(), run.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TaskRun>, String> {
        Ok(self.runs.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<TaskRun>, String> {
        let mut runs: Vec<TaskRun> = self.runs.read().await.values().cloned().collect();
        runs.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(runs)
    }

    async fn delete(&self, id: Uuid) -> Result<(), String> {
        match self.runs.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(format!("Task run not found: {}", id)),
        }
    }
}
