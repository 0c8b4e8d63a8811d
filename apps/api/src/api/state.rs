use std::sync::Arc;

use crate::agents::{AgentManager, TaskExecutor};
use crate::config::AppConfig;
use crate::domain::repositories::TaskRunRepository;
use crate::infrastructure::repositories::InMemoryTaskRunRepository;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<TaskExecutor>,
    pub runs: Arc<dyn TaskRunRepository>,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_manager(AgentManager::from_config(&config.agents))
    }

    /// State around a prepared manager, with in-memory run storage
    pub fn with_manager(manager: AgentManager) -> Self {
        Self {
            executor: Arc::new(TaskExecutor::new(Arc::new(manager))),
            runs: Arc::new(InMemoryTaskRunRepository::new()),
        }
    }

    pub fn manager(&self) -> &Arc<AgentManager> {
        self.executor.manager()
    }
}
