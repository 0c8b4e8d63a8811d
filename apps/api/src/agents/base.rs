use async_trait::async_trait;
use serde_json::Value;

use super::errors::AgentResult;
use super::state::{AgentCore, AgentStatus};

/// A named unit exposing a single input record -> output record transform
///
/// Concrete agents deserialize the input into their typed request and
/// serialize their typed result back into a JSON record.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Shared state, memory and statistics
    fn core(&self) -> &AgentCore;

    /// Transform an input record into an output record
    async fn process(&self, input: Value) -> AgentResult<Value>;

    fn name(&self) -> &str {
        self.core().name()
    }

    fn status(&self) -> AgentStatus {
        self.core().status()
    }

    fn reset(&self) {
        self.core().reset()
    }
}
