use thiserror::Error;

/// Errors that can occur in the agent system
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM API error: {0}")]
    LlmError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),

    #[error("Code validation failed: {0}")]
    ValidationFailed(String),

    #[error("Code contains unsafe operations")]
    UnsafeCode,

    #[error("Sandbox is disabled")]
    SandboxDisabled,

    #[error("Desktop error: {0}")]
    DesktopError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;
