// Agent system modules
//
// A planning agent decomposes natural-language tasks into typed subtasks,
// which the executor dispatches to the knowledge, code and GUI agents before
// the evaluation agent scores the outcome.

pub mod base;
pub mod code;
pub mod customer_service;
pub mod errors;
pub mod evaluation;
pub mod events;
pub mod executor;
pub mod gui;
pub mod knowledge;
pub mod llm;
pub mod manager;
pub mod messages;
pub mod planner;
pub mod prompts;
pub mod state;
pub mod text;
pub mod types;

// Re-export main types
pub use base::Agent;
pub use errors::{AgentError, AgentResult};
pub use executor::TaskExecutor;
pub use manager::{AgentManager, AgentsConfig};
pub use types::{ExecutionReport, Plan, Task};
