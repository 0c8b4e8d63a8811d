// Task lifecycle notifications published by the executor

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::messages::MessageBus;
use super::types::{ExecutionStatus, OutcomeStatus, TaskType};

pub const TOPIC_PLAN_CREATED: &str = "plan.created";
pub const TOPIC_SUBTASK_STARTED: &str = "subtask.started";
pub const TOPIC_SUBTASK_FINISHED: &str = "subtask.finished";
pub const TOPIC_EXECUTION_FINISHED: &str = "execution.finished";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    PlanCreated {
        instruction: String,
        subtask_count: usize,
    },
    SubtaskStarted {
        subtask_id: String,
        task_type: TaskType,
    },
    SubtaskFinished {
        subtask_id: String,
        status: OutcomeStatus,
    },
    ExecutionFinished {
        status: ExecutionStatus,
        steps: usize,
        execution_time_secs: f64,
    },
}

impl AgentEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            AgentEvent::PlanCreated { .. } => TOPIC_PLAN_CREATED,
            AgentEvent::SubtaskStarted { .. } => TOPIC_SUBTASK_STARTED,
            AgentEvent::SubtaskFinished { .. } => TOPIC_SUBTASK_FINISHED,
            AgentEvent::ExecutionFinished { .. } => TOPIC_EXECUTION_FINISHED,
        }
    }

    pub fn publish(&self, bus: &MessageBus) -> usize {
        let payload = serde_json::to_value(self).unwrap_or(Value::Null);
        bus.publish(self.topic(), payload)
    }
}
