use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A natural-language task submitted to the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub instruction: String,
    #[serde(default)]
    pub max_steps: Option<u32>,
    #[serde(default)]
    pub evaluator: Option<EvaluatorSpec>,
}

impl Task {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            max_steps: None,
            evaluator: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: EvaluatorSpec) -> Self {
        self.evaluator = Some(evaluator);
        self
    }
}

/// How a finished task should be checked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorSpec {
    #[serde(rename = "type")]
    pub kind: EvaluatorKind,
    #[serde(default)]
    pub expected: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorKind {
    ScreenshotCheck,
    FileCheck,
    VmCommandLine,
    #[serde(other)]
    Other,
}

/// Subtask type used for dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    KnowledgeQuery,
    CodeGeneration,
    GuiAction,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::KnowledgeQuery => write!(f, "knowledge_query"),
            TaskType::CodeGeneration => write!(f, "code_generation"),
            TaskType::GuiAction => write!(f, "gui_action"),
            TaskType::Unknown => write!(f, "unknown"),
        }
    }
}

/// What the planner understood from an instruction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskUnderstanding {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub expected_result: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// One unit of decomposed work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub description: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Ordered execution plan produced by the planning agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub subtasks: Vec<Subtask>,
    pub execution_order: Vec<String>,
    pub estimated_time_secs: u64,
    pub understanding: TaskUnderstanding,
}

impl Plan {
    pub fn subtask(&self, id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// Result of dispatching one subtask
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtaskResult {
    pub subtask_id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: OutcomeStatus,
    #[serde(default)]
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SubtaskResult {
    pub fn success(subtask: &Subtask, output: Value) -> Self {
        Self {
            subtask_id: subtask.id.clone(),
            task_type: subtask.task_type,
            status: OutcomeStatus::Success,
            output,
            message: None,
        }
    }

    pub fn error(subtask: &Subtask, output: Value, message: impl Into<String>) -> Self {
        Self {
            subtask_id: subtask.id.clone(),
            task_type: subtask.task_type,
            status: OutcomeStatus::Error,
            output,
            message: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == OutcomeStatus::Error
    }
}

/// Aggregate status handed to the evaluation agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    Completed,
    Partial,
    Failed,
}

/// Screen observation taken by the GUI agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Base64 encoded PNG
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Observation {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            width: None,
            height: None,
            screenshot: None,
            message: Some(message.into()),
        }
    }
}

/// What the evaluation agent scores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub status: SummaryStatus,
    pub steps: usize,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub execution_time_secs: f64,
    #[serde(default)]
    pub final_observation: Option<Observation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Completed,
    Error,
}

/// Final output of the task executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub results: Vec<SubtaskResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<super::evaluation::Evaluation>,
    pub steps: usize,
    pub execution_time_secs: f64,
}

impl ExecutionReport {
    pub fn error(message: impl Into<String>, execution_time_secs: f64) -> Self {
        Self {
            status: ExecutionStatus::Error,
            message: Some(message.into()),
            plan: None,
            results: Vec::new(),
            evaluation: None,
            steps: 0,
            execution_time_secs,
        }
    }
}
