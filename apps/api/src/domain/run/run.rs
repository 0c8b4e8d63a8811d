use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::events::RunEvent;
use super::value_objects::RunStatus;
use crate::agents::types::ExecutionReport;

/// Task run aggregate root
///
/// One submitted instruction and, once executed, the report the pipeline
/// produced for it.
///
/// # Invariants
/// - Instruction cannot be empty
/// - Status transitions follow [`RunStatus::can_transition_to`]
/// - `finished_at` is set exactly when the status is terminal
///
/// # Example
/// ```
/// use taskcrew_api::domain::run::TaskRun;
///
/// let (run, events) = TaskRun::new("open the editor".to_string(), None).expect("valid run");
///
/// assert_eq!(run.instruction(), "open the editor");
/// assert_eq!(events.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct TaskRun {
    id: Uuid,
    instruction: String,
    max_steps: Option<u32>,
    status: RunStatus,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    error: Option<String>,
    report: Option<ExecutionReport>,
}

impl TaskRun {
    /// Creates a new pending run
    ///
    /// # Returns
    /// * `Ok((TaskRun, Vec<RunEvent>))` - New run and the Created event
    /// * `Err(String)` - If the instruction is empty
    pub fn new(instruction: String, max_steps: Option<u32>) -> Result<(Self, Vec<RunEvent>), String> {
        let instruction = instruction.trim().to_string();
        if instruction.is_empty() {
            return Err("Instruction cannot be empty".to_string());
        }

        let run = Self {
            id: Uuid::new_v4(),
            instruction,
            max_steps,
            status: RunStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
            report: None,
        };

        let events = vec![RunEvent::Created {
            run_id: run.id,
            instruction: run.instruction.clone(),
        }];

        Ok((run, events))
    }

    fn transition(&mut self, next: RunStatus) -> Result<(), String> {
        if !self.status.can_transition_to(next) {
            return Err(format!("Cannot move run from {} to {}", self.status, next));
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Hands the run to the executor
    pub fn start(&mut self) -> Result<RunEvent, String> {
        self.transition(RunStatus::Running)?;
        self.started_at = Some(Utc::now());

        Ok(RunEvent::Started { run_id: self.id })
    }

    /// Records a finished execution
    pub fn complete(&mut self, report: ExecutionReport) -> Result<RunEvent, String> {
        self.transition(RunStatus::Completed)?;
        let steps = report.steps;
        self.report = Some(report);

        Ok(RunEvent::Completed {
            run_id: self.id,
            steps,
        })
    }

    /// Records a failed execution, keeping the report when there is one
    pub fn fail(&mut self, reason: String, report: Option<ExecutionReport>) -> Result<RunEvent, String> {
        self.transition(RunStatus::Failed)?;
        self.error = Some(reason.clone());
        self.report = report;

        Ok(RunEvent::Failed {
            run_id: self.id,
            reason,
        })
    }

    // ===== Getters =====

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn max_steps(&self) -> Option<u32> {
        self.max_steps
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn report(&self) -> Option<&ExecutionReport> {
        self.report.as_ref()
    }
}
