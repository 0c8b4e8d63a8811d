use uuid::Uuid;

/// Domain events raised by the TaskRun aggregate
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// Fired when a run is accepted
    Created { run_id: Uuid, instruction: String },
    /// Fired when the executor picks the run up
    Started { run_id: Uuid },
    /// Fired when execution produced a report
    Completed { run_id: Uuid, steps: usize },
    /// Fired when planning or execution failed
    Failed { run_id: Uuid, reason: String },
}

impl RunEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            RunEvent::Created { run_id, .. } => *run_id,
            RunEvent::Started { run_id } => *run_id,
            RunEvent::Completed { run_id, .. } => *run_id,
            RunEvent::Failed { run_id, .. } => *run_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RunEvent::Created { .. } => "run.created",
            RunEvent::Started { .. } => "run.started",
            RunEvent::Completed { .. } => "run.completed",
            RunEvent::Failed { .. } => "run.failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_expose_run_id_and_name() {
        let run_id = Uuid::new_v4();
        let events = [
            RunEvent::Created {
                run_id,
                instruction: "open the editor".to_string(),
            },
            RunEvent::Started { run_id },
            RunEvent::Completed { run_id, steps: 2 },
            RunEvent::Failed {
                run_id,
                reason: "no planner".to_string(),
            },
        ];

        assert!(events.iter().all(|e| e.run_id() == run_id));
        let names: Vec<&str> = events.iter().map(RunEvent::name).collect();
        assert_eq!(names, vec!["run.created", "run.started", "run.completed", "run.failed"]);
    }
}
