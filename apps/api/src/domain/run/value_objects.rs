use serde::{Deserialize, Serialize};

/// Lifecycle status of a task run
///
/// # Status Transitions
/// ```text
/// Pending -> Running -> Completed
///                  \--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Accepted, not yet handed to the executor
    Pending,
    /// The executor is working on it
    Running,
    /// Every stage ran and produced a report
    Completed,
    /// Planning or execution could not proceed
    Failed,
}

impl RunStatus {
    /// Checks if a transition from current status to next status is valid
    ///
    /// # Example
    /// ```
    /// use taskcrew_api::domain::run::value_objects::RunStatus;
    ///
    /// assert!(RunStatus::Pending.can_transition_to(RunStatus::Running));
    /// assert!(!RunStatus::Pending.can_transition_to(RunStatus::Completed));
    /// ```
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        use RunStatus::*;
        matches!(
            (self, next),
            (Pending, Running) | (Running, Completed) | (Running, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        assert!(RunStatus::Pending.can_transition_to(RunStatus::Running));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Completed));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Failed));
    }

    #[test]
    fn invalid_transition_pending_to_completed() {
        assert!(!RunStatus::Pending.can_transition_to(RunStatus::Completed));
        assert!(!RunStatus::Pending.can_transition_to(RunStatus::Failed));
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [RunStatus::Completed, RunStatus::Failed] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(RunStatus::Running));
            assert!(!terminal.can_transition_to(RunStatus::Pending));
        }
    }

    #[test]
    fn status_display() {
        assert_eq!(RunStatus::Pending.to_string(), "pending");
        assert_eq!(RunStatus::Running.to_string(), "running");
        assert_eq!(RunStatus::Completed.to_string(), "completed");
        assert_eq!(RunStatus::Failed.to_string(), "failed");
    }
}
