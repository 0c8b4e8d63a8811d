use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::base::Agent;
use super::errors::AgentResult;
use super::state::{AgentCore, DEFAULT_MAX_MEMORY};
use super::types::{EvaluatorKind, EvaluatorSpec, ExecutionSummary, SummaryStatus, Task};

const SCREENSHOT_SCORE: f64 = 0.8;
const UNVERIFIED_SCORE: f64 = 0.5;

/// Evaluation agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Completion score a run must exceed to count as a success
    pub success_threshold: f64,
    pub slow_execution_secs: f64,
    pub max_memory: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            success_threshold: 0.8,
            slow_execution_secs: 60.0,
            max_memory: DEFAULT_MAX_MEMORY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Error,
    Performance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    ErrorHandling,
    Optimization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Success,
    Partial,
}

/// Scored assessment of one execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub completion_score: f64,
    pub quality_score: f64,
    pub issues: Vec<Issue>,
    pub suggestions: Vec<Suggestion>,
    pub overall_status: OverallStatus,
}

#[derive(Debug, Deserialize)]
struct EvaluationInput {
    task: Task,
    execution_result: ExecutionSummary,
}

/// Evaluation Agent: task completion assessment and feedback
pub struct EvaluationAgent {
    core: AgentCore,
    config: EvaluationConfig,
}

impl EvaluationAgent {
    pub fn new(config: EvaluationConfig) -> Self {
        Self {
            core: AgentCore::new("EvaluationAgent", config.max_memory),
            config,
        }
    }

    pub async fn evaluate(&self, task: &Task, summary: &ExecutionSummary) -> AgentResult<Evaluation> {
        self.core
            .track("evaluate", async {
                let completion_score = completion(task.evaluator.as_ref(), summary).await;
                let quality_score = quality(summary);
                let issues = self.identify_issues(summary);
                let suggestions = suggestions_for(&issues);

                let overall_status = if completion_score > self.config.success_threshold {
                    OverallStatus::Success
                } else {
                    OverallStatus::Partial
                };

                tracing::info!(
                    completion_score,
                    quality_score,
                    issues = issues.len(),
                    ?overall_status,
                    "execution evaluated"
                );

                Ok(Evaluation {
                    completion_score,
                    quality_score,
                    issues,
                    suggestions,
                    overall_status,
                })
            })
            .await
    }

    fn identify_issues(&self, summary: &ExecutionSummary) -> Vec<Issue> {
        let mut issues: Vec<Issue> = summary
            .errors
            .iter()
            .map(|error| Issue {
                kind: IssueKind::Error,
                severity: Severity::High,
                message: error.clone(),
            })
            .collect();

        if summary.execution_time_secs > self.config.slow_execution_secs {
            issues.push(Issue {
                kind: IssueKind::Performance,
                severity: Severity::Medium,
                message: format!(
                    "Execution took too long: {:.1}s",
                    summary.execution_time_secs
                ),
            });
        }

        issues
    }
}

#[async_trait]
impl Agent for EvaluationAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn process(&self, input: Value) -> AgentResult<Value> {
        let input: EvaluationInput = serde_json::from_value(input)?;
        let evaluation = self.evaluate(&input.task, &input.execution_result).await?;
        Ok(serde_json::to_value(evaluation)?)
    }
}

async fn completion(evaluator: Option<&EvaluatorSpec>, summary: &ExecutionSummary) -> f64 {
    let Some(evaluator) = evaluator else {
        return match summary.status {
            SummaryStatus::Completed => 1.0,
            SummaryStatus::Partial => 0.5,
            SummaryStatus::Failed => 0.0,
        };
    };

    match evaluator.kind {
        EvaluatorKind::ScreenshotCheck => {
            let observed = summary
                .final_observation
                .as_ref()
                .is_some_and(|o| o.success);
            if observed {
                SCREENSHOT_SCORE
            } else {
                0.0
            }
        }
        EvaluatorKind::FileCheck => {
            let exists = !evaluator.expected.is_empty()
                && tokio::fs::try_exists(&evaluator.expected)
                    .await
                    .unwrap_or(false);
            if exists {
                1.0
            } else {
                0.0
            }
        }
        EvaluatorKind::VmCommandLine | EvaluatorKind::Other => UNVERIFIED_SCORE,
    }
}

fn quality(summary: &ExecutionSummary) -> f64 {
    if summary.steps == 0 {
        return 0.0;
    }
    let error_rate = summary.errors.len() as f64 / summary.steps as f64;
    (1.0 - error_rate).max(0.0)
}

fn suggestions_for(issues: &[Issue]) -> Vec<Suggestion> {
    issues
        .iter()
        .map(|issue| match issue.kind {
            IssueKind::Error => Suggestion {
                kind: SuggestionKind::ErrorHandling,
                suggestion: "Add error handling and retries".to_string(),
            },
            IssueKind::Performance => Suggestion {
                kind: SuggestionKind::Optimization,
                suggestion: "Remove unnecessary steps to shorten execution".to_string(),
            },
        })
        .collect()
}
