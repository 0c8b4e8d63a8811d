use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use super::errors::{AgentError, AgentResult};
use super::events::AgentEvent;
use super::gui::GuiOutcome;
use super::manager::AgentManager;
use super::types::{
    ExecutionReport, ExecutionStatus, ExecutionSummary, Observation, Plan, Subtask,
    SubtaskResult, SummaryStatus, Task, TaskType,
};

/// Runs a task end to end: plan, dispatch each subtask, evaluate
pub struct TaskExecutor {
    manager: Arc<AgentManager>,
}

impl TaskExecutor {
    pub fn new(manager: Arc<AgentManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<AgentManager> {
        &self.manager
    }

    /// Decompose a task without executing it
    ///
    /// # Errors
    /// * `AgentNotFound` - no planning agent is registered
    pub async fn plan(&self, task: &Task) -> AgentResult<Plan> {
        let planner = self
            .manager
            .planning()
            .ok_or_else(|| AgentError::AgentNotFound("planning agent not initialised".to_string()))?;
        planner.decompose(task).await
    }

    /// Execute a task; failures are reported in the returned record
    pub async fn execute(&self, task: &Task) -> ExecutionReport {
        let started = Instant::now();
        tracing::info!(instruction = %task.instruction, "executing task");

        let plan = match self.plan(task).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!(error = %e, "planning failed");
                return self.finish(ExecutionReport::error(
                    e.to_string(),
                    started.elapsed().as_secs_f64(),
                ));
            }
        };

        AgentEvent::PlanCreated {
            instruction: task.instruction.clone(),
            subtask_count: plan.subtasks.len(),
        }
        .publish(self.manager.bus());

        let mut results = Vec::new();
        for id in &plan.execution_order {
            let Some(subtask) = plan.subtask(id) else {
                tracing::warn!(subtask_id = %id, "execution order names an unknown subtask");
                continue;
            };

            let result = self.execute_subtask(subtask, task).await;
            let failed = result.is_error();
            results.push(result);
            if failed {
                tracing::warn!(subtask_id = %id, "subtask failed, stopping execution");
                break;
            }
        }

        let evaluation = match self.manager.evaluation() {
            Some(evaluator) => {
                let summary = summarize(&results, started.elapsed().as_secs_f64());
                match evaluator.evaluate(task, &summary).await {
                    Ok(evaluation) => Some(evaluation),
                    Err(e) => {
                        tracing::warn!(error = %e, "evaluation failed");
                        None
                    }
                }
            }
            None => None,
        };

        let steps = results.len();
        self.finish(ExecutionReport {
            status: ExecutionStatus::Completed,
            message: None,
            plan: Some(plan),
            results,
            evaluation,
            steps,
            execution_time_secs: started.elapsed().as_secs_f64(),
        })
    }

    fn finish(&self, report: ExecutionReport) -> ExecutionReport {
        tracing::info!(
            status = ?report.status,
            steps = report.steps,
            execution_time_secs = report.execution_time_secs,
            "task execution finished"
        );
        AgentEvent::ExecutionFinished {
            status: report.status,
            steps: report.steps,
            execution_time_secs: report.execution_time_secs,
        }
        .publish(self.manager.bus());
        report
    }

    async fn execute_subtask(&self, subtask: &Subtask, task: &Task) -> SubtaskResult {
        tracing::info!(
            subtask_id = %subtask.id,
            task_type = %subtask.task_type,
            description = %subtask.description,
            "executing subtask"
        );
        AgentEvent::SubtaskStarted {
            subtask_id: subtask.id.clone(),
            task_type: subtask.task_type,
        }
        .publish(self.manager.bus());

        let result = match self.dispatch(subtask, task).await {
            Ok(result) => result,
            Err(e) => SubtaskResult::error(subtask, Value::Null, e.to_string()),
        };

        AgentEvent::SubtaskFinished {
            subtask_id: subtask.id.clone(),
            status: result.status,
        }
        .publish(self.manager.bus());
        result
    }

    async fn dispatch(&self, subtask: &Subtask, task: &Task) -> AgentResult<SubtaskResult> {
        let missing = || AgentError::AgentNotFound(format!("no agent for {} subtasks", subtask.task_type));

        match subtask.task_type {
            TaskType::KnowledgeQuery => {
                let agent = self.manager.knowledge().ok_or_else(missing)?;
                let retrieval = agent
                    .retrieve(&subtask.description, agent.default_top_k())
                    .await?;
                Ok(SubtaskResult::success(subtask, serde_json::to_value(retrieval)?))
            }
            TaskType::CodeGeneration => {
                let agent = self.manager.code().ok_or_else(missing)?;
                let generation = agent
                    .generate_code(&subtask.description, &task.instruction)
                    .await?;
                Ok(SubtaskResult::success(subtask, serde_json::to_value(generation)?))
            }
            TaskType::GuiAction => {
                let agent = self.manager.gui().ok_or_else(missing)?;
                let max_steps = task.max_steps.unwrap_or_else(|| agent.default_max_steps());
                let run = agent.execute_task(&subtask.description, max_steps).await?;
                let failed = run.outcome == GuiOutcome::Fail;
                let output = serde_json::to_value(run)?;
                if failed {
                    Ok(SubtaskResult::error(subtask, output, "GUI agent reported failure"))
                } else {
                    Ok(SubtaskResult::success(subtask, output))
                }
            }
            TaskType::Unknown => Ok(SubtaskResult::error(
                subtask,
                json!({ "description": subtask.description }),
                format!("Unknown subtask type for: {}", subtask.description),
            )),
        }
    }
}

/// Aggregate dispatch results into what the evaluation agent scores
fn summarize(results: &[SubtaskResult], execution_time_secs: f64) -> ExecutionSummary {
    let errors: Vec<String> = results
        .iter()
        .filter(|r| r.is_error())
        .map(|r| r.message.clone().unwrap_or_else(|| format!("{} failed", r.subtask_id)))
        .collect();

    let status = if errors.is_empty() {
        SummaryStatus::Completed
    } else if errors.len() < results.len() {
        SummaryStatus::Partial
    } else {
        SummaryStatus::Failed
    };

    let final_observation = results
        .iter()
        .rev()
        .filter(|r| r.task_type == TaskType::GuiAction)
        .find_map(|r| {
            serde_json::from_value::<Observation>(r.output.get("final_observation")?.clone()).ok()
        });

    ExecutionSummary {
        status,
        steps: results.len(),
        errors,
        execution_time_secs,
        final_observation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::evaluation::{EvaluationAgent, EvaluationConfig, OverallStatus};
    use crate::agents::events::{TOPIC_EXECUTION_FINISHED, TOPIC_SUBTASK_STARTED};
    use crate::agents::gui::{GuiAgent, GuiConfig, RecordingDesktop};
    use crate::agents::knowledge::{KnowledgeAgent, KnowledgeConfig};
    use crate::agents::code::{CodeAgent, CodeConfig};
    use crate::agents::llm::ScriptedLlm;
    use crate::agents::manager::{AgentsConfig, CODE};
    use crate::agents::planner::{PlanningAgent, PlanningConfig};
    use crate::agents::types::OutcomeStatus;

    fn executor(manager: AgentManager) -> TaskExecutor {
        TaskExecutor::new(Arc::new(manager))
    }

    #[tokio::test]
    async fn missing_planner_yields_error_report() {
        let report = executor(AgentManager::new()).execute(&Task::new("do something")).await;

        assert_eq!(report.status, ExecutionStatus::Error);
        assert!(report.message.unwrap().contains("planning agent"));
        assert!(report.plan.is_none());
        assert!(report.execution_time_secs >= 0.0);
    }

    #[tokio::test]
    async fn empty_instruction_yields_error_report() {
        let exec = executor(AgentManager::from_config(&AgentsConfig::all()));
        let report = exec.execute(&Task::new("  ")).await;

        assert_eq!(report.status, ExecutionStatus::Error);
        assert!(report.message.unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn dispatches_every_subtask_type() {
        let vision = Arc::new(ScriptedLlm::new().with_reply("pyautogui.click()\nDONE"));
        let desktop = Arc::new(RecordingDesktop::new(640, 480));
        let knowledge = KnowledgeAgent::new(KnowledgeConfig::default());
        knowledge
            .add_document("how to search rust docs quickly".to_string(), Default::default())
            .await;

        let manager = AgentManager::new()
            .with_planning(PlanningAgent::new(PlanningConfig::default(), None))
            .with_knowledge(knowledge)
            .with_code(CodeAgent::new(CodeConfig::default(), None))
            .with_gui(GuiAgent::new(GuiConfig::default(), Some(vision)).with_desktop(desktop.clone()))
            .with_evaluation(EvaluationAgent::new(EvaluationConfig::default()));
        let exec = executor(manager);

        let report = exec
            .execute(&Task::new("search rust docs, generate a parser, click the save button"))
            .await;

        assert_eq!(report.status, ExecutionStatus::Completed);
        assert_eq!(report.steps, 3);
        let types: Vec<TaskType> = report.results.iter().map(|r| r.task_type).collect();
        assert_eq!(
            types,
            vec![TaskType::KnowledgeQuery, TaskType::CodeGeneration, TaskType::GuiAction]
        );
        assert!(report.results.iter().all(|r| r.status == OutcomeStatus::Success));
        assert_eq!(desktop.performed(), vec!["click()"]);

        let evaluation = report.evaluation.unwrap();
        assert_eq!(evaluation.completion_score, 1.0);
        assert_eq!(evaluation.overall_status, OverallStatus::Success);
    }

    #[tokio::test]
    async fn stops_after_first_failure() {
        // no knowledge agent registered, so the first subtask fails
        let manager = AgentManager::new()
            .with_planning(PlanningAgent::new(PlanningConfig::default(), None))
            .with_code(CodeAgent::new(CodeConfig::default(), None))
            .with_evaluation(EvaluationAgent::new(EvaluationConfig::default()));
        let exec = executor(manager);

        let report = exec.execute(&Task::new("search the docs, generate a summary")).await;

        assert_eq!(report.status, ExecutionStatus::Completed);
        assert_eq!(report.steps, 1);
        assert!(report.results[0].is_error());
        assert!(report.results[0].message.as_deref().unwrap().contains("knowledge_query"));

        let evaluation = report.evaluation.unwrap();
        assert_eq!(evaluation.completion_score, 0.0);
        assert_eq!(evaluation.quality_score, 0.0);
        assert_eq!(evaluation.overall_status, OverallStatus::Partial);
    }

    #[tokio::test]
    async fn unknown_subtasks_are_errors() {
        let manager = AgentManager::new()
            .with_planning(PlanningAgent::new(PlanningConfig::default(), None));
        let report = executor(manager).execute(&Task::new("ponder the universe")).await;

        assert_eq!(report.steps, 1);
        assert_eq!(report.results[0].task_type, TaskType::Unknown);
        assert!(report.results[0].is_error());
        assert!(report.evaluation.is_none());
    }

    #[tokio::test]
    async fn gui_failure_is_an_error_result() {
        let vision = Arc::new(ScriptedLlm::new().with_reply("I cannot find the button, FAIL"));
        let manager = AgentManager::new()
            .with_planning(PlanningAgent::new(PlanningConfig::default(), None))
            .with_gui(
                GuiAgent::new(GuiConfig::default(), Some(vision))
                    .with_desktop(Arc::new(RecordingDesktop::new(10, 10))),
            );

        let report = executor(manager).execute(&Task::new("click the ok button")).await;

        assert!(report.results[0].is_error());
        assert_eq!(report.results[0].output["outcome"], "fail");
    }

    #[tokio::test]
    async fn agent_registered_by_name_is_dispatched() {
        let first = Arc::new(ScriptedLlm::new().with_reply("result = 'first'"));
        let second = Arc::new(ScriptedLlm::new().with_reply("result = 'second'"));
        let mut manager = AgentManager::new()
            .with_planning(PlanningAgent::new(PlanningConfig::default(), None));
        manager.register_agent(CODE, Arc::new(CodeAgent::new(CodeConfig::default(), Some(first.clone()))));

        let report = executor(manager).execute(&Task::new("generate a parser")).await;

        assert_eq!(report.results[0].status, OutcomeStatus::Success);
        assert_eq!(report.results[0].output["code"], "result = 'first'");
        assert_eq!(first.prompts().len(), 1);

        // Replacing the entry replaces the agent dispatch uses
        let mut manager = AgentManager::new()
            .with_planning(PlanningAgent::new(PlanningConfig::default(), None))
            .with_code(CodeAgent::new(CodeConfig::default(), Some(first.clone())));
        manager.register_agent(CODE, Arc::new(CodeAgent::new(CodeConfig::default(), Some(second.clone()))));

        let report = executor(manager).execute(&Task::new("generate a parser")).await;

        assert_eq!(report.results[0].output["code"], "result = 'second'");
        assert_eq!(first.prompts().len(), 1);
        assert_eq!(second.prompts().len(), 1);
    }

    fn waiting_gui(max_steps: u32) -> (GuiAgent, Arc<ScriptedLlm>) {
        let vision = (0..10).fold(ScriptedLlm::new(), |llm, _| llm.with_reply("WAIT"));
        let vision = Arc::new(vision);
        let config = GuiConfig {
            max_steps,
            wait_interval_ms: 0,
            ..Default::default()
        };
        let agent = GuiAgent::new(config, Some(vision.clone()))
            .with_desktop(Arc::new(RecordingDesktop::new(10, 10)));
        (agent, vision)
    }

    #[tokio::test]
    async fn task_max_steps_overrides_gui_default() {
        let (gui, vision) = waiting_gui(5);
        let manager = AgentManager::new()
            .with_planning(PlanningAgent::new(PlanningConfig::default(), None))
            .with_gui(gui);
        let task = Task {
            instruction: "click the refresh button".to_string(),
            max_steps: Some(3),
            evaluator: None,
        };

        let report = executor(manager).execute(&task).await;

        assert_eq!(report.results[0].status, OutcomeStatus::Success);
        assert_eq!(report.results[0].output["outcome"], "max_steps");
        assert_eq!(report.results[0].output["steps"], 3);
        assert_eq!(vision.prompts().len(), 3);
    }

    #[tokio::test]
    async fn gui_default_max_steps_applies_without_task_limit() {
        let (gui, vision) = waiting_gui(2);
        let manager = AgentManager::new()
            .with_planning(PlanningAgent::new(PlanningConfig::default(), None))
            .with_gui(gui);

        let report = executor(manager).execute(&Task::new("click the refresh button")).await;

        assert_eq!(report.results[0].output["steps"], 2);
        assert_eq!(vision.prompts().len(), 2);
    }

    #[tokio::test]
    async fn lifecycle_events_are_published() {
        let manager = AgentManager::new()
            .with_planning(PlanningAgent::new(PlanningConfig::default(), None))
            .with_code(CodeAgent::new(CodeConfig::default(), None));
        let exec = executor(manager);

        exec.execute(&Task::new("write code, generate tests")).await;

        let topics: Vec<String> = exec
            .manager()
            .bus()
            .history()
            .into_iter()
            .map(|m| m.topic)
            .collect();
        assert_eq!(topics.first().map(String::as_str), Some("plan.created"));
        assert_eq!(topics.iter().filter(|t| *t == TOPIC_SUBTASK_STARTED).count(), 2);
        assert_eq!(topics.last().map(String::as_str), Some(TOPIC_EXECUTION_FINISHED));
    }

    #[test]
    fn summary_picks_last_gui_observation() {
        let subtask = Subtask {
            id: "task_1".to_string(),
            description: "click".to_string(),
            task_type: TaskType::GuiAction,
            dependencies: vec![],
        };
        let ok = SubtaskResult::success(
            &subtask,
            json!({ "final_observation": { "success": true, "width": 5, "height": 5 } }),
        );
        let failed = SubtaskResult::error(&subtask, Value::Null, "boom");

        let summary = summarize(&[ok, failed], 2.0);

        assert_eq!(summary.status, SummaryStatus::Partial);
        assert_eq!(summary.errors, vec!["boom"]);
        assert_eq!(summary.final_observation.unwrap().width, Some(5));
    }
}
