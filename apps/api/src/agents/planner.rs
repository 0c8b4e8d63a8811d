use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::base::Agent;
use super::errors::{AgentError, AgentResult};
use super::llm::{LlmClient, LlmRequest};
use super::prompts::library;
use super::state::{AgentCore, DEFAULT_MAX_MEMORY};
use super::text::first_code_block_or_text;
use super::types::{Plan, Subtask, Task, TaskType, TaskUnderstanding};

/// Seconds the planner budgets per subtask
const SECONDS_PER_SUBTASK: u64 = 5;

const KNOWLEDGE_WORDS: &[&str] = &[
    "搜索", "查找", "检索", "search", "find", "lookup", "look up", "retrieve", "query",
];
const CODE_WORDS: &[&str] = &[
    "代码", "生成", "编写", "code", "generate", "write", "script", "program",
];
const GUI_WORDS: &[&str] = &[
    "点击", "输入", "打开", "移动", "click", "type", "open", "move", "press", "scroll",
];
const ACTION_KEYWORDS: &[&str] = &[
    "打开", "搜索", "保存", "生成", "点击", "输入", "open", "search", "save", "generate", "click",
    "type",
];

/// Planning agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    pub model: String,
    pub temperature: f32,
    /// Characters the rule-based fallback splits instructions on
    pub step_delimiters: Vec<char>,
    pub max_memory: usize,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            temperature: 0.1,
            step_delimiters: vec!['，', ','],
            max_memory: DEFAULT_MAX_MEMORY,
        }
    }
}

/// Planning Agent: turns an instruction into an ordered list of typed subtasks
///
/// Understanding comes from a single LLM call when a client is configured,
/// otherwise from splitting the instruction on delimiter characters.
pub struct PlanningAgent {
    core: AgentCore,
    config: PlanningConfig,
    llm: Option<Arc<dyn LlmClient>>,
}

#[derive(Debug, Deserialize)]
struct PlanningInput {
    task: Task,
}

impl PlanningAgent {
    pub fn new(config: PlanningConfig, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            core: AgentCore::new("PlanningAgent", config.max_memory),
            config,
            llm,
        }
    }

    /// Decompose a task into an execution plan
    ///
    /// # Errors
    /// * `InvalidInput` - the instruction is empty
    /// * `InvalidPlan` - the dependency graph cannot be ordered
    pub async fn decompose(&self, task: &Task) -> AgentResult<Plan> {
        self.core
            .track("decompose", async {
                let instruction = task.instruction.trim();
                if instruction.is_empty() {
                    return Err(AgentError::InvalidInput(
                        "Instruction cannot be empty".to_string(),
                    ));
                }

                let understanding = self.understand(instruction).await;
                let mut subtasks = build_subtasks(&understanding.steps);
                link_linear_chain(&mut subtasks);
                let execution_order = topological_sort(&subtasks)?;

                tracing::info!(subtasks = subtasks.len(), "task decomposed");

                Ok(Plan {
                    estimated_time_secs: SECONDS_PER_SUBTASK * subtasks.len() as u64,
                    subtasks,
                    execution_order,
                    understanding,
                })
            })
            .await
    }

    async fn understand(&self, instruction: &str) -> TaskUnderstanding {
        if let Some(llm) = &self.llm {
            let template = library::task_understanding();
            let request = LlmRequest::new(
                template.render_with(&[("instruction", instruction)]),
                self.config.temperature,
            )
            .with_system(template.system.clone());

            match llm.complete(request).await {
                Ok(reply) => {
                    let understanding = parse_understanding(&reply);
                    if !understanding.steps.is_empty() {
                        return understanding;
                    }
                    tracing::warn!("LLM understanding contained no steps, using rule-based split");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "LLM understanding failed, using rule-based split");
                }
            }
        }

        self.rule_based_understanding(instruction)
    }

    fn rule_based_understanding(&self, instruction: &str) -> TaskUnderstanding {
        TaskUnderstanding {
            goal: instruction.to_string(),
            steps: split_steps(instruction, &self.config.step_delimiters),
            resources: Vec::new(),
            expected_result: "task completed".to_string(),
            keywords: extract_keywords(instruction),
        }
    }
}

#[async_trait]
impl Agent for PlanningAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn process(&self, input: Value) -> AgentResult<Value> {
        let input: PlanningInput = serde_json::from_value(input)?;
        let plan = self.decompose(&input.task).await?;
        Ok(serde_json::to_value(plan)?)
    }
}

/// Parse the model's JSON reply; anything unparseable becomes the goal
fn parse_understanding(reply: &str) -> TaskUnderstanding {
    let body = first_code_block_or_text(reply);
    match serde_json::from_str::<TaskUnderstanding>(&body) {
        Ok(mut understanding) => {
            understanding.steps = understanding
                .steps
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            understanding
        }
        Err(_) => TaskUnderstanding {
            goal: reply.to_string(),
            ..Default::default()
        },
    }
}

/// Split on any delimiter; the whole instruction when nothing remains
pub fn split_steps(instruction: &str, delimiters: &[char]) -> Vec<String> {
    let steps: Vec<String> = instruction
        .split(|c: char| delimiters.contains(&c))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();

    if steps.is_empty() {
        vec![instruction.to_string()]
    } else {
        steps
    }
}

fn contains_keyword(lower: &str, words: &[&str], keyword: &str) -> bool {
    if !keyword.is_ascii() || keyword.contains(' ') {
        lower.contains(keyword)
    } else {
        words.iter().any(|w| *w == keyword)
    }
}

fn ascii_words(lower: &str) -> Vec<&str> {
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Classify a step description by its action words
pub fn determine_task_type(description: &str) -> TaskType {
    let lower = description.to_lowercase();
    let words = ascii_words(&lower);
    let matches = |list: &[&str]| list.iter().any(|k| contains_keyword(&lower, &words, k));

    if matches(KNOWLEDGE_WORDS) {
        TaskType::KnowledgeQuery
    } else if matches(CODE_WORDS) {
        TaskType::CodeGeneration
    } else if matches(GUI_WORDS) {
        TaskType::GuiAction
    } else {
        TaskType::Unknown
    }
}

/// Known action words present in the text, in list order
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let words = ascii_words(&lower);
    ACTION_KEYWORDS
        .iter()
        .filter(|k| contains_keyword(&lower, &words, k))
        .map(|k| k.to_string())
        .collect()
}

fn build_subtasks(steps: &[String]) -> Vec<Subtask> {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| Subtask {
            id: format!("task_{}", i + 1),
            description: step.clone(),
            task_type: determine_task_type(step),
            dependencies: Vec::new(),
        })
        .collect()
}

/// Subtask i depends on subtask i-1 only
fn link_linear_chain(subtasks: &mut [Subtask]) {
    for i in 1..subtasks.len() {
        let previous = subtasks[i - 1].id.clone();
        subtasks[i].dependencies = vec![previous];
    }
}

/// Kahn's algorithm, breaking ties by listed position
///
/// Returns subtask IDs in an order where every subtask follows its
/// dependencies. A linear chain comes back in listed order.
pub fn topological_sort(subtasks: &[Subtask]) -> AgentResult<Vec<String>> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(subtasks.len());
    for (i, subtask) in subtasks.iter().enumerate() {
        if index.insert(subtask.id.as_str(), i).is_some() {
            return Err(AgentError::InvalidPlan(format!(
                "Duplicate subtask id: {}",
                subtask.id
            )));
        }
    }

    let mut in_degree = vec![0usize; subtasks.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); subtasks.len()];
    for (i, subtask) in subtasks.iter().enumerate() {
        for dep in &subtask.dependencies {
            let j = *index.get(dep.as_str()).ok_or_else(|| {
                AgentError::InvalidPlan(format!(
                    "Subtask {} depends on unknown subtask {}",
                    subtask.id, dep
                ))
            })?;
            in_degree[i] += 1;
            dependents[j].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..subtasks.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(subtasks.len());

    while let Some(i) = ready.pop_first() {
        order.push(subtasks[i].id.clone());
        for &d in &dependents[i] {
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                ready.insert(d);
            }
        }
    }

    if order.len() != subtasks.len() {
        return Err(AgentError::InvalidPlan("Dependency cycle detected".to_string()));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::llm::ScriptedLlm;
    use crate::agents::state::AgentState;

    fn subtask(id: &str, deps: &[&str]) -> Subtask {
        Subtask {
            id: id.to_string(),
            description: id.to_string(),
            task_type: TaskType::Unknown,
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn split_on_fullwidth_and_ascii_commas() {
        let delimiters = PlanningConfig::default().step_delimiters;
        assert_eq!(
            split_steps("打开记事本，输入Hello World，保存为test.txt", &delimiters),
            vec!["打开记事本", "输入Hello World", "保存为test.txt"]
        );
        assert_eq!(
            split_steps("open notepad, type hello", &delimiters),
            vec!["open notepad", "type hello"]
        );
    }

    #[test]
    fn split_without_parts_returns_instruction() {
        assert_eq!(split_steps("，，", &['，']), vec!["，，"]);
    }

    #[test]
    fn classifies_by_keyword_priority() {
        assert_eq!(determine_task_type("搜索AI Agent"), TaskType::KnowledgeQuery);
        assert_eq!(determine_task_type("编写排序代码"), TaskType::CodeGeneration);
        assert_eq!(determine_task_type("打开记事本"), TaskType::GuiAction);
        assert_eq!(determine_task_type("search for rust docs"), TaskType::KnowledgeQuery);
        assert_eq!(determine_task_type("Write a script"), TaskType::CodeGeneration);
        assert_eq!(determine_task_type("click the button"), TaskType::GuiAction);
        assert_eq!(determine_task_type("look up the weather"), TaskType::KnowledgeQuery);
        assert_eq!(determine_task_type("保存为test.txt"), TaskType::Unknown);
    }

    #[test]
    fn ascii_keywords_match_whole_words_only() {
        assert_eq!(determine_task_type("review the prototype"), TaskType::Unknown);
        assert_eq!(determine_task_type("reopened tickets"), TaskType::Unknown);
    }

    #[test]
    fn extracts_known_keywords() {
        assert_eq!(extract_keywords("打开记事本，保存文件"), vec!["打开", "保存"]);
        assert_eq!(extract_keywords("Open the page and click save"), vec!["open", "save", "click"]);
    }

    #[test]
    fn topological_sort_keeps_linear_chain_order() {
        let subtasks = vec![subtask("a", &[]), subtask("b", &["a"]), subtask("c", &["b"])];
        assert_eq!(topological_sort(&subtasks).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn topological_sort_orders_dependencies_first() {
        let subtasks = vec![subtask("a", &["c"]), subtask("b", &[]), subtask("c", &[])];
        assert_eq!(topological_sort(&subtasks).unwrap(), vec!["b", "c", "a"]);
    }

    #[test]
    fn topological_sort_rejects_cycles_and_unknown_ids() {
        let cycle = vec![subtask("a", &["b"]), subtask("b", &["a"])];
        assert!(matches!(topological_sort(&cycle), Err(AgentError::InvalidPlan(_))));

        let dangling = vec![subtask("a", &["zzz"])];
        assert!(matches!(topological_sort(&dangling), Err(AgentError::InvalidPlan(_))));
    }

    #[tokio::test]
    async fn rule_based_plan_is_a_linear_chain() {
        let agent = PlanningAgent::new(PlanningConfig::default(), None);
        let plan = agent
            .decompose(&Task::new("search rust docs, write a script, click run"))
            .await
            .unwrap();

        assert_eq!(plan.subtasks.len(), 3);
        assert_eq!(plan.execution_order, vec!["task_1", "task_2", "task_3"]);
        assert!(plan.subtasks[0].dependencies.is_empty());
        assert_eq!(plan.subtasks[1].dependencies, vec!["task_1"]);
        assert_eq!(plan.subtasks[2].dependencies, vec!["task_2"]);
        assert_eq!(plan.subtasks[0].task_type, TaskType::KnowledgeQuery);
        assert_eq!(plan.subtasks[1].task_type, TaskType::CodeGeneration);
        assert_eq!(plan.subtasks[2].task_type, TaskType::GuiAction);
        assert_eq!(plan.estimated_time_secs, 15);
        assert_eq!(agent.core().state(), AgentState::Idle);
    }

    #[tokio::test]
    async fn empty_instruction_is_rejected() {
        let agent = PlanningAgent::new(PlanningConfig::default(), None);
        let result = agent.decompose(&Task::new("   ")).await;

        assert!(matches!(result, Err(AgentError::InvalidInput(_))));
        assert_eq!(agent.core().state(), AgentState::Error);
    }

    #[tokio::test]
    async fn llm_steps_are_used_when_present() {
        let llm = Arc::new(ScriptedLlm::new().with_reply(
            "```json\n{\"goal\": \"g\", \"steps\": [\"search the web\", \"open editor\"]}\n```",
        ));
        let agent = PlanningAgent::new(PlanningConfig::default(), Some(llm.clone()));

        let plan = agent.decompose(&Task::new("anything")).await.unwrap();

        assert_eq!(plan.understanding.goal, "g");
        assert_eq!(plan.subtasks.len(), 2);
        assert_eq!(plan.subtasks[1].task_type, TaskType::GuiAction);
        assert!(llm.prompts()[0].prompt.contains("Task: anything"));
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_rules() {
        let llm = Arc::new(ScriptedLlm::new().with_failure("timeout"));
        let agent = PlanningAgent::new(PlanningConfig::default(), Some(llm));

        let plan = agent.decompose(&Task::new("open a, click b")).await.unwrap();
        assert_eq!(plan.subtasks.len(), 2);
        assert_eq!(plan.understanding.goal, "open a, click b");
    }

    #[tokio::test]
    async fn non_json_reply_falls_back_to_rules() {
        let llm = Arc::new(ScriptedLlm::new().with_reply("I think you should open it"));
        let agent = PlanningAgent::new(PlanningConfig::default(), Some(llm));

        let plan = agent.decompose(&Task::new("open notepad")).await.unwrap();
        assert_eq!(plan.subtasks.len(), 1);
        assert_eq!(plan.subtasks[0].description, "open notepad");
    }

    #[tokio::test]
    async fn process_accepts_task_record() {
        let agent = PlanningAgent::new(PlanningConfig::default(), None);
        let output = agent
            .process(serde_json::json!({ "task": { "instruction": "open notepad" } }))
            .await
            .unwrap();

        assert_eq!(output["subtasks"][0]["type"], "gui_action");
        assert_eq!(output["execution_order"][0], "task_1");
    }
}
