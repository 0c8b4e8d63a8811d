//! GUI agent
//!
//! Runs an observe / think / act loop against a [`Desktop`]. Screenshots are
//! sent to a vision model, whose reply is turned into whitelisted
//! `pyautogui`-style calls by [`ActionParser`].

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::base::Agent;
use super::errors::{AgentError, AgentResult};
use super::llm::{LlmClient, LlmRequest};
use super::prompts::library;
use super::state::{AgentCore, DEFAULT_MAX_MEMORY};
use super::text::code_blocks;
use super::types::{Observation, OutcomeStatus};

pub const DONE: &str = "DONE";
pub const FAIL: &str = "FAIL";
pub const WAIT: &str = "WAIT";

const ACTION_WHITELIST: &[&str] = &[
    "moveTo",
    "click",
    "doubleClick",
    "rightClick",
    "typewrite",
    "press",
    "keyDown",
    "keyUp",
    "scroll",
    "drag",
    "dragTo",
];

static PYAUTOGUI_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"pyautogui\.\w+\([^)]*\)").expect("valid regex"));

static CONTROL_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(DONE|FAIL|WAIT)\b").expect("valid regex"));

/// 1x1 grey PNG returned by [`RecordingDesktop`]
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x04, 0x00, 0x00, 0x00, 0xb5,
    0x1c, 0x0c, 0x02, 0x00, 0x00, 0x00, 0x0b, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64,
    0x60, 0x00, 0x00, 0x00, 0x06, 0x00, 0x02, 0x30, 0x81, 0xd0, 0x2f, 0x00, 0x00, 0x00, 0x00,
    0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// Raw screen capture
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// Screen the GUI agent operates on
#[async_trait]
pub trait Desktop: Send + Sync {
    async fn screenshot(&self) -> AgentResult<Screenshot>;

    /// Perform one parsed action such as `click(100, 200)`
    async fn perform(&self, action: &str) -> AgentResult<()>;
}

/// Headless desktop that records performed actions
pub struct RecordingDesktop {
    width: u32,
    height: u32,
    performed: Mutex<Vec<String>>,
}

impl RecordingDesktop {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            performed: Mutex::new(Vec::new()),
        }
    }

    pub fn performed(&self) -> Vec<String> {
        self.performed.lock().clone()
    }
}

#[async_trait]
impl Desktop for RecordingDesktop {
    async fn screenshot(&self) -> AgentResult<Screenshot> {
        Ok(Screenshot {
            width: self.width,
            height: self.height,
            png: PLACEHOLDER_PNG.to_vec(),
        })
    }

    async fn perform(&self, action: &str) -> AgentResult<()> {
        tracing::debug!(action, "desktop action recorded");
        self.performed.lock().push(action.to_string());
        Ok(())
    }
}

/// Turns model output into executable actions
pub struct ActionParser;

impl ActionParser {
    /// Whitelisted calls from the code blocks (or the whole text) followed by
    /// control words; `[FAIL]` when nothing usable is found
    pub fn parse(text: &str) -> Vec<String> {
        let mut blocks = code_blocks(text);
        if blocks.is_empty() {
            blocks.push(text.to_string());
        }

        let calls = blocks.iter().flat_map(|block| {
            PYAUTOGUI_CALL
                .find_iter(block)
                .map(|m| m.as_str().trim_start_matches("pyautogui.").to_string())
                .collect::<Vec<_>>()
        });
        let controls = CONTROL_WORD
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_uppercase());

        let actions: Vec<String> = calls
            .chain(controls)
            .filter(|action| Self::is_allowed(action))
            .collect();

        if actions.is_empty() {
            vec![FAIL.to_string()]
        } else {
            actions
        }
    }

    fn is_allowed(action: &str) -> bool {
        if matches!(action, DONE | FAIL | WAIT) {
            return true;
        }
        let name = action.split('(').next().unwrap_or_default();
        ACTION_WHITELIST.contains(&name)
    }
}

/// GUI agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuiConfig {
    pub vision_model: String,
    pub temperature: f32,
    pub max_steps: u32,
    pub wait_interval_ms: u64,
    pub screen_width: u32,
    pub screen_height: u32,
    pub max_memory: usize,
}

impl Default for GuiConfig {
    fn default() -> Self {
        Self {
            vision_model: "gpt-4-vision-preview".to_string(),
            temperature: 0.1,
            max_steps: 10,
            wait_interval_ms: 1000,
            screen_width: 1920,
            screen_height: 1080,
            max_memory: DEFAULT_MAX_MEMORY,
        }
    }
}

/// Actions proposed for the current screen
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thought {
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action: String,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActStatus {
    Done,
    Fail,
    Continue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActResult {
    pub status: ActStatus,
    pub results: Vec<ActionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_observation: Option<Observation>,
}

/// Why an `execute_task` loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuiOutcome {
    Done,
    Fail,
    NoActions,
    MaxSteps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuiRun {
    pub outcome: GuiOutcome,
    pub steps: u32,
    pub final_observation: Observation,
    pub actions: Vec<ActionRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum GuiCommand {
    Observe,
    Think {
        observation: Observation,
        #[serde(default)]
        task: String,
    },
    Act {
        #[serde(default)]
        actions: Vec<String>,
    },
    ExecuteTask {
        instruction: String,
        #[serde(default)]
        max_steps: Option<u32>,
    },
}

#[derive(Debug, Deserialize)]
struct GuiInput {
    action: GuiCommand,
}

/// GUI Agent: screen observation and interface operation
pub struct GuiAgent {
    core: AgentCore,
    config: GuiConfig,
    vision: Option<Arc<dyn LlmClient>>,
    desktop: Option<Arc<dyn Desktop>>,
}

impl GuiAgent {
    pub fn new(config: GuiConfig, vision: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            core: AgentCore::new("GUIAgent", config.max_memory),
            config,
            vision,
            desktop: None,
        }
    }

    pub fn with_desktop(mut self, desktop: Arc<dyn Desktop>) -> Self {
        self.desktop = Some(desktop);
        self
    }

    pub fn default_max_steps(&self) -> u32 {
        self.config.max_steps
    }

    pub async fn observe(&self) -> Observation {
        let Some(desktop) = &self.desktop else {
            return Observation::failed("desktop environment not attached");
        };

        match desktop.screenshot().await {
            Ok(shot) => Observation {
                success: true,
                width: Some(shot.width),
                height: Some(shot.height),
                screenshot: Some(STANDARD.encode(&shot.png)),
                message: None,
            },
            Err(e) => {
                tracing::error!(error = %e, "screen observation failed");
                Observation::failed(e.to_string())
            }
        }
    }

    /// Ask the vision model what to do next on this screen
    pub async fn think(&self, observation: &Observation, instruction: &str) -> Thought {
        let Some(vision) = &self.vision else {
            return Thought {
                message: Some("vision model not configured".to_string()),
                ..Default::default()
            };
        };
        let Some(screenshot) = &observation.screenshot else {
            return Thought {
                message: Some("observation has no screenshot".to_string()),
                ..Default::default()
            };
        };

        let template = library::gui_action();
        let request = LlmRequest::new(
            template.render_with(&[("task", instruction)]),
            self.config.temperature,
        )
        .with_system(template.system.clone())
        .with_image(screenshot.clone());

        match vision.complete(request).await {
            Ok(reply) => Thought {
                actions: ActionParser::parse(&reply),
                response: Some(reply),
                message: None,
            },
            Err(e) => {
                tracing::error!(error = %e, "vision model call failed");
                Thought {
                    message: Some(e.to_string()),
                    ..Default::default()
                }
            }
        }
    }

    /// Perform actions in order until a control word stops the sequence
    ///
    /// # Errors
    /// * `DesktopError` - no desktop is attached
    pub async fn act(&self, actions: &[String]) -> AgentResult<ActResult> {
        let desktop = self
            .desktop
            .as_ref()
            .ok_or_else(|| AgentError::DesktopError("desktop environment not attached".to_string()))?;

        let mut results = Vec::new();
        for action in actions {
            match action.as_str() {
                DONE => return Ok(Self::stopped(ActStatus::Done, results)),
                FAIL => return Ok(Self::stopped(ActStatus::Fail, results)),
                WAIT => {
                    tokio::time::sleep(Duration::from_millis(self.config.wait_interval_ms)).await;
                }
                _ => match desktop.perform(action).await {
                    Ok(()) => results.push(ActionRecord {
                        action: action.clone(),
                        status: OutcomeStatus::Success,
                        error: None,
                    }),
                    Err(e) => {
                        tracing::warn!(action = %action, error = %e, "action failed");
                        results.push(ActionRecord {
                            action: action.clone(),
                            status: OutcomeStatus::Error,
                            error: Some(e.to_string()),
                        });
                    }
                },
            }
        }

        Ok(ActResult {
            status: ActStatus::Continue,
            results,
            new_observation: Some(self.observe().await),
        })
    }

    fn stopped(status: ActStatus, results: Vec<ActionRecord>) -> ActResult {
        ActResult {
            status,
            results,
            new_observation: None,
        }
    }

    /// Observe, then alternate think and act for at most `max_steps` rounds
    pub async fn execute_task(&self, instruction: &str, max_steps: u32) -> AgentResult<GuiRun> {
        self.core
            .track("execute_task", async {
                let mut observation = self.observe().await;
                let mut performed = Vec::new();
                let mut steps = 0;
                let mut outcome = GuiOutcome::MaxSteps;

                while steps < max_steps {
                    steps += 1;
                    let thought = self.think(&observation, instruction).await;
                    if thought.actions.is_empty() {
                        outcome = GuiOutcome::NoActions;
                        break;
                    }

                    let acted = self.act(&thought.actions).await?;
                    performed.extend(acted.results);
                    match acted.status {
                        ActStatus::Done => {
                            outcome = GuiOutcome::Done;
                            break;
                        }
                        ActStatus::Fail => {
                            outcome = GuiOutcome::Fail;
                            break;
                        }
                        ActStatus::Continue => {
                            if let Some(next) = acted.new_observation {
                                observation = next;
                            }
                        }
                    }
                }

                tracing::info!(instruction, steps, ?outcome, "GUI task finished");

                Ok(GuiRun {
                    outcome,
                    steps,
                    final_observation: observation,
                    actions: performed,
                })
            })
            .await
    }
}

#[async_trait]
impl Agent for GuiAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn process(&self, input: Value) -> AgentResult<Value> {
        let input: GuiInput = serde_json::from_value(input)?;
        let output = match input.action {
            GuiCommand::Observe => serde_json::to_value(self.observe().await)?,
            GuiCommand::Think { observation, task } => {
                serde_json::to_value(self.think(&observation, &task).await)?
            }
            GuiCommand::Act { actions } => serde_json::to_value(self.act(&actions).await?)?,
            GuiCommand::ExecuteTask {
                instruction,
                max_steps,
            } => {
                let max_steps = max_steps.unwrap_or(self.config.max_steps);
                serde_json::to_value(self.execute_task(&instruction, max_steps).await?)?
            }
        };
        Ok(output)
    }
}
