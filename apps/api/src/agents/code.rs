use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;

use super::base::Agent;
use super::errors::{AgentError, AgentResult};
use super::llm::{LlmClient, LlmRequest};
use super::prompts::library;
use super::state::{AgentCore, DEFAULT_MAX_MEMORY};
use super::text::first_code_block_or_text;

/// Substrings that make code ineligible for execution
const DENYLIST: &[&str] = &[
    "import os",
    "import sys",
    "import subprocess",
    "__import__",
    "eval(",
    "exec(",
    "open(",
    "file(",
];

/// Code agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
    pub model: String,
    pub temperature: f32,
    pub sandbox_enabled: bool,
    pub interpreter: String,
    pub timeout_secs: u64,
    pub max_memory: usize,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            temperature: 0.2,
            sandbox_enabled: true,
            interpreter: "python3".to_string(),
            timeout_secs: 10,
            max_memory: DEFAULT_MAX_MEMORY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSource {
    Llm,
    RuleBased,
}

/// Generated and validated code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeGeneration {
    pub code: String,
    pub source: CodeSource,
    pub validation: Validation,
}

/// Outcome of running code through a [`CodeRunner`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeExecution {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Executes code that already passed the denylist check
#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn run(&self, code: &str) -> AgentResult<CodeExecution>;
}

/// Runs code with an interpreter child process (`<interpreter> -c <code>`)
pub struct ProcessRunner {
    interpreter: String,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CodeRunner for ProcessRunner {
    async fn run(&self, code: &str) -> AgentResult<CodeExecution> {
        let child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(code)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                AgentError::TaskExecutionFailed(format!(
                    "Code execution timed out after {:?}",
                    self.timeout
                ))
            })??;

        Ok(CodeExecution {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum CodeAction {
    #[default]
    Generate,
    Execute,
}

#[derive(Debug, Default, Deserialize)]
struct CodeTask {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct CodeInput {
    #[serde(default)]
    action: CodeAction,
    #[serde(default)]
    task: CodeTask,
    #[serde(default)]
    context: String,
    #[serde(default)]
    code: String,
}

/// Code Agent: generates code, validates it and runs it behind a denylist
pub struct CodeAgent {
    core: AgentCore,
    config: CodeConfig,
    llm: Option<Arc<dyn LlmClient>>,
    runner: Arc<dyn CodeRunner>,
}

impl CodeAgent {
    pub fn new(config: CodeConfig, llm: Option<Arc<dyn LlmClient>>) -> Self {
        let runner = Arc::new(ProcessRunner::new(
            config.interpreter.clone(),
            Duration::from_secs(config.timeout_secs),
        ));
        Self {
            core: AgentCore::new("CodeAgent", config.max_memory),
            config,
            llm,
            runner,
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CodeRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Generate code for a task description and validate it
    ///
    /// # Errors
    /// * `ValidationFailed` - the generated code did not pass validation
    pub async fn generate_code(&self, description: &str, context: &str) -> AgentResult<CodeGeneration> {
        self.core
            .track("generate_code", async {
                let (code, source) = self.draft(description, context).await;
                let validation = validate_code(&code);

                if !validation.valid {
                    let messages: Vec<&str> =
                        validation.errors.iter().map(|e| e.message.as_str()).collect();
                    return Err(AgentError::ValidationFailed(messages.join("; ")));
                }

                Ok(CodeGeneration {
                    code,
                    source,
                    validation,
                })
            })
            .await
    }

    async fn draft(&self, description: &str, context: &str) -> (String, CodeSource) {
        if let Some(llm) = &self.llm {
            let template = library::code_generation();
            let request = LlmRequest::new(
                template.render_with(&[("description", description), ("context", context)]),
                self.config.temperature,
            )
            .with_system(template.system.clone());

            match llm.complete(request).await {
                Ok(reply) => return (first_code_block_or_text(&reply), CodeSource::Llm),
                Err(e) => tracing::warn!(error = %e, "LLM code generation failed, using template"),
            }
        }

        (rule_based_code(description), CodeSource::RuleBased)
    }

    /// Run code through the configured runner
    ///
    /// # Errors
    /// * `SandboxDisabled` - execution is switched off in config
    /// * `UnsafeCode` - the code matches the denylist
    pub async fn execute_code(&self, code: &str) -> AgentResult<CodeExecution> {
        self.core
            .track("execute_code", async {
                if !self.config.sandbox_enabled {
                    return Err(AgentError::SandboxDisabled);
                }
                if !is_safe(code) {
                    return Err(AgentError::UnsafeCode);
                }
                self.runner.run(code).await
            })
            .await
    }
}

#[async_trait]
impl Agent for CodeAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn process(&self, input: Value) -> AgentResult<Value> {
        let input: CodeInput = serde_json::from_value(input)?;
        match input.action {
            CodeAction::Generate => {
                let generation = self
                    .generate_code(&input.task.description, &input.context)
                    .await?;
                Ok(serde_json::to_value(generation)?)
            }
            CodeAction::Execute => {
                let execution = self.execute_code(&input.code).await?;
                Ok(serde_json::to_value(execution)?)
            }
        }
    }
}

fn rule_based_code(description: &str) -> String {
    let comment: Vec<String> = description.lines().map(|l| format!("# {}", l)).collect();
    format!("{}\nresult = None\n", comment.join("\n"))
}

/// Lower-cased denylist match
pub fn is_safe(code: &str) -> bool {
    let lower = code.to_lowercase();
    !DENYLIST.iter().any(|item| lower.contains(item))
}

/// Check that code is non-empty and its brackets and string quotes balance
pub fn validate_code(code: &str) -> Validation {
    let message = if code.trim().is_empty() {
        Some(("empty", "code is empty".to_string()))
    } else {
        check_delimiters(code).map(|m| ("syntax_error", m))
    };

    match message {
        None => Validation {
            valid: true,
            errors: Vec::new(),
        },
        Some((kind, message)) => Validation {
            valid: false,
            errors: vec![ValidationIssue {
                kind: kind.to_string(),
                message,
            }],
        },
    }
}

fn check_delimiters(code: &str) -> Option<String> {
    let chars: Vec<char> = code.chars().collect();
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => line += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '\'' | '"' => {
                let triple = i + 2 < chars.len() && chars[i + 1] == c && chars[i + 2] == c;
                let start_line = line;
                i += if triple { 3 } else { 1 };

                let mut closed = false;
                while i < chars.len() {
                    let d = chars[i];
                    if d == '\\' {
                        if chars.get(i + 1) == Some(&'\n') {
                            line += 1;
                        }
                        i += 2;
                        continue;
                    }
                    if d == '\n' {
                        if !triple {
                            break;
                        }
                        line += 1;
                    } else if d == c {
                        if !triple {
                            closed = true;
                            i += 1;
                            break;
                        }
                        if chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c) {
                            closed = true;
                            i += 3;
                            break;
                        }
                    }
                    i += 1;
                }

                if !closed {
                    return Some(format!("line {}: unterminated string literal", start_line));
                }
                continue;
            }
            '(' | '[' | '{' => stack.push((c, line)),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, open_line)) => {
                        return Some(format!(
                            "line {}: '{}' does not match '{}' opened on line {}",
                            line, c, open, open_line
                        ))
                    }
                    None => return Some(format!("line {}: unmatched '{}'", line, c)),
                }
            }
            _ => {}
        }
        i += 1;
    }

    stack
        .pop()
        .map(|(open, open_line)| format!("line {}: '{}' was never closed", open_line, open))
}
