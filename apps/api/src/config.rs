use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::agents::errors::{AgentError, AgentResult};
use crate::agents::manager::AgentsConfig;

pub const DEFAULT_PORT: u16 = 3000;

/// Server and agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port: u16,
    pub agents: AgentsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            agents: AgentsConfig::all(),
        }
    }
}

impl AppConfig {
    /// Every agent enabled, overridden by process environment variables
    pub fn from_env() -> AgentResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any variable source
    pub fn from_lookup<F>(lookup: F) -> AgentResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        let agents = &mut config.agents;

        agents.llm.api_key = var("OPENAI_API_KEY");
        agents.llm.endpoint = var("LLM_ENDPOINT");

        if let Some(model) = var("DEFAULT_LLM_MODEL") {
            if let Some(planning) = agents.planning.as_mut() {
                planning.model = model.clone();
            }
            if let Some(code) = agents.code.as_mut() {
                code.model = model;
            }
        }
        if let Some(model) = var("DEFAULT_VL_MODEL") {
            if let Some(gui) = agents.gui.as_mut() {
                gui.vision_model = model;
            }
        }
        if let Some(temperature) = parse::<f32>("TEMPERATURE", var("TEMPERATURE"))? {
            if let Some(planning) = agents.planning.as_mut() {
                planning.temperature = temperature;
            }
            if let Some(code) = agents.code.as_mut() {
                code.temperature = temperature;
            }
        }
        if let Some(max_steps) = parse::<u32>("MAX_STEPS", var("MAX_STEPS"))? {
            if let Some(gui) = agents.gui.as_mut() {
                gui.max_steps = max_steps;
            }
        }
        if let Some(interpreter) = var("CODE_INTERPRETER") {
            if let Some(code) = agents.code.as_mut() {
                code.interpreter = interpreter;
            }
        }
        if let Some(max_memory) = parse::<usize>("MAX_MEMORY", var("MAX_MEMORY"))? {
            config.set_max_memory(max_memory);
        }
        if let Some(port) = parse::<u16>("PORT", var("PORT"))? {
            config.port = port;
        }

        if config.agents.llm.api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY not set, agents will use rule-based fallbacks");
        }

        Ok(config)
    }

    fn set_max_memory(&mut self, max_memory: usize) {
        let agents = &mut self.agents;
        if let Some(c) = agents.planning.as_mut() {
            c.max_memory = max_memory;
        }
        if let Some(c) = agents.knowledge.as_mut() {
            c.max_memory = max_memory;
        }
        if let Some(c) = agents.code.as_mut() {
            c.max_memory = max_memory;
        }
        if let Some(c) = agents.gui.as_mut() {
            c.max_memory = max_memory;
        }
        if let Some(c) = agents.evaluation.as_mut() {
            c.max_memory = max_memory;
        }
        if let Some(c) = agents.customer_service.as_mut() {
            c.max_memory = max_memory;
        }
    }
}

fn parse<T: FromStr>(key: &str, value: Option<String>) -> AgentResult<Option<T>> {
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| AgentError::ConfigError(format!("{} must be a valid number, got {:?}", key, raw)))
        })
        .transpose()
}
