use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::base::Agent;
use super::code::{CodeAgent, CodeConfig};
use super::customer_service::{CustomerServiceAgent, CustomerServiceConfig};
use super::evaluation::{EvaluationAgent, EvaluationConfig};
use super::gui::{GuiAgent, GuiConfig, RecordingDesktop};
use super::knowledge::{KnowledgeAgent, KnowledgeConfig};
use super::llm::LlmSettings;
use super::messages::MessageBus;
use super::planner::{PlanningAgent, PlanningConfig};
use super::state::AgentStatus;

pub const PLANNING: &str = "planning";
pub const KNOWLEDGE: &str = "knowledge";
pub const CODE: &str = "code";
pub const GUI: &str = "gui";
pub const EVALUATION: &str = "evaluation";
pub const CUSTOMER_SERVICE: &str = "customer_service";

/// Which agents to create, and their settings
///
/// An absent section means the agent is not created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub llm: LlmSettings,
    pub planning: Option<PlanningConfig>,
    pub knowledge: Option<KnowledgeConfig>,
    pub code: Option<CodeConfig>,
    pub gui: Option<GuiConfig>,
    pub evaluation: Option<EvaluationConfig>,
    pub customer_service: Option<CustomerServiceConfig>,
}

impl AgentsConfig {
    /// Every agent with default settings
    pub fn all() -> Self {
        Self {
            llm: LlmSettings::default(),
            planning: Some(PlanningConfig::default()),
            knowledge: Some(KnowledgeConfig::default()),
            code: Some(CodeConfig::default()),
            gui: Some(GuiConfig::default()),
            evaluation: Some(EvaluationConfig::default()),
            customer_service: Some(CustomerServiceConfig::default()),
        }
    }
}

/// A registered agent, keeping its concrete type for role dispatch
#[derive(Clone)]
pub enum RegisteredAgent {
    Planning(Arc<PlanningAgent>),
    Knowledge(Arc<KnowledgeAgent>),
    Code(Arc<CodeAgent>),
    Gui(Arc<GuiAgent>),
    Evaluation(Arc<EvaluationAgent>),
    CustomerService(Arc<CustomerServiceAgent>),
    Custom(Arc<dyn Agent>),
}

impl RegisteredAgent {
    pub fn as_agent(&self) -> Arc<dyn Agent> {
        match self {
            Self::Planning(a) => a.clone(),
            Self::Knowledge(a) => a.clone(),
            Self::Code(a) => a.clone(),
            Self::Gui(a) => a.clone(),
            Self::Evaluation(a) => a.clone(),
            Self::CustomerService(a) => a.clone(),
            Self::Custom(a) => a.clone(),
        }
    }
}

impl From<Arc<PlanningAgent>> for RegisteredAgent {
    fn from(agent: Arc<PlanningAgent>) -> Self {
        Self::Planning(agent)
    }
}

impl From<Arc<KnowledgeAgent>> for RegisteredAgent {
    fn from(agent: Arc<KnowledgeAgent>) -> Self {
        Self::Knowledge(agent)
    }
}

impl From<Arc<CodeAgent>> for RegisteredAgent {
    fn from(agent: Arc<CodeAgent>) -> Self {
        Self::Code(agent)
    }
}

impl From<Arc<GuiAgent>> for RegisteredAgent {
    fn from(agent: Arc<GuiAgent>) -> Self {
        Self::Gui(agent)
    }
}

impl From<Arc<EvaluationAgent>> for RegisteredAgent {
    fn from(agent: Arc<EvaluationAgent>) -> Self {
        Self::Evaluation(agent)
    }
}

impl From<Arc<CustomerServiceAgent>> for RegisteredAgent {
    fn from(agent: Arc<CustomerServiceAgent>) -> Self {
        Self::CustomerService(agent)
    }
}

impl From<Arc<dyn Agent>> for RegisteredAgent {
    fn from(agent: Arc<dyn Agent>) -> Self {
        Self::Custom(agent)
    }
}

/// Agent registry plus the shared message bus
///
/// The dispatching roles are looked up in the registry under their role
/// names, so registering an agent as `"code"` replaces the code agent the
/// executor uses.
#[derive(Default)]
pub struct AgentManager {
    agents: BTreeMap<String, RegisteredAgent>,
    bus: Arc<MessageBus>,
}

impl AgentManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AgentsConfig) -> Self {
        let mut manager = Self::new();

        if let Some(cfg) = &config.planning {
            let llm = config.llm.client(&cfg.model);
            manager = manager.with_planning(PlanningAgent::new(cfg.clone(), llm));
        }
        if let Some(cfg) = &config.knowledge {
            manager = manager.with_knowledge(KnowledgeAgent::new(cfg.clone()));
        }
        if let Some(cfg) = &config.code {
            let llm = config.llm.client(&cfg.model);
            manager = manager.with_code(CodeAgent::new(cfg.clone(), llm));
        }
        if let Some(cfg) = &config.gui {
            let vision = config.llm.client(&cfg.vision_model);
            let desktop = Arc::new(RecordingDesktop::new(cfg.screen_width, cfg.screen_height));
            manager = manager.with_gui(GuiAgent::new(cfg.clone(), vision).with_desktop(desktop));
        }
        if let Some(cfg) = &config.evaluation {
            manager = manager.with_evaluation(EvaluationAgent::new(cfg.clone()));
        }
        if let Some(cfg) = &config.customer_service {
            manager = manager.with_customer_service(CustomerServiceAgent::new(cfg.clone()));
        }

        tracing::info!(count = manager.agents.len(), agents = ?manager.agents(), "agents initialised");
        manager
    }

    pub fn with_planning(mut self, agent: PlanningAgent) -> Self {
        self.register_agent(PLANNING, Arc::new(agent));
        self
    }

    pub fn with_knowledge(mut self, agent: KnowledgeAgent) -> Self {
        self.register_agent(KNOWLEDGE, Arc::new(agent));
        self
    }

    pub fn with_code(mut self, agent: CodeAgent) -> Self {
        self.register_agent(CODE, Arc::new(agent));
        self
    }

    pub fn with_gui(mut self, agent: GuiAgent) -> Self {
        self.register_agent(GUI, Arc::new(agent));
        self
    }

    pub fn with_evaluation(mut self, agent: EvaluationAgent) -> Self {
        self.register_agent(EVALUATION, Arc::new(agent));
        self
    }

    pub fn with_customer_service(mut self, agent: CustomerServiceAgent) -> Self {
        self.register_agent(CUSTOMER_SERVICE, Arc::new(agent));
        self
    }

    /// Add an agent under `name`, replacing any previous entry
    pub fn register_agent(&mut self, name: &str, agent: impl Into<RegisteredAgent>) {
        if self.agents.insert(name.to_string(), agent.into()).is_some() {
            tracing::warn!(agent = name, "replaced registered agent");
        } else {
            tracing::info!(agent = name, "agent registered");
        }
    }

    pub fn get_agent(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(name).map(RegisteredAgent::as_agent)
    }

    /// Registered names in sorted order
    pub fn agents(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    pub fn agent_status(&self) -> HashMap<String, AgentStatus> {
        self.agents
            .iter()
            .map(|(name, agent)| (name.clone(), agent.as_agent().status()))
            .collect()
    }

    pub fn reset_all(&self) {
        for agent in self.agents.values() {
            agent.as_agent().reset();
        }
        tracing::info!("all agents reset");
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn planning(&self) -> Option<&Arc<PlanningAgent>> {
        match self.agents.get(PLANNING)? {
            RegisteredAgent::Planning(agent) => Some(agent),
            _ => None,
        }
    }

    pub fn knowledge(&self) -> Option<&Arc<KnowledgeAgent>> {
        match self.agents.get(KNOWLEDGE)? {
            RegisteredAgent::Knowledge(agent) => Some(agent),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&Arc<CodeAgent>> {
        match self.agents.get(CODE)? {
            RegisteredAgent::Code(agent) => Some(agent),
            _ => None,
        }
    }

    pub fn gui(&self) -> Option<&Arc<GuiAgent>> {
        match self.agents.get(GUI)? {
            RegisteredAgent::Gui(agent) => Some(agent),
            _ => None,
        }
    }

    pub fn evaluation(&self) -> Option<&Arc<EvaluationAgent>> {
        match self.agents.get(EVALUATION)? {
            RegisteredAgent::Evaluation(agent) => Some(agent),
            _ => None,
        }
    }

    pub fn customer_service(&self) -> Option<&Arc<CustomerServiceAgent>> {
        match self.agents.get(CUSTOMER_SERVICE)? {
            RegisteredAgent::CustomerService(agent) => Some(agent),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::state::AgentState;

    #[test]
    fn from_config_creates_only_listed_agents() {
        let config: AgentsConfig = serde_json::from_value(serde_json::json!({
            "planning": {},
            "evaluation": { "success_threshold": 0.5 }
        }))
        .unwrap();

        let manager = AgentManager::from_config(&config);

        assert_eq!(manager.agents(), vec!["evaluation", "planning"]);
        assert!(manager.planning().is_some());
        assert!(manager.knowledge().is_none());
        assert!(manager.get_agent("gui").is_none());
    }

    #[test]
    fn all_agents_report_idle_status() {
        let manager = AgentManager::from_config(&AgentsConfig::all());
        let status = manager.agent_status();

        assert_eq!(status.len(), 6);
        assert_eq!(status[GUI].name, "GUIAgent");
        assert!(status.values().all(|s| s.state == AgentState::Idle));
    }

    #[test]
    fn register_replaces_existing_entry() {
        let mut manager = AgentManager::new();
        manager.register_agent("helper", Arc::new(KnowledgeAgent::new(KnowledgeConfig::default())));
        manager.register_agent("helper", Arc::new(EvaluationAgent::new(EvaluationConfig::default())));

        assert_eq!(manager.agents(), vec!["helper"]);
        assert_eq!(manager.get_agent("helper").unwrap().name(), "EvaluationAgent");
    }

    #[test]
    fn roles_are_read_from_the_registry() {
        let mut manager = AgentManager::new();
        manager.register_agent(KNOWLEDGE, Arc::new(KnowledgeAgent::new(KnowledgeConfig::default())));
        // the evaluation role name holding another kind of agent fills no role
        manager.register_agent(EVALUATION, Arc::new(CodeAgent::new(CodeConfig::default(), None)));

        assert!(manager.knowledge().is_some());
        assert!(manager.evaluation().is_none());
        assert_eq!(manager.get_agent(EVALUATION).unwrap().name(), "CodeAgent");

        let custom: Arc<dyn Agent> = Arc::new(KnowledgeAgent::new(KnowledgeConfig::default()));
        manager.register_agent(KNOWLEDGE, custom);
        assert!(manager.knowledge().is_none());
        assert_eq!(manager.agents(), vec![EVALUATION, KNOWLEDGE]);
    }

    #[tokio::test]
    async fn reset_all_clears_memory() {
        let manager = AgentManager::new().with_knowledge(KnowledgeAgent::new(KnowledgeConfig::default()));
        let knowledge = manager.knowledge().unwrap().clone();
        knowledge.retrieve("anything", 3).await.unwrap();
        assert_eq!(knowledge.status().memory_length, 1);

        manager.reset_all();

        assert_eq!(knowledge.status().memory_length, 0);
        assert_eq!(knowledge.status().statistics.tasks_completed, 1);
    }
}
