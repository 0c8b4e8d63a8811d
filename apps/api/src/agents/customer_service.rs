//! Mobile package advisor
//!
//! Rule-based recommender over a fixed catalogue of telecom packages. The
//! customer's message is scanned for identity, budget and usage hints, the
//! catalogue is narrowed step by step, and the reasoning behind each step is
//! returned alongside the recommendation.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::base::Agent;
use super::errors::AgentResult;
use super::state::AgentCore;

const GREETING: &str = "Hello! I can help you choose a mobile package. Tell me a bit about \
yourself: are you a student or over 60, what is your budget, and how much data and call time \
do you use?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Anyone,
    Seniors,
    Students,
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Audience::Anyone => write!(f, "anyone"),
            Audience::Seniors => write!(f, "customers over 60"),
            Audience::Students => write!(f, "students"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Package {
    pub name: &'static str,
    pub monthly_price: u32,
    /// `None` means unlimited data
    pub data_gb: Option<u32>,
    pub call_minutes: u32,
    pub audience: Audience,
}

impl Package {
    fn data_rank(&self) -> u32 {
        self.data_gb.unwrap_or(u32::MAX)
    }

    fn data_label(&self) -> String {
        match self.data_gb {
            Some(gb) => format!("{} GB", gb),
            None => "unlimited".to_string(),
        }
    }
}

pub const PACKAGES: [Package; 5] = [
    Package {
        name: "Economy",
        monthly_price: 29,
        data_gb: Some(20),
        call_minutes: 100,
        audience: Audience::Anyone,
    },
    Package {
        name: "Care",
        monthly_price: 9,
        data_gb: Some(5),
        call_minutes: 10,
        audience: Audience::Seniors,
    },
    Package {
        name: "Campus",
        monthly_price: 39,
        data_gb: Some(200),
        call_minutes: 100,
        audience: Audience::Students,
    },
    Package {
        name: "Unlimited",
        monthly_price: 199,
        data_gb: None,
        call_minutes: 500,
        audience: Audience::Anyone,
    },
    Package {
        name: "Elite",
        monthly_price: 99,
        data_gb: Some(200),
        call_minutes: 500,
        audience: Audience::Anyone,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    Student,
    Senior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Medium,
    High,
}

/// What the customer's message says about them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Needs {
    pub identity: Option<Identity>,
    pub budget: Level,
    pub data_need: Level,
    pub call_need: Level,
}

const STUDENT_WORDS: &[&str] = &["student", "college", "university", "campus", "学生", "在校", "大学", "校园"];
const SENIOR_WORDS: &[&str] = &["senior", "retired", "elderly", "60", "老人", "退休", "年长"];
const LOW_BUDGET_WORDS: &[&str] = &[
    "cheap",
    "affordable",
    "limited budget",
    "tight budget",
    "save money",
    "便宜",
    "经济",
    "预算有限",
    "省钱",
];
const HIGH_BUDGET_WORDS: &[&str] = &["premium", "high-end", "unlimited", "money is no object", "高端", "无限", "不差钱"];
const HIGH_DATA_WORDS: &[&str] = &[
    "lots of data",
    "a lot of data",
    "video",
    "streaming",
    "gaming",
    "流量多",
    "流量大",
    "看视频",
    "玩游戏",
];
const LOW_DATA_WORDS: &[&str] = &["little data", "barely use data", "流量少", "基本不用"];
const HIGH_CALL_WORDS: &[&str] = &["lots of calls", "many calls", "call a lot", "电话多", "通话多", "经常打电话"];
const LOW_CALL_WORDS: &[&str] = &["rarely call", "few calls", "很少打电话", "基本不打电话"];

fn mentions(message: &str, words: &[&str]) -> bool {
    words.iter().any(|w| message.contains(w))
}

fn level(message: &str, high: &[&str], low: &[&str]) -> Level {
    if mentions(message, high) {
        Level::High
    } else if mentions(message, low) {
        Level::Low
    } else {
        Level::Medium
    }
}

pub fn analyze_needs(message: &str) -> Needs {
    let message = message.to_lowercase();

    let identity = if mentions(&message, STUDENT_WORDS) {
        Some(Identity::Student)
    } else if mentions(&message, SENIOR_WORDS) {
        Some(Identity::Senior)
    } else {
        None
    };

    // low budget wins ties, unlike the usage levels
    let budget = if mentions(&message, LOW_BUDGET_WORDS) {
        Level::Low
    } else if mentions(&message, HIGH_BUDGET_WORDS) {
        Level::High
    } else {
        Level::Medium
    };

    Needs {
        identity,
        budget,
        data_need: level(&message, HIGH_DATA_WORDS, LOW_DATA_WORDS),
        call_need: level(&message, HIGH_CALL_WORDS, LOW_CALL_WORDS),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub package: Package,
    pub reasons: Vec<String>,
    pub needs_analysis: Needs,
}

/// Narrow the catalogue step by step, recording each step
pub fn recommend(needs: &Needs) -> (Recommendation, Vec<String>) {
    let names = |c: &[Package]| c.iter().map(|p| p.name).collect::<Vec<_>>().join(", ");
    let mut reasoning = Vec::new();

    reasoning.push("Step 1: filter by identity".to_string());
    let audience = match needs.identity {
        Some(Identity::Student) => Audience::Students,
        Some(Identity::Senior) => Audience::Seniors,
        None => Audience::Anyone,
    };
    let mut candidates: Vec<Package> = PACKAGES
        .iter()
        .filter(|p| p.audience == audience)
        .copied()
        .collect();
    reasoning.push(format!("  packages for {}: {}", audience, names(&candidates)));
    if candidates.is_empty() {
        candidates = PACKAGES.to_vec();
        reasoning.push("  no package matches the identity, considering all packages".to_string());
    }

    reasoning.push("Step 2: filter by budget".to_string());
    match needs.budget {
        Level::Low => {
            candidates.retain(|p| p.monthly_price <= 50);
            reasoning.push(format!("  low budget (<= 50/month): {}", names(&candidates)));
        }
        Level::High => {
            candidates.retain(|p| p.monthly_price >= 99);
            reasoning.push(format!("  high budget (>= 99/month): {}", names(&candidates)));
        }
        Level::Medium => reasoning.push(format!("  medium budget, keeping: {}", names(&candidates))),
    }

    reasoning.push("Step 3: rank by data need".to_string());
    match needs.data_need {
        Level::High => {
            candidates.sort_by(|a, b| b.data_rank().cmp(&a.data_rank()));
            reasoning.push(format!("  high data need, most data first: {}", names(&candidates)));
        }
        Level::Low => {
            candidates.sort_by_key(Package::data_rank);
            reasoning.push(format!("  low data need, least data first: {}", names(&candidates)));
        }
        Level::Medium => reasoning.push(format!("  medium data need, keeping: {}", names(&candidates))),
    }

    reasoning.push("Step 4: adjust for call need".to_string());
    if needs.call_need == Level::High {
        candidates.sort_by(|a, b| b.call_minutes.cmp(&a.call_minutes));
        reasoning.push(format!("  high call need, most minutes first: {}", names(&candidates)));
    }

    let package = match candidates.first() {
        Some(first) => {
            reasoning.push(format!("Step 5: recommending {}", first.name));
            *first
        }
        None => {
            reasoning.push("Step 5: nothing matches exactly, recommending the default Economy package".to_string());
            PACKAGES[0]
        }
    };

    let recommendation = Recommendation {
        reasons: reasons_for(&package, needs),
        package,
        needs_analysis: *needs,
    };
    (recommendation, reasoning)
}

fn reasons_for(package: &Package, needs: &Needs) -> Vec<String> {
    let mut reasons = Vec::new();

    match (needs.identity, package.audience) {
        (Some(Identity::Student), Audience::Students) => reasons.push("Made for students".to_string()),
        (Some(Identity::Senior), Audience::Seniors) => reasons.push("Made for customers over 60".to_string()),
        _ => {}
    }

    match needs.budget {
        Level::Low if package.monthly_price <= 50 => reasons.push(format!(
            "Affordable at {}/month, within your budget",
            package.monthly_price
        )),
        Level::High if package.monthly_price >= 99 => reasons.push(format!(
            "Premium package at {}/month for demanding use",
            package.monthly_price
        )),
        _ => {}
    }

    match needs.data_need {
        Level::High if package.data_rank() >= 100 => reasons.push(format!(
            "Plenty of data ({}) for heavy use",
            package.data_label()
        )),
        Level::Low if package.data_rank() <= 20 => reasons.push(format!(
            "Modest data allowance ({}) so nothing goes to waste",
            package.data_label()
        )),
        _ => {}
    }

    if needs.call_need == Level::High && package.call_minutes >= 500 {
        reasons.push(format!("Generous call time ({} min/month)", package.call_minutes));
    }

    if reasons.is_empty() {
        reasons.push("Good value for most users".to_string());
    }
    reasons
}

/// Package advisor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerServiceConfig {
    /// Include the step-by-step reasoning in the reply text
    pub chain_of_thought: bool,
    pub max_memory: usize,
}

impl Default for CustomerServiceConfig {
    fn default() -> Self {
        Self {
            chain_of_thought: true,
            max_memory: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    pub user: String,
    pub assistant: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub success: bool,
    pub response: String,
    pub recommendation: Option<Recommendation>,
}

#[derive(Debug, Deserialize)]
struct ChatInput {
    #[serde(default)]
    message: String,
}

pub struct CustomerServiceAgent {
    core: AgentCore,
    config: CustomerServiceConfig,
    history: Mutex<VecDeque<ConversationTurn>>,
}

impl CustomerServiceAgent {
    pub fn new(config: CustomerServiceConfig) -> Self {
        Self {
            core: AgentCore::new("CustomerServiceAgent", config.max_memory),
            config,
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn history(&self) -> Vec<ConversationTurn> {
        self.history.lock().iter().cloned().collect()
    }

    pub async fn advise(&self, message: &str) -> AgentResult<ChatReply> {
        let message = message.trim();
        if message.is_empty() {
            return Ok(ChatReply {
                success: false,
                response: GREETING.to_string(),
                recommendation: None,
            });
        }

        self.core
            .track("recommendation", async {
                let needs = analyze_needs(message);
                let (recommendation, reasoning) = recommend(&needs);
                let response = self.format_response(&recommendation, &reasoning);

                self.remember(message, &response);
                self.core.add_to_memory(
                    "recommendation",
                    json!({
                        "user_message": message,
                        "recommended_package": recommendation.package.name,
                    }),
                );
                tracing::info!(package = recommendation.package.name, "package recommended");

                Ok(ChatReply {
                    success: true,
                    response,
                    recommendation: Some(recommendation),
                })
            })
            .await
    }

    fn remember(&self, user: &str, assistant: &str) {
        let mut history = self.history.lock();
        history.push_back(ConversationTurn {
            user: user.to_string(),
            assistant: assistant.to_string(),
            timestamp: Utc::now(),
        });
        while history.len() > self.config.max_memory.max(1) {
            history.pop_front();
        }
    }

    fn format_response(&self, recommendation: &Recommendation, reasoning: &[String]) -> String {
        let package = &recommendation.package;
        let needs = &recommendation.needs_analysis;
        let mut lines = Vec::new();

        if self.config.chain_of_thought {
            lines.push("Reasoning:".to_string());
            lines.extend(reasoning.iter().cloned());
            lines.push(String::new());
        }

        lines.push(format!("Recommended package: {}", package.name));
        lines.push(format!("Price: {}/month", package.monthly_price));
        lines.push(format!("Data: {}/month", package.data_label()));
        lines.push(format!("Calls: {} min/month", package.call_minutes));
        lines.push(format!("For: {}", package.audience));
        lines.push(String::new());
        lines.push("Why:".to_string());
        for (i, reason) in recommendation.reasons.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, reason));
        }

        let mut missing = Vec::new();
        if needs.identity.is_none() {
            missing.push("whether you are a student or over 60");
        }
        if needs.budget == Level::Medium {
            missing.push("your budget");
        }
        if needs.data_need == Level::Medium {
            missing.push("how much data you use");
        }

        if !missing.is_empty() {
            lines.push(String::new());
            lines.push("Tip: for a more precise recommendation, tell me:".to_string());
            lines.extend(missing.iter().map(|m| format!("- {}", m)));
        }

        lines.join("\n")
    }
}

#[async_trait]
impl Agent for CustomerServiceAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn process(&self, input: Value) -> AgentResult<Value> {
        let input: ChatInput = serde_json::from_value(input)?;
        let reply = self.advise(&input.message).await?;
        Ok(serde_json::to_value(reply)?)
    }

    fn reset(&self) {
        self.core.reset();
        self.history.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_with_heavy_data_gets_campus() {
        let needs = analyze_needs("I'm a university student, I watch a lot of video and I am on a tight budget");
        assert_eq!(needs.identity, Some(Identity::Student));
        assert_eq!(needs.budget, Level::Low);
        assert_eq!(needs.data_need, Level::High);

        let (recommendation, reasoning) = recommend(&needs);

        assert_eq!(recommendation.package.name, "Campus");
        assert_eq!(recommendation.reasons[0], "Made for students");
        assert!(reasoning.last().unwrap().contains("Campus"));
    }

    #[test]
    fn chinese_messages_are_understood() {
        let needs = analyze_needs("我是退休老人，很少打电话");
        assert_eq!(needs.identity, Some(Identity::Senior));
        assert_eq!(needs.call_need, Level::Low);

        let (recommendation, _) = recommend(&needs);
        assert_eq!(recommendation.package.name, "Care");
    }

    #[test]
    fn high_budget_heavy_caller_gets_most_minutes() {
        let needs = analyze_needs("money is no object, I call a lot");
        let (recommendation, _) = recommend(&needs);

        assert_eq!(recommendation.package.name, "Unlimited");
        assert!(recommendation.reasons.iter().any(|r| r.contains("500 min")));
    }

    #[test]
    fn empty_filters_fall_back_to_economy() {
        let needs = Needs {
            identity: Some(Identity::Senior),
            budget: Level::High,
            data_need: Level::Medium,
            call_need: Level::Medium,
        };
        let (recommendation, reasoning) = recommend(&needs);

        assert_eq!(recommendation.package.name, "Economy");
        assert!(reasoning.last().unwrap().contains("default Economy"));
    }

    #[test]
    fn vague_message_gets_generic_reason() {
        let (recommendation, _) = recommend(&analyze_needs("hi, I need a phone plan"));

        assert_eq!(recommendation.package.name, "Economy");
        assert_eq!(recommendation.reasons, vec!["Good value for most users"]);
    }

    #[tokio::test]
    async fn empty_message_returns_greeting() {
        let agent = CustomerServiceAgent::new(CustomerServiceConfig::default());
        let reply = agent.advise("   ").await.unwrap();

        assert!(!reply.success);
        assert!(reply.recommendation.is_none());
        assert!(agent.history().is_empty());
    }

    #[tokio::test]
    async fn reply_lists_missing_information() {
        let agent = CustomerServiceAgent::new(CustomerServiceConfig {
            chain_of_thought: false,
            ..Default::default()
        });
        let reply = agent.advise("I need a plan").await.unwrap();

        assert!(reply.success);
        assert!(!reply.response.contains("Reasoning:"));
        assert!(reply.response.starts_with("Recommended package: Economy"));
        assert!(reply.response.contains("- your budget"));
    }

    #[tokio::test]
    async fn history_is_bounded_and_cleared_on_reset() {
        let agent = CustomerServiceAgent::new(CustomerServiceConfig {
            max_memory: 2,
            ..Default::default()
        });
        for message in ["one", "two", "three"] {
            agent.advise(message).await.unwrap();
        }

        let history = agent.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].user, "two");

        Agent::reset(&agent);
        assert!(agent.history().is_empty());
        assert_eq!(agent.status().memory_length, 0);
    }
}
