//! LLM client abstraction
//!
//! Agents talk to a hosted chat model through [`LlmClient`]. The only
//! production implementation is [`OpenAiClient`], a thin wrapper around an
//! OpenAI-compatible `chat/completions` endpoint. [`ScriptedLlm`] replays
//! canned replies for tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::errors::{AgentError, AgentResult};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// A single prompt sent to the model
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    /// Base64 encoded PNG images attached to the prompt
    pub images: Vec<String>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_image(mut self, png_base64: impl Into<String>) -> Self {
        self.images.push(png_base64.into());
        self
    }
}

/// Hosted chat model used by the planning, code and GUI agents
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Model identifier, for logs
    fn model(&self) -> &str;

    /// Send one prompt and return the reply text
    async fn complete(&self, request: LlmRequest) -> AgentResult<String>;
}

/// Client for OpenAI-compatible chat completion endpoints
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<Value>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, endpoint: Option<&str>, model: &str) -> AgentResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        if !api_key.is_empty() {
            let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| AgentError::ConfigError(format!("Invalid API key format: {}", e)))?;
            headers.insert(header::AUTHORIZATION, auth_value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AgentError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.unwrap_or(DEFAULT_ENDPOINT).to_string(),
            model: model.to_string(),
            max_tokens: 4096,
        })
    }

    fn build_messages(request: &LlmRequest) -> Vec<Value> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }

        if request.images.is_empty() {
            messages.push(json!({ "role": "user", "content": request.prompt }));
        } else {
            let mut parts = vec![json!({ "type": "text", "text": request.prompt })];
            for image in &request.images {
                parts.push(json!({
                    "type": "image_url",
                    "image_url": { "url": format!("data:image/png;base64,{}", image) }
                }));
            }
            messages.push(json!({ "role": "user", "content": parts }));
        }

        messages
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: LlmRequest) -> AgentResult<String> {
        let body = CompletionRequest {
            model: self.model.clone(),
            messages: Self::build_messages(&request),
            temperature: request.temperature,
            max_tokens: self.max_tokens,
        };

        tracing::debug!(model = %self.model, endpoint = %self.endpoint, "sending completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::LlmError(format!("Request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AgentError::LlmError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(AgentError::LlmError(format!("{}: {}", status, message)));
        }

        let parsed: CompletionResponse = serde_json::from_str(&text)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AgentError::LlmError("Response contained no content".to_string()))
    }
}

/// Credentials and endpoint shared by every agent's model client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
}

impl LlmSettings {
    pub fn client(&self, model: &str) -> Option<Arc<dyn LlmClient>> {
        build_client(self.api_key.as_deref(), self.endpoint.as_deref(), model)
    }
}

/// Build a client when an API key is configured
pub fn build_client(
    api_key: Option<&str>,
    endpoint: Option<&str>,
    model: &str,
) -> Option<Arc<dyn LlmClient>> {
    let key = api_key.filter(|k| !k.is_empty())?;
    match OpenAiClient::new(key, endpoint, model) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(model, error = %e, "LLM initialisation failed, using rule-based fallback");
            None
        }
    }
}

/// LLM double that replays queued replies and records every prompt
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.replies.lock().push_back(Ok(reply.into()));
        self
    }

    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.replies.lock().push_back(Err(message.into()));
        self
    }

    pub fn prompts(&self) -> Vec<LlmRequest> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: LlmRequest) -> AgentResult<String> {
        self.prompts.lock().push(request);
        match self.replies.lock().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(AgentError::LlmError(message)),
            None => Err(AgentError::LlmError("no scripted reply left".to_string())),
        }
    }
}
