use crate::config::LlmConfig;
use crate::types::{BriefError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Requested shape of the completion body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// A single JSON object (classification).
    Json,
    /// Free plaintext (summarization).
    Text,
}

/// Thin completion interface over the model provider. Implementations
/// must keep the error split intact: `BriefError::Backend` means the call
/// failed, `BriefError::Validation` means it succeeded with unusable
/// content — the retry loops treat both as retryable but the orchestrator
/// only fails a run on backend errors.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    fn backend_name(&self) -> String;

    async fn complete(&self, prompt: &str, format: ResponseFormat) -> Result<String>;
}

/// OpenAI-compatible chat-completions backend. Works against the standard
/// endpoint or any compatible server via `base_url`.
pub struct OpenAiBackend {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiBackend {
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("world-brief/0.1")
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// Reads `LLM_API_KEY`, with `LLM_BASE_URL` and `LLM_MODEL` overriding
    /// the config file.
    pub fn from_env(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| BriefError::Config("LLM_API_KEY is not set".to_string()))?;
        let mut config = config.clone();
        if let Ok(base_url) = std::env::var("LLM_BASE_URL") {
            config.base_url = Some(base_url);
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.model = model;
        }
        Self::new(api_key, &config)
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn backend_name(&self) -> String {
        format!("openai-compatible ({})", self.model)
    }

    async fn complete(&self, prompt: &str, format: ResponseFormat) -> Result<String> {
        let response_format = match format {
            ResponseFormat::Json => Some(serde_json::json!({ "type": "json_object" })),
            ResponseFormat::Text => None,
        };
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.2,
            response_format,
        };

        debug!("LLM call: model={}, format={:?}", self.model, format);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BriefError::Backend(format!("LLM call timed out: {}", e))
                } else {
                    BriefError::Backend(format!("LLM transport failure: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BriefError::Backend(format!(
                "LLM backend returned HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| BriefError::Validation(format!("malformed completion envelope: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| BriefError::Validation("empty completion".to_string()))
    }
}

/// Scripted backend for tests and offline runs: returns queued responses in
/// order and records every prompt it receives.
#[derive(Default)]
pub struct MockBackend {
    responses: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<(String, ResponseFormat)>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, body: impl Into<String>) {
        self.responses
            .lock()
            .expect("mock responses lock")
            .push_back(Ok(body.into()));
    }

    pub fn push_backend_error(&self, message: impl Into<String>) {
        self.responses
            .lock()
            .expect("mock responses lock")
            .push_back(Err(BriefError::Backend(message.into())));
    }

    /// Prompts seen so far, in call order.
    pub fn recorded_prompts(&self) -> Vec<(String, ResponseFormat)> {
        self.prompts.lock().expect("mock prompts lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().expect("mock prompts lock").len()
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn backend_name(&self) -> String {
        "mock".to_string()
    }

    async fn complete(&self, prompt: &str, format: ResponseFormat) -> Result<String> {
        self.prompts
            .lock()
            .expect("mock prompts lock")
            .push((prompt.to_string(), format));
        self.responses
            .lock()
            .expect("mock responses lock")
            .pop_front()
            .unwrap_or_else(|| Err(BriefError::Backend("no scripted response".to_string())))
    }
}
