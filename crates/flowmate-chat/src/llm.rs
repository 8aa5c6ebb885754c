//! Chat-completion client for OpenAI-compatible APIs (Groq).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_TOP_P: f32 = 1.0;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Why a completion could not be produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("request timed out")]
    Timeout,

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl LlmError {
    /// Text suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            LlmError::Timeout => "The language model timed out. Please try again.".into(),
            LlmError::Api { status, .. } => {
                format!("The language model service returned an error ({}).", status)
            }
            LlmError::Request(_) => "The language model service could not be reached.".into(),
            LlmError::Malformed(_) => {
                "The language model service returned an unreadable response.".into()
            }
        }
    }
}

impl From<LlmError> for flowmate_core::Error {
    fn from(e: LlmError) -> Self {
        flowmate_core::Error::Llm(e.to_string())
    }
}

/// A finished completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub tokens_used: Option<usize>,
}

/// A chat message in an OpenAI-style request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Sampling and transport settings for a completion backend.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_GROQ_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// A model that turns a single prompt into text.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<Completion, LlmError>;

    fn model(&self) -> &str;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<usize>,
}

/// Non-streaming Groq chat-completions client.
pub struct GroqClient {
    client: Client,
    url: String,
    api_key: String,
    settings: LlmSettings,
}

impl GroqClient {
    pub fn new(api_key: impl Into<String>, settings: LlmSettings) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| LlmError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: GROQ_CHAT_URL.to_string(),
            api_key: api_key.into(),
            settings,
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Send a tiny prompt and report whether the API answers.
    pub async fn test_connection(&self) -> Result<(), LlmError> {
        let completion = self.complete("Hello", 50).await?;
        info!(
            "Groq connection OK ({}, {} chars)",
            completion.model,
            completion.text.len()
        );
        Ok(())
    }
}

#[async_trait]
impl CompletionModel for GroqClient {
    async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<Completion, LlmError> {
        let body = CompletionRequest {
            model: &self.settings.model,
            messages: vec![ChatMessage::user(prompt)],
            max_tokens,
            temperature: self.settings.temperature,
            top_p: self.settings.top_p,
            stream: false,
        };

        debug!(
            "Completing with {} ({} prompt chars, max_tokens={})",
            self.settings.model,
            prompt.len(),
            max_tokens
        );

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Malformed(e.to_string())
            }
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Malformed("no choices in response".into()))?;

        Ok(Completion {
            text,
            model: self.settings.model.clone(),
            tokens_used: parsed.usage.and_then(|u| u.total_tokens),
        })
    }

    fn model(&self) -> &str {
        &self.settings.model
    }
}
