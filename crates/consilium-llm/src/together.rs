//! External chat-completions backend (Together API)
//!
//! Serves `GenerationMode::External` calls. The model is pinned by
//! configuration; per-request model overrides are ignored.

use crate::error::GenerationError;
use crate::generator::{GenerationRequest, TextGenerator};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default hosted model.
pub const DEFAULT_EXTERNAL_MODEL: &str = "deepseek-ai/DeepSeek-R1";

/// Together API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TogetherConfig {
    /// API root, e.g. `https://api.together.xyz`
    pub base_url: String,
    /// Bearer token; generation fails with `MissingApiKey` when absent
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for TogetherConfig {
    fn default() -> Self {
        TogetherConfig {
            base_url: std::env::var("TOGETHER_BASE_URL")
                .unwrap_or_else(|_| "https://api.together.xyz".to_string()),
            api_key: std::env::var("TOGETHER_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            model: std::env::var("TOGETHER_MODEL")
                .unwrap_or_else(|_| DEFAULT_EXTERNAL_MODEL.to_string()),
            max_tokens: 2600,
        }
    }
}

impl TogetherConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific endpoint
    pub fn new(base_url: &str, model: &str) -> Self {
        TogetherConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            model: model.to_string(),
            max_tokens: 2600,
        }
    }

    /// Set authentication token
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for the Together chat-completions API
pub struct TogetherClient {
    config: TogetherConfig,
    http_client: reqwest::Client,
}

impl TogetherClient {
    /// Create a new client
    pub fn new(config: TogetherConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("consilium-llm/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(TogetherClient {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(TogetherConfig::from_env())
    }

    pub fn config(&self) -> &TogetherConfig {
        &self.config
    }
}

fn first_choice_content(reply: ChatReply) -> Result<String> {
    reply
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| GenerationError::MalformedResponse("reply has no choices".to_string()))
}

#[async_trait]
impl TextGenerator for TogetherClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingApiKey)?;

        let url = format!("{}/v1/chat/completions", self.config.base_url);
        debug!(model = %self.config.model, temperature = request.temperature, "external generation");

        let body = ChatBody {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::from_status(status.as_u16(), body));
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
        first_choice_content(reply)
    }
}
