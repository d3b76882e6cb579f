//! Local Ollama backend
//!
//! Serves `GenerationMode::Local` calls through the Ollama HTTP API
//! (`/api/generate`, non-streaming).

use crate::error::GenerationError;
use crate::generator::{GenerationRequest, TextGenerator};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default model for local generation.
pub const DEFAULT_LOCAL_MODEL: &str = "deepseek-r1:14b";

/// Ollama configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Server URL, e.g. `http://localhost:11434`
    pub host: String,
    /// Model used when a request does not name one
    pub default_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        OllamaConfig {
            host: std::env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            default_model: std::env::var("OLLAMA_MODEL")
                .unwrap_or_else(|_| DEFAULT_LOCAL_MODEL.to_string()),
        }
    }
}

impl OllamaConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific server
    pub fn new(host: &str, default_model: &str) -> Self {
        OllamaConfig {
            host: host.trim_end_matches('/').to_string(),
            default_model: default_model.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsReply {
    #[serde(default)]
    models: Vec<serde_json::Value>,
}

/// Client for a local Ollama server
pub struct OllamaClient {
    config: OllamaConfig,
    http_client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("consilium-llm/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(OllamaClient {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(OllamaConfig::from_env())
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Check that the server answers and has at least one model installed.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.host);

        let response = match self.http_client.get(&url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(status = %r.status(), "Ollama tags probe returned non-success");
                return false;
            }
            Err(e) => {
                debug!(error = %e, "Ollama is not reachable");
                return false;
            }
        };

        match response.json::<TagsReply>().await {
            Ok(tags) if !tags.models.is_empty() => true,
            Ok(_) => {
                warn!("Ollama is running but no model is installed");
                false
            }
            Err(e) => {
                warn!(error = %e, "Ollama tags probe returned an unreadable payload");
                false
            }
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}/api/generate", self.config.host);
        let model = request
            .model
            .as_deref()
            .unwrap_or(self.config.default_model.as_str());

        debug!(model = %model, temperature = request.temperature, "local generation");

        let body = GenerateBody {
            model,
            prompt: &request.prompt,
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
            },
        };

        let response = self.http_client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::from_status(status.as_u16(), body));
        }

        let reply: GenerateReply = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
        Ok(reply.response)
    }
}
