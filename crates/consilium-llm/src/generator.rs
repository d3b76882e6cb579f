//! The text-generation contract shared by every backend.
//!
//! A generation call is `generate(prompt, temperature, mode) -> text`. The
//! request may also name a model; backends that pin their model ignore it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::Result;

/// Where a generation call is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// A locally hosted inference server.
    #[default]
    Local,
    /// A hosted, API-key authenticated service.
    External,
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GenerationMode::Local => "local",
            GenerationMode::External => "external",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for GenerationMode {
    type Err = GenerationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(GenerationMode::Local),
            "external" => Ok(GenerationMode::External),
            other => Err(GenerationError::UnsupportedMode(other.to_string())),
        }
    }
}

/// A single generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    pub mode: GenerationMode,
    /// Model override; `None` uses the backend default.
    pub model: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32, mode: GenerationMode) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            mode,
            model: None,
        }
    }

    /// Target a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Anything that can turn a prompt into text.
///
/// Implementations must fail with a descriptive [`GenerationError`] and never
/// return a silent empty success for a transport failure.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}
