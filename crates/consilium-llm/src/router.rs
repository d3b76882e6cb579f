//! Mode-based dispatch between the local and external backends.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::generator::{GenerationMode, GenerationRequest, TextGenerator};
use crate::ollama::OllamaClient;
use crate::together::TogetherClient;
use crate::Result;

/// Routes each request to the backend registered for its [`GenerationMode`].
#[derive(Clone, Default)]
pub struct GenerationRouter {
    local: Option<Arc<dyn TextGenerator>>,
    external: Option<Arc<dyn TextGenerator>>,
}

impl std::fmt::Debug for GenerationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationRouter")
            .field("local", &self.local.is_some())
            .field("external", &self.external.is_some())
            .finish()
    }
}

impl GenerationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local(mut self, backend: Arc<dyn TextGenerator>) -> Self {
        self.local = Some(backend);
        self
    }

    pub fn with_external(mut self, backend: Arc<dyn TextGenerator>) -> Self {
        self.external = Some(backend);
        self
    }

    /// Ollama for local calls and Together for external ones, both configured
    /// from the environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new()
            .with_local(Arc::new(OllamaClient::from_env()?))
            .with_external(Arc::new(TogetherClient::from_env()?)))
    }

    fn backend(&self, mode: GenerationMode) -> Result<&Arc<dyn TextGenerator>> {
        let slot = match mode {
            GenerationMode::Local => self.local.as_ref(),
            GenerationMode::External => self.external.as_ref(),
        };
        slot.ok_or_else(|| GenerationError::UnsupportedMode(mode.to_string()))
    }
}

#[async_trait]
impl TextGenerator for GenerationRouter {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.backend(request.mode)?.generate(request).await
    }
}
