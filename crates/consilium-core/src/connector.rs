//! The synthesis specialist.
//!
//! In local mode every contribution is summarized on its own, the partial
//! summaries are written to the audit file, and a final call merges them.
//! In external mode all contributions go into a single synthesis call.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use consilium_llm::{GenerationMode, GenerationRequest, TextGenerator};
use tracing::{debug, warn};

use crate::error::{ConnectorResult, RoleError, RoleResult};
use crate::roles::{AgentCapability, Contribution, Role, Synthesizer, CONNECTOR_ROLE_ID};
use crate::text::strip_reasoning;

/// Temperature of each per-role summary and of the local final pass.
pub const LOCAL_SYNTHESIS_TEMPERATURE: f32 = 1.2;

/// Temperature of the single external synthesis call.
pub const EXTERNAL_SYNTHESIS_TEMPERATURE: f32 = 1.1;

/// Display name of the synthesis role.
pub const CONNECTOR_DISPLAY_NAME: &str = "🔗 Synthèse des Idées";

/// Connector settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorConfig {
    pub mode: GenerationMode,
    /// Model override; `None` uses the backend default.
    pub model: Option<String>,
    /// Where local mode writes the partial summaries.
    pub audit_path: Option<PathBuf>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            mode: GenerationMode::External,
            model: None,
            audit_path: None,
        }
    }
}

impl ConnectorConfig {
    pub fn with_mode(mut self, mode: GenerationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_audit_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit_path = Some(path.into());
        self
    }
}

pub struct Connector {
    generator: Arc<dyn TextGenerator>,
    config: ConnectorConfig,
}

impl Connector {
    pub fn new(generator: Arc<dyn TextGenerator>, config: ConnectorConfig) -> Self {
        Self { generator, config }
    }

    /// The registry entry for the connector.
    pub fn role(generator: Arc<dyn TextGenerator>, config: ConnectorConfig) -> Role {
        Role::new(
            CONNECTOR_ROLE_ID,
            CONNECTOR_DISPLAY_NAME,
            Arc::new(Self::new(generator, config)),
        )
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    async fn call(&self, prompt: String, temperature: f32) -> ConnectorResult<String> {
        let mut request = GenerationRequest::new(prompt, temperature, self.config.mode);
        if let Some(model) = &self.config.model {
            request = request.with_model(model.clone());
        }
        Ok(self.generator.generate(&request).await?)
    }

    async fn synthesize_local(
        &self,
        input: &str,
        contributions: &[Contribution],
    ) -> ConnectorResult<String> {
        let mut summaries = Vec::with_capacity(contributions.len());
        for contribution in contributions {
            let partial = self
                .call(
                    summary_prompt(input, contribution),
                    LOCAL_SYNTHESIS_TEMPERATURE,
                )
                .await?;
            summaries.push(format!(
                "Résumé du rôle {} : {}",
                contribution.role_label,
                strip_reasoning(&partial)
            ));
        }

        if let Err(e) = self.write_audit(&summaries.join("\n\n")).await {
            warn!(error = %e, "synthesis audit not written");
        }

        self.call(final_prompt(input, &summaries), LOCAL_SYNTHESIS_TEMPERATURE)
            .await
    }

    async fn synthesize_external(
        &self,
        input: &str,
        contributions: &[Contribution],
    ) -> ConnectorResult<String> {
        let combined = contributions
            .iter()
            .map(|c| format!("Réponse de l'aidant {}: {}", c.role_label, c.text))
            .collect::<Vec<_>>()
            .join("\n");
        self.call(final_prompt(input, &[combined]), EXTERNAL_SYNTHESIS_TEMPERATURE)
            .await
    }

    async fn write_audit(&self, summary: &str) -> ConnectorResult<()> {
        if let Some(path) = &self.config.audit_path {
            tokio::fs::write(path, summary).await?;
            debug!(path = %path.display(), "synthesis audit written");
        }
        Ok(())
    }
}

#[async_trait]
impl Synthesizer for Connector {
    async fn synthesize(
        &self,
        input: &str,
        contributions: &[Contribution],
    ) -> ConnectorResult<String> {
        match self.config.mode {
            GenerationMode::Local => self.synthesize_local(input, contributions).await,
            GenerationMode::External => self.synthesize_external(input, contributions).await,
        }
    }
}

#[async_trait]
impl AgentCapability for Connector {
    async fn execute(&self, _input: &str) -> RoleResult<String> {
        Err(RoleError::Execution(
            "the connector only runs on role contributions".to_string(),
        ))
    }

    fn as_synthesizer(&self) -> Option<&dyn Synthesizer> {
        Some(self)
    }
}

fn summary_prompt(input: &str, contribution: &Contribution) -> String {
    format!(
        "Tu es spécialiste de la synthèse de texte. Résume la réponse d'un aidant \
         à la demande d'une autre personne.\n\n\
         Demande initiale : \"{input}\"\n\n\
         Réponse de l'aidant {label} :\n{text}\n\n\
         Dégage les points clés et résume l'essentiel en quelques phrases.",
        label = contribution.role_label,
        text = contribution.text,
    )
}

fn final_prompt(input: &str, blocks: &[String]) -> String {
    format!(
        "Tu es le Connecteur : tu relies des points de vue variés pour en tirer l'essentiel.\n\n\
         Demande initiale : \"{input}\"\n\n\
         Apports des aidants :\n{combined}\n\n\
         Repère les idées communes et les complémentarités, puis rédige une réponse \
         finale fluide et naturelle qui garde l'esprit des apports, sans effet de liste.",
        combined = blocks.join("\n"),
    )
}
