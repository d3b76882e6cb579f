//! Role vocabulary: `Role`, `AgentCapability`, `Synthesizer` and the
//! concrete specialists.

use std::sync::Arc;

use async_trait::async_trait;
use consilium_llm::{GenerationMode, GenerationRequest, TextGenerator, DEFAULT_LOCAL_MODEL};
use serde::Serialize;

use crate::error::{ConnectorResult, RoleResult};
use crate::text::INPUT_PLACEHOLDER;

/// Identifier of the built-in research specialist.
pub const RESEARCH_ROLE_ID: &str = "recherche";

/// Identifier of the built-in synthesis specialist.
pub const CONNECTOR_ROLE_ID: &str = "connecteur";

/// Canonical form of a role identifier (trimmed, lowercase).
pub fn canonical_role_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// The one operation every specialist exposes.
///
/// Failures surface as a [`crate::error::RoleError`] carrying a textual
/// description; an empty string is a legitimate answer, not an error marker.
#[async_trait]
pub trait AgentCapability: Send + Sync {
    async fn execute(&self, input: &str) -> RoleResult<String>;

    /// The synthesis view of this capability, if it has one.
    fn as_synthesizer(&self) -> Option<&dyn Synthesizer> {
        None
    }
}

/// One role's answer handed to the synthesis step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    /// Display label of the contributing role.
    pub role_label: String,
    pub text: String,
}

impl Contribution {
    pub fn new(role_label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role_label: role_label.into(),
            text: text.into(),
        }
    }
}

/// A capability that merges several contributions into one answer.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, input: &str, contributions: &[Contribution])
        -> ConnectorResult<String>;
}

/// Immutable role descriptor owned by the registry.
#[derive(Clone)]
pub struct Role {
    id: String,
    display_name: String,
    detection: Option<String>,
    keywords: Vec<String>,
    keyword_weight: f32,
    capability: Arc<dyn AgentCapability>,
}

impl std::fmt::Debug for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Role")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("detection", &self.detection.is_some())
            .field("synthesizer", &self.is_synthesizer())
            .finish()
    }
}

impl Role {
    pub fn new(
        id: &str,
        display_name: impl Into<String>,
        capability: Arc<dyn AgentCapability>,
    ) -> Self {
        Self {
            id: canonical_role_id(id),
            display_name: display_name.into(),
            detection: None,
            keywords: Vec::new(),
            keyword_weight: 1.0,
            capability,
        }
    }

    /// Attach the classifier criteria text for this role. Blank text is ignored.
    pub fn with_detection(mut self, snippet: impl Into<String>) -> Self {
        let snippet = snippet.into();
        self.detection = (!snippet.trim().is_empty()).then_some(snippet);
        self
    }

    /// Attach extra fallback keywords and their weight.
    pub fn with_keywords(mut self, keywords: Vec<String>, weight: f32) -> Self {
        self.keywords = keywords;
        self.keyword_weight = weight;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn detection(&self) -> Option<&str> {
        self.detection.as_deref()
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn keyword_weight(&self) -> f32 {
        self.keyword_weight
    }

    pub fn capability(&self) -> &Arc<dyn AgentCapability> {
        &self.capability
    }

    /// Synthesis roles are never dispatched as specialists.
    pub fn is_synthesizer(&self) -> bool {
        self.capability.as_synthesizer().is_some()
    }
}

/// A specialist whose behaviour is entirely defined by configuration data.
pub struct TemplatedSpecialist {
    template: String,
    temperature: f32,
    model: String,
    mode: GenerationMode,
    generator: Arc<dyn TextGenerator>,
}

impl TemplatedSpecialist {
    pub fn new(
        template: impl Into<String>,
        temperature: f32,
        model: impl Into<String>,
        mode: GenerationMode,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            template: template.into(),
            temperature,
            model: model.into(),
            mode,
            generator,
        }
    }

    /// The template with the request substituted in.
    pub fn render(&self, input: &str) -> String {
        self.template.replace(INPUT_PLACEHOLDER, input)
    }
}

#[async_trait]
impl AgentCapability for TemplatedSpecialist {
    async fn execute(&self, input: &str) -> RoleResult<String> {
        let request = GenerationRequest::new(self.render(input), self.temperature, self.mode)
            .with_model(self.model.clone());
        Ok(self.generator.generate(&request).await?)
    }
}

const RESEARCH_PROMPT: &str = "\
Vous êtes un assistant de recherche rigoureux. Structurez votre réponse en cinq sections courtes :

**1. Objectif** : la demande reformulée en une phrase
**2. Sources** : trois à cinq sources fiables et récentes
**3. Données clés** : chiffres et faits vérifiables
**4. Analyse** : les trois enseignements principaux
**5. Actions** : recommandations concrètes

Deux ou trois phrases par section, sans jargon, en privilégiant les données des deux dernières années.

**Demande** : {input}";

const RESEARCH_DETECTION: &str = "\
- recherche : la demande porte sur des informations factuelles, des données, des statistiques ou l'état des connaissances sur un sujet.";

/// The built-in research specialist (fixed prompt, external mode).
pub struct ResearchSpecialist {
    inner: TemplatedSpecialist,
}

impl ResearchSpecialist {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            inner: TemplatedSpecialist::new(
                RESEARCH_PROMPT,
                1.0,
                DEFAULT_LOCAL_MODEL,
                GenerationMode::External,
                generator,
            ),
        }
    }

    /// The registry entry for this specialist.
    pub fn role(generator: Arc<dyn TextGenerator>) -> Role {
        Role::new(RESEARCH_ROLE_ID, "🔍 Recherches", Arc::new(Self::new(generator)))
            .with_detection(RESEARCH_DETECTION)
    }
}

#[async_trait]
impl AgentCapability for ResearchSpecialist {
    async fn execute(&self, input: &str) -> RoleResult<String> {
        self.inner.execute(input).await
    }
}
