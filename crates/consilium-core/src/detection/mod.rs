//! Role detection: classifier call, reply parsing and keyword fallback.
//!
//! [`RoleDetector::detect`] only fails with [`DetectionError::Internal`];
//! configuration problems, unusable replies and classifier outages all
//! resolve to a keyword-scored selection.

pub mod extract;
pub mod fallback;

use std::sync::Arc;

use consilium_llm::{GenerationMode, GenerationRequest, TextGenerator};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::{DetectionError, DetectionResult};
use crate::metrics::METRICS;
use crate::obs;
use crate::registry::RoleRegistry;
use crate::roles::canonical_role_id;
use crate::text::strip_reasoning;

pub use extract::{extract_json, largest_json_object};
pub use fallback::{KeywordEntry, KeywordTable};

/// Upper bound on the size of any selection.
pub const MAX_SELECTED_ROLES: usize = 6;

/// Ordered, duplicate-free role ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoleSelection(Vec<String>);

impl RoleSelection {
    /// Build a selection, keeping first occurrences and at most
    /// [`MAX_SELECTED_ROLES`] entries.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_limit(ids, MAX_SELECTED_ROLES)
    }

    pub fn with_limit<I, S>(ids: I, limit: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let limit = limit.min(MAX_SELECTED_ROLES);
        let mut out: Vec<String> = Vec::new();
        for id in ids {
            if out.len() == limit {
                break;
            }
            let id = id.into();
            if !out.contains(&id) {
                out.push(id);
            }
        }
        Self(out)
    }

    pub fn single(id: impl Into<String>) -> Self {
        Self(vec![id.into()])
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl IntoIterator for RoleSelection {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Detector settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Classifier temperature.
    pub temperature: f32,
    pub mode: GenerationMode,
    /// Model override; `None` uses the backend default.
    pub model: Option<String>,
    pub max_roles: usize,
    /// How many roles keyword fallback may return.
    pub fallback_limit: usize,
    /// Returned when no keyword matches.
    pub fallback_role: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            mode: GenerationMode::Local,
            model: None,
            max_roles: MAX_SELECTED_ROLES,
            fallback_limit: 3,
            fallback_role: "conseil".to_string(),
        }
    }
}

/// Where a selection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    Model,
    Fallback,
}

impl DetectionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionSource::Model => "model",
            DetectionSource::Fallback => "fallback",
        }
    }
}

pub struct RoleDetector {
    registry: Arc<RoleRegistry>,
    classifier: Arc<dyn TextGenerator>,
    config: DetectorConfig,
    keywords: KeywordTable,
}

impl RoleDetector {
    pub fn new(registry: Arc<RoleRegistry>, classifier: Arc<dyn TextGenerator>) -> Self {
        Self::with_config(registry, classifier, DetectorConfig::default())
    }

    pub fn with_config(
        registry: Arc<RoleRegistry>,
        classifier: Arc<dyn TextGenerator>,
        config: DetectorConfig,
    ) -> Self {
        let keywords = KeywordTable::for_registry(&registry);
        Self {
            registry,
            classifier,
            config,
            keywords,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Select the roles relevant to `input`, most relevant first.
    #[instrument(skip(self, input), fields(input_len = input.len()))]
    pub async fn detect(&self, input: &str) -> DetectionResult<RoleSelection> {
        match self.classify(input).await {
            Ok(selection) => {
                obs::emit_detection_completed(DetectionSource::Model.as_str(), selection.as_slice());
                Ok(selection)
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "model detection failed, using keyword fallback");
                METRICS.inc_fallback_detections();
                let selection = self.fallback(input)?;
                obs::emit_detection_completed(
                    DetectionSource::Fallback.as_str(),
                    selection.as_slice(),
                );
                Ok(selection)
            }
            Err(e) => Err(e),
        }
    }

    /// Model-based detection alone.
    pub async fn classify(&self, input: &str) -> DetectionResult<RoleSelection> {
        let prompt = self.classification_prompt(input)?;
        let mut request = GenerationRequest::new(prompt, self.config.temperature, self.config.mode);
        if let Some(model) = &self.config.model {
            request = request.with_model(model.clone());
        }
        let reply = self.classifier.generate(&request).await?;
        debug!(reply_len = reply.len(), "classifier replied");
        self.parse_reply(&reply)
    }

    /// Build the classification prompt from every role's detection snippet.
    pub fn classification_prompt(&self, input: &str) -> DetectionResult<String> {
        if let Some(e) = self.registry.configuration_error() {
            return Err(DetectionError::Configuration(e.to_string()));
        }
        let snippets: Vec<&str> = self
            .registry
            .detection_snippets()
            .into_iter()
            .map(|(_, snippet)| snippet)
            .collect();
        if snippets.is_empty() {
            return Err(DetectionError::Configuration(
                "no role provides a detection snippet".to_string(),
            ));
        }

        Ok(format!(
            "Analyse cette demande pour déterminer quels accompagnements conviennent, \
             d'après les critères suivants :\n\n{criteria}\n\n\
             Texte à analyser : \"{input}\"\n\n\
             Réponds UNIQUEMENT avec un JSON valide contenant une clé \"roles\" : \
             la liste des services pertinents, du plus au moins prioritaire.\n\
             Exemple : {{\"roles\": [\"organisation\", \"coach\"]}}",
            criteria = snippets.join("\n\n"),
        ))
    }

    /// Turn a raw classifier reply into a selection of dispatchable roles.
    pub fn parse_reply(&self, reply: &str) -> DetectionResult<RoleSelection> {
        let cleaned = strip_reasoning(reply).to_lowercase();
        let candidate = extract_json(cleaned.trim());

        let value: serde_json::Value =
            serde_json::from_str(candidate).map_err(|e| DetectionError::Parse(e.to_string()))?;
        let serde_json::Value::Object(object) = value else {
            return Err(DetectionError::Parse("reply is not a JSON object".to_string()));
        };
        let entries = match object.get("roles") {
            None => Vec::new(),
            Some(serde_json::Value::Array(entries)) => entries.clone(),
            Some(_) => {
                return Err(DetectionError::Parse("\"roles\" is not a list".to_string()));
            }
        };

        let ids = entries
            .iter()
            .filter_map(serde_json::Value::as_str)
            .map(normalize_role_name)
            .filter(|id| self.registry.is_dispatchable(id));
        let selection = RoleSelection::with_limit(ids, self.config.max_roles);

        if selection.is_empty() {
            return Err(DetectionError::EmptySelection);
        }
        Ok(selection)
    }

    /// Keyword-scored selection over registered roles.
    pub fn fallback(&self, input: &str) -> DetectionResult<RoleSelection> {
        let ranked = self
            .keywords
            .rank(input)
            .into_iter()
            .map(|(role, _)| role)
            .filter(|role| self.registry.is_dispatchable(role));
        let selection = RoleSelection::with_limit(ranked, self.config.fallback_limit);
        if !selection.is_empty() {
            return Ok(selection);
        }

        let default = canonical_role_id(&self.config.fallback_role);
        if self.registry.is_dispatchable(&default) {
            Ok(RoleSelection::single(default))
        } else {
            Err(DetectionError::Internal(format!(
                "fallback role {default} is not registered"
            )))
        }
    }
}

/// Trim, lowercase and drop one trailing plural `s`.
pub fn normalize_role_name(name: &str) -> String {
    let mut id = canonical_role_id(name);
    if id.ends_with('s') {
        id.pop();
    }
    id
}
