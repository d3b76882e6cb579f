//! Role-definition documents.
//!
//! A document is a JSON list of records. Each record becomes one
//! [`crate::roles::TemplatedSpecialist`] once the registry accepts it.
//! Records that fail to deserialize are skipped with a warning; only a
//! document that cannot be read or is not a JSON list is an error.

use std::path::Path;

use consilium_llm::{GenerationMode, DEFAULT_LOCAL_MODEL};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};

fn default_temperature() -> f32 {
    1.0
}

fn default_model() -> String {
    DEFAULT_LOCAL_MODEL.to_string()
}

fn default_keyword_weight() -> f32 {
    1.0
}

/// One configured specialist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Role identifier, unique and case-insensitive.
    pub name: String,
    /// Template with exactly one `{input}` placeholder.
    pub prompt: String,
    /// Criteria text folded into the classifier prompt.
    #[serde(default)]
    pub detection: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub mode: GenerationMode,
    /// Label used as the result-set key; defaults to `name`.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Extra keywords for fallback detection.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,
}

impl RoleDefinition {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            detection: None,
            temperature: default_temperature(),
            model: default_model(),
            mode: GenerationMode::default(),
            display_name: None,
            keywords: Vec::new(),
            keyword_weight: default_keyword_weight(),
        }
    }

    pub fn with_detection(mut self, detection: impl Into<String>) -> Self {
        self.detection = Some(detection.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// The accepted records of a document plus how many were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleCatalog {
    pub definitions: Vec<RoleDefinition>,
    pub skipped: usize,
}

/// Parse a role-definition document.
pub fn parse_role_definitions(document: &str) -> ConfigResult<RoleCatalog> {
    let value: serde_json::Value = serde_json::from_str(document)?;
    let serde_json::Value::Array(records) = value else {
        return Err(ConfigError::NotAList);
    };

    let mut catalog = RoleCatalog::default();
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<RoleDefinition>(record) {
            Ok(definition) => catalog.definitions.push(definition),
            Err(e) => {
                warn!(index, error = %e, "skipping malformed role definition");
                catalog.skipped += 1;
            }
        }
    }
    Ok(catalog)
}

/// Read and parse a role-definition document from disk.
pub fn load_role_definitions(path: &Path) -> ConfigResult<RoleCatalog> {
    let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_role_definitions(&document)
}
