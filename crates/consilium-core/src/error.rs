//! Error taxonomy for the orchestration engine.
//!
//! Only [`PipelineError`] is allowed to reach the caller of a request; every
//! other class is recovered (detection), or recorded as text in the result
//! set (role execution, timeouts, synthesis).

use std::path::PathBuf;

use consilium_llm::GenerationError;

/// Errors produced by a single role's execution.
#[derive(Debug, thiserror::Error)]
pub enum RoleError {
    #[error("{0}")]
    Generation(#[from] GenerationError),

    #[error("{0}")]
    Execution(String),
}

/// Result type for role execution.
pub type RoleResult<T> = std::result::Result<T, RoleError>;

/// Errors produced while loading the role-definition document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read role definitions at {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("role definitions are not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("role definitions must be a JSON list of records")]
    NotAList,
}

/// Result type for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors produced when registering a role.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RegistryError {
    #[error("role {0} is already registered")]
    DuplicateRole(String),

    #[error("role identifier must not be empty")]
    EmptyRoleId,

    #[error("display name {0:?} is already used by another role")]
    DuplicateDisplayName(String),

    #[error("display name {0:?} is reserved for the synthesis entry")]
    ReservedDisplayName(String),

    #[error("prompt template for role {role} must contain exactly one {{input}} placeholder (found {placeholders})")]
    InvalidTemplate { role: String, placeholders: usize },
}

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Errors produced during role detection.
///
/// Everything except [`DetectionError::Internal`] is recovered inside the
/// detector by keyword fallback.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("classifier reply is not usable JSON: {0}")]
    Parse(String),

    #[error("classifier call failed: {0}")]
    Classifier(#[from] GenerationError),

    #[error("classifier proposed no registered role")]
    EmptySelection,

    #[error("internal detection error: {0}")]
    Internal(String),
}

impl DetectionError {
    /// Whether keyword fallback applies.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DetectionError::Internal(_))
    }
}

/// Result type for detection.
pub type DetectionResult<T> = std::result::Result<T, DetectionError>;

/// Errors produced by the synthesis step.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("Agent Connecteur non configuré")]
    MissingConnector,

    #[error("{0}")]
    Generation(#[from] GenerationError),

    #[error("cannot write synthesis audit: {0}")]
    Audit(#[from] std::io::Error),
}

/// Result type for synthesis.
pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;

/// Failures outside task and synthesis boundaries.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("worker pool unavailable: {0}")]
    PoolUnavailable(String),

    #[error("no dispatchable role in selection {0:?}")]
    NoDispatchableRoles(Vec<String>),

    #[error("{0}")]
    Internal(String),
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
