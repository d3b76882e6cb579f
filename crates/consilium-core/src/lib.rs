//! Consilium Core: role detection, parallel dispatch and synthesis
//!
//! One free-form request is classified into an ordered set of specialist
//! roles, each role runs concurrently under a worker budget and a global
//! deadline, and the answers are merged by the connector.
//!
//! ## Key Components
//!
//! - `RoleRegistry`: built-in and configured roles, looked up case-insensitively
//! - `RoleDetector`: classifier prompt, JSON extraction, keyword fallback
//! - `Orchestrator`: worker pool lifecycle, fan-out/fan-in, progress events
//! - `Connector`: local (summarize then merge) and external (single call) synthesis
//! - `error_artifact`: bounded system-error result set

pub mod config;
pub mod connector;
pub mod detection;
pub mod error;
pub mod metrics;
pub mod obs;
pub mod orchestration;
pub mod registry;
pub mod results;
pub mod roles;
pub mod telemetry;
pub mod text;

pub use config::{load_role_definitions, parse_role_definitions, RoleCatalog, RoleDefinition};
pub use connector::{Connector, ConnectorConfig, CONNECTOR_DISPLAY_NAME};
pub use detection::{DetectorConfig, KeywordTable, RoleDetector, RoleSelection, MAX_SELECTED_ROLES};
pub use error::{
    ConfigError, ConnectorError, DetectionError, PipelineError, RegistryError, RoleError,
};
pub use orchestration::{
    ChannelObserver, Orchestrator, OrchestratorConfig, PoolState, ProgressError, ProgressEvent,
    ProgressObserver, ProgressReporter, Response, WorkerPool,
};
pub use registry::RoleRegistry;
pub use results::{error_artifact, ResultSet, TaskOutcome, TaskResult, CONNECTOR_KEY, SYSTEM_ERROR_LABEL};
pub use roles::{
    AgentCapability, Contribution, ResearchSpecialist, Role, Synthesizer, TemplatedSpecialist,
    CONNECTOR_ROLE_ID, RESEARCH_ROLE_ID,
};
pub use text::strip_reasoning;
