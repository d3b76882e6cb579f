//! Request dispatch: the worker pool, progress reporting and the orchestrator.

pub mod orchestrator;
pub mod pool;
pub mod progress;

pub use orchestrator::{Orchestrator, OrchestratorConfig, Response};
pub use pool::{next_state, PoolHandle, PoolState, WorkerPool};
pub use progress::{
    ChannelObserver, ProgressError, ProgressEvent, ProgressLink, ProgressObserver,
    ProgressReporter,
};
