//! Fan-out/fan-in dispatcher.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::time::{timeout_at, Instant};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::detection::{RoleDetector, RoleSelection};
use crate::error::{ConnectorError, PipelineError, PipelineResult};
use crate::metrics::METRICS;
use crate::obs::{self, RequestSpan};
use crate::orchestration::pool::{PoolState, WorkerPool};
use crate::orchestration::progress::{ProgressEvent, ProgressReporter};
use crate::registry::RoleRegistry;
use crate::results::{
    connector_failure_text, error_artifact, ResultSet, TaskOutcome, TaskResult, CONNECTOR_KEY,
};
use crate::roles::{Contribution, Role, RESEARCH_ROLE_ID};

/// Engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Concurrent role executions.
    pub max_workers: usize,
    /// Global deadline for one dispatched batch, measured from the first submission.
    pub deadline: Duration,
    /// Dispatched when a selection is empty.
    pub default_role: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_workers: 3,
            deadline: Duration::from_secs(200),
            default_role: RESEARCH_ROLE_ID.to_string(),
        }
    }
}

/// Outcome of [`Orchestrator::respond`].
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub request_id: Uuid,
    pub roles: RoleSelection,
    pub results: ResultSet,
}

pub struct Orchestrator {
    registry: Arc<RoleRegistry>,
    detector: RoleDetector,
    pool: WorkerPool,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<RoleRegistry>,
        detector: RoleDetector,
        config: OrchestratorConfig,
    ) -> Self {
        let pool = WorkerPool::new(config.max_workers);
        Self {
            registry,
            detector,
            pool,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<RoleRegistry> {
        &self.registry
    }

    pub fn detector(&self) -> &RoleDetector {
        &self.detector
    }

    pub fn pool_state(&self) -> PoolState {
        self.pool.state()
    }

    /// `(id, display name)` of every registered role.
    pub fn list_roles(&self) -> Vec<(String, String)> {
        self.registry.list()
    }

    /// Detection where an escaping error means "no roles detected".
    pub async fn detect_roles(&self, input: &str) -> RoleSelection {
        match self.detector.detect(input).await {
            Ok(selection) => selection,
            Err(e) => {
                warn!(error = %e, "role detection failed");
                RoleSelection::empty()
            }
        }
    }

    /// Detect, dispatch and synthesize; a pipeline failure becomes the
    /// error artifact.
    pub async fn respond(&self, input: &str, progress: &ProgressReporter) -> Response {
        let request_id = Uuid::new_v4();
        RequestSpan::new(&request_id.to_string())
            .instrument(self.respond_in_span(request_id, input, progress))
            .await
    }

    async fn respond_in_span(
        &self,
        request_id: Uuid,
        input: &str,
        progress: &ProgressReporter,
    ) -> Response {
        let started = Instant::now();

        let selection = self.detect_roles(input).await;
        let outcome = self.process(input, selection.clone(), progress).await;
        let (results, roles, success) = match outcome {
            Ok((results, roles)) => (results, roles, true),
            Err(e) => {
                warn!(error = %e, "request failed");
                (error_artifact(&e.to_string()), selection, false)
            }
        };

        obs::emit_request_finished(
            started.elapsed().as_millis() as u64,
            results.len(),
            success,
        );
        Response {
            request_id,
            roles,
            results,
        }
    }

    /// Run every selected role and synthesize when more than one ran.
    ///
    /// Returns the result set keyed by display name, in dispatch order, and
    /// the selection that was actually dispatched.
    #[instrument(skip(self, input, selection, progress), fields(roles = selection.len()))]
    pub async fn process(
        &self,
        input: &str,
        selection: RoleSelection,
        progress: &ProgressReporter,
    ) -> PipelineResult<(ResultSet, RoleSelection)> {
        METRICS.inc_requests();
        let selection = if selection.is_empty() {
            info!(role = %self.config.default_role, "empty selection, using default role");
            RoleSelection::single(self.config.default_role.clone())
        } else {
            selection
        };
        obs::emit_request_started(selection.as_slice());

        let roles = self.resolve(&selection)?;
        let dispatched = RoleSelection::new(roles.iter().map(|r| r.id().to_string()));
        let task_results = self.dispatch(input, &roles, progress).await?;

        let mut results = ResultSet::new();
        for (role, result) in roles.iter().zip(&task_results) {
            results.insert(role.display_name(), result.content.clone());
        }

        if roles.len() > 1 {
            progress.emit(ProgressEvent::SynthesisStarted);
            let contributions: Vec<Contribution> = roles
                .iter()
                .zip(&task_results)
                .map(|(role, result)| Contribution::new(role.display_name(), result.content.clone()))
                .collect();
            results.insert(CONNECTOR_KEY, self.synthesize(input, &contributions).await);
        }

        Ok((results, dispatched))
    }

    /// Close the worker pool if it is still open.
    pub fn shutdown(&self) -> PipelineResult<()> {
        if self.pool.state() != PoolState::Idle {
            info!("shutting down worker pool");
        }
        self.pool.shutdown()
    }

    fn resolve(&self, selection: &RoleSelection) -> PipelineResult<Vec<Role>> {
        let mut roles = Vec::with_capacity(selection.len());
        for id in selection.iter() {
            match self.registry.get(id) {
                Some(role) if !role.is_synthesizer() => roles.push(role.clone()),
                Some(_) => warn!(role = %id, "synthesis role cannot be dispatched"),
                None => warn!(role = %id, "unknown role skipped"),
            }
        }
        if roles.is_empty() {
            return Err(PipelineError::NoDispatchableRoles(
                selection.as_slice().to_vec(),
            ));
        }
        Ok(roles)
    }

    /// One task per role under the pool budget and the global deadline.
    ///
    /// Results come back in `roles` order. Tasks still running at the
    /// deadline are detached: they run to completion, their output is
    /// discarded and their progress events no longer reach the observer.
    async fn dispatch(
        &self,
        input: &str,
        roles: &[Role],
        progress: &ProgressReporter,
    ) -> PipelineResult<Vec<TaskResult>> {
        let handle = self.pool.acquire()?;
        let (task_progress, progress_link) = progress.detachable();
        let input: Arc<str> = Arc::from(input);
        let deadline = Instant::now() + self.config.deadline;

        let mut pending = FuturesUnordered::new();
        for (index, role) in roles.iter().enumerate() {
            let label = role.display_name().to_string();
            progress.emit(ProgressEvent::Dispatched {
                role: label.clone(),
            });
            obs::emit_role_dispatched(role.id());
            METRICS.inc_roles_dispatched();

            let capability = role.capability().clone();
            let role_id = role.id().to_string();
            let input = input.clone();
            let progress = task_progress.clone();
            let join = handle.spawn(async move {
                progress.emit(ProgressEvent::Started {
                    role: label.clone(),
                });
                match capability.execute(&input).await {
                    Ok(text) => {
                        progress.emit(ProgressEvent::Succeeded { role: label });
                        TaskResult::completed(role_id, text)
                    }
                    Err(e) => {
                        progress.emit(ProgressEvent::Failed {
                            role: label,
                            error: e.to_string(),
                        });
                        TaskResult::failed(&role_id, &e)
                    }
                }
            });
            pending.push(async move { (index, join.await) });
        }

        let mut slots: Vec<Option<TaskResult>> = vec![None; roles.len()];
        loop {
            match timeout_at(deadline, pending.next()).await {
                Ok(Some((index, joined))) => {
                    let role_id = roles[index].id();
                    let result = match joined {
                        Ok(Ok(result)) => result,
                        Ok(Err(e)) => TaskResult::failed(role_id, &e),
                        Err(e) => TaskResult::failed(role_id, &e),
                    };
                    slots[index] = Some(result);
                }
                Ok(None) => break,
                Err(_) => {
                    obs::emit_deadline_elapsed(pending.len(), self.config.deadline);
                    break;
                }
            }
        }
        drop(pending);
        drop(progress_link);

        self.pool.release(handle)?;

        let results: Vec<TaskResult> = roles
            .iter()
            .zip(slots)
            .map(|(role, slot)| {
                slot.unwrap_or_else(|| TaskResult::timed_out(role.id(), self.config.deadline))
            })
            .collect();

        for result in &results {
            obs::emit_role_finished(&result.role_id, result.outcome.as_str());
            match result.outcome {
                TaskOutcome::Completed => {}
                TaskOutcome::Failed => METRICS.inc_roles_failed(),
                TaskOutcome::TimedOut => METRICS.inc_roles_timed_out(),
            }
        }
        Ok(results)
    }

    async fn synthesize(&self, input: &str, contributions: &[Contribution]) -> String {
        let outcome = match self.registry.synthesizer() {
            Some(synthesizer) => synthesizer.synthesize(input, contributions).await,
            None => Err(ConnectorError::MissingConnector),
        };
        METRICS.inc_syntheses();
        match outcome {
            Ok(text) => {
                obs::emit_synthesis_finished(contributions.len(), true);
                text
            }
            Err(e) => {
                warn!(error = %e, "synthesis failed");
                obs::emit_synthesis_finished(contributions.len(), false);
                connector_failure_text(&e)
            }
        }
    }
}
