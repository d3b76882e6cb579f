//! Bounded worker pool with an explicit lifecycle.
//!
//! ```text
//! Idle --acquire--> Active --release--> Idle      (nothing queued: shut down)
//!                          \-release--> Draining  (tasks still queued: kept)
//! Draining --acquire--> Active (same pool reused)
//! ```
//!
//! The lock guards lifecycle transitions only. Task bodies run outside it,
//! bounded by the pool's semaphore.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::obs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// No workers exist.
    Idle,
    /// At least one request holds the pool.
    Active,
    /// No request holds the pool but submitted tasks are still waiting.
    Draining,
}

impl PoolState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolState::Idle => "idle",
            PoolState::Active => "active",
            PoolState::Draining => "draining",
        }
    }
}

/// The state a pool moves to given its outstanding leases and queued tasks.
pub fn next_state(leases: usize, queued: usize) -> PoolState {
    if leases > 0 {
        PoolState::Active
    } else if queued > 0 {
        PoolState::Draining
    } else {
        PoolState::Idle
    }
}

#[derive(Debug)]
struct PoolSlot {
    state: PoolState,
    permits: Option<Arc<Semaphore>>,
    queued: Arc<AtomicUsize>,
    leases: usize,
    generation: u64,
}

#[derive(Debug)]
pub struct WorkerPool {
    max_workers: usize,
    slot: Mutex<PoolSlot>,
}

impl WorkerPool {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            slot: Mutex::new(PoolSlot {
                state: PoolState::Idle,
                permits: None,
                queued: Arc::new(AtomicUsize::new(0)),
                leases: 0,
                generation: 0,
            }),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    fn lock(&self) -> PipelineResult<MutexGuard<'_, PoolSlot>> {
        self.slot
            .lock()
            .map_err(|_| PipelineError::PoolUnavailable("pool lock poisoned".to_string()))
    }

    /// Take a lease on the pool, creating it if it is idle.
    pub fn acquire(&self) -> PipelineResult<PoolHandle> {
        if self.max_workers == 0 {
            return Err(PipelineError::PoolUnavailable(
                "worker budget must be at least 1".to_string(),
            ));
        }

        let mut slot = self.lock()?;
        let permits = match slot.permits.clone() {
            Some(permits) => permits,
            None => {
                let permits = Arc::new(Semaphore::new(self.max_workers));
                slot.permits = Some(permits.clone());
                slot.queued = Arc::new(AtomicUsize::new(0));
                slot.generation += 1;
                debug!(
                    generation = slot.generation,
                    workers = self.max_workers,
                    "worker pool created"
                );
                permits
            }
        };
        slot.leases += 1;
        transition(&mut slot, PoolState::Active);

        Ok(PoolHandle {
            permits,
            queued: slot.queued.clone(),
            generation: slot.generation,
        })
    }

    /// Return a lease and apply the drain check.
    ///
    /// The pool shuts down when no lease remains and nothing is queued;
    /// otherwise it stays available for the next request.
    pub fn release(&self, handle: PoolHandle) -> PipelineResult<PoolState> {
        let mut slot = self.lock()?;
        if handle.generation != slot.generation {
            return Ok(slot.state);
        }
        slot.leases = slot.leases.saturating_sub(1);
        let next = next_state(slot.leases, slot.queued.load(Ordering::SeqCst));
        if next == PoolState::Idle {
            close(&mut slot);
        }
        transition(&mut slot, next);
        Ok(next)
    }

    /// Close the pool whatever its state. Idempotent.
    ///
    /// Running tasks finish; tasks still waiting for a worker fail.
    pub fn shutdown(&self) -> PipelineResult<()> {
        let mut slot = self.lock()?;
        close(&mut slot);
        slot.leases = 0;
        transition(&mut slot, PoolState::Idle);
        Ok(())
    }

    pub fn state(&self) -> PoolState {
        match self.slot.lock() {
            Ok(slot) => slot.state,
            Err(poisoned) => poisoned.into_inner().state,
        }
    }

    /// How many times the pool has been created.
    pub fn generation(&self) -> u64 {
        match self.slot.lock() {
            Ok(slot) => slot.generation,
            Err(poisoned) => poisoned.into_inner().generation,
        }
    }
}

fn close(slot: &mut PoolSlot) {
    if let Some(permits) = slot.permits.take() {
        permits.close();
    }
}

fn transition(slot: &mut PoolSlot, next: PoolState) {
    if slot.state != next {
        obs::emit_pool_transition(slot.state.as_str(), next.as_str(), slot.generation);
        slot.state = next;
    }
}

/// A lease on one pool generation.
#[derive(Debug)]
pub struct PoolHandle {
    permits: Arc<Semaphore>,
    queued: Arc<AtomicUsize>,
    generation: u64,
}

impl PoolHandle {
    /// Run `task` once a worker is free.
    ///
    /// The task counts as queued until it gets a worker. If the pool is shut
    /// down first, the task never runs and resolves to `PoolUnavailable`.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<PipelineResult<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = self.permits.clone();
        let queued = self.queued.clone();
        queued.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let permit = permits.acquire_owned().await;
            queued.fetch_sub(1, Ordering::SeqCst);
            let _permit = permit
                .map_err(|_| PipelineError::PoolUnavailable("worker pool shut down".to_string()))?;
            Ok::<_, PipelineError>(task.await)
        })
    }

    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
