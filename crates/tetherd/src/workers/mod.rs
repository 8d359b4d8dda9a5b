//! Worker pools that run deferred handler work off the connection path.
//!
//! Two execution models are supported. The blocking pool runs a fixed number
//! of OS threads sharing one FIFO queue. The cooperative runner drives a
//! single-threaded async runtime that awaits one task at a time. Both loops
//! deliver each task's outcome exactly once, keep running after a task fails,
//! check their backing resource while idle, and restart themselves on a
//! resource fault.

mod blocking;
mod cooperative;
mod errors;
mod monitor;
mod stats;
mod task;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use tether_config::Config;

use crate::dispatch::{FailurePolicy, HandlerError, TaskOutcome};

use self::blocking::{BlockingJob, BlockingPool};
use self::cooperative::{CooperativeJob, CooperativeRunner};
use self::stats::PoolStats;
use self::task::{Completion, TaskPayload};

pub use self::errors::PoolError;
pub use self::monitor::{BackingResource, NoopResources, ResourceFactory};
pub use self::stats::PoolStatsSnapshot;
pub use self::task::{ResultCallback, Task, TaskError, TaskResult};

pub(crate) const WORKERS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::workers");

/// The two worker execution models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    /// OS threads that may block for the whole task.
    Blocking,
    /// A single async loop multiplexing suspendable tasks.
    Cooperative,
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Blocking => "blocking",
            Self::Cooperative => "cooperative",
        })
    }
}

/// Pool sizing and health check cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Blocking worker threads. Zero disables the blocking pool.
    pub blocking_workers: usize,
    /// Whether the cooperative runner is started.
    pub cooperative_enabled: bool,
    /// Idle interval between backing resource checks.
    pub health_check_interval: Duration,
}

impl WorkerPoolConfig {
    /// Derives pool settings from the daemon configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            blocking_workers: config.blocking_worker_count,
            cooperative_enabled: config.cooperative_worker_enabled,
            health_check_interval: config.health_check_interval(),
        }
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// State every worker loop of one pool shares.
#[derive(Clone)]
pub(crate) struct WorkerShared {
    pub(crate) kind: WorkerKind,
    pub(crate) policy: FailurePolicy,
    pub(crate) resources: Arc<dyn ResourceFactory>,
    pub(crate) interval: Duration,
    pub(crate) stats: Arc<PoolStats>,
}

/// What a worker loop does after a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settlement {
    Continue,
    Restart,
}

/// Applies the completion rules shared by both pools.
///
/// `result` is `Err` when the payload panicked. A panicking result callback
/// counts as a task failure.
pub(crate) fn settle(
    result: Result<TaskResult, HandlerError>,
    mut completion: Completion,
    shared: &WorkerShared,
) -> Settlement {
    let failure = match result {
        Ok(Ok(outcome)) => match completion.run_callback(&outcome) {
            Ok(()) => {
                shared.stats.record_completed();
                acknowledge(completion, &outcome, shared);
                return Settlement::Continue;
            }
            Err(failure) => failure,
        },
        Ok(Err(TaskError::ResourceFault { message })) => {
            shared.stats.record_lost();
            error!(
                target: WORKERS_TARGET,
                kind = %shared.kind,
                detail = %message,
                wanted_ack = completion.wants_ack(),
                "backing resource fault; in-flight task lost"
            );
            return Settlement::Restart;
        }
        Ok(Err(TaskError::Failed(failure))) | Err(failure) => failure,
    };

    shared.stats.record_failed();
    let forward = shared.policy.forward_exceptions() && completion.wants_ack();
    warn!(
        target: WORKERS_TARGET,
        kind = %shared.kind,
        error = %failure,
        forwarded = forward,
        "deferred task failed"
    );
    if forward {
        let outcome = TaskOutcome::Error(shared.policy.typed_task_error(&failure));
        if let Err(callback_failure) = completion.run_callback(&outcome) {
            warn!(
                target: WORKERS_TARGET,
                kind = %shared.kind,
                error = %callback_failure,
                "result callback failed on a forwarded error"
            );
        }
        acknowledge(completion, &outcome, shared);
    }
    Settlement::Continue
}

fn acknowledge(completion: Completion, outcome: &TaskOutcome, shared: &WorkerShared) {
    if let Err(failure) = completion.acknowledge(outcome) {
        error!(
            target: WORKERS_TARGET,
            kind = %shared.kind,
            error = %failure,
            "acknowledgement panicked"
        );
    }
}

/// The blocking pool and cooperative runner, either of which may be
/// disabled.
pub struct WorkerPools {
    blocking: Option<BlockingPool>,
    cooperative: Option<CooperativeRunner>,
}

impl WorkerPools {
    /// Starts the pools described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError`] when a thread or the cooperative runtime cannot
    /// be created. Pools started before the failure are stopped.
    pub fn start(
        config: &WorkerPoolConfig,
        policy: FailurePolicy,
        resources: Arc<dyn ResourceFactory>,
    ) -> Result<Self, PoolError> {
        let shared = |kind| WorkerShared {
            kind,
            policy: policy.clone(),
            resources: Arc::clone(&resources),
            interval: config.health_check_interval,
            stats: Arc::new(PoolStats::default()),
        };

        let mut pools = Self::disabled();
        if config.blocking_workers > 0 {
            pools.blocking = Some(BlockingPool::start(
                config.blocking_workers,
                shared(WorkerKind::Blocking),
            )?);
        }
        if config.cooperative_enabled {
            pools.cooperative = Some(CooperativeRunner::start(shared(WorkerKind::Cooperative))?);
        }

        info!(
            target: WORKERS_TARGET,
            blocking_workers = config.blocking_workers,
            cooperative = config.cooperative_enabled,
            interval_ms = config.health_check_interval.as_millis(),
            "worker pools started"
        );
        Ok(pools)
    }

    /// Pools with no workers. Every submission fails fast.
    pub fn disabled() -> Self {
        Self {
            blocking: None,
            cooperative: None,
        }
    }

    /// Queues `task` on the pool matching its kind. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoWorkersConfigured`] when that pool is disabled
    /// and [`PoolError::QueueClosed`] after shutdown. The task is dropped
    /// without running either way.
    pub fn submit(&self, task: Task) -> Result<(), PoolError> {
        let kind = task.kind();
        let (payload, completion) = task.into_parts();
        match payload {
            TaskPayload::Blocking(run) => self
                .blocking
                .as_ref()
                .ok_or(PoolError::NoWorkersConfigured { kind })?
                .submit(BlockingJob { run, completion }),
            TaskPayload::Cooperative(future) => self
                .cooperative
                .as_ref()
                .ok_or(PoolError::NoWorkersConfigured { kind })?
                .submit(CooperativeJob { future, completion }),
        }
    }

    /// Whether the pool for `kind` is running.
    pub fn is_enabled(&self, kind: WorkerKind) -> bool {
        match kind {
            WorkerKind::Blocking => self.blocking.is_some(),
            WorkerKind::Cooperative => self.cooperative.is_some(),
        }
    }

    /// Counters for the pool of `kind`, if it is enabled.
    pub fn stats(&self, kind: WorkerKind) -> Option<PoolStatsSnapshot> {
        match kind {
            WorkerKind::Blocking => self.blocking.as_ref().map(BlockingPool::stats),
            WorkerKind::Cooperative => self.cooperative.as_ref().map(CooperativeRunner::stats),
        }
    }

    /// Closes both queues and waits for queued tasks to drain.
    ///
    /// # Errors
    ///
    /// Returns the first [`PoolError::ThreadPanic`] observed.
    pub fn shutdown(&self) -> Result<(), PoolError> {
        let blocking = self.blocking.as_ref().map_or(Ok(()), BlockingPool::shutdown);
        let cooperative = self
            .cooperative
            .as_ref()
            .map_or(Ok(()), CooperativeRunner::shutdown);
        blocking.and(cooperative)
    }
}

impl fmt::Debug for WorkerPools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPools")
            .field("blocking", &self.is_enabled(WorkerKind::Blocking))
            .field("cooperative", &self.is_enabled(WorkerKind::Cooperative))
            .finish()
    }
}

impl Drop for WorkerPools {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            warn!(target: WORKERS_TARGET, %error, "worker pool shutdown failed");
        }
    }
}
