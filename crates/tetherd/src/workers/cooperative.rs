//! Single-loop runner for suspendable tasks.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tokio::runtime::Builder;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::dispatch::HandlerError;

use super::monitor::HealthMonitor;
use super::stats::PoolStatsSnapshot;
use super::task::{Completion, CooperativePayload};
use super::{PoolError, Settlement, WORKERS_TARGET, WorkerShared, settle};

pub(crate) struct CooperativeJob {
    pub(crate) future: CooperativePayload,
    pub(crate) completion: Completion,
}

enum LoopExit {
    Closed,
    Restart,
}

/// A current-thread tokio runtime on a dedicated thread.
pub(crate) struct CooperativeRunner {
    sender: Mutex<Option<UnboundedSender<CooperativeJob>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    shared: WorkerShared,
}

impl CooperativeRunner {
    pub(crate) fn start(shared: WorkerShared) -> Result<Self, PoolError> {
        let runtime = Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|source| PoolError::Runtime { source })?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let loop_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("tether-cooperative".into())
            .spawn(move || runtime.block_on(run_loop(receiver, loop_shared)))
            .map_err(|source| PoolError::Spawn {
                kind: shared.kind,
                source,
            })?;
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            thread: Mutex::new(Some(handle)),
            shared,
        })
    }

    pub(crate) fn submit(&self, job: CooperativeJob) -> Result<(), PoolError> {
        let kind = self.shared.kind;
        lock(&self.sender)
            .as_ref()
            .ok_or(PoolError::QueueClosed { kind })?
            .send(job)
            .map_err(|_| PoolError::QueueClosed { kind })
    }

    pub(crate) fn stats(&self) -> PoolStatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub(crate) fn shutdown(&self) -> Result<(), PoolError> {
        drop(lock(&self.sender).take());
        let Some(handle) = lock(&self.thread).take() else {
            return Ok(());
        };
        if handle.thread().id() == thread::current().id() {
            return Ok(());
        }
        handle.join().map_err(|_| PoolError::ThreadPanic {
            kind: self.shared.kind,
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_loop(mut receiver: UnboundedReceiver<CooperativeJob>, shared: WorkerShared) {
    debug!(target: WORKERS_TARGET, "cooperative runner started");
    loop {
        let mut monitor = HealthMonitor::new(
            shared.interval,
            Arc::clone(&shared.resources),
            Arc::clone(&shared.stats),
        );
        match run_until_fault(&mut receiver, &mut monitor, &shared).await {
            LoopExit::Closed => break,
            LoopExit::Restart => {
                shared.stats.record_restart();
                warn!(target: WORKERS_TARGET, "restarting cooperative runner loop");
            }
        }
    }
    debug!(target: WORKERS_TARGET, "cooperative runner stopped");
}

async fn run_until_fault(
    receiver: &mut UnboundedReceiver<CooperativeJob>,
    monitor: &mut HealthMonitor,
    shared: &WorkerShared,
) -> LoopExit {
    loop {
        match tokio::time::timeout(monitor.interval(), receiver.recv()).await {
            Ok(Some(job)) => {
                monitor.tick();
                let CooperativeJob { future, completion } = job;
                let result = tokio::spawn(future).await.map_err(|error| {
                    if error.is_panic() {
                        HandlerError::panicked(error.into_panic())
                    } else {
                        HandlerError::new("cooperative task was cancelled")
                    }
                });
                if settle(result, completion, shared) == Settlement::Restart {
                    return LoopExit::Restart;
                }
            }
            Ok(None) => return LoopExit::Closed,
            Err(_elapsed) => monitor.tick(),
        }
    }
}
