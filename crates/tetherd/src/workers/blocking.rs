//! Fixed-size pool of blocking worker threads.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::dispatch::HandlerError;

use super::monitor::HealthMonitor;
use super::stats::PoolStatsSnapshot;
use super::task::{BlockingPayload, Completion};
use super::{PoolError, Settlement, WORKERS_TARGET, WorkerShared, settle};

pub(crate) struct BlockingJob {
    pub(crate) run: BlockingPayload,
    pub(crate) completion: Completion,
}

enum LoopExit {
    Closed,
    Restart,
}

pub(crate) struct BlockingPool {
    sender: Mutex<Option<Sender<BlockingJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shared: WorkerShared,
}

impl BlockingPool {
    pub(crate) fn start(count: usize, shared: WorkerShared) -> Result<Self, PoolError> {
        let (sender, receiver) = channel::unbounded();
        let pool = Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(Vec::with_capacity(count)),
            shared,
        };
        for index in 0..count {
            let receiver = receiver.clone();
            let shared = pool.shared.clone();
            let handle = thread::Builder::new()
                .name(format!("tether-blocking-{index}"))
                .spawn(move || run_worker(index, &receiver, &shared))
                .map_err(|source| PoolError::Spawn {
                    kind: pool.shared.kind,
                    source,
                })?;
            lock(&pool.workers).push(handle);
        }
        Ok(pool)
    }

    pub(crate) fn submit(&self, job: BlockingJob) -> Result<(), PoolError> {
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
        let workers = std::mem::take(&mut *lock(&self.workers));
        let current = thread::current().id();
        let mut result = Ok(());
        for handle in workers {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                result = Err(PoolError::ThreadPanic {
                    kind: self.shared.kind,
                });
            }
        }
        result
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn run_worker(index: usize, receiver: &Receiver<BlockingJob>, shared: &WorkerShared) {
    debug!(target: WORKERS_TARGET, worker = index, "blocking worker started");
    loop {
        let mut monitor = HealthMonitor::new(
            shared.interval,
            Arc::clone(&shared.resources),
            Arc::clone(&shared.stats),
        );
        match run_until_fault(receiver, &mut monitor, shared) {
            LoopExit::Closed => break,
            LoopExit::Restart => {
                shared.stats.record_restart();
                warn!(target: WORKERS_TARGET, worker = index, "restarting blocking worker");
            }
        }
    }
    debug!(target: WORKERS_TARGET, worker = index, "blocking worker stopped");
}

fn run_until_fault(
    receiver: &Receiver<BlockingJob>,
    monitor: &mut HealthMonitor,
    shared: &WorkerShared,
) -> LoopExit {
    loop {
        match receiver.recv_timeout(monitor.interval()) {
            Ok(job) => {
                monitor.tick();
                let BlockingJob { run, completion } = job;
                let result = panic::catch_unwind(AssertUnwindSafe(run))
                    .map_err(HandlerError::panicked);
                if settle(result, completion, shared) == Settlement::Restart {
                    return LoopExit::Restart;
                }
            }
            Err(RecvTimeoutError::Timeout) => monitor.tick(),
            Err(RecvTimeoutError::Disconnected) => return LoopExit::Closed,
        }
    }
}
