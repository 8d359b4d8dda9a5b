//! Error types for worker pool lifecycle and submission.

use std::io;

use thiserror::Error;

use super::WorkerKind;

/// Errors raised while starting, feeding or stopping worker pools.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool for this kind of task is disabled.
    #[error("no {kind} workers are configured")]
    NoWorkersConfigured {
        /// Pool the task needed.
        kind: WorkerKind,
    },
    /// The pool has shut down.
    #[error("{kind} task queue is closed")]
    QueueClosed {
        /// Pool whose queue is closed.
        kind: WorkerKind,
    },
    /// The cooperative runtime could not be built.
    #[error("failed to build cooperative runtime: {source}")]
    Runtime {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A worker thread could not be spawned.
    #[error("failed to spawn {kind} worker thread: {source}")]
    Spawn {
        /// Pool the thread belonged to.
        kind: WorkerKind,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A worker thread panicked outside task isolation.
    #[error("{kind} worker thread panicked")]
    ThreadPanic {
        /// Pool the thread belonged to.
        kind: WorkerKind,
    },
}
