//! Deferred units of work.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;

use thiserror::Error;

use crate::dispatch::{HandlerError, TaskOutcome};

use super::WorkerKind;

/// Result produced by a task payload.
pub type TaskResult = Result<TaskOutcome, TaskError>;

/// Callback invoked with a task's outcome.
pub type ResultCallback = Box<dyn FnOnce(&TaskOutcome) + Send>;

pub(crate) type BlockingPayload = Box<dyn FnOnce() -> TaskResult + Send>;
pub(crate) type CooperativePayload = Pin<Box<dyn Future<Output = TaskResult> + Send>>;

/// Failure raised by a task payload.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The worker's backing resource became unusable. The worker restarts
    /// with a fresh resource and the task is not retried.
    #[error("backing resource fault: {message}")]
    ResourceFault {
        /// Description of the fault.
        message: String,
    },
    /// The payload failed.
    #[error(transparent)]
    Failed(#[from] HandlerError),
}

impl TaskError {
    /// Builds a resource fault.
    pub fn resource_fault(message: impl Into<String>) -> Self {
        Self::ResourceFault {
            message: message.into(),
        }
    }

    /// Builds a payload failure from a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(HandlerError::new(message))
    }
}

pub(crate) enum TaskPayload {
    Blocking(BlockingPayload),
    Cooperative(CooperativePayload),
}

/// Work a handler hands to a worker pool.
///
/// A task is queued once and run once. When it finishes, its result callback
/// runs first, followed by the acknowledgement bound by the invoker.
pub struct Task {
    payload: TaskPayload,
    on_result: Option<ResultCallback>,
    acknowledgement: Option<ResultCallback>,
}

impl Task {
    /// A task run on a blocking worker thread.
    pub fn blocking<F>(payload: F) -> Self
    where
        F: FnOnce() -> TaskResult + Send + 'static,
    {
        Self::with_payload(TaskPayload::Blocking(Box::new(payload)))
    }

    /// A task awaited on the cooperative runner.
    pub fn cooperative<Fut>(payload: Fut) -> Self
    where
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        Self::with_payload(TaskPayload::Cooperative(Box::pin(payload)))
    }

    fn with_payload(payload: TaskPayload) -> Self {
        Self {
            payload,
            on_result: None,
            acknowledgement: None,
        }
    }

    /// Sets a callback run with the task's outcome before any
    /// acknowledgement is sent.
    #[must_use]
    pub fn on_result<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&TaskOutcome) + Send + 'static,
    {
        self.on_result = Some(Box::new(callback));
        self
    }

    /// The pool this task runs on.
    pub fn kind(&self) -> WorkerKind {
        match self.payload {
            TaskPayload::Blocking(_) => WorkerKind::Blocking,
            TaskPayload::Cooperative(_) => WorkerKind::Cooperative,
        }
    }

    /// Whether an acknowledgement is bound to this task.
    pub fn wants_ack(&self) -> bool {
        self.acknowledgement.is_some()
    }

    pub(crate) fn acknowledge_with<F>(mut self, acknowledgement: F) -> Self
    where
        F: FnOnce(&TaskOutcome) + Send + 'static,
    {
        self.acknowledgement = Some(Box::new(acknowledgement));
        self
    }

    pub(crate) fn into_parts(self) -> (TaskPayload, Completion) {
        (
            self.payload,
            Completion {
                on_result: self.on_result,
                acknowledgement: self.acknowledgement,
            },
        )
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("kind", &self.kind())
            .field("wants_ack", &self.wants_ack())
            .finish_non_exhaustive()
    }
}

/// Completion callbacks detached from a task's payload. Each callback is
/// taken when it runs, so it runs at most once.
pub(crate) struct Completion {
    on_result: Option<ResultCallback>,
    acknowledgement: Option<ResultCallback>,
}

impl Completion {
    pub(crate) fn wants_ack(&self) -> bool {
        self.acknowledgement.is_some()
    }

    /// Runs the result callback, converting a panic into a failure.
    pub(crate) fn run_callback(&mut self, outcome: &TaskOutcome) -> Result<(), HandlerError> {
        isolated(self.on_result.take(), outcome)
    }

    /// Sends the bound acknowledgement, converting a panic into a failure.
    pub(crate) fn acknowledge(mut self, outcome: &TaskOutcome) -> Result<(), HandlerError> {
        isolated(self.acknowledgement.take(), outcome)
    }
}

fn isolated(callback: Option<ResultCallback>, outcome: &TaskOutcome) -> Result<(), HandlerError> {
    match callback {
        Some(callback) => panic::catch_unwind(AssertUnwindSafe(|| callback(outcome)))
            .map_err(HandlerError::panicked),
        None => Ok(()),
    }
}
