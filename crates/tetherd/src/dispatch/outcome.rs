//! Normalized handler and task results.

use serde_json::{Map, Value};

use crate::workers::Task;

/// Error code used when authorization denies an invocation.
pub const UNAUTHORIZED_CODE: &str = "unauthorized";

/// Error code used when a deferred task has no pool to run on.
pub const NO_WORKERS_CODE: &str = "no-workers-configured";

/// Error reported to the client in an acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedError {
    message: String,
    code: Option<String>,
}

impl TypedError {
    /// Builds an error without a code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Attaches a machine-readable code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Machine-readable code.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Renders the `error_message` / `error_code` body of an ack.
    pub fn to_ack_body(&self) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("error_message".into(), Value::String(self.message.clone()));
        if let Some(code) = &self.code {
            body.insert("error_code".into(), Value::String(code.clone()));
        }
        body
    }
}

/// Final result of a handler or deferred task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// Completed without a value.
    NoResult,
    /// Completed with a value.
    Success(Value),
    /// Completed with an error for the client.
    Error(TypedError),
}

impl TaskOutcome {
    /// The error carried by this outcome, if any.
    pub fn error(&self) -> Option<&TypedError> {
        match self {
            Self::Error(error) => Some(error),
            Self::NoResult | Self::Success(_) => None,
        }
    }
}

impl From<TypedError> for TaskOutcome {
    fn from(error: TypedError) -> Self {
        Self::Error(error)
    }
}

/// What a handler returned.
#[derive(Debug)]
pub enum HandlerOutcome {
    /// Completed inline without a value.
    NoResult,
    /// Completed inline with a value.
    Success(Value),
    /// Completed inline with an error for the client.
    Error(TypedError),
    /// Work handed to a worker pool; the acknowledgement follows its completion.
    Deferred(Task),
}

impl From<TaskOutcome> for HandlerOutcome {
    fn from(outcome: TaskOutcome) -> Self {
        match outcome {
            TaskOutcome::NoResult => Self::NoResult,
            TaskOutcome::Success(value) => Self::Success(value),
            TaskOutcome::Error(error) => Self::Error(error),
        }
    }
}

impl From<TypedError> for HandlerOutcome {
    fn from(error: TypedError) -> Self {
        Self::Error(error)
    }
}

impl From<Task> for HandlerOutcome {
    fn from(task: Task) -> Self {
        Self::Deferred(task)
    }
}
