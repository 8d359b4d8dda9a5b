//! Failure forwarding policy shared by the invoker and the worker pools.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use super::errors::{DispatchError, HandlerError};
use super::outcome::TypedError;

/// Renders an error as the message sent to clients.
pub type ExceptionFormatter = Arc<dyn Fn(&dyn StdError) -> String + Send + Sync>;

/// Decides whether failures are acknowledged to clients and how they read.
#[derive(Clone)]
pub struct FailurePolicy {
    forward_exceptions: bool,
    formatter: ExceptionFormatter,
}

impl FailurePolicy {
    /// Builds a policy using each error's `Display` text.
    pub fn new(forward_exceptions: bool) -> Self {
        Self {
            forward_exceptions,
            formatter: Arc::new(|error: &dyn StdError| error.to_string()),
        }
    }

    /// Replaces the formatter.
    #[must_use]
    pub fn with_formatter(mut self, formatter: ExceptionFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Whether failures are sent to clients that asked for an ack.
    pub fn forward_exceptions(&self) -> bool {
        self.forward_exceptions
    }

    /// Converts a dispatch failure into the error sent to the client.
    pub fn typed_error(&self, error: &DispatchError) -> TypedError {
        let typed = TypedError::new((self.formatter)(error.client_error()));
        match error.code() {
            Some(code) => typed.with_code(code),
            None => typed,
        }
    }

    /// Converts a task failure into the error sent to the client.
    pub fn typed_task_error(&self, error: &HandlerError) -> TypedError {
        TypedError::new((self.formatter)(error))
    }
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::new(false)
    }
}

impl fmt::Debug for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailurePolicy")
            .field("forward_exceptions", &self.forward_exceptions)
            .finish_non_exhaustive()
    }
}
