//! Error types for authorization, handler execution and dispatch.

use std::any::Any;
use std::error::Error as StdError;

use thiserror::Error;

use crate::wire::CodecError;
use crate::workers::{PoolError, WorkerKind};

use super::outcome::{NO_WORKERS_CODE, UNAUTHORIZED_CODE};

/// The authorization clause that rejected an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    /// The binding is restricted and the connection has no identity.
    #[error("authentication required")]
    Anonymous,
    /// The identity lacks required permissions.
    #[error("missing permissions: {}", .missing.join(", "))]
    MissingPermissions {
        /// Permissions the identity does not hold, in name order.
        missing: Vec<String>,
    },
    /// The identity belongs to none of the allowed groups.
    #[error("not a member of any allowed group")]
    NotInAllowedGroup,
    /// The identity belongs to a denied group.
    #[error("member of denied group '{group}'")]
    InDeniedGroup {
        /// First denied group the identity belongs to.
        group: String,
    },
}

/// Failure raised by a handler body or task payload.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl HandlerError {
    /// Builds an error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps another error, using its display text as the message.
    pub fn from_error<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    /// Converts a caught panic payload.
    pub fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|text| (*text).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "opaque panic payload".to_owned());
        Self::new(format!("handler panicked: {detail}"))
    }

    /// Message shown to clients when failures are forwarded.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(error: serde_json::Error) -> Self {
        Self::from_error(error)
    }
}

/// Errors surfaced while dispatching one envelope to one binding.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The frame could not be decoded.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] CodecError),

    /// Authorization rejected the invocation before the handler ran.
    #[error("unauthorized call to '{type_tag}': {denial}")]
    Unauthorized {
        /// Message type of the rejected envelope.
        type_tag: String,
        /// Clause that failed.
        #[source]
        denial: Denial,
    },

    /// A deferred task targeted a disabled pool.
    #[error("no {kind} workers are configured")]
    NoWorkersConfigured {
        /// Pool the task needed.
        kind: WorkerKind,
    },

    /// The handler body failed or panicked.
    #[error("handler for '{type_tag}' failed: {source}")]
    HandlerFailure {
        /// Message type of the failing envelope.
        type_tag: String,
        /// Failure raised by the handler.
        #[source]
        source: HandlerError,
    },

    /// A deferred task could not be queued.
    #[error("failed to submit deferred task: {0}")]
    Submission(#[source] PoolError),
}

impl DispatchError {
    /// Stable code sent to clients for framework-originated failures.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Unauthorized { .. } => Some(UNAUTHORIZED_CODE),
            Self::NoWorkersConfigured { .. } => Some(NO_WORKERS_CODE),
            Self::MalformedFrame(_) | Self::HandlerFailure { .. } | Self::Submission(_) => None,
        }
    }

    /// The error handed to the exception formatter. Handler failures expose
    /// the handler's own error; everything else is reported as itself.
    pub fn client_error(&self) -> &(dyn StdError + 'static) {
        match self {
            Self::HandlerFailure { source, .. } => source as &(dyn StdError + 'static),
            _ => self as &(dyn StdError + 'static),
        }
    }
}

impl From<PoolError> for DispatchError {
    fn from(error: PoolError) -> Self {
        match error {
            PoolError::NoWorkersConfigured { kind } => Self::NoWorkersConfigured { kind },
            other => Self::Submission(other),
        }
    }
}
