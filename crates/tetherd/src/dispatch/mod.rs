//! Envelope dispatch: bindings, authorization and invocation.
//!
//! A [`DispatchTable`] maps each message type to the bindings registered for
//! it. For every binding the [`Invoker`] checks the [`AccessPolicy`], runs the
//! handler with failures isolated, and acknowledges the outcome when the
//! client asked for it. Handlers that return [`HandlerOutcome::Deferred`]
//! hand a task to the worker pools; the acknowledgement then follows the
//! task's completion instead.

mod binding;
mod errors;
mod gate;
mod invoker;
mod outcome;
mod policy;
mod request;
mod table;

pub use self::binding::{AccessPolicy, Handler, HandlerBinding, HandlerResult, Receiver};
pub use self::errors::{Denial, DispatchError, HandlerError};
pub use self::gate::authorize;
pub use self::invoker::{InvocationState, Invoker};
pub use self::outcome::{
    HandlerOutcome, NO_WORKERS_CODE, TaskOutcome, TypedError, UNAUTHORIZED_CODE,
};
pub use self::policy::{ExceptionFormatter, FailurePolicy};
pub use self::request::Request;
pub use self::table::{DispatchTable, DispatchTableBuilder};

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
