//! Per-request reply routing.

use std::fmt;
use std::sync::Arc;

use crate::dispatch::TaskOutcome;
use crate::wire::OutboundMessage;

/// Destination for outbound messages on one connection.
pub trait ReplySink: Send + Sync {
    /// Queues `message` for delivery. Delivery failures are the sink's
    /// concern and must not panic.
    fn send_message(&self, message: OutboundMessage);
}

/// Reply handle bound to the correlation id of a single envelope.
///
/// The handle is cheap to clone and is meant to be moved into deferred
/// tasks. Every message sent through it carries the bound correlation id and
/// only that id, whatever the connection has processed since.
#[derive(Clone)]
pub struct CorrelationContext {
    correlation_id: Option<Arc<str>>,
    sink: Arc<dyn ReplySink>,
}

impl CorrelationContext {
    /// Binds `sink` to `correlation_id`.
    pub fn new(correlation_id: Option<&str>, sink: Arc<dyn ReplySink>) -> Self {
        Self {
            correlation_id: correlation_id.map(Arc::from),
            sink,
        }
    }

    /// The bound correlation id.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Sends `message`, overwriting any correlation id it carries.
    pub fn reply(&self, message: OutboundMessage) {
        let stamped = message.with_correlation_id(self.correlation_id.as_deref().map(str::to_owned));
        self.sink.send_message(stamped);
    }

    /// Sends the acknowledgement for `outcome`.
    pub fn acknowledge(&self, outcome: &TaskOutcome) {
        self.reply(OutboundMessage::ack(outcome.error()));
    }
}

impl fmt::Debug for CorrelationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationContext")
            .field("correlation_id", &self.correlation_id)
            .finish_non_exhaustive()
    }
}
