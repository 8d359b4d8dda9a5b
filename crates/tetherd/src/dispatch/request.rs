//! The per-invocation view handed to handlers.

use std::sync::Arc;

use crate::context::CorrelationContext;
use crate::identity::Identity;
use crate::session::Session;
use crate::wire::Envelope;

/// One envelope as seen by one handler.
pub struct Request<'a> {
    envelope: &'a Envelope,
    identity: Option<Identity>,
    context: CorrelationContext,
    session: &'a Arc<Session>,
}

impl<'a> Request<'a> {
    /// Builds a request for `envelope` on `session`.
    pub fn new(envelope: &'a Envelope, session: &'a Arc<Session>) -> Self {
        Self {
            envelope,
            identity: session.identity(),
            context: session.context_for(envelope.correlation_id()),
            session,
        }
    }

    /// The decoded envelope.
    pub fn envelope(&self) -> &'a Envelope {
        self.envelope
    }

    /// Identity bound to the connection when dispatch began.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Reply handle bound to this envelope's correlation id. Clone it into
    /// deferred tasks that need to reply.
    pub fn context(&self) -> &CorrelationContext {
        &self.context
    }

    /// The connection's session.
    pub fn session(&self) -> &'a Arc<Session> {
        self.session
    }
}
