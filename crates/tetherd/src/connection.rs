//! Per-connection orchestration: credentials, lookup and invocation.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::ReplySink;
use crate::dispatch::{DispatchError, DispatchTable, InvocationState, Invoker, Request};
use crate::groups::{LocalPubSub, PubSub};
use crate::identity::{AnonymousAuthenticator, Authenticator, Identity};
use crate::session::{ConnectionId, Session, SessionObserver};
use crate::wire::{Envelope, message_types};

const CONNECTION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::connection");

/// Collaborators shared by every connection.
#[derive(Clone)]
pub struct ConnectionServices {
    table: Arc<DispatchTable>,
    invoker: Arc<Invoker>,
    authenticator: Arc<dyn Authenticator>,
    pubsub: Arc<dyn PubSub>,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl ConnectionServices {
    /// Services with no authenticator and an in-process pub-sub hub.
    pub fn new(table: Arc<DispatchTable>, invoker: Arc<Invoker>) -> Self {
        Self {
            table,
            invoker,
            authenticator: Arc::new(AnonymousAuthenticator),
            pubsub: Arc::new(LocalPubSub::new()),
            observer: None,
        }
    }

    /// Replaces the authenticator.
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Replaces the pub-sub collaborator.
    #[must_use]
    pub fn with_pubsub(mut self, pubsub: Arc<dyn PubSub>) -> Self {
        self.pubsub = pubsub;
        self
    }

    /// Installs an authentication observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The shared dispatch table.
    pub fn table(&self) -> &Arc<DispatchTable> {
        &self.table
    }
}

impl fmt::Debug for ConnectionServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionServices")
            .field("bindings", &self.table.len())
            .field("invoker", &self.invoker)
            .finish_non_exhaustive()
    }
}

/// Results of dispatching one envelope, one entry per binding.
#[derive(Debug)]
pub struct DispatchReport {
    /// Message type of the envelope.
    pub type_tag: String,
    /// Outcome of each binding in registration order.
    pub results: Vec<Result<InvocationState, DispatchError>>,
}

impl DispatchReport {
    /// Whether no binding was registered for the message type.
    pub fn is_unhandled(&self) -> bool {
        self.results.is_empty()
    }

    /// Failures that were not forwarded to the client.
    pub fn failures(&self) -> impl Iterator<Item = &DispatchError> {
        self.results.iter().filter_map(|result| result.as_ref().err())
    }
}

/// Dispatches envelopes arriving on one connection, in arrival order.
pub struct ConnectionDispatcher {
    session: Arc<Session>,
    table: Arc<DispatchTable>,
    invoker: Arc<Invoker>,
}

impl ConnectionDispatcher {
    /// Opens an anonymous connection replying through `sink`.
    pub fn open(id: ConnectionId, sink: Arc<dyn ReplySink>, services: &ConnectionServices) -> Self {
        let session = Session::new(
            id,
            sink,
            Arc::clone(&services.authenticator),
            Arc::clone(&services.pubsub),
        )
        .with_observer(services.observer.clone());
        debug!(target: CONNECTION_TARGET, connection = %id, "connection opened");
        Self {
            session: Arc::new(session),
            table: Arc::clone(&services.table),
            invoker: Arc::clone(&services.invoker),
        }
    }

    /// Opens a connection already authenticated as `identity`.
    pub fn open_authenticated(
        id: ConnectionId,
        sink: Arc<dyn ReplySink>,
        services: &ConnectionServices,
        identity: Identity,
    ) -> Self {
        let dispatcher = Self::open(id, sink, services);
        dispatcher.session.attach_identity(identity);
        dispatcher
    }

    /// The connection's session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Decodes and dispatches one raw frame.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MalformedFrame`] when the frame cannot be
    /// decoded. Per-binding failures are reported in the returned
    /// [`DispatchReport`].
    pub fn handle_frame(&self, frame: &[u8]) -> Result<DispatchReport, DispatchError> {
        let envelope = Envelope::decode(frame).map_err(|error| {
            warn!(
                target: CONNECTION_TARGET,
                connection = %self.session.id(),
                %error,
                "dropping malformed frame"
            );
            DispatchError::from(error)
        })?;
        Ok(self.dispatch(&envelope))
    }

    /// Dispatches a decoded envelope to every binding for its type.
    ///
    /// A new `authHeader` is authenticated first and `refresh-token`
    /// envelopes run the refresh exchange. Each binding is then invoked
    /// independently, so one failure never prevents the others from running.
    pub fn dispatch(&self, envelope: &Envelope) -> DispatchReport {
        if let Some(token) = envelope.headers().auth_token.as_deref()
            && self.session.is_new_token(token)
        {
            self.session.authenticate_with(token);
        }
        let is_refresh = envelope.type_tag() == message_types::REFRESH_TOKEN;
        if is_refresh {
            self.session
                .refresh_credentials(envelope.body_str("refresh_token"));
        }

        let bindings = self.table.lookup(envelope.type_tag());
        if bindings.is_empty() && !is_refresh {
            warn!(
                target: CONNECTION_TARGET,
                connection = %self.session.id(),
                type_tag = envelope.type_tag(),
                "no handlers registered for message type"
            );
        }

        let results = bindings
            .iter()
            .map(|binding| {
                let request = Request::new(envelope, &self.session);
                self.invoker.invoke(binding, &request)
            })
            .collect();
        DispatchReport {
            type_tag: envelope.type_tag().to_owned(),
            results,
        }
    }

    /// Releases connection-scoped state such as group membership.
    pub fn close(&self) {
        self.session.close();
        debug!(target: CONNECTION_TARGET, connection = %self.session.id(), "connection closed");
    }
}

impl Drop for ConnectionDispatcher {
    fn drop(&mut self) {
        self.session.close();
    }
}
