//! Per-connection credentials, identity and group membership.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::context::{CorrelationContext, ReplySink};
use crate::groups::{GroupMembership, PubSub};
use crate::identity::{Authenticator, Identity};
use crate::wire::OutboundMessage;

const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// Identifies one connection for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Hook notified whenever a session binds an identity.
pub trait SessionObserver: Send + Sync {
    /// Called after `identity` is bound to `session`.
    fn on_authenticated(&self, session: &Session, identity: &Identity);
}

#[derive(Debug, Default)]
struct Credentials {
    token: Option<String>,
    identity: Option<Identity>,
}

/// State shared by every envelope on one connection.
pub struct Session {
    id: ConnectionId,
    sink: Arc<dyn ReplySink>,
    authenticator: Arc<dyn Authenticator>,
    credentials: Mutex<Credentials>,
    groups: GroupMembership,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl Session {
    /// Opens an anonymous session.
    pub fn new(
        id: ConnectionId,
        sink: Arc<dyn ReplySink>,
        authenticator: Arc<dyn Authenticator>,
        pubsub: Arc<dyn PubSub>,
    ) -> Self {
        let groups = GroupMembership::new(id, pubsub, Arc::clone(&sink));
        Self {
            id,
            sink,
            authenticator,
            credentials: Mutex::new(Credentials::default()),
            groups,
            observer: None,
        }
    }

    /// Installs an authentication observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Option<Arc<dyn SessionObserver>>) -> Self {
        self.observer = observer;
        self
    }

    /// Connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Currently bound identity.
    pub fn identity(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    /// Currently bound access token.
    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    /// Binds an identity established by the transport, such as one resolved
    /// during the connection handshake.
    pub fn attach_identity(&self, identity: Identity) {
        self.lock().identity = Some(identity.clone());
        self.authenticated(&identity);
    }

    /// Whether `token` differs from the bound access token.
    pub fn is_new_token(&self, token: &str) -> bool {
        self.lock().token.as_deref() != Some(token)
    }

    /// Binds `token` and resolves it to an identity.
    ///
    /// On failure the identity is cleared and an uncorrelated
    /// `token-invalid` message is sent. Returns whether authentication
    /// succeeded.
    pub fn authenticate_with(&self, token: &str) -> bool {
        let identity = self.authenticator.authenticate(token);
        {
            let mut credentials = self.lock();
            credentials.token = Some(token.to_owned());
            credentials.identity = identity.clone();
        }
        match identity {
            Some(identity) => {
                self.authenticated(&identity);
                true
            }
            None => {
                warn!(target: SESSION_TARGET, connection = %self.id, "credential rejected");
                self.send(OutboundMessage::token_invalid());
                false
            }
        }
    }

    /// Exchanges `refresh_token` for a new token pair.
    ///
    /// On success the new access token is bound and authenticated, then a
    /// `login-token` message is sent. A missing or rejected refresh token
    /// sends `token-invalid`. Returns whether a new pair was issued.
    pub fn refresh_credentials(&self, refresh_token: Option<&str>) -> bool {
        let Some(tokens) = refresh_token.and_then(|token| self.authenticator.refresh(token))
        else {
            warn!(target: SESSION_TARGET, connection = %self.id, "refresh token rejected");
            self.send(OutboundMessage::token_invalid());
            return false;
        };
        self.authenticate_with(&tokens.access);
        self.send(OutboundMessage::login_token(&tokens));
        debug!(target: SESSION_TARGET, connection = %self.id, "issued refreshed tokens");
        true
    }

    /// Sends an uncorrelated message on this connection.
    pub fn send(&self, message: OutboundMessage) {
        self.sink.send_message(message);
    }

    /// A reply handle bound to `correlation_id`.
    pub fn context_for(&self, correlation_id: Option<&str>) -> CorrelationContext {
        CorrelationContext::new(correlation_id, Arc::clone(&self.sink))
    }

    /// Group membership of this connection.
    pub fn groups(&self) -> &GroupMembership {
        &self.groups
    }

    /// Releases connection-scoped state. Safe to call more than once.
    pub fn close(&self) {
        self.groups.leave_all();
    }

    fn authenticated(&self, identity: &Identity) {
        info!(
            target: SESSION_TARGET,
            connection = %self.id,
            subject = identity.subject(),
            "connection authenticated"
        );
        if let Some(observer) = &self.observer {
            observer.on_authenticated(self, identity);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Credentials> {
        self.credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("authenticated", &self.lock().identity.is_some())
            .finish_non_exhaustive()
    }
}
