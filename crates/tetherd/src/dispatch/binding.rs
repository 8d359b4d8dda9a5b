//! Handler bindings and their access requirements.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::errors::HandlerError;
use super::outcome::HandlerOutcome;
use super::request::Request;

/// Result returned by every handler.
pub type HandlerResult = Result<HandlerOutcome, HandlerError>;

/// Code run when an envelope of a bound type arrives.
pub trait Handler: Send + Sync {
    /// Handles one envelope.
    fn handle(&self, request: &Request<'_>) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&Request<'_>) -> HandlerResult + Send + Sync,
{
    fn handle(&self, request: &Request<'_>) -> HandlerResult {
        self(request)
    }
}

/// Who may invoke a binding. Empty sets impose no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    requires_auth: Option<bool>,
    permissions: BTreeSet<String>,
    allow_groups: BTreeSet<String>,
    deny_groups: BTreeSet<String>,
}

impl AccessPolicy {
    /// Whether an identity is required. Unset requirements default to
    /// required until the dispatch table resolves them.
    pub fn requires_auth(&self) -> bool {
        self.requires_auth.unwrap_or(true)
    }

    /// Permissions the identity must hold.
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    /// Groups of which the identity must belong to at least one.
    pub fn allow_groups(&self) -> &BTreeSet<String> {
        &self.allow_groups
    }

    /// Groups the identity must not belong to.
    pub fn deny_groups(&self) -> &BTreeSet<String> {
        &self.deny_groups
    }

    /// Whether any clause applies at all.
    pub fn is_restricted(&self) -> bool {
        self.requires_auth()
            || !self.permissions.is_empty()
            || !self.allow_groups.is_empty()
            || !self.deny_groups.is_empty()
    }

    pub(crate) fn resolve_default(&mut self, default_auth_required: bool) {
        self.requires_auth.get_or_insert(default_auth_required);
    }
}

/// A handler bound to a message type together with its access policy.
#[derive(Clone)]
pub struct HandlerBinding {
    type_tag: String,
    policy: AccessPolicy,
    handler: Arc<dyn Handler>,
}

impl HandlerBinding {
    /// Binds `handler` to `type_tag`.
    pub fn new<H>(type_tag: impl Into<String>, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        Self {
            type_tag: type_tag.into(),
            policy: AccessPolicy::default(),
            handler: Arc::new(handler),
        }
    }

    /// Binds a closure to `type_tag`.
    pub fn from_fn<F>(type_tag: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Request<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        Self::new(type_tag, handler)
    }

    /// Overrides the table-wide authentication default.
    #[must_use]
    pub fn requires_auth(mut self, required: bool) -> Self {
        self.policy.requires_auth = Some(required);
        self
    }

    /// Requires every listed permission.
    #[must_use]
    pub fn permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy
            .permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    /// Requires membership of at least one listed group.
    #[must_use]
    pub fn allow_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy
            .allow_groups
            .extend(groups.into_iter().map(Into::into));
        self
    }

    /// Rejects members of any listed group.
    #[must_use]
    pub fn deny_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy
            .deny_groups
            .extend(groups.into_iter().map(Into::into));
        self
    }

    /// Message type this binding handles.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Access policy checked before the handler runs.
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub(crate) fn policy_mut(&mut self) -> &mut AccessPolicy {
        &mut self.policy
    }

    pub(crate) fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for HandlerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("type_tag", &self.type_tag)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// A type that declares a set of handler bindings.
///
/// Receivers are registered once when the dispatch table is built. Taking
/// `Arc<Self>` lets bindings capture shared receiver state.
pub trait Receiver: Send + Sync + 'static {
    /// Returns this receiver's bindings in registration order.
    fn bindings(self: Arc<Self>) -> Vec<HandlerBinding>;
}
