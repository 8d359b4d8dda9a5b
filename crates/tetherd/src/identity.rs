//! Identities and the authentication capability.

use std::collections::BTreeSet;

/// The principal a connection is acting as.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    subject: String,
    privileged: bool,
    permissions: BTreeSet<String>,
    groups: BTreeSet<String>,
}

impl Identity {
    /// Builds an unprivileged identity without permissions or groups.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    /// Marks the identity as privileged. Privileged identities bypass every
    /// permission and group check.
    #[must_use]
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    /// Adds permissions.
    #[must_use]
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    /// Adds group memberships.
    #[must_use]
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Subject name, such as a username.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Whether this identity bypasses authorization checks.
    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    /// Whether the identity holds `permission`.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Whether the identity belongs to `group`.
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

/// Access and refresh credentials issued together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// Credential presented in `authHeader`.
    pub access: String,
    /// Credential exchanged for a new pair via `refresh-token`.
    pub refresh: String,
}

/// Turns credentials into identities.
#[cfg_attr(test, mockall::automock)]
pub trait Authenticator: Send + Sync {
    /// Resolves an access token. `None` means the token is not valid.
    fn authenticate(&self, token: &str) -> Option<Identity>;

    /// Exchanges a refresh token for a new token pair.
    ///
    /// Authenticators without refresh support keep the default, which
    /// rejects every refresh token.
    fn refresh(&self, refresh_token: &str) -> Option<TokenPair> {
        let _ = refresh_token;
        None
    }
}

/// Authenticator that accepts no credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousAuthenticator;

impl Authenticator for AnonymousAuthenticator {
    fn authenticate(&self, _token: &str) -> Option<Identity> {
        None
    }
}
