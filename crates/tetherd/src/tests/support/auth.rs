//! Authenticator double backed by a fixed token table.

use crate::identity::{Authenticator, Identity, TokenPair};

/// Access token bound to an ordinary identity.
pub const USER_TOKEN: &str = "user-token";
/// Access token bound to a privileged identity.
pub const ADMIN_TOKEN: &str = "admin-token";
/// Refresh token exchanged for [`USER_TOKEN`].
pub const REFRESH_TOKEN: &str = "refresh-1";

/// Resolves the fixed tokens above; everything else is rejected.
#[derive(Debug, Default)]
pub struct StaticTokenAuthenticator;

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, token: &str) -> Option<Identity> {
        match token {
            USER_TOKEN => Some(Identity::new("user").with_groups(["staff"])),
            ADMIN_TOKEN => Some(Identity::new("admin").privileged()),
            _ => None,
        }
    }

    fn refresh(&self, refresh_token: &str) -> Option<TokenPair> {
        (refresh_token == REFRESH_TOKEN).then(|| TokenPair {
            access: USER_TOKEN.to_owned(),
            refresh: "refresh-2".to_owned(),
        })
    }
}
