//! Connection-scoped group membership and broadcast fan-out.
//!
//! The pub-sub transport itself is a collaborator behind [`PubSub`]; this
//! module only tracks which groups a connection has joined so membership can
//! be released when the connection goes away. [`LocalPubSub`] is an
//! in-process hub suitable for a single daemon.

mod local;

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::context::ReplySink;
use crate::session::ConnectionId;
use crate::wire::OutboundMessage;

pub use self::local::LocalPubSub;

pub(crate) const GROUPS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::groups");

/// Fan-out capability used for group broadcasts.
#[cfg_attr(test, mockall::automock)]
pub trait PubSub: Send + Sync {
    /// Delivers `message` to every current member of `group`.
    fn publish(&self, group: &str, message: &OutboundMessage);

    /// Adds `connection` to `group`.
    fn subscribe(&self, connection: ConnectionId, group: &str);

    /// Removes `connection` from `group`.
    fn unsubscribe(&self, connection: ConnectionId, group: &str);

    /// Registers the sink broadcasts for `connection` are relayed to.
    fn attach(&self, connection: ConnectionId, sink: Arc<dyn ReplySink>) {
        let _ = (connection, sink);
    }

    /// Forgets the sink registered for `connection`.
    fn detach(&self, connection: ConnectionId) {
        let _ = connection;
    }
}

/// Groups joined by one connection.
pub struct GroupMembership {
    connection: ConnectionId,
    pubsub: Arc<dyn PubSub>,
    joined: Mutex<BTreeSet<String>>,
}

impl GroupMembership {
    /// Tracks membership for `connection`, relaying broadcasts to `sink`.
    pub fn new(connection: ConnectionId, pubsub: Arc<dyn PubSub>, sink: Arc<dyn ReplySink>) -> Self {
        pubsub.attach(connection, sink);
        Self {
            connection,
            pubsub,
            joined: Mutex::new(BTreeSet::new()),
        }
    }

    /// Joins `group`. Returns `false` when the connection was already a member.
    pub fn join(&self, group: &str) -> bool {
        let inserted = self.lock().insert(group.to_owned());
        if inserted {
            self.pubsub.subscribe(self.connection, group);
            debug!(target: GROUPS_TARGET, connection = %self.connection, group, "joined group");
        }
        inserted
    }

    /// Leaves `group`. Returns `false` when the connection was not a member.
    pub fn leave(&self, group: &str) -> bool {
        let removed = self.lock().remove(group);
        if removed {
            self.pubsub.unsubscribe(self.connection, group);
            debug!(target: GROUPS_TARGET, connection = %self.connection, group, "left group");
        }
        removed
    }

    /// Leaves every joined group and detaches from the hub.
    pub fn leave_all(&self) {
        let groups = std::mem::take(&mut *self.lock());
        for group in &groups {
            self.pubsub.unsubscribe(self.connection, group);
        }
        self.pubsub.detach(self.connection);
        if !groups.is_empty() {
            debug!(
                target: GROUPS_TARGET,
                connection = %self.connection,
                count = groups.len(),
                "released group memberships"
            );
        }
    }

    /// Sends `message` to every member of `group`.
    pub fn broadcast(&self, group: &str, message: &OutboundMessage) {
        self.pubsub.publish(group, message);
    }

    /// Whether the connection has joined `group`.
    pub fn is_member(&self, group: &str) -> bool {
        self.lock().contains(group)
    }

    /// Joined groups in name order.
    pub fn groups(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.joined.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use rstest::rstest;

    use super::*;
    use crate::transport::CollectingSink;

    fn membership(pubsub: MockPubSub) -> GroupMembership {
        GroupMembership::new(
            ConnectionId::new(7),
            Arc::new(pubsub),
            Arc::new(CollectingSink::new()),
        )
    }

    #[rstest]
    fn joining_twice_subscribes_once() {
        let mut pubsub = MockPubSub::new();
        pubsub.expect_attach().times(1).return_const(());
        pubsub
            .expect_subscribe()
            .with(eq(ConnectionId::new(7)), eq("room"))
            .times(1)
            .return_const(());

        let groups = membership(pubsub);
        assert!(groups.join("room"));
        assert!(!groups.join("room"));
        assert_eq!(groups.groups(), vec!["room".to_owned()]);
    }

    #[rstest]
    fn leaving_non_member_group_is_a_noop() {
        let mut pubsub = MockPubSub::new();
        pubsub.expect_attach().return_const(());
        pubsub.expect_unsubscribe().never();

        let groups = membership(pubsub);
        assert!(!groups.leave("room"));
    }

    #[rstest]
    fn leave_all_releases_every_group_once() {
        let mut pubsub = MockPubSub::new();
        pubsub.expect_attach().return_const(());
        pubsub.expect_subscribe().times(2).return_const(());
        pubsub.expect_unsubscribe().times(2).return_const(());
        pubsub.expect_detach().times(2).return_const(());

        let groups = membership(pubsub);
        groups.join("a");
        groups.join("b");
        groups.leave_all();
        groups.leave_all();
        assert!(groups.groups().is_empty());
    }
}
