//! In-process pub-sub hub.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{GROUPS_TARGET, PubSub};
use crate::context::ReplySink;
use crate::session::ConnectionId;
use crate::wire::OutboundMessage;

/// Relays group broadcasts to the sinks of attached connections.
#[derive(Default)]
pub struct LocalPubSub {
    state: Mutex<HubState>,
}

#[derive(Default)]
struct HubState {
    members: HashMap<String, BTreeSet<ConnectionId>>,
    sinks: HashMap<ConnectionId, Arc<dyn ReplySink>>,
}

impl LocalPubSub {
    /// Builds an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current members of `group`.
    pub fn members(&self, group: &str) -> Vec<ConnectionId> {
        self.lock()
            .members
            .get(group)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PubSub for LocalPubSub {
    fn publish(&self, group: &str, message: &OutboundMessage) {
        let sinks: Vec<Arc<dyn ReplySink>> = {
            let state = self.lock();
            let Some(members) = state.members.get(group) else {
                debug!(target: GROUPS_TARGET, group, "broadcast to empty group");
                return;
            };
            members
                .iter()
                .filter_map(|member| state.sinks.get(member).cloned())
                .collect()
        };
        for sink in sinks {
            sink.send_message(message.clone());
        }
    }

    fn subscribe(&self, connection: ConnectionId, group: &str) {
        self.lock()
            .members
            .entry(group.to_owned())
            .or_default()
            .insert(connection);
    }

    fn unsubscribe(&self, connection: ConnectionId, group: &str) {
        let mut state = self.lock();
        if let Some(members) = state.members.get_mut(group) {
            members.remove(&connection);
            if members.is_empty() {
                state.members.remove(group);
            }
        }
    }

    fn attach(&self, connection: ConnectionId, sink: Arc<dyn ReplySink>) {
        self.lock().sinks.insert(connection, sink);
    }

    fn detach(&self, connection: ConnectionId) {
        let mut state = self.lock();
        state.sinks.remove(&connection);
        state.members.retain(|_, members| {
            members.remove(&connection);
            !members.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::Map;

    use super::*;
    use crate::transport::CollectingSink;

    #[rstest]
    fn broadcast_reaches_only_members() {
        let hub = LocalPubSub::new();
        let inside = Arc::new(CollectingSink::new());
        let outside = Arc::new(CollectingSink::new());
        hub.attach(ConnectionId::new(1), inside.clone());
        hub.attach(ConnectionId::new(2), outside.clone());
        hub.subscribe(ConnectionId::new(1), "room");

        hub.publish("room", &OutboundMessage::new("chat", Map::new()));

        assert_eq!(inside.messages().len(), 1);
        assert!(outside.messages().is_empty());
    }

    #[rstest]
    fn detach_drops_memberships() {
        let hub = LocalPubSub::new();
        hub.attach(ConnectionId::new(1), Arc::new(CollectingSink::new()));
        hub.subscribe(ConnectionId::new(1), "room");

        hub.detach(ConnectionId::new(1));

        assert!(hub.members("room").is_empty());
    }
}
