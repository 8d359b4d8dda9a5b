//! Reply sink that buffers messages instead of writing them.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{Value, json};

use crate::context::ReplySink;
use crate::wire::OutboundMessage;

/// Buffers outbound messages for request/response bridges and tests.
///
/// [`CollectingSink::collect_result`] renders everything gathered so far as
/// `{"messages": [...]}` and empties the buffer.
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<OutboundMessage>>,
    arrived: Condvar,
}

impl CollectingSink {
    /// Builds an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages gathered so far.
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.lock().clone()
    }

    /// Waits until at least `count` messages arrived or `timeout` elapsed,
    /// then returns the messages gathered so far.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<OutboundMessage> {
        let guard = self.lock();
        let (guard, _) = self
            .arrived
            .wait_timeout_while(guard, timeout, |messages| messages.len() < count)
            .unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    /// Renders and clears the buffer.
    pub fn collect_result(&self) -> Value {
        let drained = std::mem::take(&mut *self.lock());
        let messages: Vec<Value> = drained.iter().map(OutboundMessage::to_value).collect();
        json!({ "messages": messages })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<OutboundMessage>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReplySink for CollectingSink {
    fn send_message(&self, message: OutboundMessage) {
        self.lock().push(message);
        self.arrived.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use rstest::rstest;
    use serde_json::Map;

    use super::*;

    #[rstest]
    fn collect_result_wraps_and_clears() {
        let sink = CollectingSink::new();
        sink.send_message(OutboundMessage::ack(None).with_correlation_id(Some("u1".into())));

        let rendered = sink.collect_result();

        assert_eq!(
            rendered,
            json!({"messages": [{"headers": {"messageType": "ack", "uuid": "u1"}, "body": {}}]})
        );
        assert!(sink.messages().is_empty());
        assert_eq!(sink.collect_result(), json!({"messages": []}));
    }

    #[rstest]
    fn wait_for_wakes_on_arrival() {
        let sink = Arc::new(CollectingSink::new());
        let producer = Arc::clone(&sink);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.send_message(OutboundMessage::new("late", Map::new()));
        });

        let messages = sink.wait_for(1, Duration::from_secs(2));

        assert_eq!(messages.len(), 1);
        handle.join().expect("join producer");
    }
}
