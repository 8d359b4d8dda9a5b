//! Handlers registered on every daemon connection.

use std::sync::Arc;

use serde_json::Map;

use crate::dispatch::{HandlerBinding, HandlerOutcome, Receiver};
use crate::wire::OutboundMessage;

/// Type tag answered by [`SystemReceiver`].
pub const PING: &str = "ping";
/// Reply sent for [`PING`].
pub const PONG: &str = "pong";

/// Liveness handlers available to anonymous clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemReceiver;

impl Receiver for SystemReceiver {
    fn bindings(self: Arc<Self>) -> Vec<HandlerBinding> {
        vec![
            HandlerBinding::from_fn(PING, |request| {
                request.context().reply(OutboundMessage::new(PONG, Map::new()));
                Ok(HandlerOutcome::NoResult)
            })
            .requires_auth(false),
        ]
    }
}
