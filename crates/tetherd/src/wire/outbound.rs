//! Outbound message encoding.

use serde_json::{Map, Value, json};

use crate::dispatch::TypedError;
use crate::identity::TokenPair;

/// Message types produced by the dispatch core itself.
pub mod message_types {
    /// Correlated acknowledgement.
    pub const ACK: &str = "ack";
    /// Request to exchange a refresh token for a new token pair.
    pub const REFRESH_TOKEN: &str = "refresh-token";
    /// Newly issued token pair.
    pub const LOGIN_TOKEN: &str = "login-token";
    /// The connection's credential was rejected.
    pub const TOKEN_INVALID: &str = "token-invalid";
}

/// A message queued for delivery to a client.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    message_type: String,
    correlation_id: Option<String>,
    body: Map<String, Value>,
}

impl OutboundMessage {
    /// Builds an uncorrelated message.
    pub fn new(message_type: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            message_type: message_type.into(),
            correlation_id: None,
            body,
        }
    }

    /// Builds an acknowledgement. An empty body signals success.
    pub fn ack(error: Option<&TypedError>) -> Self {
        let body = error.map(TypedError::to_ack_body).unwrap_or_default();
        Self::new(message_types::ACK, body)
    }

    /// Builds a `login-token` message carrying a fresh token pair.
    pub fn login_token(tokens: &TokenPair) -> Self {
        let mut body = Map::new();
        body.insert("token".into(), Value::String(tokens.access.clone()));
        body.insert("refresh".into(), Value::String(tokens.refresh.clone()));
        Self::new(message_types::LOGIN_TOKEN, body)
    }

    /// Builds a `token-invalid` notification.
    pub fn token_invalid() -> Self {
        Self::new(message_types::TOKEN_INVALID, Map::new())
    }

    /// Replaces the correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Message type written to `headers.messageType`.
    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    /// Correlation id written to `headers.uuid`.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Body fields.
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Renders the message in wire layout.
    pub fn to_value(&self) -> Value {
        let mut headers = Map::new();
        headers.insert(
            "messageType".into(),
            Value::String(self.message_type.clone()),
        );
        if let Some(id) = &self.correlation_id {
            headers.insert("uuid".into(), Value::String(id.clone()));
        }
        json!({ "headers": headers, "body": self.body })
    }

    /// Encodes the message as a single JSON document without a delimiter.
    pub fn encode(&self) -> Vec<u8> {
        self.to_value().to_string().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn success_ack_has_empty_body() {
        let message = OutboundMessage::ack(None).with_correlation_id(Some("u1".into()));
        assert_eq!(
            message.to_value(),
            json!({"headers": {"messageType": "ack", "uuid": "u1"}, "body": {}})
        );
    }

    #[rstest]
    fn error_ack_carries_message_and_code() {
        let error = TypedError::new("Invalid login details.").with_code("login-error");
        let message = OutboundMessage::ack(Some(&error));
        assert_eq!(
            message.body().get("error_message"),
            Some(&Value::String("Invalid login details.".into()))
        );
        assert_eq!(
            message.body().get("error_code"),
            Some(&Value::String("login-error".into()))
        );
    }

    #[rstest]
    fn uncorrelated_messages_omit_uuid() {
        let encoded = OutboundMessage::token_invalid().encode();
        let value: Value = serde_json::from_slice(&encoded).expect("encoded JSON");
        assert_eq!(value["headers"]["messageType"], "token-invalid");
        assert!(value["headers"].get("uuid").is_none());
    }
}
