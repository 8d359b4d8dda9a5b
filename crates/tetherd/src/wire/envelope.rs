//! Inbound envelope decoding.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::errors::CodecError;

/// Header fields recognised on inbound envelopes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvelopeHeaders {
    /// Credential supplied with this frame, if any.
    pub auth_token: Option<String>,
    /// Client correlation id echoed on every reply to this envelope.
    pub correlation_id: Option<String>,
    /// Whether the client asked for a single correlated acknowledgement.
    pub wants_ack: bool,
    /// Protocol version advertised by the client.
    pub api_version: Option<i64>,
    /// Number of times the client has retried this envelope.
    pub retry_count: u32,
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    type_tag: String,
    body: Map<String, Value>,
    headers: EnvelopeHeaders,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    headers: RawHeaders,
    #[serde(default)]
    body: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHeaders {
    #[serde(default)]
    message_type: Option<String>,
    #[serde(default)]
    auth_header: Option<String>,
    #[serde(default)]
    ack: Option<bool>,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    api_version: Option<i64>,
    #[serde(default)]
    retry_count: Option<u32>,
}

impl Envelope {
    /// Builds an envelope directly, bypassing the wire format.
    pub fn new(type_tag: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            type_tag: type_tag.into(),
            body,
            headers: EnvelopeHeaders::default(),
        }
    }

    /// Replaces the header block.
    #[must_use]
    pub fn with_headers(mut self, headers: EnvelopeHeaders) -> Self {
        self.headers = headers;
        self
    }

    /// Decodes a raw frame.
    ///
    /// Trailing whitespace (including the newline delimiter) is ignored. A
    /// missing or `null` body decodes as an empty object and an empty
    /// `authHeader` is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the frame is empty, is not JSON, lacks a
    /// message type, or carries a non-object body.
    pub fn decode(frame: &[u8]) -> Result<Self, CodecError> {
        let trimmed = trim_trailing_whitespace(frame);
        if trimmed.is_empty() {
            return Err(CodecError::EmptyFrame);
        }

        let raw: RawEnvelope = serde_json::from_slice(trimmed).map_err(CodecError::Json)?;
        let type_tag = raw
            .headers
            .message_type
            .filter(|tag| !tag.trim().is_empty())
            .ok_or(CodecError::MissingMessageType)?;
        let body = match raw.body {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(CodecError::BodyNotObject {
                    found: json_kind(&other),
                });
            }
        };

        Ok(Self {
            type_tag,
            body,
            headers: EnvelopeHeaders {
                auth_token: raw.headers.auth_header.filter(|token| !token.is_empty()),
                correlation_id: raw.headers.uuid,
                wants_ack: raw.headers.ack.unwrap_or(false),
                api_version: raw.headers.api_version,
                retry_count: raw.headers.retry_count.unwrap_or(0),
            },
        })
    }

    /// Message type used to select handlers.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Decoded header block.
    pub fn headers(&self) -> &EnvelopeHeaders {
        &self.headers
    }

    /// Correlation id supplied by the client.
    pub fn correlation_id(&self) -> Option<&str> {
        self.headers.correlation_id.as_deref()
    }

    /// Whether the client asked for an acknowledgement.
    pub fn wants_ack(&self) -> bool {
        self.headers.wants_ack
    }

    /// Body fields.
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Returns a string body field.
    pub fn body_str(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }

    /// Deserializes the body into a typed message.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the body does not match `T`.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.body.clone()))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn trim_trailing_whitespace(frame: &[u8]) -> &[u8] {
    let end = frame
        .iter()
        .rposition(|byte| !byte.is_ascii_whitespace())
        .map_or(0, |index| index + 1);
    &frame[..end]
}
