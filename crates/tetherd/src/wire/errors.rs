//! Error types for frame decoding.

use thiserror::Error;

/// Reasons an inbound frame could not be decoded into an [`super::Envelope`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame was empty after trimming trailing whitespace.
    #[error("empty frame")]
    EmptyFrame,

    /// The frame was not JSON or did not match the envelope layout.
    #[error("frame is not a valid envelope: {0}")]
    Json(#[source] serde_json::Error),

    /// The headers did not name a message type.
    #[error("frame headers are missing `messageType`")]
    MissingMessageType,

    /// The body was present but was not a JSON object.
    #[error("envelope body must be an object, found {found}")]
    BodyNotObject {
        /// JSON kind that was supplied instead.
        found: &'static str,
    },
}
