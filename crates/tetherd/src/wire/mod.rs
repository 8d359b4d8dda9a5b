//! JSON wire shapes exchanged with connected clients.
//!
//! Inbound frames carry a `headers` object and a `body` object:
//!
//! ```json
//! {"headers":{"messageType":"login","ack":true,"uuid":"u1"},"body":{"username":"a"}}
//! ```
//!
//! Outbound messages use the same layout. Acknowledgements use the `ack`
//! message type and echo the request's `uuid`:
//!
//! ```json
//! {"headers":{"messageType":"ack","uuid":"u1"},"body":{"error_message":"Invalid login details.","error_code":"login-error"}}
//! ```

mod envelope;
mod errors;
mod outbound;

pub use self::envelope::{Envelope, EnvelopeHeaders};
pub use self::errors::CodecError;
pub use self::outbound::{OutboundMessage, message_types};
