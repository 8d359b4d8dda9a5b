//! TCP transport carrying line-delimited JSON envelopes.
//!
//! The listener accepts connections on a background thread and hands each
//! one to a [`ConnectionHandler`] on its own thread. The dispatch handler
//! keeps the connection open, decoding one envelope per line and writing
//! replies back as they are produced.

mod collector;
mod errors;
mod handler;
mod listener;

pub use self::collector::CollectingSink;
pub use self::errors::ListenerError;
pub use self::handler::{ConnectionHandler, DispatchConnectionHandler, StreamSink};
pub use self::listener::{ListenerHandle, SocketListener};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
