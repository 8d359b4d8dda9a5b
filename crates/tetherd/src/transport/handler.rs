//! Connection handling for the daemon listener.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use super::LISTENER_TARGET;
use crate::connection::{ConnectionDispatcher, ConnectionServices};
use crate::context::ReplySink;
use crate::session::ConnectionId;
use crate::wire::OutboundMessage;

/// Handles accepted socket connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking.
    fn handle(&self, stream: TcpStream);
}

/// Writes newline-terminated JSON frames to a connected client.
#[derive(Debug)]
pub struct StreamSink {
    connection: ConnectionId,
    stream: Mutex<TcpStream>,
}

impl StreamSink {
    /// Wraps the write half of a connection.
    #[must_use]
    pub fn new(connection: ConnectionId, stream: TcpStream) -> Self {
        Self {
            connection,
            stream: Mutex::new(stream),
        }
    }
}

impl ReplySink for StreamSink {
    fn send_message(&self, message: OutboundMessage) {
        let mut frame = message.encode();
        frame.push(b'\n');
        let mut stream = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(error) = stream.write_all(&frame).and_then(|()| stream.flush()) {
            warn!(
                target: LISTENER_TARGET,
                connection = %self.connection,
                message_type = message.message_type(),
                %error,
                "failed to write reply"
            );
        }
    }
}

/// Serves each connection with a [`ConnectionDispatcher`] until the peer
/// disconnects.
#[derive(Debug)]
pub struct DispatchConnectionHandler {
    services: ConnectionServices,
    max_frame_bytes: usize,
    next_id: AtomicU64,
}

impl DispatchConnectionHandler {
    /// Builds a handler that rejects frames longer than `max_frame_bytes`.
    #[must_use]
    pub fn new(services: ConnectionServices, max_frame_bytes: usize) -> Self {
        Self {
            services,
            max_frame_bytes,
            next_id: AtomicU64::new(1),
        }
    }

    fn serve(&self, id: ConnectionId, stream: TcpStream) {
        let writer = match stream.try_clone() {
            Ok(writer) => writer,
            Err(error) => {
                warn!(
                    target: LISTENER_TARGET,
                    connection = %id,
                    %error,
                    "failed to split connection stream"
                );
                return;
            }
        };
        let sink: Arc<dyn ReplySink> = Arc::new(StreamSink::new(id, writer));
        let dispatcher = ConnectionDispatcher::open(id, sink, &self.services);
        let mut reader = BufReader::new(stream);
        loop {
            match read_frame(&mut reader, self.max_frame_bytes) {
                Ok(Some(frame)) => dispatch_frame(&dispatcher, &frame),
                Ok(None) => break,
                Err(error) => {
                    warn!(
                        target: LISTENER_TARGET,
                        connection = %id,
                        %error,
                        "closing connection after read failure"
                    );
                    break;
                }
            }
        }
        debug!(target: LISTENER_TARGET, connection = %id, "connection closed");
        dispatcher.close();
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, stream: TcpStream) {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        debug!(target: LISTENER_TARGET, connection = %id, "connection accepted");
        self.serve(id, stream);
    }
}

fn dispatch_frame(dispatcher: &ConnectionDispatcher, frame: &[u8]) {
    if frame.iter().all(u8::is_ascii_whitespace) {
        return;
    }
    let Ok(report) = dispatcher.handle_frame(frame) else {
        return;
    };
    for error in report.failures() {
        debug!(
            target: LISTENER_TARGET,
            connection = %dispatcher.session().id(),
            type_tag = report.type_tag.as_str(),
            code = error.code(),
            "failure withheld from client"
        );
    }
}

/// Reads one newline-terminated frame, or the trailing bytes before EOF.
fn read_frame<R: BufRead>(reader: &mut R, max_frame_bytes: usize) -> io::Result<Option<Vec<u8>>> {
    let limit = u64::try_from(max_frame_bytes)
        .unwrap_or(u64::MAX)
        .saturating_add(1);
    let mut frame = Vec::new();
    let read = reader.by_ref().take(limit).read_until(b'\n', &mut frame)?;
    if read == 0 {
        return Ok(None);
    }
    let terminated = frame.last() == Some(&b'\n');
    if !terminated && frame.len() > max_frame_bytes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame exceeds {max_frame_bytes} bytes"),
        ));
    }
    Ok(Some(frame))
}
