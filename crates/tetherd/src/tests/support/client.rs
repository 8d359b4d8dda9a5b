//! Line-delimited JSON client used to drive a running listener.

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Map, Value, json};

const WAIT_DEADLINE: Duration = Duration::from_secs(2);

/// Message type carried in an outbound frame's headers.
pub fn message_type(message: &Value) -> Option<&str> {
    message.get("headers")?.get("messageType")?.as_str()
}

/// Correlation id carried in an outbound frame's headers.
pub fn correlation_id(message: &Value) -> Option<&str> {
    message.get("headers")?.get("uuid")?.as_str()
}

/// Connected client that records every reply on a background reader.
pub struct TestClient {
    stream: TcpStream,
    received: Arc<Mutex<Vec<Value>>>,
    reader: Option<thread::JoinHandle<()>>,
}

impl TestClient {
    pub fn connect(address: SocketAddr) -> Self {
        let stream = TcpStream::connect(address).expect("connect client");
        let reader_stream = stream.try_clone().expect("clone client stream");
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let reader = thread::spawn(move || {
            for line in BufReader::new(reader_stream).lines() {
                let Ok(line) = line else { break };
                let value: Value = serde_json::from_str(&line).expect("reply should be JSON");
                sink.lock().expect("received mutex poisoned").push(value);
            }
        });
        Self {
            stream,
            received,
            reader: Some(reader),
        }
    }

    /// Writes `line` followed by a newline.
    pub fn send_raw(&mut self, line: &str) {
        self.stream.write_all(line.as_bytes()).expect("write frame");
        self.stream.write_all(b"\n").expect("write newline");
        self.stream.flush().expect("flush frame");
    }

    /// Sends an envelope, requesting an ack when `correlation_id` is set.
    pub fn send(&mut self, type_tag: &str, correlation_id: Option<&str>, body: Value) {
        self.send_envelope(type_tag, correlation_id, None, body);
    }

    /// Sends a `ping` carrying `token` as its auth header.
    pub fn authenticate(&mut self, token: &str) {
        self.send_envelope("ping", None, Some(token), json!({}));
    }

    fn send_envelope(
        &mut self,
        type_tag: &str,
        correlation_id: Option<&str>,
        token: Option<&str>,
        body: Value,
    ) {
        let mut headers = Map::new();
        headers.insert("messageType".into(), json!(type_tag));
        if let Some(id) = correlation_id {
            headers.insert("uuid".into(), json!(id));
            headers.insert("ack".into(), json!(true));
        }
        if let Some(token) = token {
            headers.insert("authHeader".into(), json!(token));
        }
        let frame = json!({ "headers": headers, "body": body });
        self.send_raw(&frame.to_string());
    }

    /// Snapshot of the replies received so far.
    pub fn messages(&self) -> Vec<Value> {
        self.received.lock().expect("received mutex poisoned").clone()
    }

    /// Polls until `predicate` holds or the deadline passes, returning the
    /// final snapshot either way.
    pub fn wait_until(&self, predicate: impl Fn(&[Value]) -> bool) -> Vec<Value> {
        let deadline = Instant::now() + WAIT_DEADLINE;
        loop {
            let messages = self.messages();
            if predicate(&messages) || Instant::now() >= deadline {
                return messages;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Waits for the ack correlated with `id`.
    pub fn wait_for_ack(&self, id: &str) -> Option<Value> {
        let is_ack = |message: &Value| {
            message_type(message) == Some("ack") && correlation_id(message) == Some(id)
        };
        self.wait_until(|messages| messages.iter().any(is_ack))
            .into_iter()
            .find(is_ack)
    }
}

impl Drop for TestClient {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}
