//! In-memory transport driving the connection tests.

use super::{Connector, Transport, TransportMessage};
use crate::types::{Frame, GatewayError, Result, decode, encode};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;

pub(crate) struct MockConnector {
    servers: mpsc::UnboundedSender<MockServer>,
    refuse: Arc<AtomicU32>,
    attempts: Arc<Mutex<Vec<(Instant, String)>>>,
}

/// Test side of a [`MockConnector`]: yields one server per accepted connection.
pub(crate) struct MockListener {
    servers: mpsc::UnboundedReceiver<MockServer>,
    refuse: Arc<AtomicU32>,
    attempts: Arc<Mutex<Vec<(Instant, String)>>>,
}

impl MockConnector {
    pub(crate) fn new() -> (Arc<Self>, MockListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        let refuse = Arc::new(AtomicU32::new(0));
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let connector = Arc::new(Self {
            servers: tx,
            refuse: Arc::clone(&refuse),
            attempts: Arc::clone(&attempts),
        });
        let listener = MockListener {
            servers: rx,
            refuse,
            attempts,
        };
        (connector, listener)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
        self.attempts
            .lock()
            .await
            .push((Instant::now(), url.to_string()));

        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                u32::MAX => Some(u32::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if refused {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }

        let (to_server, from_client) = mpsc::unbounded_channel();
        let (to_client, from_server) = mpsc::unbounded_channel();
        self.servers
            .send(MockServer {
                inbound: from_client,
                outbound: Some(to_client),
            })
            .map_err(|_| GatewayError::Transport("listener gone".to_string()))?;

        Ok(Box::new(MockTransport {
            outbound: to_server,
            inbound: from_server,
        }))
    }
}

impl MockListener {
    pub(crate) async fn accept(&mut self) -> MockServer {
        self.servers.recv().await.expect("connector dropped")
    }

    /// Refuses the next `n` connection attempts
    pub(crate) fn refuse_next(&self, n: u32) {
        self.refuse.store(n, Ordering::SeqCst);
    }

    pub(crate) fn refuse_all(&self) {
        self.refuse.store(u32::MAX, Ordering::SeqCst);
    }

    pub(crate) async fn attempts(&self) -> Vec<(Instant, String)> {
        self.attempts.lock().await.clone()
    }

    /// Whether a connection arrived that was not accepted yet
    pub(crate) fn has_pending(&mut self) -> bool {
        !self.servers.is_empty()
    }
}

pub(crate) struct MockServer {
    inbound: mpsc::UnboundedReceiver<ClientMessage>,
    outbound: Option<mpsc::UnboundedSender<TransportMessage>>,
}

#[derive(Debug)]
enum ClientMessage {
    Text(String),
    Close(u16),
}

impl MockServer {
    pub(crate) fn send(&self, frame: &Frame) {
        self.send_raw(&encode(frame).expect("encode"));
    }

    pub(crate) fn send_raw(&self, text: &str) {
        if let Some(tx) = &self.outbound {
            let _ = tx.send(TransportMessage::Text(text.to_string()));
        }
    }

    pub(crate) fn hello(&self, interval_ms: u64) {
        self.send(&Frame::Hello {
            heartbeat_interval_ms: interval_ms,
        });
    }

    pub(crate) fn dispatch(&self, sequence: u64, event: &str, payload: serde_json::Value) {
        self.send(&Frame::Dispatch {
            sequence: Some(sequence),
            event: event.to_string(),
            payload,
        });
    }

    /// READY without a sequence number
    pub(crate) fn ready(&self, session_id: &str) {
        self.send(&Frame::Dispatch {
            sequence: None,
            event: "READY".to_string(),
            payload: serde_json::json!({ "session_id": session_id }),
        });
    }

    /// READY as the live gateway sends it, first in the sequence
    pub(crate) fn ready_at(&self, sequence: u64, session_id: &str) {
        self.dispatch(sequence, "READY", serde_json::json!({ "session_id": session_id }));
    }

    pub(crate) fn resumed(&self) {
        self.send(&Frame::Dispatch {
            sequence: None,
            event: "RESUMED".to_string(),
            payload: serde_json::Value::Null,
        });
    }

    /// Next frame the client wrote, `None` once the client hung up
    pub(crate) async fn next_frame(&mut self) -> Option<Frame> {
        match self.inbound.recv().await? {
            ClientMessage::Text(text) => Some(decode(&text).expect("client sent garbage")),
            ClientMessage::Close(_) => None,
        }
    }

    /// Next frame that is not a heartbeat
    pub(crate) async fn next_non_heartbeat(&mut self) -> Option<Frame> {
        loop {
            match self.next_frame().await? {
                Frame::Heartbeat { .. } => continue,
                frame => return Some(frame),
            }
        }
    }

    /// Close code the client hung up with, `None` if it just dropped
    pub(crate) async fn closed_with(&mut self) -> Option<u16> {
        loop {
            match self.inbound.recv().await? {
                ClientMessage::Close(code) => return Some(code),
                ClientMessage::Text(_) => continue,
            }
        }
    }

    pub(crate) fn close(&mut self, code: u16, reason: &str) {
        if let Some(tx) = self.outbound.take() {
            let _ = tx.send(TransportMessage::Closed {
                code: Some(code),
                reason: reason.to_string(),
            });
        }
    }

    /// Ends the stream without a close frame
    pub(crate) fn drop_connection(&mut self) {
        self.outbound = None;
    }
}

struct MockTransport {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    inbound: mpsc::UnboundedReceiver<TransportMessage>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.outbound
            .send(ClientMessage::Text(text))
            .map_err(|_| GatewayError::Transport("server hung up".to_string()))
    }

    async fn recv(&mut self) -> Option<Result<TransportMessage>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self, code: u16) {
        let _ = self.outbound.send(ClientMessage::Close(code));
    }
}
