use super::{ConnectionManager, ConnectionState, GatewayOptions, Session};
use crate::infrastructure::{Backoff, HeartbeatMonitor, HeartbeatSignal, HeartbeatTimer};
use crate::messaging::{Dispatcher, GatewayEvent};
use crate::types::{
    DEFAULT_HEARTBEAT_INTERVAL, Diagnostic, Frame, GatewayError, HANDSHAKE_TIMEOUT,
    IdentifyPayload, PresenceUpdate, ResumePayload, TRANSPORT_CLOSE_TIMEOUT, WS_CLOSE_NORMAL,
    close_codes, decode, encode, gateway_events,
};
use crate::websocket::{Connector, Transport, TransportMessage};
use serde_json::Value;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Requests from the client facade to the driver.
#[derive(Debug)]
pub(crate) enum Command {
    UpdatePresence(PresenceUpdate),
}

/// How one connection ended.
#[derive(Debug)]
enum Outcome {
    Shutdown,
    Fatal(GatewayError),
    Dropped {
        reason: String,
        reached_connected: bool,
    },
    Invalidated {
        reached_connected: bool,
    },
}

/// Everything the driver shares with the client facade.
pub(crate) struct Shared {
    pub url: String,
    pub options: Arc<GatewayOptions>,
    pub connector: Arc<dyn Connector>,
    pub connection: Arc<ConnectionManager>,
    pub session: Arc<watch::Sender<Session>>,
    pub heartbeat: Arc<Mutex<HeartbeatTimer>>,
    pub dispatcher: Arc<Dispatcher>,
    pub diagnostics: broadcast::Sender<Diagnostic>,
    pub fatal: Arc<Mutex<Option<GatewayError>>>,
}

/// Owns the transport and runs connect, handshake, receive and reconnect
/// until shutdown or a fatal error. The only writer to the socket, to the
/// session and to the connection state.
pub(crate) struct Driver {
    shared: Shared,
    shutdown: watch::Receiver<bool>,
    commands: mpsc::UnboundedReceiver<Command>,
}

/// Per-connection bookkeeping.
struct Link {
    transport: Box<dyn Transport>,
    heartbeat_interval: Option<Duration>,
    heartbeat_task: Option<JoinHandle<()>>,
    beats: mpsc::UnboundedSender<HeartbeatSignal>,
    violations: u32,
    reached_connected: bool,
}

impl Link {
    fn stop_heartbeat(&mut self) {
        if let Some(task) = self.heartbeat_task.take() {
            task.abort();
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.stop_heartbeat();
    }
}

impl Driver {
    pub(crate) fn new(
        shared: Shared,
        shutdown: watch::Receiver<bool>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            shared,
            shutdown,
            commands,
        }
    }

    pub(crate) async fn run(mut self) {
        let fatal = self.reconnect_loop().await;

        if let Some(error) = &fatal {
            tracing::error!("Gateway connection ended: {}", error);
        } else {
            tracing::info!("Gateway connection closed");
        }
        *self.shared.fatal.lock().await = fatal;
        self.shared.connection.set_state(ConnectionState::Closed);

        self.shared
            .dispatcher
            .shutdown(self.shared.options.handler_grace_period)
            .await;
    }

    async fn reconnect_loop(&mut self) -> Option<GatewayError> {
        let mut backoff = Backoff::new(self.shared.options.backoff);
        let mut failures: u32 = 0;
        let mut attempt: u32 = 0;

        loop {
            if self.shutdown_requested() {
                return None;
            }
            self.shared.connection.set_state(ConnectionState::Connecting);

            let (delay, reason) = match self.run_connection(&mut backoff).await {
                Outcome::Shutdown => return None,
                Outcome::Fatal(error) => return Some(error),
                Outcome::Dropped {
                    reason,
                    reached_connected,
                } => {
                    if reached_connected {
                        failures = 0;
                        attempt = 0;
                    } else {
                        failures += 1;
                        if let Some(max) = self.shared.options.max_reconnect_attempts
                            && failures >= max
                        {
                            return Some(GatewayError::ReconnectExhausted(max));
                        }
                    }
                    (backoff.next_delay(), reason)
                }
                Outcome::Invalidated { reached_connected } => {
                    if reached_connected {
                        failures = 0;
                        attempt = 0;
                    } else {
                        failures += 1;
                        if let Some(max) = self.shared.options.max_reconnect_attempts
                            && failures >= max
                        {
                            return Some(GatewayError::ReconnectExhausted(max));
                        }
                    }
                    (
                        self.shared.options.invalid_session_delay,
                        "session invalidated".to_string(),
                    )
                }
            };

            attempt += 1;
            tracing::warn!(
                "Disconnected ({}), reconnecting in {:?} (attempt {})",
                reason,
                delay,
                attempt
            );
            self.report(Diagnostic::Disconnected { reason });
            self.report(Diagnostic::ReconnectScheduled { attempt, delay });
            self.shared
                .connection
                .set_state(ConnectionState::Reconnecting);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stopped(&mut self.shutdown) => return None,
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        // A dropped sender means every client handle is gone.
        *self.shutdown.borrow() || self.shutdown.has_changed().is_err()
    }

    async fn run_connection(&mut self, backoff: &mut Backoff) -> Outcome {
        tracing::info!("Connecting to {}", self.shared.url);

        let connect = self.shared.connector.connect(&self.shared.url);
        let transport = tokio::select! {
            result = connect => match result {
                Ok(transport) => transport,
                Err(e) => {
                    return Outcome::Dropped {
                        reason: format!("connect failed: {e}"),
                        reached_connected: false,
                    };
                }
            },
            _ = stopped(&mut self.shutdown) => return Outcome::Shutdown,
        };

        let (beats, beat_rx) = mpsc::unbounded_channel();
        let mut link = Link {
            transport,
            heartbeat_interval: None,
            heartbeat_task: None,
            beats,
            violations: 0,
            reached_connected: false,
        };

        let outcome = self.drive(&mut link, beat_rx, backoff).await;
        link.stop_heartbeat();

        let code = match outcome {
            Outcome::Shutdown | Outcome::Fatal(_) => WS_CLOSE_NORMAL,
            // A normal close would end the session server side.
            _ => close_codes::UNKNOWN_ERROR,
        };
        if tokio::time::timeout(
            Duration::from_millis(TRANSPORT_CLOSE_TIMEOUT),
            link.transport.close(code),
        )
        .await
        .is_err()
        {
            tracing::debug!("Transport close timed out");
        }

        outcome
    }

    async fn drive(
        &mut self,
        link: &mut Link,
        mut beat_rx: mpsc::UnboundedReceiver<HeartbeatSignal>,
        backoff: &mut Backoff,
    ) -> Outcome {
        let handshake_deadline = Instant::now() + Duration::from_millis(HANDSHAKE_TIMEOUT);

        loop {
            let connected = self.shared.connection.is_connected();
            let reached_connected = link.reached_connected;
            let handshake_timer = async move {
                if reached_connected {
                    std::future::pending::<()>().await;
                } else {
                    tokio::time::sleep_until(handshake_deadline).await;
                }
            };

            let flow = tokio::select! {
                message = link.transport.recv() => match message {
                    Some(Ok(TransportMessage::Text(text))) => {
                        self.on_text(link, &text, backoff).await
                    }
                    Some(Ok(TransportMessage::Closed { code, reason })) => {
                        ControlFlow::Break(self.on_close(link, code, reason))
                    }
                    Some(Err(e)) => ControlFlow::Break(Outcome::Dropped {
                        reason: format!("transport error: {e}"),
                        reached_connected: link.reached_connected,
                    }),
                    None => ControlFlow::Break(Outcome::Dropped {
                        reason: "stream ended".to_string(),
                        reached_connected: link.reached_connected,
                    }),
                },
                Some(signal) = beat_rx.recv() => self.on_heartbeat_signal(link, signal).await,
                Some(command) = self.commands.recv(), if connected => {
                    self.on_command(link, command).await
                }
                _ = stopped(&mut self.shutdown) => ControlFlow::Break(Outcome::Shutdown),
                _ = handshake_timer => ControlFlow::Break(Outcome::Dropped {
                    reason: "handshake timed out".to_string(),
                    reached_connected: false,
                }),
            };

            if let ControlFlow::Break(outcome) = flow {
                return outcome;
            }
        }
    }

    async fn on_text(
        &mut self,
        link: &mut Link,
        text: &str,
        backoff: &mut Backoff,
    ) -> ControlFlow<Outcome> {
        let frame = match decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Dropping undecodable frame: {}", e);
                self.report(Diagnostic::DecodeFailed {
                    error: e.to_string(),
                });
                return self.violation(link, e.to_string());
            }
        };
        tracing::debug!("Received {}", frame.name());

        match frame {
            Frame::Hello {
                heartbeat_interval_ms,
            } => self.on_hello(link, heartbeat_interval_ms).await,
            Frame::HeartbeatAck => {
                link.violations = 0;
                if let Some(rtt) = self.shared.heartbeat.lock().await.acknowledge(Instant::now()) {
                    tracing::debug!("Heartbeat acknowledged after {:?}", rtt);
                }
                ControlFlow::Continue(())
            }
            Frame::Heartbeat { .. } => {
                tracing::debug!("Server requested a heartbeat");
                self.send_heartbeat(link).await
            }
            Frame::Dispatch {
                sequence,
                event,
                payload,
            } => self.on_dispatch(link, sequence, event, payload, backoff).await,
            Frame::Reconnect => {
                tracing::info!("Server requested a reconnect");
                ControlFlow::Break(Outcome::Dropped {
                    reason: "server requested reconnect".to_string(),
                    reached_connected: link.reached_connected,
                })
            }
            Frame::InvalidSession { resumable } => {
                tracing::warn!("Session invalidated (resumable: {})", resumable);
                self.shared
                    .session
                    .send_modify(|session| session.invalidate(resumable));
                self.report(Diagnostic::SessionInvalidated { resumable });
                ControlFlow::Break(Outcome::Invalidated {
                    reached_connected: link.reached_connected,
                })
            }
            frame @ (Frame::Identify(_) | Frame::Resume(_) | Frame::PresenceUpdate(_)) => {
                self.violation(link, format!("server sent client-only {}", frame.name()))
            }
        }
    }

    async fn on_hello(&mut self, link: &mut Link, interval_ms: u64) -> ControlFlow<Outcome> {
        if link.heartbeat_interval.is_some() {
            return self.violation(link, "duplicate HELLO".to_string());
        }
        link.heartbeat_interval = Some(Duration::from_millis(interval_ms));

        let session = self.shared.session.borrow().clone();
        let options = &self.shared.options;
        let (frame, state) = match (session.session_id(), session.last_sequence()) {
            (Some(session_id), Some(seq)) if session.can_resume() => {
                tracing::info!("Resuming session {} at sequence {}", session_id, seq);
                let frame = Frame::Resume(ResumePayload {
                    token: options.token.clone(),
                    session_id: session_id.to_string(),
                    seq,
                });
                (frame, ConnectionState::Resuming)
            }
            _ => {
                tracing::info!("Identifying with intents {:?}", options.intents);
                // A fresh identify starts a new sequence.
                self.shared.session.send_if_modified(|session| {
                    let stale = *session != Session::new();
                    session.invalidate(false);
                    stale
                });
                let frame = Frame::Identify(IdentifyPayload {
                    token: options.token.clone(),
                    intents: options.intents,
                    properties: options.properties.clone(),
                    shard: options.shard,
                    presence: options.presence.clone(),
                });
                (frame, ConnectionState::Identifying)
            }
        };

        self.shared.connection.set_state(state);
        self.send(link, &frame).await
    }

    async fn on_dispatch(
        &mut self,
        link: &mut Link,
        sequence: Option<u64>,
        event: String,
        payload: Value,
        backoff: &mut Backoff,
    ) -> ControlFlow<Outcome> {
        let ready_session = if event == gateway_events::READY {
            match payload.get("session_id").and_then(Value::as_str) {
                Some(session_id) => Some(session_id.to_string()),
                None => return self.violation(link, "READY without session_id".to_string()),
            }
        } else {
            None
        };

        let mut recorded = Ok(());
        self.shared.session.send_if_modified(|session| {
            recorded = session.record(sequence);
            recorded.is_ok() && sequence.is_some()
        });
        if let Err(e) = recorded {
            tracing::debug!("Dropping redelivered {}: {}", event, e);
            return self.violation(link, e.to_string());
        }
        link.violations = 0;

        if let Some(session_id) = ready_session {
            self.shared
                .session
                .send_modify(|session| session.adopt(session_id));
            self.enter_connected(link, backoff).await;
        } else if event == gateway_events::RESUMED {
            self.enter_connected(link, backoff).await;
        }

        let delivered = self
            .shared
            .dispatcher
            .dispatch(&GatewayEvent::parse(&event), payload)
            .await;
        tracing::trace!("Dispatched {} to {} handler(s)", event, delivered);
        ControlFlow::Continue(())
    }

    async fn enter_connected(&mut self, link: &mut Link, backoff: &mut Backoff) {
        if link.reached_connected {
            return;
        }
        link.reached_connected = true;
        backoff.reset();
        self.shared.connection.set_state(ConnectionState::Connected);
        tracing::info!("Gateway session established");

        let interval = link
            .heartbeat_interval
            .unwrap_or(Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL));
        link.stop_heartbeat();
        let monitor = HeartbeatMonitor::new(
            Arc::clone(&self.shared.heartbeat),
            self.shared.connection.subscribe(),
            link.beats.clone(),
        )
        .with_interval(interval);
        link.heartbeat_task = Some(monitor.start().await);
    }

    fn on_close(&self, link: &Link, code: Option<u16>, reason: String) -> Outcome {
        tracing::info!("Server closed the connection: {:?} {}", code, reason);
        match code {
            Some(close_codes::AUTHENTICATION_FAILED) => {
                Outcome::Fatal(GatewayError::AuthenticationRejected(reason))
            }
            Some(
                code @ (close_codes::INVALID_SHARD
                | close_codes::SHARDING_REQUIRED
                | close_codes::INVALID_API_VERSION
                | close_codes::INVALID_INTENTS
                | close_codes::DISALLOWED_INTENTS),
            ) => Outcome::Fatal(GatewayError::Rejected { code, reason }),
            Some(code @ (close_codes::INVALID_SEQ | close_codes::SESSION_TIMED_OUT)) => {
                self.shared
                    .session
                    .send_modify(|session| session.invalidate(false));
                Outcome::Dropped {
                    reason: format!("closed with {code}, session discarded"),
                    reached_connected: link.reached_connected,
                }
            }
            code => Outcome::Dropped {
                reason: match code {
                    Some(code) => format!("closed with {code}: {reason}"),
                    None => "closed without a code".to_string(),
                },
                reached_connected: link.reached_connected,
            },
        }
    }

    async fn on_heartbeat_signal(
        &mut self,
        link: &mut Link,
        signal: HeartbeatSignal,
    ) -> ControlFlow<Outcome> {
        match signal {
            HeartbeatSignal::Beat => self.send_heartbeat(link).await,
            HeartbeatSignal::Zombied => {
                self.report(Diagnostic::Zombied);
                ControlFlow::Break(Outcome::Dropped {
                    reason: "heartbeat not acknowledged".to_string(),
                    reached_connected: link.reached_connected,
                })
            }
        }
    }

    async fn on_command(&mut self, link: &mut Link, command: Command) -> ControlFlow<Outcome> {
        match command {
            Command::UpdatePresence(presence) => {
                tracing::debug!("Updating presence to {:?}", presence.status);
                self.send(link, &Frame::PresenceUpdate(presence)).await
            }
        }
    }

    async fn send_heartbeat(&mut self, link: &mut Link) -> ControlFlow<Outcome> {
        let last_sequence = self.shared.session.borrow().last_sequence();
        self.send(link, &Frame::Heartbeat { last_sequence }).await
    }

    async fn send(&mut self, link: &mut Link, frame: &Frame) -> ControlFlow<Outcome> {
        let text = match encode(frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to encode {}: {}", frame.name(), e);
                return ControlFlow::Continue(());
            }
        };

        match link.transport.send(text).await {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => ControlFlow::Break(Outcome::Dropped {
                reason: format!("send failed: {e}"),
                reached_connected: link.reached_connected,
            }),
        }
    }

    fn violation(&self, link: &mut Link, reason: String) -> ControlFlow<Outcome> {
        link.violations += 1;
        tracing::warn!(
            "Protocol violation ({} in a row): {}",
            link.violations,
            reason
        );
        self.report(Diagnostic::ProtocolViolation {
            reason,
            consecutive: link.violations,
        });

        if link.violations >= self.shared.options.max_protocol_violations {
            return ControlFlow::Break(Outcome::Dropped {
                reason: format!("{} consecutive protocol violations", link.violations),
                reached_connected: link.reached_connected,
            });
        }
        ControlFlow::Continue(())
    }

    fn report(&self, diagnostic: Diagnostic) {
        let _ = self.shared.diagnostics.send(diagnostic);
    }
}

/// Resolves once shutdown is requested or every client handle is gone
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
