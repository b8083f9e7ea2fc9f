use crate::types::Diagnostic;
use std::fmt;
use tokio::sync::{broadcast, watch};

/// Lifecycle of a gateway client.
///
/// ```text
/// Disconnected -> Connecting -> Identifying | Resuming -> Connected
///                     ^                                      |
///                     +------------- Reconnecting <----------+
/// any -> Closed (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Identifying,
    Resuming,
    Connected,
    Reconnecting,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        }
    }

    /// Handshake in progress, transport up but session not acknowledged
    pub fn is_handshaking(&self) -> bool {
        matches!(self, Self::Identifying | Self::Resuming)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishes the connection state. Only the connection driver writes.
pub struct ConnectionManager {
    state: watch::Sender<ConnectionState>,
    diagnostics: broadcast::Sender<Diagnostic>,
}

impl ConnectionManager {
    pub fn new(diagnostics: broadcast::Sender<Diagnostic>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self { state, diagnostics }
    }

    /// Gets the current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Moves to `next`. Closed is terminal and repeated states are ignored.
    pub fn set_state(&self, next: ConnectionState) {
        let mut previous = None;
        self.state.send_if_modified(|current| {
            if *current == next || *current == ConnectionState::Closed {
                return false;
            }
            previous = Some(*current);
            *current = next;
            true
        });

        if let Some(from) = previous {
            tracing::debug!("Connection state: {} -> {}", from, next);
            let _ = self
                .diagnostics
                .send(Diagnostic::StateChanged { from, to: next });
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Checks if currently connected
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}
