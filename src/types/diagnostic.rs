use crate::client::ConnectionState;
use std::time::Duration;

/// Non-fatal conditions observed by the client.
///
/// Everything here is handled internally (retried, dropped or isolated);
/// the events exist so applications can watch the feed's health through
/// [`GatewayClient::diagnostics`](crate::GatewayClient::diagnostics).
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// A frame could not be decoded and was skipped
    DecodeFailed { error: String },
    /// A frame was dropped for breaking the protocol (stale sequence, unexpected opcode)
    ProtocolViolation { reason: String, consecutive: u32 },
    SessionInvalidated { resumable: bool },
    /// A heartbeat went unacknowledged for a full interval
    Zombied,
    Disconnected { reason: String },
    ReconnectScheduled { attempt: u32, delay: Duration },
    HandlerFailed { event: String, error: String },
}
