use thiserror::Error;

/// Errors that can occur when using the gateway client.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// WebSocket protocol error (connection failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Transport-level failure reported by a non-WebSocket transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server explicitly rejected the token
    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(String),

    /// The server closed the connection with a code that must not be retried
    #[error("Gateway rejected the connection with close code {code}: {reason}")]
    Rejected { code: u16, reason: String },

    /// URL parsing error (malformed gateway URL)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Client options failed validation
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Too many consecutive reconnect attempts failed
    #[error("Gave up after {0} consecutive failed reconnect attempts")]
    ReconnectExhausted(u32),

    /// The client was closed and cannot be used again
    #[error("Client is closed")]
    Closed,

    /// Attempted operation while not connected to the server
    #[error("Not connected")]
    NotConnected,
}

impl GatewayError {
    /// Whether this error ends the client instead of triggering a reconnect
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationRejected(_) | Self::Rejected { .. } | Self::ReconnectExhausted(_)
        )
    }

    /// Copies a fatal error so every waiter on a closed client gets one.
    /// Non-fatal variants collapse to [`GatewayError::Closed`].
    pub(crate) fn reissue(&self) -> Self {
        match self {
            Self::AuthenticationRejected(reason) => Self::AuthenticationRejected(reason.clone()),
            Self::Rejected { code, reason } => Self::Rejected {
                code: *code,
                reason: reason.clone(),
            },
            Self::ReconnectExhausted(attempts) => Self::ReconnectExhausted(*attempts),
            _ => Self::Closed,
        }
    }
}

/// Errors produced while decoding an inbound frame.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    #[error("opcode {op} is missing field `{field}`")]
    MissingField { op: u8, field: &'static str },

    #[error("opcode {op} has an invalid `{field}`: {reason}")]
    InvalidField {
        op: u8,
        field: &'static str,
        reason: String,
    },
}

/// A dispatch sequence number that does not advance the session.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("sequence {received} does not advance last sequence {last}")]
pub struct SequenceError {
    pub received: u64,
    pub last: u64,
}

/// Convenience type alias for `Result<T, GatewayError>`.
pub type Result<T> = std::result::Result<T, GatewayError>;
