use crate::types::Result;
use async_trait::async_trait;

/// What the transport hands up to the connection driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMessage {
    /// One complete text frame
    Text(String),
    /// The peer closed the connection, with its close code if it sent one
    Closed { code: Option<u16>, reason: String },
}

/// Opens transports. Called once per connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>>;
}

/// One open duplex connection.
///
/// `recv` must be cancel safe: the driver races it against heartbeat and
/// shutdown signals and drops the future when another branch wins.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> Result<()>;

    /// Next message, or `None` once the stream has ended
    async fn recv(&mut self) -> Option<Result<TransportMessage>>;

    /// Sends a close frame with `code`. Errors are not interesting here.
    async fn close(&mut self, code: u16);
}
