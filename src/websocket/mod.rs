// WebSocket module - Transport seam and its tungstenite implementation
#[cfg(test)]
pub(crate) mod mock;
mod socket;
mod transport;

pub use socket::WebSocketConnector;
pub use transport::{Connector, Transport, TransportMessage};
