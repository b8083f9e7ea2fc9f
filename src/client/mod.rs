// Module declarations
mod builder;
mod connection;
mod core;
mod driver;
mod session;
mod state;

// Public API exports
pub use builder::{GatewayClientBuilder, GatewayOptions};
pub use connection::{ConnectionManager, ConnectionState};
pub use self::core::GatewayClient;
pub use session::Session;
pub(crate) use state::ClientState;
