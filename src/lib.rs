//! # Fluxer Gateway
//!
//! A Rust client for the Fluxer real-time gateway (Discord-compatible
//! WebSocket protocol). It keeps one session alive across network drops,
//! resumes where it left off, and delivers every dispatch to your handlers
//! exactly in wire order.
//!
//! ## Example
//!
//! ```no_run
//! use fluxer_gateway::{GatewayClient, GatewayOptions, Intents};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GatewayClient::new(
//!         "wss://gateway.fluxer.app",
//!         GatewayOptions {
//!             token: "your-bot-token".to_string(),
//!             intents: Intents::DEFAULT | Intents::GUILD_MEMBERS,
//!             ..Default::default()
//!         }
//!     )?;
//!
//!     client.on("MESSAGE_CREATE", |message| async move {
//!         println!("{}: {}", message["author"]["username"], message["content"]);
//!         Ok(())
//!     }).await;
//!
//!     client.connect().await?;
//!     client.closed().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod infrastructure;
pub mod messaging;
pub mod types;
pub mod websocket;

pub use client::{ConnectionState, GatewayClient, GatewayClientBuilder, GatewayOptions, Session};
pub use infrastructure::BackoffConfig;
pub use messaging::{GatewayEvent, HandlerResult, SubscriptionHandle};
pub use types::{
    ClientProperties, Diagnostic, Frame, GatewayError, Intents, PresenceUpdate, Result, Status,
};
pub use websocket::{Connector, Transport, TransportMessage, WebSocketConnector};
