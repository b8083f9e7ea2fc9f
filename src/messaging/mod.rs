// Messaging module - Event names and dispatch to handlers
pub mod dispatcher;
pub mod event;

pub use dispatcher::{Dispatcher, HandlerResult, SubscriptionHandle};
pub use event::GatewayEvent;
