pub mod constants;
pub mod diagnostic;
pub mod error;
pub mod frame;
pub mod intents;
pub mod payload;

pub use constants::*;
pub use diagnostic::Diagnostic;
pub use error::{DecodeError, GatewayError, Result, SequenceError};
pub use frame::{Frame, decode, encode};
pub use intents::Intents;
pub use payload::{ClientProperties, IdentifyPayload, PresenceUpdate, ResumePayload, Status};
