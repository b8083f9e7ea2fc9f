/// Gateway opcodes (Discord-compatible numbering)
pub mod opcodes {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const PRESENCE_UPDATE: u8 = 3;
    pub const RESUME: u8 = 6;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Dispatch event names with protocol meaning (magic strings layer)
pub mod gateway_events {
    pub const READY: &str = "READY";
    pub const RESUMED: &str = "RESUMED";
    pub const MESSAGE_CREATE: &str = "MESSAGE_CREATE";
    pub const MESSAGE_UPDATE: &str = "MESSAGE_UPDATE";
    pub const MESSAGE_DELETE: &str = "MESSAGE_DELETE";
    pub const MESSAGE_REACTION_ADD: &str = "MESSAGE_REACTION_ADD";
    pub const MESSAGE_REACTION_REMOVE: &str = "MESSAGE_REACTION_REMOVE";
    pub const GUILD_CREATE: &str = "GUILD_CREATE";
    pub const GUILD_UPDATE: &str = "GUILD_UPDATE";
    pub const GUILD_DELETE: &str = "GUILD_DELETE";
    pub const GUILD_MEMBER_ADD: &str = "GUILD_MEMBER_ADD";
    pub const GUILD_MEMBER_UPDATE: &str = "GUILD_MEMBER_UPDATE";
    pub const GUILD_MEMBER_REMOVE: &str = "GUILD_MEMBER_REMOVE";
    pub const CHANNEL_CREATE: &str = "CHANNEL_CREATE";
    pub const CHANNEL_UPDATE: &str = "CHANNEL_UPDATE";
    pub const CHANNEL_DELETE: &str = "CHANNEL_DELETE";
    pub const TYPING_START: &str = "TYPING_START";
    pub const PRESENCE_UPDATE: &str = "PRESENCE_UPDATE";
}

/// Close codes sent by the gateway when it terminates a connection
pub mod close_codes {
    pub const UNKNOWN_ERROR: u16 = 4000;
    pub const AUTHENTICATION_FAILED: u16 = 4004;
    pub const INVALID_SEQ: u16 = 4007;
    pub const SESSION_TIMED_OUT: u16 = 4009;
    pub const INVALID_SHARD: u16 = 4010;
    pub const SHARDING_REQUIRED: u16 = 4011;
    pub const INVALID_API_VERSION: u16 = 4012;
    pub const INVALID_INTENTS: u16 = 4013;
    pub const DISALLOWED_INTENTS: u16 = 4014;
}

/// Gateway protocol version appended to URLs without a query string
pub const GATEWAY_VERSION: &str = "1";

/// Payload encoding requested from the gateway
pub const GATEWAY_ENCODING: &str = "json";

/// Default heartbeat interval used until the server's Hello arrives (milliseconds)
pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 41_250;

/// Default reconnect backoff bounds (milliseconds)
pub const DEFAULT_MIN_BACKOFF: u64 = 1_000;
pub const DEFAULT_MAX_BACKOFF: u64 = 60_000;

/// Delay before reconnecting after an invalid session (milliseconds)
pub const DEFAULT_INVALID_SESSION_DELAY: u64 = 3_000;

/// Time allowed between transport open and the identify/resume ack (milliseconds)
pub const HANDSHAKE_TIMEOUT: u64 = 30_000;

/// Time allowed for a close handshake before the transport is dropped (milliseconds)
pub const TRANSPORT_CLOSE_TIMEOUT: u64 = 1_000;

/// Consecutive protocol violations tolerated before the connection is recycled
pub const DEFAULT_MAX_PROTOCOL_VIOLATIONS: u32 = 10;

/// Grace period given to in-flight handlers on close (milliseconds)
pub const DEFAULT_HANDLER_GRACE_PERIOD: u64 = 5_000;

/// Capacity of the diagnostics broadcast channel
pub const DIAGNOSTICS_CAPACITY: usize = 256;

/// WebSocket close codes
pub const WS_CLOSE_NORMAL: u16 = 1000;
