use crate::types::constants::gateway_events;

/// Type-safe gateway dispatch event names.
///
/// The set of events is open-ended and defined by the server; anything not
/// listed here is carried as [`GatewayEvent::Custom`]. Names are normalized
/// to upper case, so `"message_create"` and `"MESSAGE_CREATE"` are the same
/// event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GatewayEvent {
    /// Identify acknowledged; carries the session id
    Ready,
    /// Resume acknowledged
    Resumed,
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    MessageReactionAdd,
    MessageReactionRemove,
    GuildCreate,
    GuildUpdate,
    GuildDelete,
    GuildMemberAdd,
    GuildMemberUpdate,
    GuildMemberRemove,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    TypingStart,
    PresenceUpdate,
    /// Any other server-defined event
    Custom(String),
}

impl GatewayEvent {
    /// Parse an event name, case-insensitively
    pub fn parse(s: &str) -> Self {
        let name = s.to_ascii_uppercase();
        match name.as_str() {
            gateway_events::READY => Self::Ready,
            gateway_events::RESUMED => Self::Resumed,
            gateway_events::MESSAGE_CREATE => Self::MessageCreate,
            gateway_events::MESSAGE_UPDATE => Self::MessageUpdate,
            gateway_events::MESSAGE_DELETE => Self::MessageDelete,
            gateway_events::MESSAGE_REACTION_ADD => Self::MessageReactionAdd,
            gateway_events::MESSAGE_REACTION_REMOVE => Self::MessageReactionRemove,
            gateway_events::GUILD_CREATE => Self::GuildCreate,
            gateway_events::GUILD_UPDATE => Self::GuildUpdate,
            gateway_events::GUILD_DELETE => Self::GuildDelete,
            gateway_events::GUILD_MEMBER_ADD => Self::GuildMemberAdd,
            gateway_events::GUILD_MEMBER_UPDATE => Self::GuildMemberUpdate,
            gateway_events::GUILD_MEMBER_REMOVE => Self::GuildMemberRemove,
            gateway_events::CHANNEL_CREATE => Self::ChannelCreate,
            gateway_events::CHANNEL_UPDATE => Self::ChannelUpdate,
            gateway_events::CHANNEL_DELETE => Self::ChannelDelete,
            gateway_events::TYPING_START => Self::TypingStart,
            gateway_events::PRESENCE_UPDATE => Self::PresenceUpdate,
            _ => Self::Custom(name),
        }
    }

    /// Convert event to string representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ready => gateway_events::READY,
            Self::Resumed => gateway_events::RESUMED,
            Self::MessageCreate => gateway_events::MESSAGE_CREATE,
            Self::MessageUpdate => gateway_events::MESSAGE_UPDATE,
            Self::MessageDelete => gateway_events::MESSAGE_DELETE,
            Self::MessageReactionAdd => gateway_events::MESSAGE_REACTION_ADD,
            Self::MessageReactionRemove => gateway_events::MESSAGE_REACTION_REMOVE,
            Self::GuildCreate => gateway_events::GUILD_CREATE,
            Self::GuildUpdate => gateway_events::GUILD_UPDATE,
            Self::GuildDelete => gateway_events::GUILD_DELETE,
            Self::GuildMemberAdd => gateway_events::GUILD_MEMBER_ADD,
            Self::GuildMemberUpdate => gateway_events::GUILD_MEMBER_UPDATE,
            Self::GuildMemberRemove => gateway_events::GUILD_MEMBER_REMOVE,
            Self::ChannelCreate => gateway_events::CHANNEL_CREATE,
            Self::ChannelUpdate => gateway_events::CHANNEL_UPDATE,
            Self::ChannelDelete => gateway_events::CHANNEL_DELETE,
            Self::TypingStart => gateway_events::TYPING_START,
            Self::PresenceUpdate => gateway_events::PRESENCE_UPDATE,
            Self::Custom(s) => s.as_str(),
        }
    }
}

impl From<&str> for GatewayEvent {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for GatewayEvent {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<&String> for GatewayEvent {
    fn from(s: &String) -> Self {
        Self::parse(s)
    }
}

impl std::fmt::Display for GatewayEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
