use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

/// Bit-set of event categories the client asks the gateway to deliver.
///
/// Sent once in the identify payload. The client never filters on it; the
/// server is trusted to only deliver what was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Intents(u64);

impl Intents {
    /// Guild create/update/delete and channel events
    pub const GUILDS: Self = Self(1 << 0);
    /// Member join/leave/update
    pub const GUILD_MEMBERS: Self = Self(1 << 1);
    pub const GUILD_PRESENCES: Self = Self(1 << 8);
    /// `MESSAGE_CREATE` / `MESSAGE_UPDATE` / `MESSAGE_DELETE` in guilds
    pub const GUILD_MESSAGES: Self = Self(1 << 9);
    pub const GUILD_MESSAGE_REACTIONS: Self = Self(1 << 10);
    pub const GUILD_MESSAGE_TYPING: Self = Self(1 << 11);
    pub const DIRECT_MESSAGES: Self = Self(1 << 12);
    /// Access to the `content` field of messages
    pub const MESSAGE_CONTENT: Self = Self(1 << 15);

    /// Guilds, guild messages and message content
    pub const DEFAULT: Self =
        Self(Self::GUILDS.0 | Self::GUILD_MESSAGES.0 | Self::MESSAGE_CONTENT.0);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for Intents {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl BitOr for Intents {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Intents {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
