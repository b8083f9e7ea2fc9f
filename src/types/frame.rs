use super::constants::opcodes;
use super::error::DecodeError;
use super::payload::{IdentifyPayload, PresenceUpdate, ResumePayload};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded gateway frame.
///
/// Server frames: `Hello`, `Dispatch`, `HeartbeatAck`, `Reconnect`,
/// `InvalidSession`, and `Heartbeat` (an immediate-beat request).
/// Client frames: `Heartbeat`, `Identify`, `Resume`, `PresenceUpdate`.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Hello {
        heartbeat_interval_ms: u64,
    },
    Dispatch {
        sequence: Option<u64>,
        event: String,
        payload: Value,
    },
    Heartbeat {
        last_sequence: Option<u64>,
    },
    HeartbeatAck,
    Reconnect,
    InvalidSession {
        resumable: bool,
    },
    Identify(IdentifyPayload),
    Resume(ResumePayload),
    PresenceUpdate(PresenceUpdate),
}

/// Wire envelope: `{"op": .., "d": .., "s": .., "t": ..}`
#[derive(Debug, Serialize, Deserialize)]
struct RawFrame {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    t: Option<String>,
}

impl Frame {
    pub fn opcode(&self) -> u8 {
        match self {
            Self::Hello { .. } => opcodes::HELLO,
            Self::Dispatch { .. } => opcodes::DISPATCH,
            Self::Heartbeat { .. } => opcodes::HEARTBEAT,
            Self::HeartbeatAck => opcodes::HEARTBEAT_ACK,
            Self::Reconnect => opcodes::RECONNECT,
            Self::InvalidSession { .. } => opcodes::INVALID_SESSION,
            Self::Identify(_) => opcodes::IDENTIFY,
            Self::Resume(_) => opcodes::RESUME,
            Self::PresenceUpdate(_) => opcodes::PRESENCE_UPDATE,
        }
    }

    /// Short name used in logs. Never includes payload contents.
    pub fn name(&self) -> &str {
        match self {
            Self::Hello { .. } => "HELLO",
            Self::Dispatch { event, .. } => event.as_str(),
            Self::Heartbeat { .. } => "HEARTBEAT",
            Self::HeartbeatAck => "HEARTBEAT_ACK",
            Self::Reconnect => "RECONNECT",
            Self::InvalidSession { .. } => "INVALID_SESSION",
            Self::Identify(_) => "IDENTIFY",
            Self::Resume(_) => "RESUME",
            Self::PresenceUpdate(_) => "PRESENCE_UPDATE",
        }
    }

    fn from_raw(raw: RawFrame) -> Result<Self, DecodeError> {
        let op = raw.op;
        match op {
            opcodes::HELLO => {
                let interval = raw
                    .d
                    .get("heartbeat_interval")
                    .ok_or(DecodeError::MissingField {
                        op,
                        field: "heartbeat_interval",
                    })?;
                let heartbeat_interval_ms = interval.as_u64().ok_or_else(|| {
                    DecodeError::InvalidField {
                        op,
                        field: "heartbeat_interval",
                        reason: format!("expected a non-negative integer, got {interval}"),
                    }
                })?;
                Ok(Self::Hello {
                    heartbeat_interval_ms,
                })
            }
            opcodes::DISPATCH => {
                let event = raw.t.ok_or(DecodeError::MissingField { op, field: "t" })?;
                Ok(Self::Dispatch {
                    sequence: raw.s,
                    event,
                    payload: raw.d,
                })
            }
            opcodes::HEARTBEAT => {
                let last_sequence = match raw.d {
                    Value::Null => None,
                    ref d => Some(d.as_u64().ok_or_else(|| DecodeError::InvalidField {
                        op,
                        field: "d",
                        reason: format!("expected a sequence or null, got {d}"),
                    })?),
                };
                Ok(Self::Heartbeat { last_sequence })
            }
            opcodes::HEARTBEAT_ACK => Ok(Self::HeartbeatAck),
            opcodes::RECONNECT => Ok(Self::Reconnect),
            opcodes::INVALID_SESSION => {
                let resumable = match raw.d {
                    Value::Null => false,
                    Value::Bool(resumable) => resumable,
                    ref d => {
                        return Err(DecodeError::InvalidField {
                            op,
                            field: "d",
                            reason: format!("expected a boolean, got {d}"),
                        });
                    }
                };
                Ok(Self::InvalidSession { resumable })
            }
            opcodes::IDENTIFY => Ok(Self::Identify(payload_from(op, raw.d)?)),
            opcodes::RESUME => Ok(Self::Resume(payload_from(op, raw.d)?)),
            opcodes::PRESENCE_UPDATE => Ok(Self::PresenceUpdate(payload_from(op, raw.d)?)),
            other => Err(DecodeError::UnknownOpcode(other)),
        }
    }

    fn into_raw(self) -> Result<RawFrame, serde_json::Error> {
        let op = self.opcode();
        let (d, s, t) = match self {
            Self::Hello {
                heartbeat_interval_ms,
            } => (
                serde_json::json!({ "heartbeat_interval": heartbeat_interval_ms }),
                None,
                None,
            ),
            Self::Dispatch {
                sequence,
                event,
                payload,
            } => (payload, sequence, Some(event)),
            Self::Heartbeat { last_sequence } => (serde_json::to_value(last_sequence)?, None, None),
            Self::HeartbeatAck | Self::Reconnect => (Value::Null, None, None),
            Self::InvalidSession { resumable } => (Value::Bool(resumable), None, None),
            Self::Identify(payload) => (serde_json::to_value(payload)?, None, None),
            Self::Resume(payload) => (serde_json::to_value(payload)?, None, None),
            Self::PresenceUpdate(payload) => (serde_json::to_value(payload)?, None, None),
        };
        Ok(RawFrame { op, d, s, t })
    }
}

fn payload_from<T: serde::de::DeserializeOwned>(op: u8, d: Value) -> Result<T, DecodeError> {
    serde_json::from_value(d).map_err(|e| DecodeError::InvalidField {
        op,
        field: "d",
        reason: e.to_string(),
    })
}

/// Decodes one text frame received from the gateway.
pub fn decode(text: &str) -> Result<Frame, DecodeError> {
    let raw: RawFrame = serde_json::from_str(text)?;
    Frame::from_raw(raw)
}

/// Encodes a frame into the JSON text sent over the wire.
pub fn encode(frame: &Frame) -> Result<String, serde_json::Error> {
    let raw = frame.clone().into_raw()?;
    serde_json::to_string(&raw)
}
