use super::Intents;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client metadata sent with identify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for ClientProperties {
    fn default() -> Self {
        let agent = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
        Self {
            os: std::env::consts::OS.to_string(),
            browser: agent.to_string(),
            device: agent.to_string(),
        }
    }
}

/// Online status advertised in presence updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Online,
    Idle,
    Dnd,
    Invisible,
}

/// Presence payload, used both at identify time and for presence updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PresenceUpdate {
    pub since: Option<u64>,
    #[serde(default)]
    pub activities: Vec<Value>,
    pub status: Status,
    #[serde(default)]
    pub afk: bool,
}

impl PresenceUpdate {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Adds an activity object, e.g. `{"name": "Listening to commands", "type": 2}`
    pub fn with_activity(mut self, activity: Value) -> Self {
        self.activities.push(activity);
        self
    }
}

/// Payload of a fresh identify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub intents: Intents,
    pub properties: ClientProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<PresenceUpdate>,
}

/// Payload of a session resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    pub seq: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_serialization() {
        let presence = PresenceUpdate::new(Status::Dnd)
            .with_activity(serde_json::json!({"name": "chess", "type": 0}));
        let json = serde_json::to_value(&presence).unwrap();
        assert_eq!(json["status"], "dnd");
        assert_eq!(json["since"], Value::Null);
        assert_eq!(json["activities"][0]["name"], "chess");
        assert_eq!(json["afk"], false);
    }

    #[test]
    fn test_identify_omits_absent_shard_and_presence() {
        let identify = IdentifyPayload {
            token: "Bot abc".to_string(),
            intents: Intents::GUILDS,
            properties: ClientProperties::default(),
            shard: None,
            presence: None,
        };
        let json = serde_json::to_string(&identify).unwrap();
        assert!(!json.contains("shard"));
        assert!(!json.contains("presence"));
        assert!(json.contains(r#""intents":1"#));
    }

    #[test]
    fn test_default_properties_name_the_library() {
        let props = ClientProperties::default();
        assert!(props.browser.starts_with("fluxer-gateway/"));
        assert_eq!(props.browser, props.device);
    }
}
