use super::GatewayClient;
use crate::infrastructure::BackoffConfig;
use crate::types::{
    ClientProperties, DEFAULT_HANDLER_GRACE_PERIOD, DEFAULT_INVALID_SESSION_DELAY,
    DEFAULT_MAX_PROTOCOL_VIOLATIONS, GATEWAY_ENCODING, GATEWAY_VERSION, GatewayError, Intents,
    PresenceUpdate, Result, Status,
};
use crate::websocket::{Connector, WebSocketConnector};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Configuration for a [`GatewayClient`].
#[derive(Clone)]
pub struct GatewayOptions {
    /// Bot or user token sent in identify and resume. Required.
    pub token: String,
    pub intents: Intents,
    pub properties: ClientProperties,
    /// `[shard_id, shard_count]`
    pub shard: Option<[u32; 2]>,
    /// Presence announced with identify, online by default
    pub presence: Option<PresenceUpdate>,
    pub backoff: BackoffConfig,
    /// Fixed wait after the server invalidates the session
    pub invalid_session_delay: Duration,
    /// Consecutive attempts that may fail to reach `Connected` before the
    /// client gives up. A handshake answered with an invalid session counts
    /// as a failed attempt. `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
    /// Consecutive undecodable or out-of-order frames tolerated before the
    /// connection is dropped
    pub max_protocol_violations: u32,
    /// How long `close()` lets queued handler invocations finish
    pub handler_grace_period: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            token: String::new(),
            intents: Intents::default(),
            properties: ClientProperties::default(),
            shard: None,
            presence: Some(PresenceUpdate::new(Status::Online)),
            backoff: BackoffConfig::default(),
            invalid_session_delay: Duration::from_millis(DEFAULT_INVALID_SESSION_DELAY),
            max_reconnect_attempts: None,
            max_protocol_violations: DEFAULT_MAX_PROTOCOL_VIOLATIONS,
            handler_grace_period: Duration::from_millis(DEFAULT_HANDLER_GRACE_PERIOD),
        }
    }
}

impl fmt::Debug for GatewayOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayOptions")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("properties", &self.properties)
            .field("shard", &self.shard)
            .field("presence", &self.presence)
            .field("backoff", &self.backoff)
            .field("invalid_session_delay", &self.invalid_session_delay)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("max_protocol_violations", &self.max_protocol_violations)
            .field("handler_grace_period", &self.handler_grace_period)
            .finish()
    }
}

impl GatewayOptions {
    fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(GatewayError::InvalidOptions("token is required".to_string()));
        }
        self.backoff.validate().map_err(GatewayError::InvalidOptions)?;
        if self.max_reconnect_attempts == Some(0) {
            return Err(GatewayError::InvalidOptions(
                "max_reconnect_attempts must be > 0".to_string(),
            ));
        }
        if self.max_protocol_violations == 0 {
            return Err(GatewayError::InvalidOptions(
                "max_protocol_violations must be > 0".to_string(),
            ));
        }
        if let Some([id, count]) = self.shard
            && id >= count
        {
            return Err(GatewayError::InvalidOptions(format!(
                "shard id {id} is out of range for {count} shard(s)"
            )));
        }
        Ok(())
    }
}

/// Builder for GatewayClient that validates options and picks a transport
pub struct GatewayClientBuilder {
    url: String,
    options: GatewayOptions,
    connector: Arc<dyn Connector>,
}

impl GatewayClientBuilder {
    /// Create a new builder. Fails on a malformed URL or invalid options.
    pub fn new(url: impl AsRef<str>, options: GatewayOptions) -> Result<Self> {
        options.validate()?;
        let url = gateway_url(url.as_ref())?;

        Ok(Self {
            url,
            options,
            connector: Arc::new(WebSocketConnector),
        })
    }

    /// Replaces the default WebSocket transport
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Build the client. Nothing is spawned until `connect()`.
    pub fn build(self) -> GatewayClient {
        GatewayClient::from_parts(self.url, self.options, self.connector)
    }
}

/// Appends the protocol version and encoding when the caller gave no query
fn gateway_url(raw: &str) -> Result<String> {
    let mut url = Url::parse(raw)?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(GatewayError::InvalidOptions(format!(
                "gateway URL must use ws or wss, got {other}"
            )));
        }
    }

    if url.query().is_none() {
        url.query_pairs_mut()
            .append_pair("v", GATEWAY_VERSION)
            .append_pair("encoding", GATEWAY_ENCODING);
    }
    Ok(url.to_string())
}
