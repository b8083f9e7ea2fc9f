use super::driver::{Command, Driver, Shared};
use super::{
    ClientState, ConnectionManager, ConnectionState, GatewayClientBuilder, GatewayOptions, Session,
};
use crate::infrastructure::HeartbeatTimer;
use crate::messaging::{Dispatcher, GatewayEvent, HandlerResult, SubscriptionHandle};
use crate::types::{DIAGNOSTICS_CAPACITY, Diagnostic, GatewayError, PresenceUpdate, Result};
use crate::websocket::Connector;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, mpsc, watch};

/// The main entry point for the Fluxer gateway.
///
/// `GatewayClient` keeps one session with the gateway alive: it identifies or
/// resumes, heartbeats, reconnects with exponential backoff, and hands every
/// dispatch to the handlers registered with [`on()`](Self::on), in wire
/// order and without duplicates.
///
/// Cloning is cheap; all clones drive the same connection. When the last
/// clone is dropped the connection shuts down.
///
/// # Example
///
/// ```no_run
/// use fluxer_gateway::{GatewayClient, GatewayOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = GatewayClient::new(
///     "wss://gateway.fluxer.app",
///     GatewayOptions {
///         token: "your-bot-token".to_string(),
///         ..Default::default()
///     }
/// )?;
///
/// client.on("MESSAGE_CREATE", |message| async move {
///     println!("{}", message["content"]);
///     Ok(())
/// }).await;
///
/// client.connect().await?;
/// client.closed().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GatewayClient {
    pub(crate) url: String,
    pub(crate) options: Arc<GatewayOptions>,
    pub(crate) connector: Arc<dyn Connector>,

    // Shared with the driver
    pub(crate) connection: Arc<ConnectionManager>,
    pub(crate) session: Arc<watch::Sender<Session>>,
    pub(crate) heartbeat: Arc<Mutex<HeartbeatTimer>>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) diagnostics: broadcast::Sender<Diagnostic>,
    pub(crate) fatal: Arc<Mutex<Option<GatewayError>>>,

    // Client side only; dropping the last sender stops the driver
    pub(crate) shutdown: Arc<watch::Sender<bool>>,
    pub(crate) commands: mpsc::UnboundedSender<Command>,
    pub(crate) state: Arc<Mutex<ClientState>>,
}

impl GatewayClient {
    /// Creates a new GatewayClient using the default WebSocket transport.
    ///
    /// This validates the options but does not connect. Call
    /// [`connect()`](Self::connect) to start the session.
    ///
    /// # Arguments
    ///
    /// * `url` - The gateway URL as returned by the REST API. `v=1&encoding=json`
    ///   is appended when the URL has no query string.
    /// * `options` - Token, intents and reconnect tuning
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UrlParse`] for a malformed URL and
    /// [`GatewayError::InvalidOptions`] for an empty token or inconsistent
    /// limits.
    pub fn new(url: impl AsRef<str>, options: GatewayOptions) -> Result<Self> {
        GatewayClientBuilder::new(url, options).map(|builder| builder.build())
    }

    /// Starts a builder, mainly to plug in a custom [`Connector`]
    pub fn builder(url: impl AsRef<str>, options: GatewayOptions) -> Result<GatewayClientBuilder> {
        GatewayClientBuilder::new(url, options)
    }

    pub(crate) fn from_parts(
        url: String,
        options: GatewayOptions,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (diagnostics, _) = broadcast::channel(DIAGNOSTICS_CAPACITY);
        let (session, _) = watch::channel(Session::new());
        let (shutdown, _) = watch::channel(false);
        let (commands, command_rx) = mpsc::unbounded_channel();

        Self {
            url,
            options: Arc::new(options),
            connector,
            connection: Arc::new(ConnectionManager::new(diagnostics.clone())),
            session: Arc::new(session),
            heartbeat: Arc::new(Mutex::new(HeartbeatTimer::default())),
            dispatcher: Arc::new(Dispatcher::new(diagnostics.clone())),
            diagnostics,
            fatal: Arc::new(Mutex::new(None)),
            shutdown: Arc::new(shutdown),
            commands,
            state: Arc::new(Mutex::new(ClientState::new(command_rx))),
        }
    }

    /// Starts the connection in the background.
    ///
    /// Returns as soon as the driver task is running; the handshake, and any
    /// reconnects after it, happen asynchronously. Watch
    /// [`state_changes()`](Self::state_changes) to learn when the session is
    /// up and [`closed()`](Self::closed) to learn why it ended. Calling this
    /// again while running is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Closed`] if the client was closed.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use fluxer_gateway::{ConnectionState, GatewayClient, GatewayOptions};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let client = GatewayClient::new(
    /// #     "wss://gateway.fluxer.app",
    /// #     GatewayOptions { token: "your-bot-token".to_string(), ..Default::default() }
    /// # )?;
    /// client.connect().await?;
    ///
    /// let mut states = client.state_changes();
    /// states.wait_for(|state| *state == ConnectionState::Connected).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed || self.connection.state() == ConnectionState::Closed {
            return Err(GatewayError::Closed);
        }
        let Some(commands) = state.commands.take() else {
            return Ok(());
        };

        let driver = Driver::new(
            Shared {
                url: self.url.clone(),
                options: Arc::clone(&self.options),
                connector: Arc::clone(&self.connector),
                connection: Arc::clone(&self.connection),
                session: Arc::clone(&self.session),
                heartbeat: Arc::clone(&self.heartbeat),
                dispatcher: Arc::clone(&self.dispatcher),
                diagnostics: self.diagnostics.clone(),
                fatal: Arc::clone(&self.fatal),
            },
            self.shutdown.subscribe(),
            commands,
        );
        state.driver = Some(tokio::spawn(driver.run()));

        tracing::debug!("Gateway driver started");
        Ok(())
    }

    /// Closes the connection for good.
    ///
    /// Cancels any pending backoff, in-flight connect and heartbeat, closes
    /// the transport, and gives queued handler invocations up to
    /// `handler_grace_period` to finish. Safe to call from any state, more
    /// than once, and from several tasks at the same time; every call
    /// returns once the client is `Closed`.
    pub async fn close(&self) {
        self.shutdown.send_replace(true);

        let (driver, never_started) = {
            let mut state = self.state.lock().await;
            state.closed = true;
            let never_started = state.commands.take().is_some();
            (state.driver.take(), never_started)
        };

        if never_started {
            self.connection.set_state(ConnectionState::Closed);
            self.dispatcher
                .shutdown(self.options.handler_grace_period)
                .await;
        } else if let Some(driver) = driver
            && let Err(e) = driver.await
        {
            tracing::error!("Gateway driver ended abnormally: {}", e);
            self.connection.set_state(ConnectionState::Closed);
        }

        self.wait_closed().await;
        tracing::info!("Gateway client closed");
    }

    /// Waits until the client is `Closed`.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the client when it stopped on its own:
    /// [`GatewayError::AuthenticationRejected`], [`GatewayError::Rejected`] or
    /// [`GatewayError::ReconnectExhausted`]. A client stopped by
    /// [`close()`](Self::close) returns `Ok(())`.
    pub async fn closed(&self) -> Result<()> {
        self.wait_closed().await;
        match self.fatal.lock().await.as_ref() {
            Some(error) => Err(error.reissue()),
            None => Ok(()),
        }
    }

    async fn wait_closed(&self) {
        let mut states = self.connection.subscribe();
        let _ = states
            .wait_for(|state| *state == ConnectionState::Closed)
            .await;
    }

    /// Registers a handler for a dispatch event.
    ///
    /// Event names are case-insensitive (`"message_create"` and
    /// `"MESSAGE_CREATE"` are the same). Each handler gets the dispatch
    /// payload in wire order. A handler that errors or panics is reported
    /// through [`diagnostics()`](Self::diagnostics) and does not affect
    /// other handlers or the connection.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use fluxer_gateway::{GatewayClient, GatewayEvent};
    ///
    /// # async fn example(client: GatewayClient) {
    /// let handle = client.on(GatewayEvent::GuildCreate, |guild| async move {
    ///     println!("joined {}", guild["name"]);
    ///     Ok(())
    /// }).await;
    ///
    /// client.unsubscribe(&handle).await;
    /// # }
    /// ```
    pub async fn on<F, Fut>(&self, event: impl Into<GatewayEvent>, handler: F) -> SubscriptionHandle
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.dispatcher.subscribe(event, handler).await
    }

    /// Removes a handler. Returns `false` if it was already removed.
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.dispatcher.unsubscribe(handle).await
    }

    /// Queues a presence update. It is written as soon as the session is
    /// `Connected`, so an update made during a reconnect is not lost.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NotConnected`] before [`connect()`](Self::connect),
    /// [`GatewayError::Closed`] after the client closed.
    pub async fn update_presence(&self, presence: PresenceUpdate) -> Result<()> {
        {
            let state = self.state.lock().await;
            if state.closed || self.connection.state() == ConnectionState::Closed {
                return Err(GatewayError::Closed);
            }
            if !state.started() {
                return Err(GatewayError::NotConnected);
            }
        }

        self.commands
            .send(Command::UpdatePresence(presence))
            .map_err(|_| GatewayError::Closed)
    }

    /// Gets the current connection state
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Checks if the session is currently established
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Watches connection state transitions
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    /// Snapshot of the session the client would resume
    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    /// Round trip of the last acknowledged heartbeat
    pub async fn latency(&self) -> Option<Duration> {
        self.heartbeat.lock().await.latency()
    }

    /// Subscribes to non-fatal events: state changes, dropped frames,
    /// reconnects and handler failures.
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.diagnostics.subscribe()
    }
}
