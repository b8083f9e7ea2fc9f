use super::driver::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Lifecycle bookkeeping for GatewayClient, behind one lock
pub(crate) struct ClientState {
    /// Driver task, present from `connect()` until `close()` collects it
    pub(crate) driver: Option<JoinHandle<()>>,

    /// Handed to the driver on the first `connect()`
    pub(crate) commands: Option<mpsc::UnboundedReceiver<Command>>,

    /// Set once `close()` ran; a closed client never starts again
    pub(crate) closed: bool,
}

impl ClientState {
    pub(crate) fn new(commands: mpsc::UnboundedReceiver<Command>) -> Self {
        Self {
            driver: None,
            commands: Some(commands),
            closed: false,
        }
    }

    /// Whether `connect()` has already started the driver
    pub(crate) fn started(&self) -> bool {
        self.commands.is_none()
    }
}
