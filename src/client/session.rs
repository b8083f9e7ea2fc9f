use crate::types::SequenceError;

/// Resumable identity of the current gateway session.
///
/// Owned by the connection driver. Readers get copies through
/// [`GatewayClient::session`](crate::GatewayClient::session).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    session_id: Option<String>,
    last_sequence: Option<u64>,
    resumable: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    pub fn resumable(&self) -> bool {
        self.resumable
    }

    /// A resume needs a session id, a sequence to replay from, and no
    /// server verdict against it.
    pub fn can_resume(&self) -> bool {
        self.resumable && self.session_id.is_some() && self.last_sequence.is_some()
    }

    /// Records the sequence number of an incoming dispatch.
    ///
    /// Frames without a sequence leave the session untouched. A sequence at
    /// or below the last one recorded is rejected and not applied.
    pub fn record(&mut self, sequence: Option<u64>) -> Result<(), SequenceError> {
        let Some(received) = sequence else {
            return Ok(());
        };

        match self.last_sequence {
            Some(last) if received <= last => Err(SequenceError { received, last }),
            _ => {
                self.last_sequence = Some(received);
                Ok(())
            }
        }
    }

    /// Takes on the session id the server handed out in READY
    pub fn adopt(&mut self, session_id: impl Into<String>) {
        self.session_id = Some(session_id.into());
        self.resumable = true;
    }

    /// Applies the server's invalid-session verdict. A resumable verdict
    /// leaves the session as is; otherwise id and sequence are dropped and
    /// the next handshake is a fresh identify.
    pub fn invalidate(&mut self, resumable: bool) {
        if resumable {
            return;
        }
        self.session_id = None;
        self.last_sequence = None;
        self.resumable = false;
    }
}
