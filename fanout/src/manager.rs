use crate::io::{self, TransportIo};
use crate::registry::Registry;
use crate::session::{Session, DEFAULT_SESSION_TIMEOUT};
use log::*;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on each session's inbound and outbound queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default time a client gets to answer a server close before the transport drops it.
pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Per-session tunables applied to every session the manager opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub timeout: Duration,
    pub queue_capacity: usize,
    /// How long a transport waits for the close handshake to finish after the
    /// session asks it to close. Once it lapses the transport reports the
    /// disconnect itself.
    pub close_grace: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SESSION_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            close_grace: DEFAULT_CLOSE_GRACE,
        }
    }
}

/// Wires new connections to the shared registry.
pub struct Manager {
    registry: Arc<Registry>,
    settings: SessionSettings,
}

impl Manager {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            settings,
        }
    }

    /// Create a session for a newly accepted connection. The caller keeps the
    /// transport half and drives `Session::run` to completion.
    pub fn open_session(&self) -> (Session, TransportIo) {
        let (session_io, transport) = io::pair(self.settings.queue_capacity);
        info!("Opening session {}", transport.connection_id);

        let session = Session::new(
            Arc::clone(&self.registry),
            session_io,
            self.settings.timeout,
        );
        (session, transport)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}
