use crate::io::{CloseCode, CloseRequest, SessionIo};
use crate::message::Message;
use crate::registry::{ConnectionId, Registry, UserId};
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Fixed lifetime of a session, counted from connection start.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Close frame reason sent when the session lifetime runs out.
pub const TIMEOUT_CLOSE_REASON: &str = "session expired";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Closed,
}

/// What a finished session did, returned to the transport for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub connection_id: ConnectionId,
    pub user: Option<UserId>,
    pub messages_received: u64,
    pub timed_out: bool,
}

/// Runtime state machine bound to one client connection.
///
/// The session learns its user identity from the first inbound message and
/// registers its outbound handle under that identity. Every inbound message is
/// broadcast to all registered users. When the deadline passes the session asks
/// the transport to close with a normal-closure code and keeps running until the
/// transport reports the disconnect; cleanup always happens on that disconnect.
pub struct Session {
    registry: Arc<Registry>,
    io: SessionIo,
    timeout: Duration,
    state: SessionState,
    user: Option<UserId>,
    messages_received: u64,
    timed_out: bool,
}

impl Session {
    pub fn new(registry: Arc<Registry>, io: SessionIo, timeout: Duration) -> Self {
        Self {
            registry,
            io,
            timeout,
            state: SessionState::Active,
            user: None,
            messages_received: 0,
            timed_out: false,
        }
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.io.connection_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Drive the event loop until the transport reports a disconnect.
    pub async fn run(mut self) -> SessionSummary {
        let deadline = sleep_until(Instant::now() + self.timeout);
        tokio::pin!(deadline);

        let mut inbound_open = true;
        let mut errors_open = true;

        debug!("Session {} started", self.io.connection_id);

        while self.state == SessionState::Active {
            tokio::select! {
                biased;

                () = &mut deadline, if !self.timed_out => self.on_timeout(),

                inbound = self.io.inbound.recv(), if inbound_open => match inbound {
                    Some(message) => self.on_message(message),
                    None => {
                        debug!("Session {} inbound stream ended", self.io.connection_id);
                        inbound_open = false;
                    }
                },

                err = self.io.errors.recv(), if errors_open => match err {
                    Some(err) => warn!(
                        "Stream error on session {}: {}",
                        self.io.connection_id, err
                    ),
                    None => errors_open = false,
                },

                _ = &mut self.io.disconnected => self.on_disconnect(),
            }
        }

        SessionSummary {
            connection_id: self.io.connection_id.clone(),
            user: self.user.clone(),
            messages_received: self.messages_received,
            timed_out: self.timed_out,
        }
    }

    fn on_message(&mut self, message: Message) {
        self.messages_received += 1;

        if let Some(bound) = &self.user {
            if bound != &message.user {
                debug!(
                    "Session {} is bound to {}, not rebinding to {}",
                    self.io.connection_id, bound, message.user
                );
            }
        } else {
            info!(
                "Session {} bound to user {}",
                self.io.connection_id, message.user
            );
            self.user = Some(message.user.clone());
            self.registry
                .register(message.user.clone(), self.io.outbound.clone());
        }

        self.registry.broadcast(&message);
    }

    fn on_timeout(&mut self) {
        self.timed_out = true;
        info!(
            "Session {} reached its {}s limit, closing connection",
            self.io.connection_id,
            self.timeout.as_secs()
        );
        let request = CloseRequest::new(CloseCode::NORMAL, TIMEOUT_CLOSE_REASON);
        if !self.io.close.request_close(request) {
            debug!(
                "Close already pending for session {}",
                self.io.connection_id
            );
        }
    }

    fn on_disconnect(&mut self) {
        self.state = SessionState::Closed;

        let Some(user) = self.user.as_deref() else {
            debug!(
                "Session {} disconnected before sending anything",
                self.io.connection_id
            );
            return;
        };

        // A newer connection for the same user owns the entry now; leave it and
        // stay quiet, that user has not left.
        if !self.registry.unregister_owned(user, &self.io.connection_id) {
            debug!(
                "Session {} no longer owns user {}, skipping departure notice",
                self.io.connection_id, user
            );
            return;
        }

        let notice = Message::departure(user);
        info!("{}", notice.text);
        self.registry.broadcast(&notice);
    }
}
