use crate::message::Message;
use dashmap::DashMap;
use log::*;
use std::collections::HashSet;
use tokio::sync::mpsc::{self, error::TrySendError};

/// User identity as supplied by the client on each message.
pub type UserId = String;

/// Unique identifier for a session's connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a single non-blocking delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// The recipient's queue was full and the message was discarded.
    Dropped,
    /// The recipient's session is gone.
    Closed,
}

/// Write-only handle used to enqueue outbound messages to one session.
///
/// The queue behind it is bounded; `deliver` never waits for space.
#[derive(Debug, Clone)]
pub struct DeliveryHandle {
    connection_id: ConnectionId,
    sender: mpsc::Sender<Message>,
}

impl DeliveryHandle {
    pub fn new(connection_id: ConnectionId, sender: mpsc::Sender<Message>) -> Self {
        Self {
            connection_id,
            sender,
        }
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    pub fn deliver(&self, message: &Message) -> Delivery {
        match self.sender.try_send(message.clone()) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Dropped,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

/// Per-call tally of what happened to a broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub queued: usize,
    pub dropped: usize,
    pub closed: usize,
}

impl BroadcastReport {
    pub fn recipients(&self) -> usize {
        self.queued + self.dropped + self.closed
    }
}

/// Process-wide mapping from user identity to that user's delivery handle.
///
/// All access goes through the DashMap's shard locks, so sessions running on
/// different worker threads can register, unregister and broadcast concurrently.
/// A broadcast clones the handles out first and sends after the locks are
/// released, so a recipient can never hold up registry mutation.
pub struct Registry {
    senders: DashMap<UserId, DeliveryHandle>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            senders: DashMap::new(),
        }
    }

    /// Insert or overwrite the handle for `user`. Last write wins.
    pub fn register(&self, user: UserId, handle: DeliveryHandle) {
        let connection_id = handle.connection_id().clone();
        if let Some(previous) = self.senders.insert(user.clone(), handle) {
            if previous.connection_id() != &connection_id {
                warn!(
                    "User {} re-registered by connection {}, connection {} will no longer receive messages",
                    user,
                    connection_id,
                    previous.connection_id()
                );
            }
        }
        debug!("Registered user {} on connection {}", user, connection_id);
    }

    /// Remove the handle for `user`. Returns whether an entry was present.
    pub fn unregister(&self, user: &str) -> bool {
        let removed = self.senders.remove(user).is_some();
        if removed {
            debug!("Unregistered user {}", user);
        }
        removed
    }

    /// Remove the entry for `user` only while it still belongs to `connection_id`.
    ///
    /// A session whose entry was taken over by a newer connection for the same
    /// user must not remove the newer one. Returns whether an entry was removed.
    pub fn unregister_owned(&self, user: &str, connection_id: &ConnectionId) -> bool {
        let removed = self
            .senders
            .remove_if(user, |_, handle| handle.connection_id() == connection_id)
            .is_some();
        if removed {
            debug!("Unregistered user {} from connection {}", user, connection_id);
        }
        removed
    }

    /// Deliver `message` to every registered handle, the sender's own included.
    pub fn broadcast(&self, message: &Message) -> BroadcastReport {
        let recipients: Vec<(UserId, DeliveryHandle)> = self
            .senders
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut report = BroadcastReport::default();
        for (user, handle) in recipients {
            match handle.deliver(message) {
                Delivery::Queued => report.queued += 1,
                Delivery::Dropped => {
                    warn!(
                        "Outbound queue full for user {} (connection {}), dropping message from {}",
                        user,
                        handle.connection_id(),
                        message.user
                    );
                    report.dropped += 1;
                }
                Delivery::Closed => {
                    warn!(
                        "Failed to deliver message to user {}: connection {} is closed",
                        user,
                        handle.connection_id()
                    );
                    report.closed += 1;
                }
            }
        }

        trace!(
            "Broadcast from {} reached {} recipient(s)",
            message.user,
            report.queued
        );
        report
    }

    pub fn snapshot_keys(&self) -> HashSet<UserId> {
        self.senders.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn contains(&self, user: &str) -> bool {
        self.senders.contains_key(user)
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
