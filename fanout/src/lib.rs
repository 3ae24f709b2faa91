//! Real-time message fan-out core.
//!
//! Clients connect, submit messages tagged with a user identity, and receive
//! every message submitted by any connected client, plus a departure notice
//! whenever a user disconnects.
//!
//! # Architecture
//!
//! - **Registry**: process-wide map from user identity to that user's
//!   delivery handle, shared by all sessions.
//! - **Session**: one state machine per connection. It learns its user from
//!   the first inbound message, fans every message out through the registry,
//!   requests a normal close once its fixed deadline passes, and cleans up its
//!   registry entry on disconnect.
//! - **Transport**: whatever carries the connection (the `web` crate's
//!   WebSocket handler) talks to its session only through the channels built
//!   by [`io::pair`].
//!
//! # Backpressure
//!
//! Each session's outbound queue is bounded. A broadcast never waits on a
//! recipient: if the recipient's queue is full the message is dropped for that
//! recipient and a warning is logged.
//!
//! # Modules
//!
//! - `message`: the wire message and inbound validation
//! - `registry`: Registry, DeliveryHandle and ConnectionId
//! - `io`: channels between a session and its transport
//! - `session`: the per-connection event loop
//! - `manager`: creates sessions wired to the shared registry

pub mod error;
pub mod io;
pub mod manager;
pub mod message;
pub mod registry;
pub mod session;

pub use error::Error;
pub use manager::{Manager, SessionSettings};
pub use message::Message;
pub use registry::Registry;
pub use session::Session;
