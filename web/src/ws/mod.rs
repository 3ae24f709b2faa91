//! WebSocket endpoint for the fan-out core.
//!
//! The handler only upgrades the connection. The transport owns the socket,
//! translates frames to and from `fanout::Message`, and relays disconnects,
//! stream errors and close requests between the socket and its session.

pub(crate) mod handler;
pub(crate) mod transport;
