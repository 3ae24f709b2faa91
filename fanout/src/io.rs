//! The channels linking a session to the connection that carries it.
//!
//! A transport accepts a connection, calls [`pair`], keeps the [`TransportIo`]
//! half and hands the [`SessionIo`] half to a session. From then on the two
//! sides only talk through these primitives:
//!
//! - inbound messages (transport -> session)
//! - outbound messages (registry -> transport), via the session's [`DeliveryHandle`]
//! - a one-shot disconnect signal (transport -> session)
//! - non-fatal stream errors (transport -> session)
//! - close requests (session -> transport)

use crate::error::Error;
use crate::message::Message;
use crate::registry::{ConnectionId, DeliveryHandle};
use tokio::sync::{mpsc, oneshot};

/// Capacity of the stream error channel. A transport that finds it full logs the error instead.
const ERROR_CHANNEL_CAPACITY: usize = 16;

/// WebSocket close status code (RFC 6455, section 7.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(pub u16);

impl CloseCode {
    /// 1000, the purpose for which the connection was established has been fulfilled.
    pub const NORMAL: CloseCode = CloseCode(1000);

    pub fn as_u16(self) -> u16 {
        self.0
    }
}

/// A close the session wants the transport to perform: the status code and
/// the reason text carried in the close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseRequest {
    pub code: CloseCode,
    pub reason: String,
}

impl CloseRequest {
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// Lets a session ask its transport to close the connection.
///
/// Requests are advisory: the transport closes the socket and later reports
/// the disconnect back through the usual signal.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    sender: mpsc::Sender<CloseRequest>,
}

impl CloseHandle {
    /// Returns false if a close is already pending or the transport has gone away.
    pub fn request_close(&self, request: CloseRequest) -> bool {
        self.sender.try_send(request).is_ok()
    }
}

/// Fires the disconnect signal. Dropping it without calling `notify` counts as a disconnect too.
#[derive(Debug)]
pub struct Disconnect(oneshot::Sender<()>);

impl Disconnect {
    pub fn notify(self) {
        // The session may have finished already, nothing to do then
        let _ = self.0.send(());
    }
}

/// Session-side ends.
#[derive(Debug)]
pub struct SessionIo {
    pub connection_id: ConnectionId,
    pub inbound: mpsc::Receiver<Message>,
    pub outbound: DeliveryHandle,
    pub disconnected: oneshot::Receiver<()>,
    pub errors: mpsc::Receiver<Error>,
    pub close: CloseHandle,
}

/// Transport-side ends.
#[derive(Debug)]
pub struct TransportIo {
    pub connection_id: ConnectionId,
    pub inbound: mpsc::Sender<Message>,
    pub outbound: mpsc::Receiver<Message>,
    pub disconnect: Disconnect,
    pub errors: mpsc::Sender<Error>,
    pub close_requests: mpsc::Receiver<CloseRequest>,
}

/// Create the linked halves for one connection. `capacity` bounds both the
/// inbound and the outbound queue.
pub fn pair(capacity: usize) -> (SessionIo, TransportIo) {
    let capacity = capacity.max(1);
    let connection_id = ConnectionId::new();

    let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
    let (disconnect_tx, disconnect_rx) = oneshot::channel();
    let (errors_tx, errors_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);
    // One pending close request is all a transport ever needs
    let (close_tx, close_rx) = mpsc::channel(1);

    let session = SessionIo {
        connection_id: connection_id.clone(),
        inbound: inbound_rx,
        outbound: DeliveryHandle::new(connection_id.clone(), outbound_tx),
        disconnected: disconnect_rx,
        errors: errors_rx,
        close: CloseHandle { sender: close_tx },
    };
    let transport = TransportIo {
        connection_id,
        inbound: inbound_tx,
        outbound: outbound_rx,
        disconnect: Disconnect(disconnect_tx),
        errors: errors_tx,
        close_requests: close_rx,
    };

    (session, transport)
}
