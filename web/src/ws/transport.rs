use axum::extract::ws::{CloseFrame, Message as Frame, WebSocket};
use fanout::io::{CloseRequest, Disconnect, TransportIo};
use fanout::registry::ConnectionId;
use fanout::{Error, Manager, Message};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::*;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::time::{sleep_until, Instant};

/// Consecutive read errors after which the socket is treated as dead.
const MAX_CONSECUTIVE_READ_ERRORS: usize = 3;

/// Run one session over an upgraded socket until the client goes away.
///
/// Splits the socket into a reader and a writer task:
/// - Reader: decodes text frames into messages for the session and fires the
///   disconnect signal when the stream ends
/// - Writer: encodes outbound messages and carries out close requests
///
/// Once the session asks for a close, the client has `close_grace` to finish
/// the handshake. A client that never answers is dropped when it lapses: the
/// reader stops and fires the disconnect signal itself.
pub(crate) async fn serve(socket: WebSocket, manager: Arc<Manager>) {
    let close_grace = manager.settings().close_grace;
    let (session, transport) = manager.open_session();
    let TransportIo {
        connection_id,
        inbound,
        outbound,
        disconnect,
        errors,
        mut close_requests,
    } = transport;

    let (sink, stream) = socket.split();
    // Close requests pass through here so the grace period starts even when
    // the writer is stuck on a client that has stopped reading.
    let (close_tx, close_rx) = mpsc::channel::<CloseRequest>(1);
    let give_up = Arc::new(Notify::new());

    let writer_handle = tokio::spawn(write_frames(
        sink,
        outbound,
        close_rx,
        errors.clone(),
        connection_id.clone(),
    ));
    let reader_handle = tokio::spawn(read_frames(
        stream,
        inbound,
        errors,
        disconnect,
        Arc::clone(&give_up),
        connection_id.clone(),
    ));

    let run = session.run();
    tokio::pin!(run);
    let grace = sleep_until(Instant::now());
    tokio::pin!(grace);
    let mut closing = false;
    let mut gave_up = false;

    let summary = loop {
        tokio::select! {
            biased;

            summary = &mut run => break summary,

            Some(request) = close_requests.recv(), if !closing => {
                closing = true;
                grace.as_mut().reset(Instant::now() + close_grace);
                if close_tx.try_send(request).is_err() {
                    debug!("Writer for connection {} has already stopped", connection_id);
                }
            }

            () = &mut grace, if closing && !gave_up => {
                gave_up = true;
                warn!(
                    "Connection {} did not complete the close handshake within {}s, dropping it",
                    connection_id,
                    close_grace.as_secs()
                );
                give_up.notify_one();
            }
        }
    };

    writer_handle.abort();
    reader_handle.abort();

    info!(
        "Connection {} closed (user: {}, messages: {}, timed out: {})",
        connection_id,
        summary.user.as_deref().unwrap_or("<none>"),
        summary.messages_received,
        summary.timed_out
    );
}

async fn read_frames(
    mut stream: SplitStream<WebSocket>,
    inbound: mpsc::Sender<Message>,
    errors: mpsc::Sender<Error>,
    disconnect: Disconnect,
    give_up: Arc<Notify>,
    connection_id: ConnectionId,
) {
    let mut consecutive_errors = 0;

    loop {
        let frame = tokio::select! {
            biased;

            () = give_up.notified() => break,
            frame = stream.next() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        let frame = match frame {
            Ok(frame) => {
                consecutive_errors = 0;
                frame
            }
            Err(e) => {
                consecutive_errors += 1;
                report_error(&errors, Error::transport(e), &connection_id);
                if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                    warn!(
                        "Giving up on connection {} after {} read errors",
                        connection_id, consecutive_errors
                    );
                    break;
                }
                continue;
            }
        };

        match frame {
            Frame::Text(text) => match Message::from_json(&text) {
                Ok(message) => {
                    if inbound.send(message).await.is_err() {
                        // Session has finished
                        break;
                    }
                }
                Err(e) => warn!("Rejected frame on connection {}: {}", connection_id, e),
            },
            Frame::Close(frame) => {
                debug!(
                    "Client closed connection {}: {:?}",
                    connection_id, frame
                );
                break;
            }
            Frame::Binary(_) => {
                debug!("Ignoring binary frame on connection {}", connection_id);
            }
            // axum answers pings itself
            Frame::Ping(_) | Frame::Pong(_) => {}
        }
    }

    disconnect.notify();
}

async fn write_frames(
    mut sink: SplitSink<WebSocket, Frame>,
    mut outbound: mpsc::Receiver<Message>,
    mut close_requests: mpsc::Receiver<CloseRequest>,
    errors: mpsc::Sender<Error>,
    connection_id: ConnectionId,
) {
    loop {
        tokio::select! {
            Some(request) = close_requests.recv() => {
                debug!(
                    "Closing connection {} with code {} ({})",
                    connection_id,
                    request.code.as_u16(),
                    request.reason
                );
                let frame = CloseFrame {
                    code: request.code.as_u16(),
                    reason: request.reason.into(),
                };
                if let Err(e) = sink.send(Frame::Close(Some(frame))).await {
                    report_error(&errors, Error::transport(e), &connection_id);
                }
                break;
            }
            message = outbound.recv() => {
                let Some(message) = message else {
                    break;
                };
                let json = match message.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to encode message for connection {}: {}", connection_id, e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Frame::Text(json)).await {
                    report_error(&errors, Error::transport(e), &connection_id);
                    break;
                }
            }
        }
    }
}

fn report_error(errors: &mpsc::Sender<Error>, err: Error, connection_id: &ConnectionId) {
    if let Err(e) = errors.try_send(err) {
        warn!(
            "Dropping stream error for connection {}: {}",
            connection_id, e
        );
    }
}
