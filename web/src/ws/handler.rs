use crate::ws::transport;
use axum::extract::{ws::WebSocketUpgrade, State};
use axum::response::Response;
use log::*;
use service::AppState;

/// GET /ws
/// Upgrades to a WebSocket and runs one fan-out session for the lifetime of the connection.
pub(crate) async fn ws_upgrade(State(app_state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    debug!("Upgrading connection to WebSocket");

    let manager = app_state.fanout.clone();
    ws.on_upgrade(move |socket| transport::serve(socket, manager))
}
