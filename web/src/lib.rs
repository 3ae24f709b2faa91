//! HTTP and WebSocket plumbing around the fan-out core.
//!
//! Routes:
//! - `GET /ws`: WebSocket endpoint, one fan-out session per connection
//! - `GET /health`: liveness check
//! - anything else: static files, or the JSON 404 page

use log::*;
use tokio::net::TcpListener;

pub use service::AppState;

pub(crate) mod controller;
pub mod error;
pub(crate) mod middleware;
pub mod router;
pub(crate) mod ws;

/// Bind to the configured address and serve until Ctrl-C.
pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let address = app_state.config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Server is running on {}", listener.local_addr()?);

    serve(listener, app_state).await
}

/// Serve on an already bound listener.
pub async fn serve(listener: TcpListener, app_state: AppState) -> std::io::Result<()> {
    let router = router::define_routes(app_state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        // Without a signal handler there's nothing to wait for; keep serving
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, stopping server");
}
