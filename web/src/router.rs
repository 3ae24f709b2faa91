use crate::{
    controller::health_check_controller,
    error::{handle_404, handle_panic},
    middleware::request_logger::log_request,
    ws::handler::ws_upgrade,
    AppState,
};
use axum::{handler::HandlerWithoutStateExt, middleware::from_fn, routing::get, Router};
use std::path::Path;
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, services::ServeDir,
};

pub fn define_routes(app_state: AppState) -> Router {
    let static_dir = app_state.config.static_dir.clone();

    Router::new()
        .merge(health_routes(app_state.clone()))
        .merge(ws_routes(app_state))
        .fallback_service(static_routes(&static_dir))
        .layer(from_fn(log_request))
        .layer(CatchPanicLayer::custom(handle_panic))
}

fn health_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_controller::health_check))
        .with_state(app_state)
}

fn ws_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(app_state)
}

// Anything that isn't an API route is looked up in the static directory,
// gzip-compressed when the client accepts it. Missing files get the JSON 404.
pub fn static_routes(static_dir: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(static_dir).not_found_service(handle_404.into_service()))
        .layer(CompressionLayer::new())
}
