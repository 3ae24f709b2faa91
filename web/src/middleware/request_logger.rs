use axum::{extract::Request, middleware::Next, response::Response};
use log::*;
use tokio::time::Instant;

/// Logs method, path, status and elapsed time for every request.
pub async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        "{} {} {} in {:?}",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}
