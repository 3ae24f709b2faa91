use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use service::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    registered_users: usize,
}

/// GET report that the router is up and how many users are currently reachable
pub async fn health_check(State(app_state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            registered_users: app_state.fanout_ref().registry().len(),
        }),
    )
}
