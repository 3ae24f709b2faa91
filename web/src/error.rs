use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::*;
use serde::Serialize;

/// Failures that reach the HTTP boundary. Each maps to a fixed JSON body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Internal,
    NotFound,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: &'static str,
}

impl Error {
    fn status_code(self) -> StatusCode {
        match self {
            Error::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Error::NotFound => StatusCode::NOT_FOUND,
        }
    }

    fn message(self) -> &'static str {
        match self {
            Error::Internal => "A server error has occurred",
            Error::NotFound => "The route could not be found",
        }
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{}", self.message())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                message: self.message(),
            }),
        )
            .into_response()
    }
}

/// Fallback for any route or static file that doesn't exist.
pub(crate) async fn handle_404() -> Error {
    Error::NotFound
}

/// Turns a panic inside a handler into the internal error response.
pub(crate) fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    error!("Request handler panicked: {details}");

    Error::Internal.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::json;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_renders_fixed_json_body() {
        let response = Error::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"message": "The route could not be found"})
        );
    }

    #[tokio::test]
    async fn test_internal_renders_fixed_json_body() {
        let response = Error::Internal.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"message": "A server error has occurred"})
        );
    }

    #[tokio::test]
    async fn test_panic_payload_becomes_internal_error() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
