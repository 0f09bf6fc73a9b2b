//! HTTP error responses.
//!
//! Every failure leaving a handler becomes an [`ApiError`], rendered as a
//! status code and a `{"error": message}` body.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::service::{BroadcastError, RouteError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{message}")]
    TooManyRequests {
        message: &'static str,
        retry_after: Duration,
    },
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Route(err) => route_status(err),
            ApiError::Broadcast(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// HTTP status for a failed backend call.
#[must_use]
pub fn route_status(err: &RouteError) -> StatusCode {
    match err {
        RouteError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        RouteError::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
        RouteError::UnknownTarget { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        RouteError::Transport { .. }
        | RouteError::ConnectionClosed { .. }
        | RouteError::Remote { .. }
        | RouteError::EmptyResponse { .. }
        | RouteError::Codec { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        } else {
            tracing::debug!(%status, error = %message, "request rejected");
        }

        match self {
            ApiError::TooManyRequests { retry_after, .. } => {
                let mut response = (status, Json(json!({ "error": message }))).into_response();
                let secs = retry_after.as_secs().max(1);
                if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                response
            }
            ApiError::Broadcast(err) => {
                let failed: Vec<_> = err
                    .failed
                    .iter()
                    .map(|(target, e)| json!({ "target": target, "error": e.to_string() }))
                    .collect();
                let body = json!({
                    "error": message,
                    "delivered": err.delivered,
                    "failed": failed,
                });
                (status, Json(body)).into_response()
            }
            _ => (status, Json(json!({ "error": message }))).into_response(),
        }
    }
}
