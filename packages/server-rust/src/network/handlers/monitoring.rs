//! Operational endpoints: backend health, status and Prometheus metrics.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde_json::json;

use super::AppState;
use crate::service::probe;

/// Probes every backend with the `health` pattern.
///
/// 200 when all backends are up, 503 otherwise; the body lists each one.
pub async fn backend_health_handler(State(state): State<AppState>) -> Response {
    let report = probe(&state.router, state.gateway.health_probe_timeout_ms).await;
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

/// `{"status":"ok","timestamp":"2026-01-01T00:00:00.000Z"}`, timestamp in UTC.
pub async fn status_handler() -> Json<serde_json::Value> {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    Json(json!({ "status": "ok", "timestamp": timestamp }))
}

/// Prometheus text exposition of the installed recorder.
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
