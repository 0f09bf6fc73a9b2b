//! Health, liveness, and readiness endpoint handlers.
//!
//! These handlers expose process health for orchestrators (Kubernetes,
//! load balancers). Backend health lives under `/system/monitoring`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::AppState;
use crate::network::HealthState;

/// Returns detailed health information as JSON.
///
/// Always returns 200; the `state` field tells "up but draining" apart from
/// "ready".
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "state": state.shutdown.health_state().as_str(),
        "in_flight": state.shutdown.in_flight_count(),
        "backends": state.router.targets(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Kubernetes liveness probe -- always returns 200 OK.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe -- 200 when ready, 503 otherwise.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.health_state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Unauthenticated probe of the auth surface.
pub async fn auth_health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::handlers::tests::test_state;

    #[tokio::test]
    async fn health_handler_reports_state_and_backends() {
        let state = test_state();
        state.shutdown.set_ready();

        let json = health_handler(State(state)).await.0;

        assert_eq!(json["state"], "ready");
        assert_eq!(json["in_flight"], 0);
        assert_eq!(json["backends"], json!(["notification", "inventory", "aiMl"]));
        assert!(json["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn health_handler_reports_draining_state() {
        let state = test_state();
        state.shutdown.set_ready();
        state.shutdown.trigger_shutdown();

        let json = health_handler(State(state)).await.0;
        assert_eq!(json["state"], "draining");
    }

    #[tokio::test]
    async fn liveness_handler_always_returns_200() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_follows_health_state() {
        let state = test_state();
        assert_eq!(
            readiness_handler(State(state.clone())).await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.shutdown.set_ready();
        assert_eq!(readiness_handler(State(state.clone())).await, StatusCode::OK);

        state.shutdown.trigger_shutdown();
        assert_eq!(
            readiness_handler(State(state)).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn auth_health_is_ok() {
        assert_eq!(auth_health_handler().await.0, json!({"status": "ok"}));
    }
}
