//! HTTP handler definitions for the gateway.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports all handler functions for convenient access
//! when building the router.

pub mod gateway;
pub mod health;
pub mod monitoring;

pub use gateway::{broadcast_event, create_notification, get_prediction, update_inventory};
pub use health::{auth_health_handler, health_handler, liveness_handler, readiness_handler};
pub use monitoring::{backend_health_handler, metrics_handler, status_handler};

use std::sync::Arc;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusHandle;

use super::auth::JwtVerifier;
use super::rate_limit::RateLimiter;
use super::{NetworkConfig, ShutdownController};
use crate::service::{GatewayConfig, GatewayRouter};

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Routes calls to the backends.
    pub router: GatewayRouter,
    /// Validates bearer tokens on `/api` routes.
    pub auth: Arc<JwtVerifier>,
    /// Per-route, per-caller request windows.
    pub limits: Arc<RateLimiter>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    pub gateway: Arc<GatewayConfig>,
    /// Renders `/metrics`; `None` when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use serde_json::json;

    use super::AppState;
    use crate::network::auth::tests::SECRET;
    use crate::network::auth::JwtVerifier;
    use crate::network::rate_limit::RateLimiter;
    use crate::network::{NetworkConfig, ShutdownController};
    use crate::service::testing::{replying_clients, router_with, RecordingClient};
    use crate::service::GatewayConfig;

    pub(crate) fn test_state_with(clients: Vec<Arc<RecordingClient>>) -> AppState {
        AppState {
            router: router_with(clients),
            auth: Arc::new(JwtVerifier::new(SECRET)),
            limits: Arc::new(RateLimiter::new()),
            shutdown: Arc::new(ShutdownController::new()),
            config: Arc::new(NetworkConfig::default()),
            gateway: Arc::new(GatewayConfig::default()),
            metrics: None,
            start_time: Instant::now(),
        }
    }

    pub(crate) fn test_state() -> AppState {
        test_state_with(replying_clients(&json!({"success": true})))
    }
}
