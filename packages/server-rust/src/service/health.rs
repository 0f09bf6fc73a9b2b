//! Backend health probe.
//!
//! Sends the `health` pattern to every registered target concurrently. A
//! target is up when the call succeeds within the probe timeout.

use futures_util::future::join_all;
use gatehouse_core::ServiceName;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::router::GatewayRouter;

/// Pattern every backend answers to when it is alive.
pub const HEALTH_PATTERN: &str = "health";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceHealth {
    pub service: ServiceName,
    pub status: BackendStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health of every registered backend, in registry order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendHealthReport {
    pub healthy: bool,
    pub services: Vec<ServiceHealth>,
}

/// Probes every backend of `router` with `timeout_ms` per call.
pub async fn probe(router: &GatewayRouter, timeout_ms: u64) -> BackendHealthReport {
    let probes = router.targets().into_iter().map(|service| async move {
        match router
            .route_to_with_timeout(service, HEALTH_PATTERN, json!({}), timeout_ms)
            .await
        {
            Ok(_) => ServiceHealth {
                service,
                status: BackendStatus::Up,
                error: None,
            },
            Err(e) => {
                debug!(target_name = service.as_str(), error = %e, "health probe failed");
                ServiceHealth {
                    service,
                    status: BackendStatus::Down,
                    error: Some(e.to_string()),
                }
            }
        }
    });

    let services = join_all(probes).await;
    BackendHealthReport {
        healthy: services.iter().all(|s| s.status == BackendStatus::Up),
        services,
    }
}
