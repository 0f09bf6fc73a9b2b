//! Gateway router: forwards calls to one backend or fans them out to all.
//!
//! The router adds no behavior of its own. `route_to` returns the
//! multiplexer's result unmodified and nothing is cached, so two identical
//! calls reach the backend twice.

use std::sync::Arc;

use futures_util::future::join_all;
use gatehouse_core::ServiceName;
use serde_json::Value;
use tracing::{debug, warn};

use super::broadcast::{BroadcastReport, TargetOutcome};
use super::call::RouteError;
use super::multiplexer::ClientMultiplexer;

/// Cheaply cloneable handle over the shared [`ClientMultiplexer`].
#[derive(Clone)]
pub struct GatewayRouter {
    mux: Arc<ClientMultiplexer>,
}

impl GatewayRouter {
    #[must_use]
    pub fn new(mux: ClientMultiplexer) -> Self {
        Self { mux: Arc::new(mux) }
    }

    /// Registered targets in registry order.
    #[must_use]
    pub fn targets(&self) -> Vec<ServiceName> {
        self.mux.targets().collect()
    }

    /// Request/response call to one backend.
    ///
    /// # Errors
    ///
    /// Whatever the multiplexer returns, unchanged.
    pub async fn route_to(
        &self,
        target: ServiceName,
        pattern: &str,
        payload: Value,
    ) -> Result<Value, RouteError> {
        debug!(target_name = target.as_str(), pattern, "routing call");
        self.mux.send(target, pattern, payload).await
    }

    /// Like [`route_to`](Self::route_to) with an explicit timeout.
    ///
    /// # Errors
    ///
    /// Whatever the multiplexer returns, unchanged.
    pub async fn route_to_with_timeout(
        &self,
        target: ServiceName,
        pattern: &str,
        payload: Value,
        timeout_ms: u64,
    ) -> Result<Value, RouteError> {
        self.mux
            .send_with_timeout(target, pattern, payload, timeout_ms)
            .await
    }

    /// # Errors
    ///
    /// See [`route_to`](Self::route_to).
    pub async fn route_to_notification_service(
        &self,
        pattern: &str,
        payload: Value,
    ) -> Result<Value, RouteError> {
        self.route_to(ServiceName::Notification, pattern, payload)
            .await
    }

    /// # Errors
    ///
    /// See [`route_to`](Self::route_to).
    pub async fn route_to_inventory_service(
        &self,
        pattern: &str,
        payload: Value,
    ) -> Result<Value, RouteError> {
        self.route_to(ServiceName::Inventory, pattern, payload).await
    }

    /// # Errors
    ///
    /// See [`route_to`](Self::route_to).
    pub async fn route_to_ai_ml_service(
        &self,
        pattern: &str,
        payload: Value,
    ) -> Result<Value, RouteError> {
        self.route_to(ServiceName::AiMl, pattern, payload).await
    }

    /// Emits `pattern` to every registered target concurrently and waits for
    /// all of them to settle.
    ///
    /// A failing target does not cancel the others; its error is reported in
    /// its slot of the returned report.
    pub async fn broadcast(&self, pattern: &str, payload: &Value) -> BroadcastReport {
        self.broadcast_with_timeout(pattern, payload, self.mux.default_timeout_ms())
            .await
    }

    /// Like [`broadcast`](Self::broadcast) with an explicit per-target timeout.
    pub async fn broadcast_with_timeout(
        &self,
        pattern: &str,
        payload: &Value,
        timeout_ms: u64,
    ) -> BroadcastReport {
        let calls = self.mux.targets().map(|target| {
            let payload = payload.clone();
            async move {
                let result = self
                    .mux
                    .emit_with_timeout(target, pattern, payload, timeout_ms)
                    .await;
                TargetOutcome { target, result }
            }
        });

        // join_all yields results in input order, not completion order.
        let report = BroadcastReport::new(join_all(calls).await);

        for (target, err) in report.failed() {
            warn!(target_name = target.as_str(), pattern, error = %err, "broadcast delivery failed");
        }
        report
    }

    /// Closes every backend client.
    pub async fn shutdown(&self) {
        self.mux.shutdown().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
