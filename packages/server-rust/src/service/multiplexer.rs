//! Client multiplexer: one long-lived client per registered target.
//!
//! Every target gets its own [`CallPipeline`] around its client. All pipelines
//! share one load-shed layer, so the concurrency limit is gateway-wide.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gatehouse_core::ServiceName;
use serde_json::Value;
use tower::ServiceExt;
use tracing::{debug, info, warn};

use super::call::{Call, CallContext, CallKind, RouteError};
use super::client::BackendClient;
use super::config::GatewayConfig;
use super::middleware::{build_call_pipeline, CallPipeline, LoadShedLayer};
use super::targets::{ConfigError, TargetRegistry};
use crate::transport::TcpBackendClient;

/// A registered target together with its call pipeline.
struct Slot {
    target: ServiceName,
    client: Arc<dyn BackendClient>,
    pipeline: CallPipeline,
}

/// Owns the client handle of every registered target.
///
/// Slots are kept in registry order; broadcast and shutdown rely on it.
pub struct ClientMultiplexer {
    slots: Vec<Slot>,
    next_call_id: AtomicU64,
    default_timeout_ms: u64,
}

impl ClientMultiplexer {
    /// Wires `clients` to the targets of `registry`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when a registered target has no client, when a
    /// client serves a target the registry does not know, or when two clients
    /// serve the same target.
    pub fn new(
        registry: &TargetRegistry,
        clients: Vec<Arc<dyn BackendClient>>,
        config: &GatewayConfig,
    ) -> Result<Self, ConfigError> {
        for (i, client) in clients.iter().enumerate() {
            let target = client.target();
            if !registry.contains(target) {
                return Err(ConfigError::UnregisteredClient(target));
            }
            if clients[..i].iter().any(|c| c.target() == target) {
                return Err(ConfigError::DuplicateTarget(target));
            }
        }

        let load_shed = LoadShedLayer::new(config.max_concurrent_calls);
        let mut slots = Vec::with_capacity(registry.len());
        for target in registry.names() {
            let client = clients
                .iter()
                .find(|c| c.target() == target)
                .ok_or(ConfigError::MissingClient(target))?;
            slots.push(Slot {
                target,
                client: Arc::clone(client),
                pipeline: build_call_pipeline(Arc::clone(client), &load_shed),
            });
        }

        Ok(Self {
            slots,
            next_call_id: AtomicU64::new(1),
            default_timeout_ms: config.default_call_timeout_ms,
        })
    }

    /// Creates one TCP client per registered target. Connections are opened
    /// lazily on first use.
    #[must_use]
    pub fn tcp(registry: &TargetRegistry, config: &GatewayConfig) -> Self {
        let load_shed = LoadShedLayer::new(config.max_concurrent_calls);
        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);
        let slots = registry
            .iter()
            .map(|target| {
                info!(target_name = target.name.as_str(), address = %target.address(), "registering backend client");
                let client: Arc<dyn BackendClient> = Arc::new(TcpBackendClient::new(
                    target.clone(),
                    connect_timeout,
                    config.max_frame_len,
                ));
                Slot {
                    target: target.name,
                    pipeline: build_call_pipeline(Arc::clone(&client), &load_shed),
                    client,
                }
            })
            .collect();

        Self {
            slots,
            next_call_id: AtomicU64::new(1),
            default_timeout_ms: config.default_call_timeout_ms,
        }
    }

    /// Registered targets in registry order.
    pub fn targets(&self) -> impl Iterator<Item = ServiceName> + '_ {
        self.slots.iter().map(|s| s.target)
    }

    /// Timeout applied when the caller does not pass one.
    #[must_use]
    pub fn default_timeout_ms(&self) -> u64 {
        self.default_timeout_ms
    }

    /// Request/response call to `target`.
    ///
    /// # Errors
    ///
    /// Any `RouteError` produced by the pipeline or the client.
    pub async fn send(
        &self,
        target: ServiceName,
        pattern: &str,
        payload: Value,
    ) -> Result<Value, RouteError> {
        self.dispatch(target, CallKind::Request, pattern, payload, self.default_timeout_ms)
            .await
    }

    /// Like [`send`](Self::send) with an explicit timeout.
    ///
    /// # Errors
    ///
    /// Any `RouteError` produced by the pipeline or the client.
    pub async fn send_with_timeout(
        &self,
        target: ServiceName,
        pattern: &str,
        payload: Value,
        timeout_ms: u64,
    ) -> Result<Value, RouteError> {
        self.dispatch(target, CallKind::Request, pattern, payload, timeout_ms)
            .await
    }

    /// Event call to `target`; resolves with the transport's acknowledgement.
    ///
    /// # Errors
    ///
    /// Any `RouteError` produced by the pipeline or the client.
    pub async fn emit(
        &self,
        target: ServiceName,
        pattern: &str,
        payload: Value,
    ) -> Result<Value, RouteError> {
        self.dispatch(target, CallKind::Event, pattern, payload, self.default_timeout_ms)
            .await
    }

    /// Like [`emit`](Self::emit) with an explicit timeout.
    ///
    /// # Errors
    ///
    /// Any `RouteError` produced by the pipeline or the client.
    pub async fn emit_with_timeout(
        &self,
        target: ServiceName,
        pattern: &str,
        payload: Value,
        timeout_ms: u64,
    ) -> Result<Value, RouteError> {
        self.dispatch(target, CallKind::Event, pattern, payload, timeout_ms)
            .await
    }

    /// Closes every client in reverse registry order. Failures are logged and
    /// do not stop the remaining clients from closing.
    pub async fn shutdown(&self) {
        for slot in self.slots.iter().rev() {
            match slot.client.close().await {
                Ok(()) => debug!(target_name = slot.target.as_str(), "backend client closed"),
                Err(e) => warn!(
                    target_name = slot.target.as_str(),
                    error = %e,
                    "failed to close backend client"
                ),
            }
        }
    }

    async fn dispatch(
        &self,
        target: ServiceName,
        kind: CallKind,
        pattern: &str,
        payload: Value,
        timeout_ms: u64,
    ) -> Result<Value, RouteError> {
        let slot = self
            .slots
            .iter()
            .find(|s| s.target == target)
            .ok_or_else(|| RouteError::UnknownTarget {
                target: target.to_string(),
            })?;

        let call = Call {
            ctx: CallContext {
                call_id: self.next_call_id.fetch_add(1, Ordering::Relaxed),
                target,
                kind,
                timeout_ms,
            },
            pattern: pattern.to_string(),
            payload,
        };

        slot.pipeline.clone().oneshot(call).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
