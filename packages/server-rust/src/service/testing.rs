//! Test doubles shared by the service and network test modules.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gatehouse_core::ServiceName;
use parking_lot::Mutex;
use serde_json::Value;

use super::call::RouteError;
use super::client::BackendClient;
use super::config::GatewayConfig;
use super::multiplexer::ClientMultiplexer;
use super::router::GatewayRouter;
use super::targets::{Target, TargetRegistry};

/// How a `RecordingClient` answers.
#[derive(Clone)]
pub(crate) enum Behavior {
    Reply(Value),
    Fail,
    /// Sleep, then reply.
    Delay(Duration, Value),
}

/// Backend client that records every call and answers per its `Behavior`.
pub(crate) struct RecordingClient {
    target: ServiceName,
    behavior: Behavior,
    sends: Mutex<Vec<(String, Value)>>,
    emits: Mutex<Vec<(String, Value)>>,
    closed: Mutex<bool>,
    /// Shared log of targets in the order their calls completed.
    completions: Option<Arc<Mutex<Vec<ServiceName>>>>,
}

impl RecordingClient {
    pub(crate) fn new(target: ServiceName, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            target,
            behavior,
            sends: Mutex::new(Vec::new()),
            emits: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
            completions: None,
        })
    }

    pub(crate) fn replying(target: ServiceName, reply: Value) -> Arc<Self> {
        Self::new(target, Behavior::Reply(reply))
    }

    pub(crate) fn failing(target: ServiceName) -> Arc<Self> {
        Self::new(target, Behavior::Fail)
    }

    pub(crate) fn with_completion_log(
        target: ServiceName,
        behavior: Behavior,
        log: Arc<Mutex<Vec<ServiceName>>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            target,
            behavior,
            sends: Mutex::new(Vec::new()),
            emits: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
            completions: Some(log),
        })
    }

    pub(crate) fn sends(&self) -> Vec<(String, Value)> {
        self.sends.lock().clone()
    }

    pub(crate) fn emits(&self) -> Vec<(String, Value)> {
        self.emits.lock().clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    async fn answer(&self) -> Result<Value, RouteError> {
        let result = match &self.behavior {
            Behavior::Reply(value) => Ok(value.clone()),
            Behavior::Fail => Err(RouteError::ConnectionClosed {
                target: self.target,
            }),
            Behavior::Delay(delay, value) => {
                tokio::time::sleep(*delay).await;
                Ok(value.clone())
            }
        };
        if let Some(log) = &self.completions {
            log.lock().push(self.target);
        }
        result
    }
}

#[async_trait]
impl BackendClient for RecordingClient {
    fn target(&self) -> ServiceName {
        self.target
    }

    async fn send(&self, pattern: &str, payload: Value) -> Result<Value, RouteError> {
        self.sends.lock().push((pattern.to_string(), payload));
        self.answer().await
    }

    async fn emit(&self, pattern: &str, payload: Value) -> Result<Value, RouteError> {
        self.emits.lock().push((pattern.to_string(), payload));
        self.answer().await
    }

    async fn close(&self) -> anyhow::Result<()> {
        *self.closed.lock() = true;
        Ok(())
    }
}

/// Builds a router over the given clients, registered in the given order.
pub(crate) fn router_with(clients: Vec<Arc<RecordingClient>>) -> GatewayRouter {
    router_with_config(clients, &GatewayConfig::default())
}

pub(crate) fn router_with_config(
    clients: Vec<Arc<RecordingClient>>,
    config: &GatewayConfig,
) -> GatewayRouter {
    let registry = TargetRegistry::new(
        clients
            .iter()
            .map(|c| Target::new(c.target(), "localhost", c.target().default_port()))
            .collect(),
    )
    .expect("unique targets");
    let clients: Vec<Arc<dyn BackendClient>> = clients
        .into_iter()
        .map(|c| c as Arc<dyn BackendClient>)
        .collect();
    let mux = ClientMultiplexer::new(&registry, clients, config).expect("valid wiring");
    GatewayRouter::new(mux)
}

/// One replying client per known backend, in registry order.
pub(crate) fn replying_clients(reply: &Value) -> Vec<Arc<RecordingClient>> {
    ServiceName::ALL
        .iter()
        .map(|&name| RecordingClient::replying(name, reply.clone()))
        .collect()
}
