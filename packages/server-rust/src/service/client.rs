//! Backend client abstraction and its Tower adapter.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use gatehouse_core::ServiceName;
use serde_json::Value;
use tower::Service;

use super::call::{Call, CallKind, RouteError};

/// Outbound handle to one backend.
///
/// Implementations must be safe to share between many concurrent calls;
/// the multiplexer holds exactly one per target for the process lifetime.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Backend this client is connected to.
    fn target(&self) -> ServiceName;

    /// Request/response call; resolves with the backend's reply.
    async fn send(&self, pattern: &str, payload: Value) -> Result<Value, RouteError>;

    /// Event call; resolves with the transport's acknowledgement.
    async fn emit(&self, pattern: &str, payload: Value) -> Result<Value, RouteError>;

    /// Release the underlying connection. Calls made afterwards may reconnect.
    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub(crate) type CallFuture = Pin<Box<dyn Future<Output = Result<Value, RouteError>> + Send>>;

/// Innermost service of a target's call pipeline: hands the call to the
/// backend client according to its `CallKind`.
#[derive(Clone)]
pub struct ClientService {
    client: Arc<dyn BackendClient>,
}

impl ClientService {
    #[must_use]
    pub fn new(client: Arc<dyn BackendClient>) -> Self {
        Self { client }
    }
}

impl Service<Call> for ClientService {
    type Response = Value;
    type Error = RouteError;
    type Future = CallFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: Call) -> Self::Future {
        let client = Arc::clone(&self.client);
        Box::pin(async move {
            match call.ctx.kind {
                CallKind::Request => client.send(&call.pattern, call.payload).await,
                CallKind::Event => client.emit(&call.pattern, call.payload).await,
            }
        })
    }
}
