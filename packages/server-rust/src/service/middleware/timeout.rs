//! Timeout middleware for backend calls.
//!
//! Rejects calls that exceed their `timeout_ms` with `RouteError::Timeout`.
//! Dropping the inner future cancels the call, which releases any state the
//! client parked for it.

use std::task::{Context, Poll};
use std::time::Duration;

use serde_json::Value;
use tower::{Layer, Service};

use crate::service::call::{Call, RouteError};
use crate::service::client::CallFuture;

// ---------------------------------------------------------------------------
// TimeoutLayer
// ---------------------------------------------------------------------------

/// Tower layer that wraps services with per-call timeout enforcement.
///
/// The timeout is read from each call's `ctx.timeout_ms` field, so callers
/// can tighten it for individual calls (e.g. health probes).
#[derive(Debug, Clone)]
pub struct TimeoutLayer;

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService { inner }
    }
}

// ---------------------------------------------------------------------------
// TimeoutService
// ---------------------------------------------------------------------------

/// Service wrapper that enforces per-call timeouts.
#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
}

impl<S> Service<Call> for TimeoutService<S>
where
    S: Service<Call, Response = Value, Error = RouteError> + Send,
    S::Future: Send + 'static,
{
    type Response = Value;
    type Error = RouteError;
    type Future = CallFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: Call) -> Self::Future {
        let timeout_ms = call.ctx.timeout_ms;
        let target = call.ctx.target;
        let fut = self.inner.call(call);
        Box::pin(async move {
            match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
                Ok(result) => result,
                Err(_elapsed) => Err(RouteError::Timeout { target, timeout_ms }),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
