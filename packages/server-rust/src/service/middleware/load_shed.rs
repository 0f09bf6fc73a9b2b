//! Load-shedding middleware for backend calls.
//!
//! Rejects calls when the gateway already has `max_concurrent_calls` calls in
//! flight, across all targets, with `RouteError::Overloaded`.

use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::Semaphore;
use tower::{Layer, Service};

use crate::service::call::{Call, RouteError};
use crate::service::client::CallFuture;

// ---------------------------------------------------------------------------
// LoadShedLayer
// ---------------------------------------------------------------------------

/// Tower layer that limits concurrent calls via a shared semaphore.
///
/// Every service produced by one layer shares its permits, so applying the
/// same layer to each target yields a gateway-wide limit. When no permit is
/// free, calls fail immediately instead of queueing.
#[derive(Debug, Clone)]
pub struct LoadShedLayer {
    semaphore: Arc<Semaphore>,
}

impl LoadShedLayer {
    /// Create a new `LoadShedLayer` with the given concurrency limit.
    #[must_use]
    pub fn new(max_concurrent: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent as usize)),
        }
    }

    /// Permits currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl<S> Layer<S> for LoadShedLayer {
    type Service = LoadShedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoadShedService {
            inner,
            semaphore: Arc::clone(&self.semaphore),
        }
    }
}

// ---------------------------------------------------------------------------
// LoadShedService
// ---------------------------------------------------------------------------

/// Service wrapper that enforces the concurrency limit.
#[derive(Debug, Clone)]
pub struct LoadShedService<S> {
    inner: S,
    semaphore: Arc<Semaphore>,
}

impl<S> Service<Call> for LoadShedService<S>
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
        let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
            return Box::pin(async { Err(RouteError::Overloaded) });
        };

        let fut = self.inner.call(call);
        Box::pin(async move {
            let result = fut.await;
            drop(permit);
            result
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
