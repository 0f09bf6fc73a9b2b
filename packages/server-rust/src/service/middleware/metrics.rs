//! Metrics middleware for backend calls.
//!
//! Wraps every call in a `tracing` span and records the `metrics` counters
//! and histogram that the `/metrics` endpoint exposes.

use std::task::{Context, Poll};
use std::time::Instant;

use serde_json::Value;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::call::{Call, RouteError};
use crate::service::client::CallFuture;

/// Counter of completed calls, labelled by `target`, `kind` and `outcome`.
pub const CALLS_TOTAL: &str = "gatehouse_calls_total";
/// Histogram of call latency in seconds, labelled by `target` and `kind`.
pub const CALL_DURATION_SECONDS: &str = "gatehouse_call_duration_seconds";

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments calls with timing and outcome.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records call duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<Call> for MetricsService<S>
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
        let target = call.ctx.target.as_str();
        let kind = call.ctx.kind.as_str();
        let call_id = call.ctx.call_id;

        let span = info_span!(
            "backend_call",
            target_name = target,
            kind = kind,
            call_id = call_id,
            pattern = %call.pattern,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(call);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();

                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(err) => err.kind(),
                };

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                metrics::counter!(CALLS_TOTAL, "target" => target, "kind" => kind, "outcome" => outcome)
                    .increment(1);
                metrics::histogram!(CALL_DURATION_SECONDS, "target" => target, "kind" => kind)
                    .record(elapsed.as_secs_f64());

                match &result {
                    Ok(_) => tracing::debug!(duration_ms, "backend call complete"),
                    Err(err) => tracing::warn!(duration_ms, error = %err, "backend call failed"),
                }

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
