//! Gateway HTTP server with deferred startup lifecycle.
//!
//! `new()` creates shared state, `start()` binds the TCP listener and
//! `serve()` accepts requests until shutdown, then drains and closes the
//! backend clients.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::auth::JwtVerifier;
use super::config::NetworkConfig;
use super::handlers::{
    auth_health_handler, backend_health_handler, broadcast_event, create_notification,
    get_prediction, health_handler, liveness_handler, metrics_handler, readiness_handler,
    status_handler, update_inventory, AppState,
};
use super::middleware::{build_http_layers, record_http_metrics, track_in_flight};
use super::rate_limit::RateLimiter;
use super::shutdown::ShutdownController;
use crate::service::{GatewayConfig, GatewayRouter};

/// Longest rate-limit window; expired windows older than this are swept.
const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Assembles every route over `state`, without the HTTP-level layers.
///
/// Routes:
/// - `POST /api/notifications|inventory|predictions|broadcast` -- bearer auth, rate limited
/// - `GET /auth/health` -- `{"status":"ok"}`
/// - `GET /health`, `/health/live`, `/health/ready` -- process health
/// - `GET /system/monitoring/health` -- backend probe
/// - `GET /system/monitoring/status` -- status and timestamp
/// - `GET /metrics` -- Prometheus exposition
pub fn api_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/notifications", post(create_notification))
        .route("/api/inventory", post(update_inventory))
        .route("/api/predictions", post(get_prediction))
        .route("/api/broadcast", post(broadcast_event))
        .route_layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state.shutdown),
            track_in_flight,
        ));

    Router::new()
        .merge(api)
        .route("/auth/health", get(auth_health_handler))
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/system/monitoring/health", get(backend_health_handler))
        .route("/system/monitoring/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .layer(axum::middleware::from_fn(record_http_metrics))
        .with_state(state)
}

/// Manages the HTTP server lifecycle.
///
/// 1. `new()` -- allocates shared state (rate limiter, shutdown controller)
/// 2. `start()` -- binds TCP listener to the configured address
/// 3. `serve()` -- serves until shutdown is signalled, then drains
pub struct GatewayServer {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    state: AppState,
}

impl GatewayServer {
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        gateway: GatewayConfig,
        router: GatewayRouter,
        auth: JwtVerifier,
    ) -> Self {
        let state = AppState {
            router,
            auth: Arc::new(auth),
            limits: Arc::new(RateLimiter::new()),
            shutdown: Arc::new(ShutdownController::new()),
            config: Arc::new(config.clone()),
            gateway: Arc::new(gateway),
            metrics: None,
            start_time: Instant::now(),
        };
        Self {
            config,
            listener: None,
            state,
        }
    }

    /// Serves `GET /metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.state.metrics = Some(handle);
        self
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.state.shutdown)
    }

    /// Full application router including the HTTP-level layers.
    pub fn build_router(&self) -> Router {
        api_router(self.state.clone()).layer(build_http_layers(&self.config))
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let listener = TcpListener::bind(self.config.bind_address()).await?;
        let port = listener.local_addr()?.port();

        info!("HTTP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until `shutdown` resolves.
    ///
    /// After the signal:
    /// 1. Health state transitions to Draining and new API calls get 503
    /// 2. Waits up to `drain_timeout` for in-flight API calls
    /// 3. Closes every backend client
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let Some(listener) = self.listener.take() else {
            anyhow::bail!("start() must be called before serve()");
        };
        let router = self.build_router();
        let ctrl = Arc::clone(&self.state.shutdown);

        let mut stop = ctrl.shutdown_receiver();
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = stop.wait_for(|stopping| *stopping).await;
        });
        let mut server = tokio::spawn(async move { server.await });

        let limits = Arc::clone(&self.state.limits);
        let sweeper = tokio::spawn(async move {
            let mut tick = tokio::time::interval(RATE_WINDOW);
            loop {
                tick.tick().await;
                let removed = limits.sweep(RATE_WINDOW);
                if removed > 0 {
                    tracing::debug!(removed, "swept expired rate-limit windows");
                }
            }
        });

        // Transition to Ready so readiness probes pass.
        ctrl.set_ready();
        info!("Serving HTTP connections");

        let finished_early = tokio::select! {
            result = &mut server => Some(result),
            () = shutdown => None,
        };

        let outcome = if let Some(result) = finished_early {
            warn!("HTTP server exited before shutdown was requested");
            result.map_err(anyhow::Error::from).and_then(|r| r.map_err(Into::into))
        } else {
            info!("Shutdown requested, draining in-flight requests");
            ctrl.trigger_shutdown();
            if ctrl.wait_for_drain(self.config.drain_timeout).await {
                info!("All in-flight requests drained");
            } else {
                warn!(
                    remaining = ctrl.in_flight_count(),
                    "Drain timeout expired with in-flight requests remaining"
                );
                server.abort();
            }
            match server.await {
                Ok(result) => result.map_err(Into::into),
                Err(e) if e.is_cancelled() => Ok(()),
                Err(e) => Err(e.into()),
            }
        };

        sweeper.abort();
        self.state.router.shutdown().await;
        info!("Backend clients closed");
        outcome
    }
}
