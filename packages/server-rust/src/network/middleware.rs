//! HTTP middleware stack for the gateway.
//!
//! Middleware ordering follows the outer-to-inner convention: the first
//! layer listed is the outermost (processes the request first on the way
//! in, and the response last on the way out).

use std::sync::Arc;

use axum::extract::{MatchedPath, Request, State};
use axum::http::header::{self, HeaderName};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;
use super::error::ApiError;
use super::shutdown::ShutdownController;

/// Counter of handled HTTP requests, labelled by `path`, `method` and
/// `status_code`.
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

type HttpLayers = tower::layer::util::Stack<
    PropagateRequestIdLayer,
    tower::layer::util::Stack<
        TimeoutLayer,
        tower::layer::util::Stack<
            CorsLayer,
            tower::layer::util::Stack<
                CompressionLayer,
                tower::layer::util::Stack<
                    TraceLayer<
                        tower_http::classify::SharedClassifier<
                            tower_http::classify::ServerErrorsAsFailures,
                        >,
                    >,
                    tower::layer::util::Stack<
                        SetRequestIdLayer<MakeRequestUuid>,
                        tower::layer::util::Identity,
                    >,
                >,
            >,
        >,
    >,
>;

/// Builds the HTTP-level Tower middleware stack from the network configuration.
///
/// **Middleware ordering (outermost to innermost):**
/// 1. `SetRequestId` -- assigns a UUID v4 `X-Request-Id` to every incoming request
/// 2. `Tracing` -- logs request/response with structured trace spans
/// 3. `Compression` -- gzip response compression
/// 4. `CORS` -- allows the configured origins to call the API with a bearer token
/// 5. `Timeout` -- enforces a maximum request processing duration
/// 6. `PropagateRequestId` -- copies `X-Request-Id` from the request to the response
#[must_use]
pub fn build_http_layers(config: &NetworkConfig) -> HttpLayers {
    let x_request_id = HeaderName::from_static("x-request-id");

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&config.cors_origins))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .into_inner()
}

/// A `"*"` entry allows any origin; otherwise only the parsable origins
/// listed are allowed.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Counts the request as in flight for graceful shutdown and refuses new
/// requests with 503 once the server is draining.
pub async fn track_in_flight(
    State(shutdown): State<Arc<ShutdownController>>,
    request: Request,
    next: Next,
) -> Response {
    if shutdown.is_draining() {
        return ApiError::Unavailable("Server is shutting down".to_string()).into_response();
    }

    let _guard = shutdown.in_flight_guard();
    next.run(request).await
}

/// Counts every request under its route template, so `/items/42` and
/// `/items/7` share one series. Requests that match no route are counted
/// as `unmatched`.
pub async fn record_http_metrics(request: Request, next: Next) -> Response {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());
    let method = request.method().to_string();

    let response = next.run(request).await;

    metrics::counter!(
        HTTP_REQUESTS_TOTAL,
        "path" => path,
        "method" => method,
        "status_code" => response.status().as_u16().to_string()
    )
    .increment(1);
    response
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use super::*;

    #[test]
    fn build_http_layers_with_custom_timeout() {
        let config = NetworkConfig {
            request_timeout: Duration::from_secs(5),
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "https://example.com".to_string(),
            ],
            ..NetworkConfig::default()
        };
        let _layers = build_http_layers(&config);
    }

    fn get_root() -> Request {
        axum::http::Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap()
    }

    fn tracked_app(shutdown: &Arc<ShutdownController>) -> Router {
        let watched = Arc::clone(shutdown);
        Router::new()
            .route(
                "/",
                get(move || {
                    let watched = Arc::clone(&watched);
                    async move { watched.in_flight_count().to_string() }
                }),
            )
            .route_layer(axum::middleware::from_fn_with_state(
                Arc::clone(shutdown),
                track_in_flight,
            ))
    }

    #[tokio::test]
    async fn request_is_counted_while_handled() {
        let shutdown = Arc::new(ShutdownController::new());
        shutdown.set_ready();

        let response = tracked_app(&shutdown)
            .oneshot(get_root())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"1");
        assert_eq!(shutdown.in_flight_count(), 0);
    }

    #[test]
    fn requests_are_counted_by_route_template() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let app = Router::new()
            .route("/items/{id}", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(record_http_metrics));

        metrics::with_local_recorder(&recorder, || {
            rt.block_on(async {
                for uri in ["/items/1", "/items/2", "/missing"] {
                    let request = axum::http::Request::builder()
                        .uri(uri)
                        .body(Body::empty())
                        .unwrap();
                    app.clone().oneshot(request).await.unwrap();
                }
            });
        });

        let rendered = handle.render();
        let line = |labels: &[&str]| {
            rendered
                .lines()
                .filter(|l| l.starts_with(HTTP_REQUESTS_TOTAL))
                .find(|l| labels.iter().all(|label| l.contains(label)))
                .map(str::to_string)
        };

        let items = line(&[r#"path="/items/{id}""#, r#"method="GET""#, r#"status_code="200""#])
            .unwrap_or_else(|| panic!("no series for /items/{{id}} in {rendered}"));
        assert!(items.ends_with(" 2"), "{items}");
        assert!(line(&[r#"path="unmatched""#, r#"status_code="404""#]).is_some(), "{rendered}");
    }

    #[tokio::test]
    async fn draining_server_refuses_requests() {
        let shutdown = Arc::new(ShutdownController::new());
        shutdown.set_ready();
        shutdown.trigger_shutdown();

        let response = tracked_app(&shutdown)
            .oneshot(get_root())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
