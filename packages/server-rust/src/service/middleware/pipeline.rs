//! Pipeline composition: wraps a backend client in the call middleware.

use std::sync::Arc;

use tower::ServiceBuilder;

use super::load_shed::{LoadShedLayer, LoadShedService};
use super::metrics::{MetricsLayer, MetricsService};
use super::timeout::{TimeoutLayer, TimeoutService};
use crate::service::client::{BackendClient, ClientService};

/// Fully layered per-target call service. Cheap to clone; clones share the
/// client and the load-shed permits.
pub type CallPipeline = MetricsService<LoadShedService<TimeoutService<ClientService>>>;

/// Build the call pipeline for one backend client.
///
/// Layer order (outermost to innermost):
/// 1. `MetricsLayer` -- record timing and outcome, including sheds and timeouts
/// 2. `LoadShedLayer` -- reject when overloaded (fail fast before doing any work)
/// 3. `TimeoutLayer` -- enforce the per-call timeout
///
/// Pass the same `load_shed` layer for every target to get a gateway-wide
/// concurrency limit.
#[must_use]
pub fn build_call_pipeline(
    client: Arc<dyn BackendClient>,
    load_shed: &LoadShedLayer,
) -> CallPipeline {
    ServiceBuilder::new()
        .layer(MetricsLayer)
        .layer(load_shed.clone())
        .layer(TimeoutLayer)
        .service(ClientService::new(client))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gatehouse_core::ServiceName;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::service::call::{Call, CallContext, CallKind, RouteError};
    use crate::service::testing::{Behavior, RecordingClient};

    fn make_call(timeout_ms: u64) -> Call {
        call_to(ServiceName::Inventory, timeout_ms)
    }

    fn call_to(target: ServiceName, timeout_ms: u64) -> Call {
        Call {
            ctx: CallContext {
                call_id: 7,
                target,
                kind: CallKind::Request,
                timeout_ms,
            },
            pattern: "updateInventory".to_string(),
            payload: json!({"item": "test"}),
        }
    }

    #[tokio::test]
    async fn pipeline_routes_through_all_layers() {
        let client = RecordingClient::replying(ServiceName::Inventory, json!({"success": true}));
        let svc = build_call_pipeline(client.clone(), &LoadShedLayer::new(100));

        let resp = svc.oneshot(make_call(5000)).await.unwrap();
        assert_eq!(resp, json!({"success": true}));
        assert_eq!(client.sends().len(), 1);
    }

    #[tokio::test]
    async fn pipeline_enforces_call_timeout() {
        let client = RecordingClient::new(
            ServiceName::Inventory,
            Behavior::Delay(Duration::from_millis(300), json!(null)),
        );
        let svc = build_call_pipeline(client, &LoadShedLayer::new(100));

        let err = svc.oneshot(make_call(20)).await.unwrap_err();
        assert!(matches!(err, RouteError::Timeout { timeout_ms: 20, .. }));
    }

    #[tokio::test]
    async fn timed_out_call_releases_its_permit() {
        let layer = LoadShedLayer::new(1);
        let client = RecordingClient::new(
            ServiceName::Inventory,
            Behavior::Delay(Duration::from_millis(300), json!(null)),
        );
        let svc = build_call_pipeline(client, &layer);

        let _ = svc.clone().oneshot(make_call(20)).await;
        assert_eq!(layer.available(), 1);
    }

    /// First call-counter line carrying every label in `labels`.
    fn counter_line<'a>(rendered: &'a str, labels: &[&str]) -> Option<&'a str> {
        rendered
            .lines()
            .filter(|line| line.starts_with(crate::service::middleware::metrics::CALLS_TOTAL))
            .find(|line| labels.iter().all(|label| line.contains(label)))
    }

    #[test]
    fn timeouts_and_sheds_are_counted() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        metrics::with_local_recorder(&recorder, || {
            rt.block_on(async {
                let ok = build_call_pipeline(
                    RecordingClient::replying(ServiceName::Inventory, json!(1)),
                    &LoadShedLayer::new(10),
                );
                ok.oneshot(call_to(ServiceName::Inventory, 5000))
                    .await
                    .unwrap();

                let slow = build_call_pipeline(
                    RecordingClient::new(
                        ServiceName::AiMl,
                        Behavior::Delay(Duration::from_millis(300), json!(null)),
                    ),
                    &LoadShedLayer::new(10),
                );
                let err = slow
                    .oneshot(call_to(ServiceName::AiMl, 20))
                    .await
                    .unwrap_err();
                assert!(matches!(err, RouteError::Timeout { .. }));

                let shed = build_call_pipeline(
                    RecordingClient::replying(ServiceName::Notification, json!(1)),
                    &LoadShedLayer::new(0),
                );
                let err = shed
                    .oneshot(call_to(ServiceName::Notification, 5000))
                    .await
                    .unwrap_err();
                assert!(matches!(err, RouteError::Overloaded));
            });
        });

        let rendered = handle.render();
        assert!(counter_line(&rendered, &[r#"target="inventory""#, r#"outcome="ok""#]).is_some());
        assert!(
            counter_line(&rendered, &[r#"target="aiMl""#, r#"outcome="timeout""#]).is_some(),
            "{rendered}"
        );
        assert!(
            counter_line(&rendered, &[r#"target="notification""#, r#"outcome="overloaded""#])
                .is_some(),
            "{rendered}"
        );
    }
}
