//! Tower middleware layers for the outbound call pipeline.
//!
//! - [`timeout`]: Per-call timeout enforcement
//! - [`metrics`]: Call timing and counting via `tracing` spans and `metrics`
//! - [`load_shed`]: Semaphore-based concurrency limiting
//! - [`pipeline`]: Composes all layers around a backend client

pub mod load_shed;
pub mod metrics;
pub mod pipeline;
pub mod timeout;

pub use load_shed::LoadShedLayer;
pub use metrics::MetricsLayer;
pub use pipeline::{build_call_pipeline, CallPipeline};
pub use timeout::TimeoutLayer;
