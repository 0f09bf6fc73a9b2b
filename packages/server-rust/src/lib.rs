//! Gatehouse server: HTTP API gateway routing authenticated requests to
//! backend microservices over a framed JSON TCP transport.

pub mod network;
pub mod service;
pub mod transport;

pub use service::{GatewayConfig, GatewayRouter, RouteError, TargetRegistry};
