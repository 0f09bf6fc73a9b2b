//! Outbound routing and fan-out.
//!
//! 1. **Targets** (`targets`): static backend name -> host/port registry
//! 2. **Clients** (`client`): the `BackendClient` seam and its Tower adapter
//! 3. **Middleware** (`middleware`): Tower layers (load-shedding, timeout, metrics)
//! 4. **Multiplexer** (`multiplexer`): one long-lived client per target
//! 5. **Routing** (`router`): `route_to` and broadcast fan-out
//! 6. **Health** (`health`): concurrent `health` probe of every backend

pub mod broadcast;
pub mod call;
pub mod client;
pub mod config;
pub mod health;
pub mod middleware;
pub mod multiplexer;
pub mod router;
pub mod targets;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types for convenient access.
pub use broadcast::{BroadcastError, BroadcastReport, TargetOutcome};
pub use call::{Call, CallContext, CallKind, RouteError};
pub use client::{BackendClient, ClientService};
pub use config::GatewayConfig;
pub use health::{probe, BackendHealthReport, BackendStatus, ServiceHealth};
pub use multiplexer::ClientMultiplexer;
pub use router::GatewayRouter;
pub use targets::{ConfigError, Target, TargetRegistry};
