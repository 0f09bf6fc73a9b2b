//! HTTP surface: configuration, auth, rate limits, handlers and lifecycle.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod rate_limit;
pub mod shutdown;

pub use auth::{AuthenticatedCaller, Claims, JwtVerifier};
pub use config::NetworkConfig;
pub use error::ApiError;
pub use handlers::AppState;
pub use module::{api_router, GatewayServer};
pub use rate_limit::{Quota, RateLimiter};
pub use shutdown::{HealthState, InFlightGuard, ShutdownController};
