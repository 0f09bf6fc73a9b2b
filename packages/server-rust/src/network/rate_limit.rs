//! Per-route, per-caller fixed-window rate limiting.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use super::error::ApiError;

/// Allowance of one route: `points` requests per `window`. A caller who
/// goes over is refused for `block` from that moment, even if their window
/// resets sooner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub route: &'static str,
    pub points: u32,
    pub window: Duration,
    pub block: Duration,
    pub message: &'static str,
}

pub const NOTIFICATIONS: Quota = Quota {
    route: "notifications",
    points: 10,
    window: Duration::from_secs(60),
    block: Duration::from_secs(60),
    message: "Too many requests, please try again later",
};

pub const INVENTORY: Quota = Quota {
    route: "inventory",
    points: 20,
    window: Duration::from_secs(60),
    block: Duration::from_secs(60),
    message: "Too many inventory requests, please try again later",
};

pub const PREDICTIONS: Quota = Quota {
    route: "predictions",
    points: 5,
    window: Duration::from_secs(60),
    block: Duration::from_secs(60),
    message: "Too many prediction requests, please try again later",
};

pub const BROADCAST: Quota = Quota {
    route: "broadcast",
    points: 5,
    window: Duration::from_secs(60),
    block: Duration::from_secs(60),
    message: "Too many broadcast requests, please try again later",
};

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    used: u32,
    blocked_until: Option<Instant>,
}

impl Window {
    fn fresh(now: Instant) -> Self {
        Self {
            started: now,
            used: 0,
            blocked_until: None,
        }
    }
}

/// Counts requests per `(route, caller)` in fixed windows that start with
/// the caller's first request.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<(&'static str, String), Window>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one point of `quota` for `caller`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::TooManyRequests` with the time until the caller
    /// is unblocked once the quota is spent.
    pub fn check(&self, quota: &Quota, caller: &str) -> Result<(), ApiError> {
        let now = Instant::now();
        let mut window = self
            .windows
            .entry((quota.route, caller.to_string()))
            .or_insert_with(|| Window::fresh(now));

        if let Some(until) = window.blocked_until {
            if now < until {
                return Err(ApiError::TooManyRequests {
                    message: quota.message,
                    retry_after: until - now,
                });
            }
            *window = Window::fresh(now);
        }

        if now.duration_since(window.started) >= quota.window {
            *window = Window::fresh(now);
        }

        if window.used >= quota.points {
            window.blocked_until = Some(now + quota.block);
            tracing::debug!(route = quota.route, caller, "rate limit exceeded, caller blocked");
            return Err(ApiError::TooManyRequests {
                message: quota.message,
                retry_after: quota.block,
            });
        }

        window.used += 1;
        Ok(())
    }

    /// Drops windows that have expired and carry no active block. Returns
    /// how many were removed.
    pub fn sweep(&self, longest_window: Duration) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, w| {
            now.duration_since(w.started) < longest_window
                || w.blocked_until.is_some_and(|until| until > now)
        });
        before - self.windows.len()
    }

    #[must_use]
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}
