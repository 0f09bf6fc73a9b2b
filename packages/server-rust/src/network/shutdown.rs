//! Graceful shutdown controller with in-flight request tracking.
//!
//! Health state lives in an `ArcSwap` so probes read it without locking.
//! In-flight requests are counted by RAII guards; the last guard to drop
//! while the server is draining wakes `wait_for_drain`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::{watch, Notify};

/// Server health state, transitioned by the shutdown controller.
///
/// State machine: Starting -> Ready -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Listener not yet serving.
    Starting,
    /// Accepting requests.
    Ready,
    /// Finishing in-flight requests; new API calls are refused.
    Draining,
    /// Every in-flight request completed.
    Stopped,
}

impl HealthState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            HealthState::Starting => "starting",
            HealthState::Ready => "ready",
            HealthState::Draining => "draining",
            HealthState::Stopped => "stopped",
        }
    }
}

#[derive(Debug)]
struct InFlight {
    count: AtomicU64,
    idle: Notify,
}

/// Coordinates graceful shutdown of the HTTP surface.
///
/// 1. Readiness probes read `health_state()`
/// 2. The in-flight middleware takes a guard per request and refuses new
///    ones once draining
/// 3. `trigger_shutdown()` moves to Draining and signals all listeners
/// 4. `wait_for_drain()` waits until the guards are gone
#[derive(Debug)]
pub struct ShutdownController {
    shutdown_signal: watch::Sender<bool>,
    in_flight: Arc<InFlight>,
    health_state: ArcSwap<HealthState>,
}

impl ShutdownController {
    /// Creates a new shutdown controller in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            shutdown_signal: tx,
            in_flight: Arc::new(InFlight {
                count: AtomicU64::new(0),
                idle: Notify::new(),
            }),
            health_state: ArcSwap::from_pointee(HealthState::Starting),
        }
    }

    pub fn set_ready(&self) {
        self.health_state.store(Arc::new(HealthState::Ready));
    }

    /// Receiver flipped to `true` when shutdown is triggered.
    #[must_use]
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_signal.subscribe()
    }

    /// Moves to `Draining` and signals every shutdown receiver.
    pub fn trigger_shutdown(&self) {
        self.health_state.store(Arc::new(HealthState::Draining));
        // Receivers may have been dropped.
        let _ = self.shutdown_signal.send(true);
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.health_state.load()
    }

    /// `true` while new API requests should be refused.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        matches!(
            self.health_state(),
            HealthState::Draining | HealthState::Stopped
        )
    }

    /// Counts one in-flight request until the returned guard is dropped.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.count.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.count.load(Ordering::Acquire)
    }

    /// Waits for all in-flight requests to complete, up to `timeout`.
    ///
    /// Returns `true` and moves to `Stopped` when the count reached zero.
    /// Returns `false` on timeout; the state stays `Draining`.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // Registered before the check so a guard dropped in between
            // still wakes us.
            let idle = self.in_flight.idle.notified();

            if self.in_flight_count() == 0 {
                self.health_state.store(Arc::new(HealthState::Stopped));
                return true;
            }

            if tokio::time::timeout_at(deadline, idle).await.is_err() {
                return false;
            }
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight count on drop, including during unwinding.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.in_flight.idle.notify_waiters();
        }
    }
}
