//! Core rate limiter implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::config::RateLimiterConfig;
use crate::error::{FloodgateError, Result};

use super::permits;

/// Wait-time value signaling a rejected reservation.
const REJECTED: i64 = -1;

/// A permit-based rate limiter with a periodically refreshed pool.
///
/// The limiter grants up to `limit_for_period` permits per refresh period,
/// regardless of arrival pattern. [`reserve_permission`] is the synchronous
/// admission decision: it never sleeps, returning either an immediate grant,
/// the wait the caller must perform itself, or a rejection. The async
/// conveniences ([`acquire_permission`], [`execute`]) perform that wait with
/// the tokio timer.
///
/// Permits are consumption tokens, not lock/unlock pairs: once granted or
/// reserved, a permit is never returned.
///
/// This struct is thread-safe and can be shared across multiple tasks.
///
/// [`reserve_permission`]: RateLimiter::reserve_permission
/// [`acquire_permission`]: RateLimiter::acquire_permission
/// [`execute`]: RateLimiter::execute
pub struct RateLimiter {
    /// Name of this limiter, used in diagnostics and rejection errors
    name: String,
    /// Epoch for cycle arithmetic; cycle 0 begins here
    started_at: Instant,
    /// Active config snapshot, swapped whole on change
    config: RwLock<Arc<RateLimiterConfig>>,
    /// Permit state, guarded by a single mutex
    state: Mutex<State>,
}

/// Mutable permit state.
///
/// `permits` may go negative: a count of `-k` records `k` reservations
/// already made against future refresh cycles.
struct State {
    /// Refresh cycle the permit count refers to
    cycle: u64,
    /// Permits remaining in that cycle
    permits: i64,
}

impl RateLimiter {
    /// Create a new rate limiter with the given name and config.
    ///
    /// The pool starts full and the first refresh fires one period from now.
    pub fn new(name: impl Into<String>, config: RateLimiterConfig) -> Self {
        let name = name.into();
        let permits = i64::from(config.limit_for_period());
        debug!(
            name = %name,
            limit = config.limit_for_period(),
            period = ?config.limit_refresh_period(),
            "Creating rate limiter"
        );
        Self {
            name,
            started_at: Instant::now(),
            config: RwLock::new(Arc::new(config)),
            state: Mutex::new(State { cycle: 0, permits }),
        }
    }

    /// Name of this limiter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current config snapshot.
    pub fn rate_limiter_config(&self) -> Arc<RateLimiterConfig> {
        self.config.read().clone()
    }

    /// Attempt to reserve one permit, waiting at most `timeout`.
    ///
    /// Returns `0` when a permit was available and consumed, a positive
    /// nanosecond wait when one was reserved against a future refresh (the
    /// caller is expected to delay that long before proceeding), or a
    /// negative value when no permit can exist within `timeout`. Rejection
    /// consumes nothing.
    ///
    /// This method never sleeps and never fails; the decision is atomic with
    /// respect to concurrent reservations and refreshes.
    pub fn reserve_permission(&self, timeout: Duration) -> i64 {
        self.reserve_permission_at(Instant::now(), timeout)
    }

    /// Admission decision at an explicit instant.
    fn reserve_permission_at(&self, now: Instant, timeout: Duration) -> i64 {
        let config = self.rate_limiter_config();
        let capacity = config.limit_for_period();
        let period_nanos = permits::saturating_nanos(config.limit_refresh_period());
        let elapsed = permits::saturating_nanos(now.saturating_duration_since(self.started_at));

        let mut state = self.state.lock();
        Self::refresh_if_due(&mut state, capacity, period_nanos, elapsed);

        let wait = permits::nanos_to_wait(state.permits, capacity, period_nanos, elapsed);
        if wait == 0 {
            state.permits -= 1;
            trace!(name = %self.name, permits = state.permits, "Permit granted");
            return 0;
        }

        if u128::from(wait) <= timeout.as_nanos() {
            state.permits -= 1;
            debug!(
                name = %self.name,
                wait_nanos = wait,
                "Permit reserved against a future refresh"
            );
            return i64::try_from(wait).unwrap_or(i64::MAX);
        }

        debug!(
            name = %self.name,
            wait_nanos = wait,
            timeout = ?timeout,
            "Reservation rejected"
        );
        REJECTED
    }

    /// Advance the permit state across any refresh boundaries that have
    /// passed. Replenishment is all-at-once per cycle, capped at capacity.
    fn refresh_if_due(state: &mut State, capacity: u32, period_nanos: u64, elapsed: u64) {
        let current_cycle = permits::cycle_index(elapsed, period_nanos);
        if current_cycle > state.cycle {
            state.permits =
                permits::replenish(state.permits, capacity, current_cycle - state.cycle);
            state.cycle = current_cycle;
        }
    }

    /// Acquire a permit, performing the wait internally.
    ///
    /// Reserves with the configured `timeout_duration` and sleeps out any
    /// returned wait. Returns whether a permit was obtained.
    ///
    /// If the surrounding task is cancelled while sleeping, the reserved
    /// permit is wasted rather than returned; the limiter has no visibility
    /// into cancellation.
    pub async fn acquire_permission(&self) -> bool {
        let timeout = self.rate_limiter_config().timeout_duration();
        let wait = self.reserve_permission(timeout);
        if wait < 0 {
            return false;
        }
        if wait > 0 {
            tokio::time::sleep(Duration::from_nanos(wait as u64)).await;
        }
        true
    }

    /// Run `op` under this limiter's admission control.
    ///
    /// Reserves with the configured `timeout_duration`; on rejection returns
    /// [`FloodgateError::RequestNotPermitted`] naming this limiter, otherwise
    /// waits out the reservation and runs the operation. As with
    /// [`acquire_permission`](RateLimiter::acquire_permission), cancellation
    /// during the wait wastes the reserved permit.
    pub async fn execute<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let timeout = self.rate_limiter_config().timeout_duration();
        let wait = self.reserve_permission(timeout);
        if wait < 0 {
            return Err(FloodgateError::RequestNotPermitted {
                name: self.name.clone(),
            });
        }
        if wait > 0 {
            tokio::time::sleep(Duration::from_nanos(wait as u64)).await;
        }
        Ok(op().await)
    }

    /// Atomically replace the acquisition timeout.
    ///
    /// Takes effect for subsequent reservation decisions; permits already
    /// reserved are unaffected.
    pub fn change_timeout_duration(&self, timeout: Duration) {
        let mut config = self.config.write();
        let updated = config.with_timeout_duration(timeout);
        *config = Arc::new(updated);
        debug!(name = %self.name, timeout = ?timeout, "Changed timeout duration");
    }

    /// Atomically replace the per-period capacity. Must be >= 1.
    ///
    /// Takes effect for subsequent reservation decisions; a capacity
    /// increase becomes fully visible at the next refresh, since the pool is
    /// only replenished on cycle boundaries.
    pub fn change_limit_for_period(&self, limit: u32) -> Result<()> {
        let mut config = self.config.write();
        let updated = config.with_limit_for_period(limit)?;
        *config = Arc::new(updated);
        debug!(name = %self.name, limit = limit, "Changed limit for period");
        Ok(())
    }

    /// Force available permits to zero immediately.
    ///
    /// Administrative action for shedding load. Reservations already made
    /// against future cycles are untouched.
    pub fn drain_permissions(&self) {
        let config = self.rate_limiter_config();
        let period_nanos = permits::saturating_nanos(config.limit_refresh_period());
        let elapsed =
            permits::saturating_nanos(Instant::now().saturating_duration_since(self.started_at));

        let mut state = self.state.lock();
        Self::refresh_if_due(&mut state, config.limit_for_period(), period_nanos, elapsed);
        state.permits = state.permits.min(0);
        debug!(name = %self.name, "Drained available permits");
    }

    /// Permits currently available for immediate grant.
    pub fn available_permits(&self) -> u32 {
        let config = self.rate_limiter_config();
        let period_nanos = permits::saturating_nanos(config.limit_refresh_period());
        let elapsed =
            permits::saturating_nanos(Instant::now().saturating_duration_since(self.started_at));

        let mut state = self.state.lock();
        Self::refresh_if_due(&mut state, config.limit_for_period(), period_nanos, elapsed);
        u32::try_from(state.permits.max(0)).unwrap_or(u32::MAX)
    }

    /// Time remaining until the next pool refresh.
    pub fn time_until_refresh(&self) -> Duration {
        let config = self.rate_limiter_config();
        let period_nanos = permits::saturating_nanos(config.limit_refresh_period());
        let elapsed =
            permits::saturating_nanos(Instant::now().saturating_duration_since(self.started_at));
        Duration::from_nanos(period_nanos - (elapsed % period_nanos))
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("cycle", &state.cycle)
            .field("permits", &state.permits)
            .finish()
    }
}
