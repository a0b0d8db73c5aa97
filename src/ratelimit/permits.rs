//! Permit accounting arithmetic.
//!
//! Pure functions over elapsed time and permit counts. All decisions are
//! parameterized by an explicit elapsed-nanosecond value so the limiter's
//! timing semantics can be tested without a clock.

use std::time::Duration;

/// Convert a duration to whole nanoseconds, saturating at `u64::MAX`.
pub(crate) fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Index of the refresh cycle containing the given elapsed time.
///
/// Cycle 0 starts at the limiter's construction instant.
pub(crate) fn cycle_index(elapsed_nanos: u64, period_nanos: u64) -> u64 {
    elapsed_nanos / period_nanos
}

/// Permit count after `cycles_passed` refresh boundaries.
///
/// Each refresh grants a full `capacity` of permits; the pool is capped at
/// `capacity`, so replenishment is all-at-once rather than incremental. A
/// negative input count (reservations already made against future cycles)
/// is paid down before any availability appears.
pub(crate) fn replenish(permits: i64, capacity: u32, cycles_passed: u64) -> i64 {
    if cycles_passed == 0 {
        return permits;
    }
    let gained = cycles_passed.saturating_mul(u64::from(capacity));
    let gained = i64::try_from(gained).unwrap_or(i64::MAX);
    permits.saturating_add(gained).min(i64::from(capacity))
}

/// Nanoseconds until a permit exists for the next reservation.
///
/// Returns 0 when a permit is available right now. Otherwise the wait spans
/// the remainder of the current cycle plus however many full cycles the
/// current deficit requires: a count of `-k` means `k` permits are already
/// promised to earlier reservations, and the next caller is number `k + 1`
/// in line against future refreshes.
pub(crate) fn nanos_to_wait(
    permits: i64,
    capacity: u32,
    period_nanos: u64,
    elapsed_nanos: u64,
) -> u64 {
    if permits > 0 {
        return 0;
    }

    let until_next_refresh = period_nanos - (elapsed_nanos % period_nanos);

    // Permits still needed from future refreshes, counting this caller.
    let deficit = 1u64.saturating_add(permits.unsigned_abs());
    let full_cycles = (deficit - 1) / u64::from(capacity);

    full_cycles
        .saturating_mul(period_nanos)
        .saturating_add(until_next_refresh)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: u64 = 1_000_000;

    #[test]
    fn test_cycle_index() {
        assert_eq!(cycle_index(0, 500 * MS), 0);
        assert_eq!(cycle_index(499 * MS, 500 * MS), 0);
        assert_eq!(cycle_index(500 * MS, 500 * MS), 1);
        assert_eq!(cycle_index(1600 * MS, 500 * MS), 3);
    }

    #[test]
    fn test_replenish_caps_at_capacity() {
        assert_eq!(replenish(3, 5, 1), 5);
        assert_eq!(replenish(5, 5, 10), 5);
        assert_eq!(replenish(0, 5, 1), 5);
    }

    #[test]
    fn test_replenish_pays_down_deficit() {
        // Two permits promised ahead, one refresh of capacity 1: still one short.
        assert_eq!(replenish(-2, 1, 1), -1);
        assert_eq!(replenish(-2, 1, 3), 1);
        // A single refresh of a larger capacity covers the deficit at once.
        assert_eq!(replenish(-2, 5, 1), 3);
    }

    #[test]
    fn test_replenish_no_cycles_is_identity() {
        assert_eq!(replenish(2, 5, 0), 2);
        assert_eq!(replenish(-4, 5, 0), -4);
    }

    #[test]
    fn test_replenish_long_idle_saturates() {
        assert_eq!(replenish(-1, u32::MAX, u64::MAX), i64::from(u32::MAX));
    }

    #[test]
    fn test_wait_zero_when_available() {
        assert_eq!(nanos_to_wait(1, 1, 500 * MS, 10 * MS), 0);
        assert_eq!(nanos_to_wait(5, 5, 500 * MS, 499 * MS), 0);
    }

    #[test]
    fn test_wait_until_next_refresh() {
        // Exhausted at 10ms into a 500ms cycle: wait the remaining 490ms.
        assert_eq!(nanos_to_wait(0, 1, 500 * MS, 10 * MS), 490 * MS);
    }

    #[test]
    fn test_wait_at_cycle_boundary() {
        // Exactly on the boundary the refresh has already happened; an empty
        // pool waits a full period for the next one.
        assert_eq!(nanos_to_wait(0, 1, 500 * MS, 500 * MS), 500 * MS);
    }

    #[test]
    fn test_wait_spans_full_cycles_for_deficit() {
        // One reservation ahead of us at capacity 1: the next refresh is
        // already spoken for, so we wait through it plus the remainder.
        assert_eq!(nanos_to_wait(-1, 1, 500 * MS, 10 * MS), 990 * MS);
        assert_eq!(nanos_to_wait(-3, 1, 500 * MS, 10 * MS), 1990 * MS);
    }

    #[test]
    fn test_wait_deficit_within_one_refresh_of_larger_capacity() {
        // Capacity 5 refresh covers a deficit of 2 in a single cycle.
        assert_eq!(nanos_to_wait(-1, 5, 500 * MS, 10 * MS), 490 * MS);
        // Deficit of 6 needs one extra full cycle.
        assert_eq!(nanos_to_wait(-5, 5, 500 * MS, 10 * MS), 990 * MS);
    }
}
