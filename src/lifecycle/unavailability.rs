// ============================================================================
// File: packages/porter/src/lifecycle/unavailability.rs
// ----------------------------------------------------------------------------
// Unavailability clock: deadline arithmetic against a single `now` sample.
// ============================================================================

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Far-future fallback for deadlines that overflow the clock
const MAX_OUTAGE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Deadline `duration` after `now`
pub fn deadline_after(now: Instant, duration: Duration) -> Instant {
    now.checked_add(duration)
        .or_else(|| now.checked_add(MAX_OUTAGE))
        .unwrap_or(now)
}

/// Merge a new deadline into an existing one; deadlines never move backward
pub fn merge_deadline(existing: Option<Instant>, candidate: Instant) -> Instant {
    match existing {
        Some(existing) if existing > candidate => existing,
        _ => candidate,
    }
}

/// Whole seconds left before `until`, or `None` once it has passed
///
/// Sub-second remainders round down but never to zero, so a client is
/// always told to wait at least one second while the deadline is ahead.
pub fn remaining_secs(until: Instant, now: Instant) -> Option<u64> {
    if now >= until {
        return None;
    }
    Some(until.duration_since(now).as_secs().max(1))
}

/// Wall-clock rendering of a monotonic deadline, for events and logs
pub fn wall_clock(until: Instant, now: Instant) -> DateTime<Utc> {
    let ahead = until.saturating_duration_since(now);
    chrono::Duration::from_std(ahead)
        .ok()
        .and_then(|ahead| Utc::now().checked_add_signed(ahead))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlines_only_move_forward() {
        let now = Instant::now();
        let long = deadline_after(now, Duration::from_secs(30));
        let short = deadline_after(now, Duration::from_secs(5));

        assert_eq!(merge_deadline(Some(long), short), long);
        assert_eq!(merge_deadline(Some(short), long), long);
        assert_eq!(merge_deadline(None, short), short);
    }

    #[test]
    fn remaining_seconds_truncate_with_floor_of_one() {
        let now = Instant::now();
        let until = now + Duration::from_secs(10);

        assert_eq!(remaining_secs(until, now), Some(10));
        assert_eq!(remaining_secs(until, now + Duration::from_millis(500)), Some(9));
        assert_eq!(
            remaining_secs(until, now + Duration::from_millis(9_900)),
            Some(1)
        );
        assert_eq!(remaining_secs(until, until), None);
        assert_eq!(remaining_secs(until, until + Duration::from_secs(1)), None);
    }

    #[test]
    fn wall_clock_is_in_the_future() {
        let now = Instant::now();
        let at = wall_clock(now + Duration::from_secs(60), now);
        assert!(at > Utc::now());
    }
}
