// ============================================================================
// File: packages/porter/src/drain.rs
// ----------------------------------------------------------------------------
// In-flight request accounting for drain-aware teardown.
//
// Every dispatch that proceeds holds a DrainGuard for its whole duration;
// dropping the guard is the only way to leave, so the count stays balanced
// on success, error, panic and cancellation alike.
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Lock-free count of requests currently inside a handler
#[derive(Debug, Clone, Default)]
pub struct DrainCounter {
    in_flight: Arc<AtomicUsize>,
}

impl DrainCounter {
    /// Create a counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request as in flight until the returned guard is dropped
    pub fn enter(&self) -> DrainGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        DrainGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Requests currently in flight
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until no request is in flight, sampling on a fixed interval
    ///
    /// Gives up after `ceil(bound / poll_interval)` samples. Must not be
    /// awaited from inside a request holding a guard on this counter.
    ///
    /// # Returns
    /// Requests still in flight when the wait ended (zero when drained)
    pub async fn wait_until_drained(&self, bound: Duration, poll_interval: Duration) -> usize {
        let poll_interval = if poll_interval.is_zero() {
            bound
        } else {
            poll_interval
        };
        let polls = if poll_interval.is_zero() {
            0
        } else {
            bound.as_nanos().div_ceil(poll_interval.as_nanos())
        };

        let mut polled = 0u128;
        loop {
            let outstanding = self.in_flight();
            if outstanding == 0 || polled >= polls {
                return outstanding;
            }
            if polled == 0 {
                log::debug!(
                    "Waiting up to {}s for {} in-flight request(s) to finish",
                    bound.as_secs(),
                    outstanding
                );
            }
            tokio::time::sleep(poll_interval).await;
            polled += 1;
        }
    }
}

/// Marks one request as in flight; dropping it exits the drain
#[derive(Debug)]
#[must_use = "dropping the guard immediately ends the in-flight bracket"]
pub struct DrainGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        let decremented = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if decremented.is_err() {
            log::error!("Drain counter underflow; exit without matching enter");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn guards_balance_the_counter() {
        let counter = DrainCounter::new();
        let first = counter.enter();
        let second = counter.enter();
        assert_eq!(counter.in_flight(), 2);

        drop(first);
        assert_eq!(counter.in_flight(), 1);
        drop(second);
        assert_eq!(counter.in_flight(), 0);
    }

    #[test]
    fn guard_released_on_panic() {
        let counter = DrainCounter::new();
        let worker = counter.clone();
        let result = std::thread::spawn(move || {
            let _guard = worker.enter();
            panic!("request blew up");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(counter.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drained_counter_returns_immediately() {
        let counter = DrainCounter::new();
        let start = Instant::now();
        let outstanding = counter
            .wait_until_drained(Duration::from_secs(5), Duration::from_secs(1))
            .await;

        assert_eq!(outstanding, 0);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_ends_when_requests_finish() {
        let counter = DrainCounter::new();
        let guard = counter.enter();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            drop(guard);
        });

        let start = Instant::now();
        let outstanding = counter
            .wait_until_drained(Duration::from_secs(10), Duration::from_secs(1))
            .await;

        assert_eq!(outstanding, 0);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_is_bounded() {
        let counter = DrainCounter::new();
        let _stuck = counter.enter();

        let start = Instant::now();
        let outstanding = counter
            .wait_until_drained(Duration::from_secs(5), Duration::from_secs(1))
            .await;

        assert_eq!(outstanding, 1);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_millis(5100));
    }
}
