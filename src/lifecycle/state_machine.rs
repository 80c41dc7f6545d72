// ============================================================================
// File: packages/porter/src/lifecycle/state_machine.rs
// ----------------------------------------------------------------------------
// Availability transitions guarded by one small critical section.
//
// No target code ever runs while the state lock is held; callers sample the
// clock once and pass `now` in, so a decision never mixes two readings.
// ============================================================================

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use super::unavailability::{deadline_after, merge_deadline, remaining_secs};
use super::{Acquire, LifecycleState, Rejection};

const DRAINING_REASON: &str = "handler is shutting down";

/// Outcome of a permanent-unavailability transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermanentTransition {
    /// State became permanent; `was_available` means it was serving traffic
    Entered { was_available: bool },
    /// State was already permanent; the first reason is kept
    AlreadyPermanent { reason: String },
}

#[derive(Debug)]
struct StateCell {
    state: LifecycleState,
    draining: bool,
    // Outage that was pending when the current drain began
    backoff: Option<(Instant, String)>,
}

/// Lifecycle state of one handler
#[derive(Debug)]
pub struct LifecycleStateMachine {
    cell: Mutex<StateCell>,
}

impl LifecycleStateMachine {
    /// Create a state machine in `Uninitialized`
    pub fn new() -> Self {
        Self {
            cell: Mutex::new(StateCell {
                state: LifecycleState::Uninitialized,
                draining: false,
                backoff: None,
            }),
        }
    }

    // Critical sections never run foreign code, so a poisoned lock still
    // holds a consistent state.
    fn lock(&self) -> MutexGuard<'_, StateCell> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current state
    pub fn state(&self) -> LifecycleState {
        self.lock().state.clone()
    }

    /// Whether requests may be serviced right now
    pub fn is_available(&self) -> bool {
        self.lock().state.is_available()
    }

    /// Whether a drain is in progress
    pub fn is_draining(&self) -> bool {
        self.lock().draining
    }

    /// Decide whether a request may enter
    ///
    /// An expired temporary outage flips to `Uninitialized` exactly once;
    /// the caller that observes the flip, and any caller arriving before
    /// initialization completes, gets `NeedsInit`.
    pub fn try_acquire(&self, now: Instant) -> Acquire {
        let mut cell = self.lock();
        let draining = cell.draining;

        match &cell.state {
            LifecycleState::Available => Acquire::Proceed,
            LifecycleState::PermanentlyUnavailable { reason } => {
                Acquire::Reject(Rejection::permanent(reason.clone()))
            }
            LifecycleState::Uninitialized if draining => {
                Acquire::Reject(Rejection::temporary(DRAINING_REASON, 1))
            }
            LifecycleState::Uninitialized => Acquire::NeedsInit,
            LifecycleState::TemporarilyUnavailable { until, reason } => {
                match remaining_secs(*until, now) {
                    Some(secs) => Acquire::Reject(Rejection::temporary(reason.clone(), secs)),
                    None if draining => Acquire::Reject(Rejection::temporary(reason.clone(), 1)),
                    None => {
                        cell.state = LifecycleState::Uninitialized;
                        Acquire::NeedsInit
                    }
                }
            }
        }
    }

    /// Put the handler in service
    ///
    /// Refused while a drain is in progress, so an initializer racing with
    /// teardown cannot reopen the handler.
    ///
    /// # Returns
    /// `true` if the state changed; `false` when already available,
    /// permanent or draining
    pub fn mark_available(&self) -> bool {
        let mut cell = self.lock();
        if cell.draining {
            return false;
        }
        match cell.state {
            LifecycleState::Available | LifecycleState::PermanentlyUnavailable { .. } => false,
            _ => {
                cell.state = LifecycleState::Available;
                true
            }
        }
    }

    /// Take the handler out of service for `duration`
    ///
    /// A later existing deadline wins, together with its reason.
    ///
    /// # Returns
    /// Effective deadline, or the permanent rejection if the state is terminal
    pub fn mark_temporarily_unavailable(
        &self,
        duration: Duration,
        reason: &str,
        now: Instant,
    ) -> Result<Instant, Rejection> {
        let mut cell = self.lock();
        let candidate = deadline_after(now, duration);

        let existing = match &cell.state {
            LifecycleState::PermanentlyUnavailable { reason } => {
                return Err(Rejection::permanent(reason.clone()));
            }
            LifecycleState::TemporarilyUnavailable { until, .. } => Some(*until),
            _ => None,
        };

        let until = merge_deadline(existing, candidate);
        if existing != Some(until) {
            cell.state = LifecycleState::TemporarilyUnavailable {
                until,
                reason: reason.to_string(),
            };
        }
        Ok(until)
    }

    /// Move to the terminal state
    pub fn mark_permanently_unavailable(&self, reason: &str) -> PermanentTransition {
        let mut cell = self.lock();
        match &cell.state {
            LifecycleState::PermanentlyUnavailable { reason } => {
                PermanentTransition::AlreadyPermanent {
                    reason: reason.clone(),
                }
            }
            previous => {
                let was_available = previous.is_available();
                cell.state = LifecycleState::PermanentlyUnavailable {
                    reason: reason.to_string(),
                };
                PermanentTransition::Entered { was_available }
            }
        }
    }

    /// Return to `Uninitialized` after an unload
    ///
    /// An outage recorded before or during the drain, and not yet over at
    /// `now`, is kept instead.
    ///
    /// # Returns
    /// `false` if the state is terminal
    pub fn mark_uninitialized(&self, now: Instant) -> bool {
        let mut cell = self.lock();
        if cell.state.is_permanent() {
            return false;
        }
        let cell = &mut *cell;
        let mut backoff = cell.backoff.take();
        if let LifecycleState::TemporarilyUnavailable { until, reason } = &cell.state {
            let later = backoff.as_ref().is_none_or(|(pending, _)| until > pending);
            if reason != DRAINING_REASON && later {
                backoff = Some((*until, reason.clone()));
            }
        }
        cell.state = match backoff {
            Some((until, reason)) if until > now => {
                LifecycleState::TemporarilyUnavailable { until, reason }
            }
            _ => LifecycleState::Uninitialized,
        };
        true
    }

    /// Stop admitting requests while in-flight work drains
    ///
    /// New requests are rejected with a retry hint until `end_drain`. A
    /// permanent state stays permanent.
    ///
    /// # Returns
    /// Drain deadline, or `None` when the state is terminal
    pub fn begin_drain(&self, bound: Duration, now: Instant) -> Option<Instant> {
        let mut cell = self.lock();
        cell.draining = true;
        if cell.state.is_permanent() {
            return None;
        }

        let cell = &mut *cell;
        let existing = match &cell.state {
            LifecycleState::TemporarilyUnavailable { until, reason } => {
                if cell.backoff.is_none() && reason != DRAINING_REASON {
                    cell.backoff = Some((*until, reason.clone()));
                }
                Some(*until)
            }
            _ => None,
        };
        let until = merge_deadline(existing, deadline_after(now, bound));
        cell.state = LifecycleState::TemporarilyUnavailable {
            until,
            reason: DRAINING_REASON.to_string(),
        };
        Some(until)
    }

    /// Finish a drain
    pub fn end_drain(&self) {
        let mut cell = self.lock();
        cell.draining = false;
        cell.backoff = None;
    }
}

impl Default for LifecycleStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
