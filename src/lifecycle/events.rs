// ============================================================================
// File: packages/porter/src/lifecycle/events.rs
// ----------------------------------------------------------------------------
// Lifecycle and invocation events for operational tooling
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Something observable happened to a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerEvent {
    /// Handler entered service
    AvailableForService,
    /// Handler left service; `until` is `None` when permanent
    UnavailableForService {
        until: Option<DateTime<Utc>>,
        reason: String,
    },
    /// Request turned away by availability policy
    Rejected { retry_after: Option<u64> },
    /// Request serviced successfully
    ServiceFinished { elapsed: Duration },
    /// Request failed inside the target
    ServiceFailed { elapsed: Duration, message: String },
    /// Destroy sequence started
    StartDestroy,
    /// Drain bound expired with requests still in flight
    DestroyForced { outstanding: usize },
    /// Destroy sequence finished
    FinishDestroy,
    /// Target teardown reported an error
    DestroyFailed { message: String },
    /// Target torn down, handler back to uninitialized
    Unloaded,
}

/// Observer of handler events
pub trait HandlerEventListener: Send + Sync {
    /// Called synchronously on the thread that caused the event
    fn on_event(&self, handler: &str, at: DateTime<Utc>, event: &HandlerEvent);
}

impl<F> HandlerEventListener for F
where
    F: Fn(&str, DateTime<Utc>, &HandlerEvent) + Send + Sync,
{
    fn on_event(&self, handler: &str, at: DateTime<Utc>, event: &HandlerEvent) {
        self(handler, at, event)
    }
}

/// Fan-out of events to registered listeners
#[derive(Default)]
pub(crate) struct EventSource {
    listeners: RwLock<Vec<Arc<dyn HandlerEventListener>>>,
    has_listeners: AtomicBool,
}

impl EventSource {
    pub(crate) fn add(&self, listener: Arc<dyn HandlerEventListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
        self.has_listeners.store(true, Ordering::SeqCst);
    }

    /// Cheap check so hot paths skip building events nobody reads
    pub(crate) fn is_observed(&self) -> bool {
        self.has_listeners.load(Ordering::Relaxed)
    }

    pub(crate) fn emit(&self, handler: &str, event: HandlerEvent) {
        if !self.is_observed() {
            return;
        }

        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let at = Utc::now();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener.on_event(handler, at, &event))).is_err() {
                log::error!("Event listener panicked on {event:?} for handler '{handler}'");
            }
        }
    }
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .listeners
            .read()
            .map(|listeners| listeners.len())
            .unwrap_or_default();
        f.debug_struct("EventSource")
            .field("listeners", &count)
            .finish()
    }
}
