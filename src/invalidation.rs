// ============================================================================
// File: packages/porter/src/invalidation.rs
// ----------------------------------------------------------------------------
// Exactly-once notification of caches holding a handler reference.
//
// The registry is either live (collecting listeners) or invalidated. The
// first invalidate() flips it and fires every listener outside the lock;
// later calls are no-ops and late registrations fire immediately.
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Callback told that a handler reference it holds is no longer valid
pub trait InvalidationListener: Send + Sync {
    /// React to invalidation; errors are reported but never propagated
    fn invalidate(&self) -> anyhow::Result<()>;
}

impl<F> InvalidationListener for F
where
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    fn invalidate(&self) -> anyhow::Result<()> {
        self()
    }
}

/// Outcome of firing listeners
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Listeners invoked
    pub notified: usize,
    /// Invoked listeners that failed or panicked
    pub failed: usize,
}

enum RegistryState {
    Live(Vec<Arc<dyn InvalidationListener>>),
    Invalidated,
}

/// Listener set attached to one handler generation
pub struct InvalidationRegistry {
    invalidated: AtomicBool,
    state: Mutex<RegistryState>,
}

impl InvalidationRegistry {
    /// Create a live, empty registry
    pub fn new() -> Self {
        Self {
            invalidated: AtomicBool::new(false),
            state: Mutex::new(RegistryState::Live(Vec::new())),
        }
    }

    /// Register a listener
    ///
    /// # Returns
    /// `true` if the listener was stored, `false` if the registry was
    /// already invalidated and the listener has been fired immediately
    pub fn register(&self, listener: Arc<dyn InvalidationListener>) -> bool {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if let RegistryState::Live(listeners) = &mut *state {
                listeners.push(listener);
                return true;
            }
        }

        fire(&listener);
        false
    }

    /// Remove a listener that has not fired yet
    ///
    /// Listeners are matched by identity.
    ///
    /// # Returns
    /// `true` if the listener was registered and is now removed
    pub fn deregister(&self, listener: &Arc<dyn InvalidationListener>) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let RegistryState::Live(listeners) = &mut *state else {
            return false;
        };

        let before = listeners.len();
        listeners.retain(|registered| !Arc::ptr_eq(registered, listener));
        listeners.len() < before
    }

    /// Fire and forget every registered listener, once
    pub fn invalidate(&self) -> InvalidationReport {
        if self.invalidated.swap(true, Ordering::SeqCst) {
            return InvalidationReport::default();
        }

        let listeners = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *state, RegistryState::Invalidated) {
                RegistryState::Live(listeners) => listeners,
                RegistryState::Invalidated => Vec::new(),
            }
        };

        let mut report = InvalidationReport::default();
        for listener in &listeners {
            report.notified += 1;
            if !fire(listener) {
                report.failed += 1;
            }
        }

        log::debug!(
            "Invalidated {} listener(s), {} failed",
            report.notified,
            report.failed
        );
        report
    }

    /// Whether invalidate() has run
    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::SeqCst)
    }

    /// Listeners waiting for invalidation
    pub fn listener_count(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            RegistryState::Live(listeners) => listeners.len(),
            RegistryState::Invalidated => 0,
        }
    }
}

impl Default for InvalidationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InvalidationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidationRegistry")
            .field("invalidated", &self.is_invalidated())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn fire(listener: &Arc<dyn InvalidationListener>) -> bool {
    match catch_unwind(AssertUnwindSafe(|| listener.invalidate())) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            log::error!("Invalidation listener failed: {e:#}");
            false
        }
        Err(_) => {
            log::error!("Invalidation listener panicked");
            false
        }
    }
}
