// ============================================================================
// File: packages/porter/src/lifecycle/mod.rs
// ----------------------------------------------------------------------------
// Per-handler availability tracking.
//
// - LifecycleStateMachine: atomic availability transitions
// - Unavailability clock: deadline merging and retry hints
// - Lifecycle events delivered to observers
// ============================================================================

mod events;
mod state_machine;
pub mod unavailability;


pub use events::{HandlerEvent, HandlerEventListener};
pub(crate) use events::EventSource;
pub use state_machine::{LifecycleStateMachine, PermanentTransition};

use tokio::time::Instant;

/// Availability state of a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    /// Target not constructed (or torn down by unload)
    Uninitialized,
    /// Serving requests
    Available,
    /// Rejecting requests until the deadline passes
    TemporarilyUnavailable { until: Instant, reason: String },
    /// Terminal; only replacing the handler leaves this state
    PermanentlyUnavailable { reason: String },
}

impl LifecycleState {
    /// Short state name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Available => "available",
            Self::TemporarilyUnavailable { .. } => "temporarily-unavailable",
            Self::PermanentlyUnavailable { .. } => "permanently-unavailable",
        }
    }

    /// Whether requests may be serviced
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }

    /// Whether the state is the terminal sink
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::PermanentlyUnavailable { .. })
    }
}

/// Why a request was turned away
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Unavailability message
    pub reason: String,
    /// Seconds until a retry may succeed; `None` for permanent rejections
    pub retry_after: Option<u64>,
}

impl Rejection {
    /// Rejection that clears after `retry_after` seconds
    pub fn temporary<R: Into<String>>(reason: R, retry_after: u64) -> Self {
        Self {
            reason: reason.into(),
            retry_after: Some(retry_after.max(1)),
        }
    }

    /// Rejection that never clears
    pub fn permanent<R: Into<String>>(reason: R) -> Self {
        Self {
            reason: reason.into(),
            retry_after: None,
        }
    }

    /// Whether the rejection never clears
    pub fn is_permanent(&self) -> bool {
        self.retry_after.is_none()
    }
}

/// Result of asking whether a request may enter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquire {
    /// Serve the request
    Proceed,
    /// Turn the request away
    Reject(Rejection),
    /// Initialize the target first, then serve
    NeedsInit,
}
