// ============================================================================
// File: packages/porter/src/handler/queries.rs
// ----------------------------------------------------------------------------
// Handler query and listener registration operations
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::config::HandlerConfig;
use crate::error::PorterResult;
use crate::invalidation::{InvalidationListener, InvalidationRegistry};
use crate::lifecycle::{HandlerEventListener, LifecycleState};

use super::Handler;

impl Handler {
    /// Handler name
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Unique handler identifier
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Handler configuration
    pub fn config(&self) -> &HandlerConfig {
        &self.shared.config
    }

    /// Snapshot of the availability state
    pub fn state(&self) -> LifecycleState {
        self.shared.state.state()
    }

    /// Requests currently inside the handler
    pub fn in_flight(&self) -> usize {
        self.shared.drain.in_flight()
    }

    /// Whether the handler can still serve, now or after a backoff
    pub fn is_alive(&self) -> bool {
        !self.is_destroyed() && !self.state().is_permanent()
    }

    /// Whether a destroy sequence has started
    pub fn is_destroyed(&self) -> bool {
        self.shared.destroy_started.load(Ordering::SeqCst)
    }

    /// Whether the target strategy currently holds a constructed target
    pub fn is_loaded(&self) -> bool {
        self.shared.strategy.is_initialized()
    }

    /// When the handler last admitted a request (creation time if never)
    pub fn last_access(&self) -> Instant {
        let millis = self.shared.last_access_ms.load(Ordering::Relaxed);
        self.shared.created_at + Duration::from_millis(millis)
    }

    /// Name of the target strategy
    pub fn strategy_kind(&self) -> &'static str {
        self.shared.strategy.kind()
    }

    /// Register a listener fired once when the handler is destroyed or unloaded
    ///
    /// # Returns
    /// `false` if the handler was already invalidated and the listener has
    /// been fired immediately
    pub fn register_listener(&self, listener: Arc<dyn InvalidationListener>) -> bool {
        self.current_invalidation().register(listener)
    }

    /// Current invalidation generation
    pub fn invalidation_registry(&self) -> Arc<InvalidationRegistry> {
        self.current_invalidation()
    }

    /// Observe lifecycle and service events
    pub fn add_event_listener(&self, listener: Arc<dyn HandlerEventListener>) {
        self.shared.events.add(listener);
    }

    /// Evict idle pooled instances
    ///
    /// # Returns
    /// Number of instances evicted (always zero for shared targets)
    pub fn evict_idle(&self) -> PorterResult<usize> {
        Ok(self.shared.strategy.evict_idle()?)
    }
}
