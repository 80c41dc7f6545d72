// ============================================================================
// File: packages/porter/src/handler/mod.rs
// ----------------------------------------------------------------------------
// Request handler: one named unit of request processing backed by a target.
//
// A handler combines:
// - Availability state machine and drain counter
// - Target strategy (shared or pooled)
// - Invalidation registry for cached references
// - Event listeners, optional chain collaborator and unavailable responder
// ============================================================================

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use tokio::time::Instant;
use uuid::Uuid;

use crate::chain::ChainLink;
use crate::config::HandlerConfig;
use crate::drain::DrainCounter;
use crate::error::PorterResult;
use crate::invalidation::InvalidationRegistry;
use crate::lifecycle::{EventSource, HandlerEvent, LifecycleStateMachine};
use crate::registry::HandlerTable;
use crate::target::{DefaultUnavailableResponder, TargetFactory, UnavailableResponder};

mod dispatch;
mod lifecycle;
mod queries;
pub mod strategy;


pub use strategy::{Initialized, PooledTarget, SharedTarget, TargetStrategy};

/// Named request handler
///
/// Cloning yields another reference to the same handler.
#[derive(Debug, Clone)]
pub struct Handler {
    pub(crate) shared: Arc<HandlerShared>,
}

#[derive(Debug)]
pub(crate) struct HandlerShared {
    /// Unique handler identifier
    pub(crate) id: Uuid,

    /// Validated configuration
    pub(crate) config: HandlerConfig,

    /// Availability state
    pub(crate) state: LifecycleStateMachine,

    /// Requests currently inside the handler
    pub(crate) drain: DrainCounter,

    /// Target ownership policy
    pub(crate) strategy: Box<dyn TargetStrategy>,

    /// Serializes initialization and teardown
    pub(crate) init_lock: tokio::sync::Mutex<()>,

    /// Current invalidation generation; unload installs a fresh one
    pub(crate) invalidation: Mutex<Arc<InvalidationRegistry>>,

    /// Event listeners
    pub(crate) events: EventSource,

    /// Set by the first destroy call
    pub(crate) destroy_started: AtomicBool,

    /// Registry table this handler is registered in
    pub(crate) owner: RwLock<Option<Weak<HandlerTable>>>,

    /// Secondary-handler lookup for chained responses
    pub(crate) chain: RwLock<Option<Arc<dyn ChainLink>>>,

    /// Builds responses for rejected requests
    pub(crate) responder: RwLock<Arc<dyn UnavailableResponder>>,

    /// Reference point for `last_access_ms`
    pub(crate) created_at: Instant,

    /// Milliseconds after `created_at` of the last serviced request
    pub(crate) last_access_ms: AtomicU64,
}

/// Outcome of a destroy or unload sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DestroyReport {
    /// Whether this call ran the sequence (false for repeated calls)
    pub performed: bool,

    /// Whether teardown proceeded with requests still in flight
    pub forced: bool,

    /// Requests in flight when the drain wait ended
    pub outstanding: usize,

    /// Invalidation listeners notified
    pub listeners_notified: usize,
}

impl Handler {
    /// Create a handler for targets built by `factory`
    ///
    /// Factories reporting single-request targets get a pooled strategy;
    /// all others share one target.
    ///
    /// # Arguments
    /// * `config` - Handler configuration (validated here)
    /// * `factory` - Target factory
    pub fn new(config: HandlerConfig, factory: Arc<dyn TargetFactory>) -> PorterResult<Self> {
        let strategy: Box<dyn TargetStrategy> = if factory.single_request() {
            Box::new(PooledTarget::new(factory, config.clone()))
        } else {
            Box::new(SharedTarget::new(factory))
        };
        Self::with_strategy(config, strategy)
    }

    /// Create a handler with a custom target strategy
    pub fn with_strategy(
        config: HandlerConfig,
        strategy: Box<dyn TargetStrategy>,
    ) -> PorterResult<Self> {
        config.validate()?;

        log::debug!(
            "Created handler '{}' with {} target strategy",
            config.name,
            strategy.kind()
        );

        Ok(Self {
            shared: Arc::new(HandlerShared {
                id: Uuid::new_v4(),
                config,
                state: LifecycleStateMachine::new(),
                drain: DrainCounter::new(),
                strategy,
                init_lock: tokio::sync::Mutex::new(()),
                invalidation: Mutex::new(Arc::new(InvalidationRegistry::new())),
                events: EventSource::default(),
                destroy_started: AtomicBool::new(false),
                owner: RwLock::new(None),
                chain: RwLock::new(None),
                responder: RwLock::new(Arc::new(DefaultUnavailableResponder)),
                created_at: Instant::now(),
                last_access_ms: AtomicU64::new(0),
            }),
        })
    }

    /// Re-dispatch responses through `chain`
    pub fn with_chain(self, chain: Arc<dyn ChainLink>) -> Self {
        *self
            .shared
            .chain
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(chain);
        self
    }

    /// Use `responder` for rejected requests
    pub fn with_responder(self, responder: Arc<dyn UnavailableResponder>) -> Self {
        *self
            .shared
            .responder
            .write()
            .unwrap_or_else(PoisonError::into_inner) = responder;
        self
    }

    pub(crate) fn set_owner(&self, owner: Weak<HandlerTable>) {
        *self
            .shared
            .owner
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(owner);
    }

    /// Remove this handler from its registry, unless it was already replaced
    pub(crate) fn detach_from_owner(&self) {
        let owner = self
            .shared
            .owner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(table) = owner.and_then(|owner| owner.upgrade()) else {
            return;
        };

        let mut handlers = table.write().unwrap_or_else(PoisonError::into_inner);
        let registered_here = handlers
            .get(self.name())
            .is_some_and(|registered| registered.id() == self.id());
        if registered_here {
            handlers.remove(self.name());
            log::debug!("Removed handler '{}' from its registry", self.name());
        }
    }

    pub(crate) fn current_invalidation(&self) -> Arc<InvalidationRegistry> {
        Arc::clone(
            &self
                .shared
                .invalidation
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    pub(crate) fn touch(&self) {
        let elapsed = self.shared.created_at.elapsed().as_millis();
        self.shared
            .last_access_ms
            .store(u64::try_from(elapsed).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    pub(crate) fn emit(&self, event: HandlerEvent) {
        self.shared.events.emit(self.name(), event);
    }
}
