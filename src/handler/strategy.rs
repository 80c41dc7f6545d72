// ============================================================================
// File: packages/porter/src/handler/strategy.rs
// ----------------------------------------------------------------------------
// Target strategies: how a handler owns and invokes its target(s).
//
// - SharedTarget: one lazily constructed target serving concurrent requests
// - PooledTarget: instance pool for single-request targets
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::async_task::{AsyncTask, AsyncTaskBuilder};
use crate::config::HandlerConfig;
use crate::pool::InstancePool;
use crate::target::{Request, Response, Target, TargetError, TargetFactory, TargetResult};

/// Outcome of a successful initialization
#[derive(Debug, Default)]
pub struct Initialized {
    /// Shutdown failure of a stale target this initialization replaced
    ///
    /// Never a reason to fail initialization: the new target is in place.
    pub retired_failure: Option<TargetError>,
}

/// Ownership and invocation policy for a handler's target
///
/// The handler serializes `initialize` and `teardown` against each other;
/// `invoke` may run concurrently with anything.
pub trait TargetStrategy: Send + Sync + std::fmt::Debug {
    /// Construct whatever the strategy needs to serve requests
    ///
    /// Only construction failures are errors.
    fn initialize(&self, config: &HandlerConfig) -> AsyncTask<TargetResult<Initialized>>;

    /// Service one request
    fn invoke(&self, request: Request) -> AsyncTask<TargetResult<Response>>;

    /// Release every target the strategy owns
    fn teardown(&self) -> AsyncTask<TargetResult<()>>;

    /// Whether a target is currently constructed
    fn is_initialized(&self) -> bool;

    /// Short strategy name for logs
    fn kind(&self) -> &'static str;

    /// Drop idle instances past their idle threshold
    ///
    /// # Returns
    /// Number of instances evicted
    fn evict_idle(&self) -> TargetResult<usize> {
        Ok(0)
    }
}

/// One target shared by all concurrent requests
#[derive(Debug)]
pub struct SharedTarget {
    factory: Arc<dyn TargetFactory>,
    slot: Arc<RwLock<Option<Arc<dyn Target>>>>,
}

impl SharedTarget {
    /// Create a strategy that constructs its target on first initialization
    pub fn new(factory: Arc<dyn TargetFactory>) -> Self {
        Self {
            factory,
            slot: Arc::new(RwLock::new(None)),
        }
    }

    fn current(&self) -> Option<Arc<dyn Target>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TargetStrategy for SharedTarget {
    fn initialize(&self, config: &HandlerConfig) -> AsyncTask<TargetResult<Initialized>> {
        let factory = Arc::clone(&self.factory);
        let slot = Arc::clone(&self.slot);
        let config = config.clone();

        AsyncTaskBuilder::new(async move {
            let target = factory.construct(&config).await??;
            let previous = slot
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .replace(target);

            let Some(previous) = previous else {
                return Ok(Initialized::default());
            };

            log::warn!(
                "Handler '{}' replaced a live target; shutting the old one down",
                config.name
            );
            let retired_failure = match previous.shutdown().await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(e) => Some(TargetError::from(e)),
            };
            Ok(Initialized { retired_failure })
        })
        .spawn()
    }

    fn invoke(&self, request: Request) -> AsyncTask<TargetResult<Response>> {
        match self.current() {
            Some(target) => target.handle(request),
            None => AsyncTaskBuilder::new(async { Err(TargetError::NotInitialized) }).spawn(),
        }
    }

    fn teardown(&self) -> AsyncTask<TargetResult<()>> {
        let target = self
            .slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        AsyncTaskBuilder::new(async move {
            match target {
                Some(target) => target.shutdown().await?,
                None => Ok(()),
            }
        })
        .spawn()
    }

    fn is_initialized(&self) -> bool {
        self.current().is_some()
    }

    fn kind(&self) -> &'static str {
        "shared"
    }
}

/// Pool of single-request targets, one per concurrent request
#[derive(Debug)]
pub struct PooledTarget {
    pool: InstancePool,
    initialized: Arc<AtomicBool>,
}

impl PooledTarget {
    /// Create a pooled strategy
    ///
    /// # Arguments
    /// * `factory` - Constructs pool instances
    /// * `config` - Supplies prewarm size and idle threshold
    pub fn new(factory: Arc<dyn TargetFactory>, config: HandlerConfig) -> Self {
        Self {
            pool: InstancePool::new(factory, config),
            initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The underlying pool
    pub fn pool(&self) -> &InstancePool {
        &self.pool
    }
}

impl TargetStrategy for PooledTarget {
    fn initialize(&self, config: &HandlerConfig) -> AsyncTask<TargetResult<Initialized>> {
        let pool = self.pool.clone();
        let initialized = Arc::clone(&self.initialized);
        let initial_size = config.pool.initial_size;

        AsyncTaskBuilder::new(async move {
            pool.reopen()?;
            if let Err(e) = pool.prewarm(initial_size).await {
                // Keep partially built instances from leaking
                pool.destroy_all().await?;
                return Err(e);
            }
            initialized.store(true, Ordering::SeqCst);
            Ok(Initialized::default())
        })
        .spawn()
    }

    fn invoke(&self, request: Request) -> AsyncTask<TargetResult<Response>> {
        let pool = self.pool.clone();

        AsyncTaskBuilder::new(async move {
            let element = pool.checkout().await?;
            let result = match element.target().handle(request).await {
                Ok(result) => result,
                Err(e) => Err(TargetError::from(e)),
            };
            if let Err(e) = pool.checkin(element) {
                log::warn!("Failed to return instance to pool: {e}");
            }
            result
        })
        .spawn()
    }

    fn teardown(&self) -> AsyncTask<TargetResult<()>> {
        let pool = self.pool.clone();
        let initialized = Arc::clone(&self.initialized);

        AsyncTaskBuilder::new(async move {
            initialized.store(false, Ordering::SeqCst);
            let count = pool.destroy_all().await?;
            log::debug!("Shut down {count} pooled instance(s)");
            Ok(())
        })
        .spawn()
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn kind(&self) -> &'static str {
        "pooled"
    }

    fn evict_idle(&self) -> TargetResult<usize> {
        self.pool.evict_expired()
    }
}
