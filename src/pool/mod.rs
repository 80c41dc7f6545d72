// ============================================================================
// File: packages/porter/src/pool/mod.rs
// ----------------------------------------------------------------------------
// Instance pool for targets that can serve one request at a time.
//
// - LIFO reuse of idle instances (warm instances first)
// - On-demand construction without a hard maximum
// - Idle eviction, oldest first
// - Teardown of every instance, idle or checked out
// ============================================================================

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::async_task::AsyncTaskBuilder;
use crate::config::HandlerConfig;
use crate::target::{Target, TargetError, TargetFactory, TargetResult};

mod lifecycle;
mod maintenance;
mod queries;

#[cfg(test)]
mod tests;

/// Bounded-by-idleness set of interchangeable target instances
///
/// Cloning yields another handle to the same pool.
#[derive(Debug, Clone)]
pub struct InstancePool {
    /// Constructs new instances
    pub(crate) factory: Arc<dyn TargetFactory>,

    /// Configuration handed to the factory
    pub(crate) config: Arc<HandlerConfig>,

    /// Every live instance plus the idle subset, behind one lock
    pub(crate) state: Arc<Mutex<PoolState>>,

    /// Idle time after which an instance is evicted
    pub(crate) max_idle_time: Duration,
}

#[derive(Debug, Default)]
pub(crate) struct PoolState {
    /// All live instances, idle or checked out
    pub(crate) all: HashMap<Uuid, Arc<dyn Target>>,

    /// Idle instances, oldest check-in at the front
    pub(crate) idle: VecDeque<PoolElement>,

    /// Set by destroy_all; later check-ins are dropped instead of pooled
    pub(crate) closed: bool,
}

/// One pooled target instance
///
/// Held exclusively by a single request between checkout and checkin.
#[derive(Debug)]
pub struct PoolElement {
    id: Uuid,
    target: Arc<dyn Target>,
    last_access: Instant,
}

impl PoolElement {
    pub(crate) fn new(target: Arc<dyn Target>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            last_access: Instant::now(),
        }
    }

    /// Unique element identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The pooled target
    pub fn target(&self) -> &Arc<dyn Target> {
        &self.target
    }

    /// When the element was last checked in
    pub fn last_access(&self) -> Instant {
        self.last_access
    }
}

impl InstancePool {
    /// Create an empty pool
    ///
    /// # Arguments
    /// * `factory` - Constructs instances on demand
    /// * `config` - Handler configuration; supplies `pool.max_idle_time`
    pub fn new(factory: Arc<dyn TargetFactory>, config: HandlerConfig) -> Self {
        let max_idle_time = config.pool.max_idle_time;
        Self {
            factory,
            config: Arc::new(config),
            state: Arc::new(Mutex::new(PoolState::default())),
            max_idle_time,
        }
    }

    pub(crate) fn lock(&self) -> TargetResult<MutexGuard<'_, PoolState>> {
        self.state.lock().map_err(|e| {
            TargetError::Other(anyhow::anyhow!("Failed to acquire pool lock: {e}"))
        })
    }
}

/// Shut an instance down in the background, logging failures
pub(crate) fn retire(handler: &str, id: Uuid, target: Arc<dyn Target>) {
    let handler = handler.to_string();
    let _detached = AsyncTaskBuilder::new(async move {
        match target.shutdown().await {
            Ok(Ok(())) => log::debug!("Retired pooled instance {id} of handler '{handler}'"),
            Ok(Err(e)) => {
                log::warn!("Failed to shut down pooled instance {id} of handler '{handler}': {e}")
            }
            Err(e) => log::warn!("Shutdown of pooled instance {id} of handler '{handler}' aborted: {e}"),
        }
    })
    .spawn();
}
