// ============================================================================
// File: packages/porter/src/pool/lifecycle.rs
// ----------------------------------------------------------------------------
// Instance pool element lifecycle:
// - Checkout (reuse or construct)
// - Checkin with opportunistic eviction
// - Prewarming and reopening
// ============================================================================

use std::sync::Arc;

use tokio::time::Instant;

use crate::target::{TargetError, TargetResult};

use super::{InstancePool, PoolElement, retire};

impl InstancePool {
    /// Take an instance for exclusive use
    ///
    /// Reuses the most recently checked-in idle instance, or constructs a
    /// new one. Construction runs outside the pool lock.
    ///
    /// # Returns
    /// Pool element to hand back through `checkin`
    pub async fn checkout(&self) -> TargetResult<PoolElement> {
        {
            let mut state = self.lock()?;
            if state.closed {
                return Err(TargetError::NotInitialized);
            }
            if let Some(element) = state.idle.pop_back() {
                return Ok(element);
            }
        }

        let element = PoolElement::new(self.factory.construct(&self.config).await??);

        let mut state = self.lock()?;
        if state.closed {
            drop(state);
            retire(&self.config.name, element.id, element.target);
            return Err(TargetError::NotInitialized);
        }
        state.all.insert(element.id, Arc::clone(&element.target));
        log::debug!(
            "Constructed pooled instance {} for handler '{}' ({} live)",
            element.id,
            self.config.name,
            state.all.len()
        );
        Ok(element)
    }

    /// Return an instance to the pool
    ///
    /// Stamps the access time, makes the instance idle and then evicts
    /// whatever has been idle too long. Instances returned after
    /// destroy_all were already shut down and are dropped.
    ///
    /// # Returns
    /// Number of instances evicted
    pub fn checkin(&self, mut element: PoolElement) -> TargetResult<usize> {
        let now = Instant::now();
        element.last_access = now;

        let expired = {
            let mut state = self.lock()?;
            if state.closed || !state.all.contains_key(&element.id) {
                log::debug!(
                    "Dropping instance {} returned to closed pool of handler '{}'",
                    element.id,
                    self.config.name
                );
                return Ok(0);
            }
            state.idle.push_back(element);
            self.take_expired(&mut state, now)
        };

        let evicted = expired.len();
        for element in expired {
            retire(&self.config.name, element.id, element.target);
        }
        Ok(evicted)
    }

    /// Construct idle instances until `count` are live
    ///
    /// # Returns
    /// Number of instances constructed
    pub async fn prewarm(&self, count: usize) -> TargetResult<usize> {
        let mut constructed = 0;
        loop {
            {
                let state = self.lock()?;
                if state.closed {
                    return Err(TargetError::NotInitialized);
                }
                if state.all.len() >= count {
                    return Ok(constructed);
                }
            }

            let element = PoolElement::new(self.factory.construct(&self.config).await??);

            let mut state = self.lock()?;
            if state.closed {
                drop(state);
                retire(&self.config.name, element.id, element.target);
                return Err(TargetError::NotInitialized);
            }
            state.all.insert(element.id, Arc::clone(&element.target));
            state.idle.push_back(element);
            constructed += 1;
        }
    }

    /// Accept instances again after destroy_all
    pub fn reopen(&self) -> TargetResult<()> {
        self.lock()?.closed = false;
        Ok(())
    }
}
