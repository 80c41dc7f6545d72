// ============================================================================
// File: packages/porter/src/pool/maintenance.rs
// ----------------------------------------------------------------------------
// Instance pool maintenance operations:
// - Evict instances idle past the threshold
// - Destroy every instance at handler teardown
// ============================================================================

use tokio::time::Instant;

use crate::target::TargetResult;

use super::{InstancePool, PoolElement, PoolState, retire};

impl InstancePool {
    /// Remove and shut down instances idle longer than `max_idle_time`
    ///
    /// # Returns
    /// Number of instances evicted
    pub fn evict_expired(&self) -> TargetResult<usize> {
        let expired = {
            let mut state = self.lock()?;
            self.take_expired(&mut state, Instant::now())
        };

        let evicted = expired.len();
        for element in expired {
            retire(&self.config.name, element.id(), element.target);
        }
        if evicted > 0 {
            log::debug!(
                "Evicted {evicted} idle instance(s) from handler '{}'",
                self.config.name
            );
        }
        Ok(evicted)
    }

    /// Oldest-first scan; stops at the first instance that is still fresh
    pub(crate) fn take_expired(&self, state: &mut PoolState, now: Instant) -> Vec<PoolElement> {
        let mut expired = Vec::new();
        while let Some(oldest) = state.idle.front() {
            if now.saturating_duration_since(oldest.last_access()) <= self.max_idle_time {
                break;
            }
            if let Some(element) = state.idle.pop_front() {
                state.all.remove(&element.id());
                expired.push(element);
            }
        }
        expired
    }

    /// Close the pool and shut down every instance, idle or checked out
    ///
    /// Only safe once no checkout is in flight; the owning handler calls
    /// this after its drain completes.
    ///
    /// # Returns
    /// Number of instances shut down
    pub async fn destroy_all(&self) -> TargetResult<usize> {
        let targets = {
            let mut state = self.lock()?;
            state.closed = true;
            state.idle.clear();
            state.all.drain().collect::<Vec<_>>()
        };

        for (id, target) in &targets {
            match target.shutdown().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!(
                    "Failed to shut down pooled instance {id} of handler '{}': {e}",
                    self.config.name
                ),
                Err(e) => log::warn!(
                    "Shutdown of pooled instance {id} of handler '{}' aborted: {e}",
                    self.config.name
                ),
            }
        }

        Ok(targets.len())
    }
}
