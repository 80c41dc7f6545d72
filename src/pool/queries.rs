// ============================================================================
// File: packages/porter/src/pool/queries.rs
// ----------------------------------------------------------------------------
// Instance pool query operations
// ============================================================================

use crate::target::TargetResult;

use super::InstancePool;

impl InstancePool {
    /// Live instances, idle or checked out
    pub fn total_count(&self) -> TargetResult<usize> {
        Ok(self.lock()?.all.len())
    }

    /// Instances waiting in the pool
    pub fn idle_count(&self) -> TargetResult<usize> {
        Ok(self.lock()?.idle.len())
    }

    /// Whether destroy_all has closed the pool
    pub fn is_closed(&self) -> TargetResult<bool> {
        Ok(self.lock()?.closed)
    }
}
