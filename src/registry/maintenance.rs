// ============================================================================
// File: packages/porter/src/registry/maintenance.rs
// ----------------------------------------------------------------------------
// Registry maintenance operations:
// - Evict idle pooled instances across handlers
// - Shut down every handler
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use crate::async_task::{AsyncTask, AsyncTaskBuilder};
use crate::error::{PorterError, PorterResult};
use crate::handler::DestroyReport;

use super::HandlerRegistry;

impl HandlerRegistry {
    /// Evict idle instances from every pooled handler
    ///
    /// # Returns
    /// AsyncTask that resolves with the number of instances evicted
    pub fn cleanup_idle(&self) -> AsyncTask<PorterResult<usize>> {
        let handlers_lock = Arc::clone(&self.handlers);

        AsyncTaskBuilder::new(async move {
            let handler_list = {
                let handlers = handlers_lock.read().map_err(|e| {
                    PorterError::internal(format!("Failed to acquire read lock: {e}"))
                })?;

                handlers.values().cloned().collect::<Vec<_>>()
            };

            let mut evicted = 0;
            for handler in handler_list {
                match handler.evict_idle() {
                    Ok(count) => evicted += count,
                    Err(e) => log::warn!(
                        "Failed to evict idle instances of handler '{}': {e}",
                        handler.name()
                    ),
                }
            }

            Ok(evicted)
        })
        .spawn()
    }

    /// Destroy every handler and clear the registry
    ///
    /// Handlers drain concurrently, each within its own wait bound.
    ///
    /// # Returns
    /// AsyncTask that resolves to the destroy report of each handler
    pub fn shutdown(&self) -> AsyncTask<PorterResult<HashMap<String, DestroyReport>>> {
        let handlers_lock = Arc::clone(&self.handlers);

        AsyncTaskBuilder::new(async move {
            let all_handlers = {
                let mut handlers = handlers_lock.write().map_err(|e| {
                    PorterError::internal(format!("Failed to acquire write lock: {e}"))
                })?;

                handlers.drain().collect::<Vec<_>>()
            };

            let destroy_tasks = all_handlers
                .into_iter()
                .map(|(name, handler)| (name, handler.destroy()))
                .collect::<Vec<_>>();

            let mut reports = HashMap::new();
            for (name, task) in destroy_tasks {
                match task.await {
                    Ok(Ok(report)) => {
                        reports.insert(name, report);
                    }
                    Ok(Err(e)) => log::warn!("Failed to destroy handler '{name}' during shutdown: {e}"),
                    Err(e) => log::warn!("Destroy of handler '{name}' aborted during shutdown: {e}"),
                }
            }

            Ok(reports)
        })
        .spawn()
    }
}
