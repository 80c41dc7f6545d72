// ============================================================================
// File: packages/porter/src/registry/queries.rs
// ----------------------------------------------------------------------------
// Handler lookup and state queries
// ============================================================================

use std::collections::HashMap;

use crate::error::{PorterError, PorterResult};
use crate::handler::Handler;
use crate::lifecycle::LifecycleState;

use super::HandlerRegistry;

impl HandlerRegistry {
    /// Look up a handler by name
    pub fn get(&self, name: &str) -> PorterResult<Handler> {
        let handlers = self
            .handlers
            .read()
            .map_err(|e| PorterError::internal(format!("Failed to acquire read lock: {e}")))?;

        handlers
            .get(name)
            .cloned()
            .ok_or_else(|| PorterError::HandlerNotFound {
                name: name.to_string(),
            })
    }

    /// Names of all registered handlers, sorted
    pub fn list_handlers(&self) -> PorterResult<Vec<String>> {
        let handlers = self
            .handlers
            .read()
            .map_err(|e| PorterError::internal(format!("Failed to acquire read lock: {e}")))?;

        let mut names = handlers.keys().cloned().collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    /// Availability state of every registered handler
    pub fn handler_states(&self) -> PorterResult<HashMap<String, LifecycleState>> {
        let handlers = self
            .handlers
            .read()
            .map_err(|e| PorterError::internal(format!("Failed to acquire read lock: {e}")))?;

        Ok(handlers
            .iter()
            .map(|(name, handler)| (name.clone(), handler.state()))
            .collect())
    }

    /// Number of registered handlers
    pub fn len(&self) -> PorterResult<usize> {
        let handlers = self
            .handlers
            .read()
            .map_err(|e| PorterError::internal(format!("Failed to acquire read lock: {e}")))?;

        Ok(handlers.len())
    }

    /// Whether no handler is registered
    pub fn is_empty(&self) -> PorterResult<bool> {
        Ok(self.len()? == 0)
    }
}
