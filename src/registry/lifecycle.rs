// ============================================================================
// File: packages/porter/src/registry/lifecycle.rs
// ----------------------------------------------------------------------------
// Handler registration and removal
// ============================================================================

use std::sync::Arc;

use crate::async_task::{AsyncTask, AsyncTaskBuilder};
use crate::error::{PorterError, PorterResult};
use crate::handler::{DestroyReport, Handler};

use super::HandlerRegistry;

impl HandlerRegistry {
    /// Register a handler under its name
    ///
    /// Handlers configured with `load_on_startup` are initialized before
    /// the task resolves. A failed load stays in the handler's state (and
    /// the log); the handler remains registered.
    ///
    /// # Arguments
    /// * `handler` - Handler to register
    ///
    /// # Returns
    /// AsyncTask that resolves when the handler is registered
    pub fn register(&self, handler: Handler) -> AsyncTask<PorterResult<()>> {
        let handlers_lock = Arc::clone(&self.handlers);

        AsyncTaskBuilder::new(async move {
            if handler.is_destroyed() {
                return Err(PorterError::invalid_config(format!(
                    "Handler '{}' has been destroyed and cannot be registered",
                    handler.name()
                )));
            }

            {
                let mut handlers = handlers_lock.write().map_err(|e| {
                    PorterError::internal(format!("Failed to acquire write lock: {e}"))
                })?;

                if handlers.contains_key(handler.name()) {
                    return Err(PorterError::HandlerConflict {
                        name: handler.name().to_string(),
                    });
                }
                handlers.insert(handler.name().to_string(), handler.clone());
            }

            handler.set_owner(Arc::downgrade(&handlers_lock));
            log::debug!("Registered handler '{}'", handler.name());

            if handler.config().load_on_startup {
                match handler.load().await {
                    Ok(Ok(())) => log::info!("Loaded handler '{}' on startup", handler.name()),
                    Ok(Err(e)) => log::warn!("Handler '{}' failed to load on startup: {e}", handler.name()),
                    Err(e) => log::warn!("Startup load of handler '{}' aborted: {e}", handler.name()),
                }
            }

            Ok(())
        })
        .spawn()
    }

    /// Remove a handler and destroy it
    ///
    /// # Arguments
    /// * `name` - Handler name
    ///
    /// # Returns
    /// AsyncTask that resolves to the destroy report, or `None` if no
    /// handler was registered under `name`
    pub fn remove(&self, name: &str) -> AsyncTask<PorterResult<Option<DestroyReport>>> {
        let handlers_lock = Arc::clone(&self.handlers);
        let name = name.to_string();

        AsyncTaskBuilder::new(async move {
            let removed = {
                let mut handlers = handlers_lock.write().map_err(|e| {
                    PorterError::internal(format!("Failed to acquire write lock: {e}"))
                })?;

                handlers.remove(&name)
            };

            match removed {
                Some(handler) => {
                    log::debug!("Removing handler '{name}'");
                    Ok(Some(handler.run_destroy().await))
                }
                None => Ok(None),
            }
        })
        .spawn()
    }
}
