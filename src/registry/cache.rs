// ============================================================================
// File: packages/porter/src/registry/cache.rs
// ----------------------------------------------------------------------------
// Handler reference cache.
//
// Entries are evicted by the handler's invalidation registry, so a cached
// reference never outlives a destroy or unload of its handler.
// ============================================================================

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use uuid::Uuid;

use crate::error::PorterResult;
use crate::handler::Handler;
use crate::invalidation::{InvalidationListener, InvalidationRegistry};

use super::HandlerRegistry;

type CacheEntries = RwLock<HashMap<String, CacheEntry>>;

/// Cached handler plus the eviction listener registered on its behalf
#[derive(Clone)]
struct CacheEntry {
    handler: Handler,
    generation: Arc<InvalidationRegistry>,
    eviction: Arc<dyn InvalidationListener>,
}

impl CacheEntry {
    fn release(&self) {
        self.generation.deregister(&self.eviction);
    }
}

/// Cache of resolved handler references keyed by caller-chosen keys
/// (typically request paths)
///
/// Each entry holds exactly one listener on its handler; dropping the entry
/// through [`HandlerCache::invalidate`] deregisters it.
#[derive(Clone, Default)]
pub struct HandlerCache {
    entries: Arc<CacheEntries>,
}

impl std::fmt::Debug for HandlerCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerCache")
            .field("entries", &self.len())
            .finish()
    }
}

/// Evicts one cache entry when its handler is invalidated
struct CacheEviction {
    entries: Weak<CacheEntries>,
    key: String,
    handler_id: Uuid,
}

impl InvalidationListener for CacheEviction {
    fn invalidate(&self) -> anyhow::Result<()> {
        let Some(entries) = self.entries.upgrade() else {
            return Ok(());
        };

        let mut entries = entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries
            .get(&self.key)
            .is_some_and(|cached| cached.handler.id() == self.handler_id)
        {
            entries.remove(&self.key);
            log::debug!("Evicted cached handler reference '{}'", self.key);
        }
        Ok(())
    }
}

impl HandlerCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the handler registered under `name`, caching it under the same key
    pub fn resolve(&self, name: &str, registry: &HandlerRegistry) -> PorterResult<Handler> {
        self.resolve_with(name, || registry.get(name))
    }

    /// Resolve `key`, calling `lookup` on a miss
    ///
    /// The looked-up handler is cached and an invalidation listener is
    /// registered on it that evicts the entry. A concurrent resolve that
    /// filled the entry first wins; no second listener is registered.
    pub fn resolve_with<F>(&self, key: &str, lookup: F) -> PorterResult<Handler>
    where
        F: FnOnce() -> PorterResult<Handler>,
    {
        if let Some(handler) = self.cached(key) {
            return Ok(handler);
        }

        let handler = lookup()?;
        let eviction: Arc<dyn InvalidationListener> = Arc::new(CacheEviction {
            entries: Arc::downgrade(&self.entries),
            key: key.to_string(),
            handler_id: handler.id(),
        });
        let entry = CacheEntry {
            handler: handler.clone(),
            generation: handler.invalidation_registry(),
            eviction: Arc::clone(&eviction),
        };

        {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = entries.get(key) {
                return Ok(existing.handler.clone());
            }
            entries.insert(key.to_string(), entry.clone());
        }

        // Registering on an invalidated handler evicts the entry right away
        entry.generation.register(eviction);

        Ok(handler)
    }

    /// Cached handler for `key`, if any
    pub fn cached(&self, key: &str) -> Option<Handler> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|entry| entry.handler.clone())
    }

    /// Drop the entry for `key` and deregister its eviction listener
    ///
    /// # Returns
    /// The handler that was cached under `key`
    pub fn invalidate(&self, key: &str) -> Option<Handler> {
        let entry = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)?;
        entry.release();
        Some(entry.handler)
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
