// ============================================================================
// File: packages/porter/src/registry/mod.rs
// ----------------------------------------------------------------------------
// Owning registry for named handlers.
//
// Provides:
// - Named handler registration with eager loading
// - Removal with drain-aware destroy
// - Idle maintenance over pooled handlers
// - Concurrent shutdown of every handler
// - A handler reference cache kept consistent through invalidation
// ============================================================================

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::handler::Handler;

mod cache;
mod global;
mod lifecycle;
mod maintenance;
mod queries;

#[cfg(test)]
mod tests;

pub use cache::HandlerCache;
pub use global::{global_registry, init_global_registry};

/// Name-indexed handler table shared between a registry and its handlers
pub(crate) type HandlerTable = RwLock<HashMap<String, Handler>>;

/// Thread-safe registry of named handlers
///
/// Handlers keep a weak reference back to the table so they can remove
/// themselves when they become permanently unavailable. Cloning yields
/// another handle to the same registry.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    /// Registered handlers by name
    pub(crate) handlers: Arc<HandlerTable>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }
}
