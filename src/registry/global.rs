// ============================================================================
// File: packages/porter/src/registry/global.rs
// ----------------------------------------------------------------------------
// Process-wide handler registry
// ============================================================================

use std::sync::OnceLock;

use super::HandlerRegistry;

/// Global handler registry singleton
static GLOBAL_REGISTRY: OnceLock<HandlerRegistry> = OnceLock::new();

/// Get the global handler registry
///
/// # Returns
/// Reference to the global registry, created empty on first use
pub fn global_registry() -> &'static HandlerRegistry {
    GLOBAL_REGISTRY.get_or_init(HandlerRegistry::new)
}

/// Install a prepared registry as the global registry
///
/// # Arguments
/// * `registry` - Registry to install, possibly with handlers already registered
///
/// # Returns
/// Result indicating success or if already initialized
pub fn init_global_registry(registry: HandlerRegistry) -> Result<(), &'static str> {
    GLOBAL_REGISTRY
        .set(registry)
        .map_err(|_| "Global handler registry already initialized")
}
