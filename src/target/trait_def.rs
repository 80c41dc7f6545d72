// ============================================================================
// File: packages/porter/src/target/trait_def.rs
// ----------------------------------------------------------------------------
// Target and TargetFactory trait definitions
// ============================================================================

use std::sync::Arc;

use crate::async_task::AsyncTask;
use crate::config::HandlerConfig;
use crate::target::errors::TargetResult;
use crate::target::types::{Request, Response};

/// Long-lived request-processing object owned by a handler
///
/// Implementations must tolerate concurrent `handle` calls unless their
/// factory reports `single_request`, in which case the handler pools
/// instances and never shares one between requests.
pub trait Target: Send + Sync + std::fmt::Debug {
    /// Process one request
    ///
    /// # Arguments
    /// * `request` - Inbound request, transport already terminated
    ///
    /// # Returns
    /// AsyncTask that resolves to the response or a target error
    fn handle(&self, request: Request) -> AsyncTask<TargetResult<Response>>;

    /// Release the target's resources
    ///
    /// Called exactly once per constructed target.
    fn shutdown(&self) -> AsyncTask<TargetResult<()>>;
}

/// Constructs targets on demand
pub trait TargetFactory: Send + Sync + std::fmt::Debug {
    /// Construct and initialize a new target
    ///
    /// Return `TargetError::Transient` to request a backoff; any other
    /// error marks the handler permanently unavailable.
    fn construct(&self, config: &HandlerConfig) -> AsyncTask<TargetResult<Arc<dyn Target>>>;

    /// Whether each target instance can serve only one request at a time
    fn single_request(&self) -> bool {
        false
    }
}
