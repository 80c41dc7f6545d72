// ============================================================================
// File: packages/porter/src/error.rs
// ----------------------------------------------------------------------------
// Crate-level error type for handler, pool and registry operations.
//
// Failure classes:
// - Permanent / transient initialization failures (absorbed into handler
//   state; only the initializing call sees them directly)
// - Rejections while a handler is unavailable
// - Request failures raised by a target during service
// - Registry and configuration errors
// ============================================================================

use crate::target::TargetError;

/// Errors surfaced by porter operations
#[derive(Debug, thiserror::Error)]
pub enum PorterError {
    /// Target construction is broken and will not be retried
    #[error("Handler '{handler}' is permanently unavailable: {reason}")]
    PermanentFailure { handler: String, reason: String },

    /// Target asked for a backoff before the next attempt
    #[error("Handler '{handler}' is unavailable for {retry_after_secs} seconds: {reason}")]
    TransientFailure {
        handler: String,
        reason: String,
        retry_after_secs: u64,
    },

    /// Request rejected by availability policy, not a failure of the request
    #[error("Handler '{handler}' rejected the request: {reason}")]
    Unavailable {
        handler: String,
        reason: String,
        retry_after: Option<u64>,
    },

    /// Target failed while servicing a request
    #[error("Handler '{handler}' failed to service the request: {source}")]
    RequestFailed {
        handler: String,
        #[source]
        source: TargetError,
    },

    /// No handler registered under this name
    #[error("Handler '{name}' not found")]
    HandlerNotFound { name: String },

    /// A handler with this name is already registered
    #[error("Handler '{name}' is already registered")]
    HandlerConflict { name: String },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Chained re-dispatch exceeded the configured hop limit
    #[error("Handler '{handler}' exceeded the chain depth limit of {limit}")]
    ChainTooDeep { handler: String, limit: usize },

    /// Collaborator error with no handler context
    #[error(transparent)]
    Target(#[from] TargetError),

    /// Internal invariant violation (poisoned lock, lost task)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PorterError {
    /// Create an internal error
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config<M: Into<String>>(message: M) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create a request failure attributed to a handler
    pub fn request_failed<H: Into<String>>(handler: H, source: TargetError) -> Self {
        Self::RequestFailed {
            handler: handler.into(),
            source,
        }
    }

    /// Seconds a client should wait before retrying, if the error is temporary
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::TransientFailure {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            Self::Unavailable { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Whether this error means the handler can never serve again
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::PermanentFailure { .. } => true,
            Self::Unavailable { retry_after, .. } => retry_after.is_none(),
            _ => false,
        }
    }
}

/// Result type for porter operations
pub type PorterResult<T> = Result<T, PorterError>;
