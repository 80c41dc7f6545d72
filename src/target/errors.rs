// ============================================================================
// File: packages/porter/src/target/errors.rs
// ----------------------------------------------------------------------------
// Errors raised by targets and their factories
// ============================================================================

use tokio::task::JoinError;

/// Target-side error types
///
/// `Permanent` and `Transient` drive the owning handler's availability;
/// the remaining variants only fail the request at hand.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// Target cannot work until externally fixed
    #[error("Target is permanently unavailable: {reason}")]
    Permanent { reason: String },

    /// Target asks not to be used for a while
    #[error("Target is unavailable for {retry_after_secs} seconds: {reason}")]
    Transient {
        reason: String,
        retry_after_secs: u64,
    },

    /// Request-level failure
    #[error("Request failed: {message}")]
    Failed { message: String },

    /// Invocation reached a target that was never constructed or already torn down
    #[error("Target is not initialized")]
    NotInitialized,

    /// Task running the target panicked or was cancelled
    #[error("Target task aborted: {message}")]
    Aborted { message: String },

    /// Opaque collaborator error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TargetError {
    /// Create a permanent failure
    pub fn permanent<R: Into<String>>(reason: R) -> Self {
        Self::Permanent {
            reason: reason.into(),
        }
    }

    /// Create a transient failure with a retry delay
    pub fn transient<R: Into<String>>(reason: R, retry_after_secs: u64) -> Self {
        Self::Transient {
            reason: reason.into(),
            retry_after_secs,
        }
    }

    /// Create a request-level failure
    pub fn failed<M: Into<String>>(message: M) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Human-readable reason used for unavailability messages
    pub fn reason(&self) -> String {
        match self {
            Self::Permanent { reason } | Self::Transient { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}

impl From<JoinError> for TargetError {
    fn from(err: JoinError) -> Self {
        let message = if err.is_panic() {
            "target task panicked".to_string()
        } else {
            format!("target task cancelled: {err}")
        };
        Self::Aborted { message }
    }
}

/// Result type for target operations
pub type TargetResult<T> = Result<T, TargetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons() {
        assert_eq!(TargetError::permanent("no class").reason(), "no class");
        assert_eq!(TargetError::transient("warming", 5).reason(), "warming");
        assert_eq!(
            TargetError::failed("bad").reason(),
            "Request failed: bad"
        );
    }

    #[tokio::test]
    async fn join_errors_become_aborted() {
        let task = tokio::spawn(async {
            panic!("boom");
        });
        let err: TargetError = task.await.unwrap_err().into();
        assert!(matches!(err, TargetError::Aborted { .. }));
    }
}
