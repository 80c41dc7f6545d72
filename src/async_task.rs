// ============================================================================
// File: packages/porter/src/async_task.rs
// ----------------------------------------------------------------------------
// Spawned-task handles used for every asynchronous collaborator call.
// ============================================================================

use std::future::Future;

/// Handle to a spawned asynchronous operation
///
/// Awaiting yields `Err(JoinError)` only when the task panicked or was
/// aborted; callers fold that into their own error type.
pub type AsyncTask<T> = tokio::task::JoinHandle<T>;

/// Builder that spawns a future onto the current tokio runtime
#[derive(Debug)]
pub struct AsyncTaskBuilder<F> {
    future: F,
}

impl<F> AsyncTaskBuilder<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    /// Wrap a future for spawning
    pub fn new(future: F) -> Self {
        Self { future }
    }

    /// Spawn the wrapped future and return its handle
    pub fn spawn(self) -> AsyncTask<F::Output> {
        tokio::spawn(self.future)
    }
}
