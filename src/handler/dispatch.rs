// ============================================================================
// File: packages/porter/src/handler/dispatch.rs
// ----------------------------------------------------------------------------
// Request dispatch:
// - Admission against the availability state, initializing on demand
// - Drain bracket around target invocation and chained hops
// - Classification of failures raised during service
// ============================================================================

use std::sync::PoisonError;
use std::time::Duration;

use tokio::time::Instant;

use crate::async_task::{AsyncTask, AsyncTaskBuilder};
use crate::chain::chained_request;
use crate::drain::DrainGuard;
use crate::error::{PorterError, PorterResult};
use crate::lifecycle::{Acquire, HandlerEvent, Rejection};
use crate::target::{Request, Response, TargetError};

use super::Handler;

/// Result of asking a handler to take a request
enum Admission {
    /// Request is inside the drain bracket and may be serviced
    Granted(DrainGuard),
    /// Request was turned away with this response
    Rejected(Response),
}

impl Handler {
    /// Service one request
    ///
    /// Rejections while the handler is unavailable resolve to a synthesized
    /// unavailable response, not an error. The request that triggers a
    /// failing initialization gets the classified failure.
    ///
    /// # Arguments
    /// * `request` - Inbound request
    ///
    /// # Returns
    /// AsyncTask that resolves to the response or error
    pub fn dispatch(&self, request: Request) -> AsyncTask<PorterResult<Response>> {
        let handler = self.clone();
        AsyncTaskBuilder::new(async move { handler.dispatch_chained(request).await }).spawn()
    }

    async fn dispatch_chained(&self, request: Request) -> PorterResult<Response> {
        let _guard = match self.admit().await? {
            Admission::Granted(guard) => guard,
            Admission::Rejected(response) => return Ok(response),
        };

        let mut response = self.invoke_target(request).await?;
        let limit = self.shared.config.max_chain_depth;
        let mut hops = 0;

        while let Some(next) = self.next_hop(&response) {
            hops += 1;
            if hops > limit {
                return Err(PorterError::ChainTooDeep {
                    handler: self.name().to_string(),
                    limit,
                });
            }
            log::debug!(
                "Handler '{}' chaining response to '{}' (hop {hops})",
                self.name(),
                next.name()
            );
            response = next.dispatch_single(chained_request(response)).await?;
        }

        Ok(response)
    }

    /// Service one chained hop without following the hop's own chain
    async fn dispatch_single(&self, request: Request) -> PorterResult<Response> {
        let _guard = match self.admit().await? {
            Admission::Granted(guard) => guard,
            Admission::Rejected(response) => return Ok(response),
        };
        self.invoke_target(request).await
    }

    /// Bring the request inside the drain bracket, initializing if needed
    async fn admit(&self) -> PorterResult<Admission> {
        loop {
            match self.shared.state.try_acquire(Instant::now()) {
                Acquire::Reject(rejection) => {
                    return Ok(Admission::Rejected(self.reject(&rejection)));
                }
                Acquire::NeedsInit => self.initialize_target().await?,
                Acquire::Proceed => {
                    let guard = self.shared.drain.enter();
                    // Destroy may have started between the check and enter
                    if self.shared.state.is_available() {
                        self.touch();
                        return Ok(Admission::Granted(guard));
                    }
                }
            }
        }
    }

    fn reject(&self, rejection: &Rejection) -> Response {
        log::debug!(
            "Handler '{}' rejected a request: {} (retry after {:?})",
            self.name(),
            rejection.reason,
            rejection.retry_after
        );
        self.emit(HandlerEvent::Rejected {
            retry_after: rejection.retry_after,
        });

        let responder = self
            .shared
            .responder
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        responder.respond(self.name(), rejection)
    }

    fn next_hop(&self, response: &Response) -> Option<Handler> {
        let chain = self
            .shared
            .chain
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;
        chain.next_hop(response)
    }

    async fn invoke_target(&self, request: Request) -> PorterResult<Response> {
        let started = Instant::now();
        let outcome = match self.shared.strategy.invoke(request).await {
            Ok(outcome) => outcome,
            Err(e) => Err(TargetError::from(e)),
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok(response) => {
                self.emit(HandlerEvent::ServiceFinished { elapsed });
                Ok(response)
            }
            Err(error) => {
                self.emit(HandlerEvent::ServiceFailed {
                    elapsed,
                    message: error.to_string(),
                });
                Err(self.classify_service_failure(error))
            }
        }
    }

    fn classify_service_failure(&self, error: TargetError) -> PorterError {
        match error {
            TargetError::Permanent { reason } => {
                self.enter_permanent(&reason);
                PorterError::PermanentFailure {
                    handler: self.name().to_string(),
                    reason,
                }
            }
            TargetError::Transient {
                reason,
                retry_after_secs,
            } => {
                log::warn!(
                    "Handler '{}' is unavailable for {retry_after_secs}s: {reason}",
                    self.name()
                );
                match self.enter_temporary(Duration::from_secs(retry_after_secs), &reason) {
                    Some(retry_after_secs) => PorterError::TransientFailure {
                        handler: self.name().to_string(),
                        reason,
                        retry_after_secs,
                    },
                    None => PorterError::PermanentFailure {
                        handler: self.name().to_string(),
                        reason,
                    },
                }
            }
            other => PorterError::request_failed(self.name(), other),
        }
    }
}
