// ============================================================================
// File: packages/porter/src/handler/lifecycle.rs
// ----------------------------------------------------------------------------
// Handler lifecycle operations:
// - Initialization under the init lock, with failure classification
// - Availability transitions and their events
// - Drain-aware destroy and unload
// ============================================================================

use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::async_task::{AsyncTask, AsyncTaskBuilder};
use crate::error::{PorterError, PorterResult};
use crate::invalidation::InvalidationRegistry;
use crate::lifecycle::unavailability::{remaining_secs, wall_clock};
use crate::lifecycle::{Acquire, HandlerEvent, PermanentTransition};
use crate::target::TargetError;

use super::{DestroyReport, Handler};

const DESTROYED_REASON: &str = "handler destroyed";

impl Handler {
    /// Initialize the target ahead of the first request
    ///
    /// # Returns
    /// AsyncTask that resolves once the handler is available, or to the
    /// classified initialization failure or rejection
    pub fn load(&self) -> AsyncTask<PorterResult<()>> {
        let handler = self.clone();

        AsyncTaskBuilder::new(async move {
            loop {
                match handler.shared.state.try_acquire(Instant::now()) {
                    Acquire::Proceed => return Ok(()),
                    Acquire::Reject(rejection) => {
                        return Err(PorterError::Unavailable {
                            handler: handler.name().to_string(),
                            reason: rejection.reason,
                            retry_after: rejection.retry_after,
                        });
                    }
                    Acquire::NeedsInit => handler.initialize_target().await?,
                }
            }
        })
        .spawn()
    }

    /// Run the target strategy's initialization, once
    ///
    /// Callers that lose the race wait on the init lock and return without
    /// initializing; they re-evaluate availability themselves.
    pub(crate) async fn initialize_target(&self) -> PorterResult<()> {
        let _init = self.shared.init_lock.lock().await;

        if self.shared.state.try_acquire(Instant::now()) != Acquire::NeedsInit {
            return Ok(());
        }

        log::debug!(
            "Initializing {} target for handler '{}'",
            self.shared.strategy.kind(),
            self.name()
        );

        let outcome = match self.shared.strategy.initialize(&self.shared.config).await {
            Ok(outcome) => outcome,
            Err(e) => Err(TargetError::from(e)),
        };

        match outcome {
            Ok(initialized) => {
                if let Some(e) = initialized.retired_failure {
                    log::error!(
                        "Failed to shut down replaced target of handler '{}': {e}",
                        self.name()
                    );
                    self.emit(HandlerEvent::DestroyFailed {
                        message: e.to_string(),
                    });
                }
                self.enter_service();
                Ok(())
            }
            Err(TargetError::Transient {
                reason,
                retry_after_secs,
            }) => {
                log::warn!(
                    "Handler '{}' failed to initialize, retrying in {retry_after_secs}s: {reason}",
                    self.name()
                );
                match self.enter_temporary(Duration::from_secs(retry_after_secs), &reason) {
                    Some(retry_after_secs) => Err(PorterError::TransientFailure {
                        handler: self.name().to_string(),
                        reason,
                        retry_after_secs,
                    }),
                    None => Err(PorterError::PermanentFailure {
                        handler: self.name().to_string(),
                        reason,
                    }),
                }
            }
            Err(e) => {
                let reason = e.reason();
                log::error!("Handler '{}' failed to initialize: {reason}", self.name());
                self.enter_permanent(&reason);
                Err(PorterError::PermanentFailure {
                    handler: self.name().to_string(),
                    reason,
                })
            }
        }
    }

    /// Put the handler in service
    pub(crate) fn enter_service(&self) {
        if self.shared.state.mark_available() {
            log::debug!("Handler '{}' is available for service", self.name());
            self.emit(HandlerEvent::AvailableForService);
        }
    }

    /// Take the handler out of service for `duration`
    ///
    /// # Returns
    /// Whole seconds until the effective deadline, or `None` when the
    /// handler is permanently unavailable
    pub(crate) fn enter_temporary(&self, duration: Duration, reason: &str) -> Option<u64> {
        let now = Instant::now();
        match self
            .shared
            .state
            .mark_temporarily_unavailable(duration, reason, now)
        {
            Ok(until) => {
                self.emit(HandlerEvent::UnavailableForService {
                    until: Some(wall_clock(until, now)),
                    reason: reason.to_string(),
                });
                Some(remaining_secs(until, now).unwrap_or(0))
            }
            Err(_) => None,
        }
    }

    /// Move the handler to the terminal state
    ///
    /// A handler that was serving traffic is removed from its registry and
    /// destroyed in the background, so the request that reported the
    /// failure never waits on its own drain.
    pub(crate) fn enter_permanent(&self, reason: &str) {
        match self.shared.state.mark_permanently_unavailable(reason) {
            PermanentTransition::Entered { was_available } => {
                log::warn!(
                    "Handler '{}' is permanently unavailable: {reason}",
                    self.name()
                );
                self.emit(HandlerEvent::UnavailableForService {
                    until: None,
                    reason: reason.to_string(),
                });

                if was_available {
                    self.detach_from_owner();
                    let _detached = self.destroy();
                }
            }
            PermanentTransition::AlreadyPermanent { .. } => {}
        }
    }

    /// Drain, tear down and permanently retire the handler
    ///
    /// Waits at most `drain.wait_bound` for in-flight requests, then tears
    /// the target down regardless. Only the first call performs the
    /// sequence.
    ///
    /// # Returns
    /// AsyncTask that resolves to the destroy report
    pub fn destroy(&self) -> AsyncTask<PorterResult<DestroyReport>> {
        let handler = self.clone();
        AsyncTaskBuilder::new(async move { Ok(handler.run_destroy().await) }).spawn()
    }

    pub(crate) async fn run_destroy(&self) -> DestroyReport {
        if self
            .shared
            .destroy_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return DestroyReport::default();
        }

        log::debug!("Destroying handler '{}'", self.name());
        self.emit(HandlerEvent::StartDestroy);

        let bound = self.shared.config.drain.wait_bound;
        self.shared.state.begin_drain(bound, Instant::now());
        let _init = self.shared.init_lock.lock().await;

        let outstanding = self.drain_in_flight().await;
        self.teardown_target().await;
        let notified = self.current_invalidation().invalidate();

        self.shared
            .state
            .mark_permanently_unavailable(DESTROYED_REASON);
        self.shared.state.end_drain();
        self.detach_from_owner();

        log::debug!("Handler '{}' destroyed", self.name());
        self.emit(HandlerEvent::FinishDestroy);

        DestroyReport {
            performed: true,
            forced: outstanding > 0,
            outstanding,
            listeners_notified: notified.notified,
        }
    }

    /// Drain and tear down the target, then return to `Uninitialized`
    ///
    /// A pending outage is kept, so the next request after its deadline
    /// initializes a fresh target. Cached references are
    /// invalidated and a new invalidation generation starts.
    ///
    /// # Returns
    /// AsyncTask that resolves to the unload report, or an error once the
    /// handler has been destroyed or is permanently unavailable
    pub fn unload(&self) -> AsyncTask<PorterResult<DestroyReport>> {
        let handler = self.clone();
        AsyncTaskBuilder::new(async move { handler.run_unload().await }).spawn()
    }

    async fn run_unload(&self) -> PorterResult<DestroyReport> {
        let _init = self.shared.init_lock.lock().await;
        self.ensure_reloadable()?;

        log::debug!("Unloading handler '{}'", self.name());
        let bound = self.shared.config.drain.wait_bound;
        if self.shared.state.begin_drain(bound, Instant::now()).is_none() {
            self.shared.state.end_drain();
            return Err(self.destroyed_error());
        }

        let outstanding = self.drain_in_flight().await;
        self.teardown_target().await;

        let retired = std::mem::replace(
            &mut *self
                .shared
                .invalidation
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            Arc::new(InvalidationRegistry::new()),
        );
        let notified = retired.invalidate();

        // A destroy that started meanwhile owns the rest of the sequence
        if !self.shared.destroy_started.load(Ordering::SeqCst) {
            self.shared.state.mark_uninitialized(Instant::now());
            self.shared.state.end_drain();
        }

        self.emit(HandlerEvent::Unloaded);

        Ok(DestroyReport {
            performed: true,
            forced: outstanding > 0,
            outstanding,
            listeners_notified: notified.notified,
        })
    }

    fn ensure_reloadable(&self) -> PorterResult<()> {
        if self.shared.destroy_started.load(Ordering::SeqCst)
            || self.shared.state.state().is_permanent()
        {
            return Err(self.destroyed_error());
        }
        Ok(())
    }

    fn destroyed_error(&self) -> PorterError {
        PorterError::Unavailable {
            handler: self.name().to_string(),
            reason: DESTROYED_REASON.to_string(),
            retry_after: None,
        }
    }

    /// Bounded wait for in-flight requests
    ///
    /// # Returns
    /// Requests still in flight when the bound expired
    async fn drain_in_flight(&self) -> usize {
        let drain = &self.shared.config.drain;
        let outstanding = self
            .shared
            .drain
            .wait_until_drained(drain.wait_bound, drain.poll_interval)
            .await;

        if outstanding > 0 {
            log::warn!(
                "Handler '{}' still has {outstanding} request(s) in flight after {}s; tearing down anyway",
                self.name(),
                drain.wait_bound.as_secs()
            );
            self.emit(HandlerEvent::DestroyForced { outstanding });
        }
        outstanding
    }

    async fn teardown_target(&self) {
        let outcome = match self.shared.strategy.teardown().await {
            Ok(outcome) => outcome,
            Err(e) => Err(TargetError::from(e)),
        };

        if let Err(e) = outcome {
            log::error!(
                "Failed to tear down target of handler '{}': {e}",
                self.name()
            );
            self.emit(HandlerEvent::DestroyFailed {
                message: e.to_string(),
            });
        }
    }
}
