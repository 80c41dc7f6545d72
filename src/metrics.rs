// ============================================================================
// File: packages/porter/src/metrics.rs
// ----------------------------------------------------------------------------
// Per-handler service metrics collected from handler events.
// ============================================================================

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::lifecycle::{HandlerEvent, HandlerEventListener};

/// Aggregated statistics for one handler
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HandlerStats {
    /// Requests serviced without error
    pub requests_served: u64,

    /// Requests whose target reported an error
    pub failures: u64,

    /// Requests turned away by availability policy
    pub rejections: u64,

    /// Running mean of service time over served and failed requests
    pub avg_response_time: Duration,

    /// Fraction of serviced requests that succeeded
    pub success_rate: f32,

    /// Teardowns that proceeded with requests still in flight
    pub forced_teardowns: u64,

    /// Times the handler entered service
    pub activations: u64,

    /// Time of the last recorded event
    pub last_updated: Option<DateTime<Utc>>,
}

impl HandlerStats {
    fn record_service(&mut self, elapsed: Duration, succeeded: bool) {
        if succeeded {
            self.requests_served += 1;
        } else {
            self.failures += 1;
        }

        let serviced = self.requests_served + self.failures;
        let previous = serviced - 1;

        self.success_rate = if succeeded {
            (self.success_rate * previous as f32 + 1.0) / serviced as f32
        } else {
            (self.success_rate * previous as f32) / serviced as f32
        };

        let current_avg = u64::try_from(self.avg_response_time.as_nanos()).unwrap_or(u64::MAX);
        let elapsed = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.avg_response_time = Duration::from_nanos(
            current_avg
                .saturating_mul(previous)
                .saturating_add(elapsed)
                / serviced,
        );
    }
}

/// Event listener that aggregates per-handler statistics
///
/// Register one instance on every handler to be observed.
#[derive(Debug, Default)]
pub struct HandlerMetrics {
    stats: RwLock<HashMap<String, HandlerStats>>,
}

impl HandlerMetrics {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics for one handler
    pub fn stats(&self, handler: &str) -> Option<HandlerStats> {
        self.stats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handler)
            .cloned()
    }

    /// Statistics for every observed handler
    pub fn snapshot(&self) -> HashMap<String, HandlerStats> {
        self.stats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget everything recorded
    pub fn reset(&self) {
        self.stats
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl HandlerEventListener for HandlerMetrics {
    fn on_event(&self, handler: &str, at: DateTime<Utc>, event: &HandlerEvent) {
        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        let entry = stats.entry(handler.to_string()).or_default();

        match event {
            HandlerEvent::ServiceFinished { elapsed } => entry.record_service(*elapsed, true),
            HandlerEvent::ServiceFailed { elapsed, .. } => entry.record_service(*elapsed, false),
            HandlerEvent::Rejected { .. } => entry.rejections += 1,
            HandlerEvent::DestroyForced { .. } => entry.forced_teardowns += 1,
            HandlerEvent::AvailableForService => entry.activations += 1,
            _ => {}
        }

        entry.last_updated = Some(at);
    }
}
