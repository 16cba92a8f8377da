//! Fixed-delay executor standing in for a real verification backend.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{StageContext, StageExecutor, StageOutcome};

/// Waits a fixed delay, then reports a configured outcome.
///
/// Returns early with a failure outcome if the run is cancelled while
/// waiting; the engine discards it either way.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    delay: Duration,
    outcome: StageOutcome,
}

impl SimulatedExecutor {
    /// Creates an executor that succeeds after `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            outcome: StageOutcome::Success,
        }
    }

    /// Creates an executor that succeeds after `ms` milliseconds.
    #[must_use]
    pub fn with_delay_ms(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Sets the outcome reported once the delay elapses.
    #[must_use]
    pub fn with_outcome(mut self, outcome: StageOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Returns the configured delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl StageExecutor for SimulatedExecutor {
    async fn execute(&self, ctx: &StageContext) -> StageOutcome {
        tokio::select! {
            () = tokio::time::sleep(self.delay) => self.outcome.clone(),
            () = ctx.cancelled() => {
                let reason = ctx
                    .cancellation()
                    .reason()
                    .unwrap_or_else(|| "cancelled".to_string());
                debug!(stage = %ctx.stage_id(), reason = %reason, "Simulated stage interrupted");
                StageOutcome::failure(reason)
            }
        }
    }
}
