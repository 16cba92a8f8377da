//! Deterministic executors for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

use crate::stages::{StageContext, StageExecutor, StageOutcome};

/// An executor that records calls and returns a configurable outcome.
#[derive(Debug)]
pub struct MockExecutor {
    outcome: Mutex<StageOutcome>,
    calls: Mutex<Vec<String>>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExecutor {
    /// Creates a mock executor that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            outcome: Mutex::new(StageOutcome::Success),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sets the outcome to return.
    pub fn set_outcome(&self, outcome: StageOutcome) {
        *self.outcome.lock() = outcome;
    }

    /// Returns the number of times the executor ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the stage ids of each call, in order.
    #[must_use]
    pub fn recorded_stages(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl StageExecutor for MockExecutor {
    async fn execute(&self, ctx: &StageContext) -> StageOutcome {
        self.calls.lock().push(ctx.stage_id().to_string());
        self.outcome.lock().clone()
    }
}

/// An executor that always fails.
#[derive(Debug, Clone)]
pub struct FailingExecutor {
    message: String,
}

impl FailingExecutor {
    /// Creates a failing executor.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl StageExecutor for FailingExecutor {
    async fn execute(&self, _ctx: &StageContext) -> StageOutcome {
        StageOutcome::failure(&self.message)
    }
}

/// An executor that blocks until the test releases it.
///
/// Each [`release`](Self::release) lets exactly one pending or future call
/// settle with the configured outcome. Tracks how many calls are in flight
/// so tests can assert stages never overlap.
#[derive(Debug)]
pub struct GatedExecutor {
    permits: Semaphore,
    outcome: Mutex<StageOutcome>,
    entered: Notify,
    started: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    ignore_cancellation: AtomicBool,
    saw_cancellation: AtomicBool,
}

impl Default for GatedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl GatedExecutor {
    /// Creates a gate with no permits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            permits: Semaphore::new(0),
            outcome: Mutex::new(StageOutcome::Success),
            entered: Notify::new(),
            started: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            ignore_cancellation: AtomicBool::new(false),
            saw_cancellation: AtomicBool::new(false),
        }
    }

    /// Creates a shared gate.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Makes the executor keep waiting for a permit even after cancellation,
    /// simulating a backend that does not honour the stop request.
    pub fn ignore_cancellation(&self) {
        self.ignore_cancellation.store(true, Ordering::SeqCst);
    }

    /// Sets the outcome returned by released calls.
    pub fn set_outcome(&self, outcome: StageOutcome) {
        *self.outcome.lock() = outcome;
    }

    /// Lets one call settle.
    pub fn release(&self) {
        self.permits.add_permits(1);
    }

    /// Waits until at least `n` calls have started.
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            let entered = self.entered.notified();
            if self.started.load(Ordering::SeqCst) >= n {
                return;
            }
            entered.await;
        }
    }

    /// Number of calls that have started.
    #[must_use]
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Highest number of calls ever in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Whether any call observed the cancellation signal.
    #[must_use]
    pub fn saw_cancellation(&self) -> bool {
        self.saw_cancellation.load(Ordering::SeqCst)
    }

    async fn acquire(&self) {
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}

#[async_trait]
impl StageExecutor for GatedExecutor {
    async fn execute(&self, ctx: &StageContext) -> StageOutcome {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.started.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_waiters();

        let outcome = if self.ignore_cancellation.load(Ordering::SeqCst) {
            self.acquire().await;
            self.outcome.lock().clone()
        } else {
            tokio::select! {
                () = self.acquire() => self.outcome.lock().clone(),
                () = ctx.cancelled() => {
                    self.saw_cancellation.store(true, Ordering::SeqCst);
                    StageOutcome::failure("cancelled")
                }
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_stage_context;
    use std::time::Duration;

    #[tokio::test]
    async fn test_mock_executor_records() {
        let mock = MockExecutor::new();
        mock.set_outcome(StageOutcome::failure("nope"));

        let outcome = mock.execute(&test_stage_context("scan")).await;
        assert_eq!(outcome, StageOutcome::failure("nope"));
        assert_eq!(mock.recorded_stages(), vec!["scan".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_executor() {
        let outcome = FailingExecutor::new("bad").execute(&test_stage_context("x")).await;
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_gated_executor_waits_for_release() {
        let gate = GatedExecutor::shared();
        let ctx = test_stage_context("scan");

        let task = {
            let gate = gate.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { gate.execute(&ctx).await })
        };

        gate.wait_for_calls(1).await;
        assert!(!task.is_finished());

        gate.release();
        let outcome = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(gate.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_gated_executor_observes_cancel() {
        let gate = GatedExecutor::shared();
        let ctx = test_stage_context("scan");
        ctx.cancellation().cancel("stop");

        let outcome = gate.execute(&ctx).await;
        assert!(!outcome.is_success());
        assert!(gate.saw_cancellation());
    }
}
