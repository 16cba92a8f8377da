//! The verification engine: lifecycle operations and sequential stage execution.

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Run, RunSnapshot, StageTemplate};
use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::core::{DocumentHandle, DocumentType, RunState};
use crate::errors::{
    AlreadyRunningError, ConfigurationError, NotRunningError, VerificationError,
};
use crate::events::{NoOpPresentationSink, PresentationSink};
use crate::stages::{Stage, StageContext, StageOutcome};

const CANCELLED_BY_CALLER: &str = "cancelled by caller";
const CANCELLED_BY_RESET: &str = "reset while active";
const CANCELLED_BY_DROP: &str = "run driver dropped before completion";

#[derive(Default)]
struct EngineState {
    template: Option<StageTemplate>,
    run: Option<Run>,
    token: Option<Arc<CancellationToken>>,
}

impl EngineState {
    fn active_run(&self) -> Option<&Run> {
        self.run.as_ref().filter(|run| run.is_active())
    }

    fn run_state(&self) -> RunState {
        self.run.as_ref().map_or(RunState::Idle, |run| run.state)
    }

    fn snapshot(&self) -> RunSnapshot {
        self.run.as_ref().map_or_else(RunSnapshot::idle, Run::snapshot)
    }
}

/// One pending sink callback.
enum Emission {
    Snapshot(RunSnapshot),
    Terminal(RunState, RunSnapshot),
}

/// Callbacks waiting for delivery.
///
/// Only the outermost emitter on the owning thread drains the queue, so
/// anything a sink triggers from inside a callback is delivered after the
/// callbacks already queued.
#[derive(Default)]
struct EmissionQueue {
    pending: VecDeque<Emission>,
    draining: bool,
}

/// Clears the draining flag even if a sink panics.
struct DrainGuard<'a>(&'a RefCell<EmissionQueue>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.borrow_mut().draining = false;
    }
}

type EmissionLock<'a> = ReentrantMutexGuard<'a, RefCell<EmissionQueue>>;

struct EngineInner {
    config: EngineConfig,
    sink: Arc<dyn PresentationSink>,
    state: Mutex<EngineState>,
    /// Held from mutation through sink delivery so snapshots leave in
    /// transition order. Reentrant so sinks may call back into the engine.
    emission: ReentrantMutex<RefCell<EmissionQueue>>,
}

/// Drives documents through an ordered list of verification stages.
///
/// The engine is a cheap handle; clones share one run. At most one run is
/// active at a time, and its stages execute strictly one after another.
#[derive(Clone)]
pub struct VerificationEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for VerificationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("VerificationEngine")
            .field("configured", &state.template.is_some())
            .field("run_state", &state.run_state())
            .finish()
    }
}

impl Default for VerificationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default(), Arc::new(NoOpPresentationSink))
    }
}

impl VerificationEngine {
    /// Creates an unconfigured engine reporting to `sink`.
    #[must_use]
    pub fn new(config: EngineConfig, sink: Arc<dyn PresentationSink>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                config,
                sink,
                state: Mutex::new(EngineState::default()),
                emission: ReentrantMutex::new(RefCell::new(EmissionQueue::default())),
            }),
        }
    }

    /// Creates an engine already configured with `stages`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the stage list is rejected.
    pub fn with_stages(
        config: EngineConfig,
        sink: Arc<dyn PresentationSink>,
        stages: Vec<Stage>,
    ) -> Result<Self, VerificationError> {
        let engine = Self::new(config, sink);
        engine.configure(stages)?;
        Ok(engine)
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Returns the configured stage template, if any.
    #[must_use]
    pub fn template(&self) -> Option<StageTemplate> {
        self.inner.state.lock().template.clone()
    }

    /// Returns true while a run is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active_run().is_some()
    }

    /// Sets the stage template.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the list is empty or has duplicate
    /// or blank ids, and `AlreadyRunning` while a run is active.
    pub fn configure(&self, stages: Vec<Stage>) -> Result<(), VerificationError> {
        let template = StageTemplate::new(stages)?;

        let mut state = self.inner.state.lock();
        if let Some(run) = state.active_run() {
            return Err(AlreadyRunningError { run_id: run.run_id }.into());
        }
        info!(stages = ?template.ids(), "Stage template configured");
        state.template = Some(template);
        Ok(())
    }

    /// Creates a new run and emits its first snapshot.
    ///
    /// The returned [`RunDriver`] executes the stages; await
    /// [`RunDriver::run`] or [`RunDriver::spawn`] it. A terminal run left
    /// over from a previous start is replaced.
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` if a run is active (the active run is untouched)
    /// - `Configuration` if no stages are configured
    /// - `InvalidInput` if the document fails the intake policy
    pub fn start(
        &self,
        document: DocumentHandle,
        document_type: DocumentType,
    ) -> Result<RunDriver, VerificationError> {
        let emission = self.inner.emission.lock();

        let (driver, snapshot) = {
            let mut state = self.inner.state.lock();
            if let Some(run) = state.active_run() {
                warn!(run_id = %run.run_id, "Start rejected: run already active");
                return Err(AlreadyRunningError { run_id: run.run_id }.into());
            }
            let template = state
                .template
                .clone()
                .ok_or_else(ConfigurationError::not_configured)?;
            document.validate(&self.inner.config.intake)?;

            let run = Run::new(
                template,
                document,
                document_type,
                self.inner.config.progress_rounding,
            );
            let token = Arc::new(CancellationToken::new());

            info!(
                run_id = %run.run_id,
                document = %run.document(),
                document_type = %document_type,
                stages = run.template().len(),
                "Verification run started"
            );

            let driver = RunDriver {
                engine: self.clone(),
                run_id: run.run_id,
                template: run.template().clone(),
                document: run.document().clone(),
                document_type: run.document_type(),
                token: token.clone(),
                finished: false,
            };
            let snapshot = run.snapshot();
            state.run = Some(run);
            state.token = Some(token);
            (driver, snapshot)
        };

        self.deliver(&emission, [Emission::Snapshot(snapshot)]);
        Ok(driver)
    }

    /// Starts a run and drives it to its terminal state.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`start`](Self::start).
    pub async fn verify(
        &self,
        document: DocumentHandle,
        document_type: DocumentType,
    ) -> Result<RunState, VerificationError> {
        let driver = self.start(document, document_type)?;
        Ok(driver.run().await)
    }

    /// Cancels the active run.
    ///
    /// The in-flight stage is marked aborted and its executor is signalled;
    /// a result it reports later is discarded.
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` if no run is active.
    pub fn cancel(&self) -> Result<RunSnapshot, VerificationError> {
        self.cancel_with_reason(CANCELLED_BY_CALLER)
    }

    /// Cancels the active run, recording `reason`.
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` if no run is active.
    pub fn cancel_with_reason(
        &self,
        reason: impl Into<String>,
    ) -> Result<RunSnapshot, VerificationError> {
        let reason = reason.into();
        let emission = self.inner.emission.lock();

        let (snapshot, token) = {
            let mut state = self.inner.state.lock();
            let current = state.run_state();
            let Some(run) = state.run.as_mut().filter(|run| run.is_active()) else {
                return Err(NotRunningError { state: current }.into());
            };
            run.cancel(reason.clone());
            info!(run_id = %run.run_id, reason = %reason, "Verification run cancelled");
            (run.snapshot(), state.token.clone())
        };

        if let Some(token) = token {
            token.cancel(reason);
        }
        self.deliver(
            &emission,
            [
                Emission::Snapshot(snapshot.clone()),
                Emission::Terminal(RunState::Cancelled, snapshot.clone()),
            ],
        );
        Ok(snapshot)
    }

    /// Clears the run and returns to idle, cancelling first if active.
    pub fn reset(&self) {
        let emission = self.inner.emission.lock();

        if self.is_active() {
            // Cannot fail: the emission lock keeps anyone else from finishing the run.
            let _ = self.cancel_with_reason(CANCELLED_BY_RESET);
        }

        {
            let mut state = self.inner.state.lock();
            state.run = None;
            state.token = None;
        }
        debug!("Engine reset to idle");
        self.deliver(&emission, [Emission::Snapshot(RunSnapshot::idle())]);
    }

    /// Returns a copy of the current run, or an idle snapshot.
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        self.inner.state.lock().snapshot()
    }

    /// Applies `f` to the run `run_id` if it is still the active run, then
    /// emits the resulting snapshot (and terminal notification, if `f`
    /// returns one).
    ///
    /// Returns `None` if the run was cancelled, reset or replaced.
    fn transition<F>(&self, run_id: Uuid, f: F) -> Option<Option<RunState>>
    where
        F: FnOnce(&mut Run) -> Option<RunState>,
    {
        let emission = self.inner.emission.lock();

        let (snapshot, terminal) = {
            let mut state = self.inner.state.lock();
            let run = state
                .run
                .as_mut()
                .filter(|run| run.run_id == run_id && run.is_active())?;
            let terminal = f(run);
            if terminal.is_some() {
                state.token = None;
            }
            (state.snapshot(), terminal)
        };

        match terminal {
            Some(state) => self.deliver(
                &emission,
                [
                    Emission::Snapshot(snapshot.clone()),
                    Emission::Terminal(state, snapshot),
                ],
            ),
            None => self.deliver(&emission, [Emission::Snapshot(snapshot)]),
        }
        Some(terminal)
    }

    /// Queues `emissions` and, unless a callback further up this thread's
    /// stack is already delivering, drains the queue to the sink in order.
    fn deliver<I>(&self, emission: &EmissionLock<'_>, emissions: I)
    where
        I: IntoIterator<Item = Emission>,
    {
        let queue: &RefCell<EmissionQueue> = emission;
        {
            let mut queue = queue.borrow_mut();
            queue.pending.extend(emissions);
            if queue.draining {
                return;
            }
            queue.draining = true;
        }
        let _draining = DrainGuard(queue);

        loop {
            let next = queue.borrow_mut().pending.pop_front();
            match next {
                Some(Emission::Snapshot(snapshot)) => self.inner.sink.on_snapshot(&snapshot),
                Some(Emission::Terminal(state, snapshot)) => {
                    self.inner.sink.on_terminal(state, &snapshot);
                }
                None => break,
            }
        }
    }

    /// Cancels `run_id` if it is still active; used when a driver is dropped.
    fn abandon(&self, run_id: Uuid) {
        let _emission = self.inner.emission.lock();
        let still_active = self
            .inner
            .state
            .lock()
            .active_run()
            .is_some_and(|run| run.run_id == run_id);
        if still_active {
            warn!(run_id = %run_id, "Run driver dropped mid-run; cancelling");
            let _ = self.cancel_with_reason(CANCELLED_BY_DROP);
        }
    }
}

/// Executes the stages of one run.
///
/// Returned by [`VerificationEngine::start`]. Dropping a driver before its
/// run finishes cancels the run.
#[must_use = "a run only makes progress while its driver is awaited"]
pub struct RunDriver {
    engine: VerificationEngine,
    run_id: Uuid,
    template: StageTemplate,
    document: DocumentHandle,
    document_type: DocumentType,
    token: Arc<CancellationToken>,
    finished: bool,
}

impl std::fmt::Debug for RunDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunDriver")
            .field("run_id", &self.run_id)
            .field("stages", &self.template.len())
            .field("finished", &self.finished)
            .finish()
    }
}

impl RunDriver {
    /// The id of the run this driver executes.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Spawns the driver onto the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(self) -> JoinHandle<RunState> {
        tokio::spawn(self.run())
    }

    /// Executes the stages in order until the run reaches a terminal state.
    ///
    /// Returns that state. A run cancelled or reset from outside returns
    /// `Cancelled`.
    pub async fn run(mut self) -> RunState {
        let state = self.execute().await;
        self.finished = true;
        state
    }

    async fn execute(&self) -> RunState {
        let engine = &self.engine;
        let run_id = self.run_id;

        for (index, stage) in self.template.stages().iter().enumerate() {
            if engine
                .transition(run_id, |run| {
                    run.begin_stage(index);
                    None
                })
                .is_none()
            {
                return RunState::Cancelled;
            }
            debug!(run_id = %run_id, stage = %stage.id, index, "Stage processing");

            let ctx = StageContext::new(
                run_id,
                stage.id.clone(),
                index,
                self.document.clone(),
                self.document_type,
                self.token.clone(),
            );
            let started = Instant::now();

            let outcome = tokio::select! {
                biased;
                () = self.token.cancelled() => None,
                outcome = stage.executor.execute(&ctx) => Some(outcome),
            };
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

            let Some(outcome) = outcome else {
                debug!(
                    run_id = %run_id,
                    stage = %stage.id,
                    reason = ?self.token.reason(),
                    "Stage interrupted by cancellation"
                );
                return RunState::Cancelled;
            };

            let applied = match outcome {
                StageOutcome::Success => engine.transition(run_id, |run| {
                    debug!(run_id = %run_id, stage = %stage.id, duration_ms = elapsed_ms, "Stage completed");
                    run.complete_stage(index)
                }),
                StageOutcome::Failure(message) => engine.transition(run_id, |run| {
                    warn!(
                        run_id = %run_id,
                        stage = %stage.id,
                        duration_ms = elapsed_ms,
                        error = %message,
                        "Stage failed"
                    );
                    run.fail_stage(index, message);
                    Some(RunState::Failed)
                }),
            };

            match applied {
                None => {
                    warn!(run_id = %run_id, stage = %stage.id, "Discarding late stage result");
                    return RunState::Cancelled;
                }
                Some(Some(terminal)) => {
                    info!(run_id = %run_id, state = %terminal, "Verification run finished");
                    return terminal;
                }
                Some(None) => {}
            }
        }

        // Only reachable if the last completion was refused, which
        // set_status guards against.
        engine.snapshot().run_state
    }
}

impl Drop for RunDriver {
    fn drop(&mut self) {
        if !self.finished {
            self.engine.abandon(self.run_id);
        }
    }
}
