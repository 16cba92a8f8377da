//! Presentation sink trait and implementations.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, Level};

use crate::core::RunState;
use crate::pipeline::RunSnapshot;

/// Receives engine state for rendering.
///
/// Callbacks run synchronously on the thread that caused the transition and
/// are serialised, so a sink observes snapshots in transition order. Sinks
/// may call back into the engine from the same thread.
#[cfg_attr(test, mockall::automock)]
pub trait PresentationSink: Send + Sync {
    /// Called after every transition.
    fn on_snapshot(&self, snapshot: &RunSnapshot);

    /// Called exactly once per run, when it reaches a terminal state.
    fn on_terminal(&self, state: RunState, snapshot: &RunSnapshot);
}

/// A sink that discards everything.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpPresentationSink;

impl PresentationSink for NoOpPresentationSink {
    fn on_snapshot(&self, _snapshot: &RunSnapshot) {}

    fn on_terminal(&self, _state: RunState, _snapshot: &RunSnapshot) {}
}

/// A sink that logs snapshots using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingPresentationSink {
    level: Level,
}

impl Default for LoggingPresentationSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingPresentationSink {
    /// Creates a new logging sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }
}

impl PresentationSink for LoggingPresentationSink {
    fn on_snapshot(&self, snapshot: &RunSnapshot) {
        let stage = snapshot.processing_stage().map(|s| s.title.as_str());
        if self.level == Level::DEBUG {
            debug!(
                run_state = %snapshot.run_state,
                progress = snapshot.overall_progress,
                stage = ?stage,
                "Verification snapshot"
            );
        } else {
            info!(
                run_state = %snapshot.run_state,
                progress = snapshot.overall_progress,
                stage = ?stage,
                "Verification snapshot"
            );
        }
    }

    fn on_terminal(&self, state: RunState, snapshot: &RunSnapshot) {
        info!(
            run_id = ?snapshot.run_id,
            state = %state,
            progress = snapshot.overall_progress,
            "Verification finished"
        );
    }
}

/// A sink that records everything it receives.
#[derive(Debug, Default)]
pub struct CollectingPresentationSink {
    snapshots: RwLock<Vec<RunSnapshot>>,
    terminals: RwLock<Vec<(RunState, RunSnapshot)>>,
}

impl CollectingPresentationSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected snapshots.
    #[must_use]
    pub fn snapshots(&self) -> Vec<RunSnapshot> {
        self.snapshots.read().clone()
    }

    /// Returns all terminal notifications.
    #[must_use]
    pub fn terminals(&self) -> Vec<(RunState, RunSnapshot)> {
        self.terminals.read().clone()
    }

    /// Returns the progress value of every collected snapshot.
    #[must_use]
    pub fn progress_sequence(&self) -> Vec<u8> {
        self.snapshots
            .read()
            .iter()
            .map(|s| s.overall_progress)
            .collect()
    }

    /// Returns the most recent snapshot.
    #[must_use]
    pub fn last(&self) -> Option<RunSnapshot> {
        self.snapshots.read().last().cloned()
    }

    /// Returns the number of collected snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }

    /// Clears everything collected.
    pub fn clear(&self) {
        self.snapshots.write().clear();
        self.terminals.write().clear();
    }
}

impl PresentationSink for CollectingPresentationSink {
    fn on_snapshot(&self, snapshot: &RunSnapshot) {
        self.snapshots.write().push(snapshot.clone());
    }

    fn on_terminal(&self, state: RunState, snapshot: &RunSnapshot) {
        self.terminals.write().push((state, snapshot.clone()));
    }
}

/// Forwards every callback to each inner sink, in order.
#[derive(Default, Clone)]
pub struct FanoutPresentationSink {
    sinks: Vec<Arc<dyn PresentationSink>>,
}

impl FanoutPresentationSink {
    /// Creates an empty fan-out sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink.
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn PresentationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Returns the number of inner sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns true if there are no inner sinks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl std::fmt::Debug for FanoutPresentationSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutPresentationSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl PresentationSink for FanoutPresentationSink {
    fn on_snapshot(&self, snapshot: &RunSnapshot) {
        for sink in &self.sinks {
            sink.on_snapshot(snapshot);
        }
    }

    fn on_terminal(&self, state: RunState, snapshot: &RunSnapshot) {
        for sink in &self.sinks {
            sink.on_terminal(state, snapshot);
        }
    }
}
