//! The mutable run record and the immutable snapshots handed to sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::StageTemplate;
use crate::config::ProgressRounding;
use crate::core::{DocumentHandle, DocumentType, RunState, StageStatus};
use crate::errors::StageExecutionFailure;

/// One execution of the pipeline over one document.
///
/// Owned exclusively by the engine; the outside world only ever sees
/// [`RunSnapshot`] copies.
#[derive(Debug, Clone)]
pub(crate) struct Run {
    pub(crate) run_id: Uuid,
    template: StageTemplate,
    document: DocumentHandle,
    document_type: DocumentType,
    current_stage_index: usize,
    stage_statuses: Vec<StageStatus>,
    overall_progress: u8,
    pub(crate) state: RunState,
    rounding: ProgressRounding,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    failure: Option<StageExecutionFailure>,
    cancel_reason: Option<String>,
}

impl Run {
    /// Creates an active run with every stage pending.
    pub(crate) fn new(
        template: StageTemplate,
        document: DocumentHandle,
        document_type: DocumentType,
        rounding: ProgressRounding,
    ) -> Self {
        let stage_statuses = vec![StageStatus::Pending; template.len()];
        Self {
            run_id: Uuid::new_v4(),
            template,
            document,
            document_type,
            current_stage_index: 0,
            stage_statuses,
            overall_progress: 0,
            state: RunState::Active,
            rounding,
            started_at: Utc::now(),
            finished_at: None,
            failure: None,
            cancel_reason: None,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state == RunState::Active
    }

    pub(crate) fn template(&self) -> &StageTemplate {
        &self.template
    }

    pub(crate) fn document(&self) -> &DocumentHandle {
        &self.document
    }

    pub(crate) fn document_type(&self) -> DocumentType {
        self.document_type
    }

    fn completed_count(&self) -> usize {
        self.stage_statuses
            .iter()
            .filter(|s| **s == StageStatus::Completed)
            .count()
    }

    fn recompute_progress(&mut self) {
        self.overall_progress = self
            .rounding
            .percent(self.completed_count(), self.stage_statuses.len());
    }

    /// Applies a status transition, refusing anything non-monotonic.
    fn set_status(&mut self, index: usize, next: StageStatus) -> bool {
        let Some(current) = self.stage_statuses.get(index).copied() else {
            warn!(run_id = %self.run_id, index, "Stage index out of range");
            return false;
        };
        if !current.can_transition_to(next) {
            warn!(
                run_id = %self.run_id,
                index,
                from = %current,
                to = %next,
                "Refusing illegal stage transition"
            );
            return false;
        }
        self.stage_statuses[index] = next;
        self.recompute_progress();
        true
    }

    fn finish(&mut self, state: RunState) {
        self.state = state;
        self.finished_at = Some(Utc::now());
    }

    /// Marks stage `index` processing.
    pub(crate) fn begin_stage(&mut self, index: usize) -> bool {
        if self.set_status(index, StageStatus::Processing) {
            self.current_stage_index = index;
            true
        } else {
            false
        }
    }

    /// Marks stage `index` completed; finishes the run after the last stage.
    ///
    /// Returns the terminal state if the run finished.
    pub(crate) fn complete_stage(&mut self, index: usize) -> Option<RunState> {
        if !self.set_status(index, StageStatus::Completed) {
            return None;
        }
        if index + 1 == self.stage_statuses.len() {
            self.finish(RunState::Completed);
            Some(RunState::Completed)
        } else {
            None
        }
    }

    /// Marks stage `index` failed and the run failed.
    pub(crate) fn fail_stage(&mut self, index: usize, message: impl Into<String>) {
        if self.set_status(index, StageStatus::Failed) {
            let stage_id = self
                .template
                .get(index)
                .map(|s| s.id.clone())
                .unwrap_or_default();
            self.failure = Some(StageExecutionFailure {
                stage_id,
                stage_index: index,
                message: message.into(),
            });
        }
        self.finish(RunState::Failed);
    }

    /// Cancels the run, aborting whichever stage is processing.
    pub(crate) fn cancel(&mut self, reason: impl Into<String>) {
        if let Some(index) = self
            .stage_statuses
            .iter()
            .position(|s| *s == StageStatus::Processing)
        {
            self.set_status(index, StageStatus::Aborted);
        }
        self.cancel_reason = Some(reason.into());
        self.finish(RunState::Cancelled);
    }

    /// Produces an owned, immutable copy for rendering.
    pub(crate) fn snapshot(&self) -> RunSnapshot {
        let stages = self
            .template
            .stages()
            .iter()
            .zip(&self.stage_statuses)
            .map(|(stage, status)| StageView {
                id: stage.id.clone(),
                title: stage.title.clone(),
                description: stage.description.clone(),
                status: *status,
            })
            .collect();

        RunSnapshot {
            run_id: Some(self.run_id),
            run_state: self.state,
            document: Some(self.document.clone()),
            document_type: Some(self.document_type),
            current_stage_index: self.is_active().then_some(self.current_stage_index),
            overall_progress: self.overall_progress,
            stages,
            failure: self.failure.clone(),
            cancel_reason: self.cancel_reason.clone(),
            started_at: Some(self.started_at),
            finished_at: self.finished_at,
        }
    }
}

/// Render-ready view of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageView {
    /// Stage id.
    pub id: String,
    /// Stage title.
    pub title: String,
    /// Stage description.
    pub description: String,
    /// Stage status at snapshot time.
    pub status: StageStatus,
}

/// Immutable point-in-time copy of the engine's run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// The run id, absent while idle.
    pub run_id: Option<Uuid>,
    /// The run state.
    pub run_state: RunState,
    /// The document under verification.
    pub document: Option<DocumentHandle>,
    /// The document's classification.
    pub document_type: Option<DocumentType>,
    /// Index of the stage being worked on; only set while active.
    pub current_stage_index: Option<usize>,
    /// Completed-stage percentage, 0-100.
    pub overall_progress: u8,
    /// One view per stage, in execution order. Empty while idle.
    pub stages: Vec<StageView>,
    /// The recorded stage failure, if the run failed.
    pub failure: Option<StageExecutionFailure>,
    /// Why the run was cancelled, if it was.
    pub cancel_reason: Option<String>,
    /// When the run started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSnapshot {
    /// The snapshot of an engine with no run.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            run_id: None,
            run_state: RunState::Idle,
            document: None,
            document_type: None,
            current_stage_index: None,
            overall_progress: 0,
            stages: Vec::new(),
            failure: None,
            cancel_reason: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Returns the stage statuses in order.
    #[must_use]
    pub fn statuses(&self) -> Vec<StageStatus> {
        self.stages.iter().map(|s| s.status).collect()
    }

    /// Returns how many stages have the given status.
    #[must_use]
    pub fn count(&self, status: StageStatus) -> usize {
        self.stages.iter().filter(|s| s.status == status).count()
    }

    /// Returns the stage currently processing, if any.
    #[must_use]
    pub fn processing_stage(&self) -> Option<&StageView> {
        self.stages
            .iter()
            .find(|s| s.status == StageStatus::Processing)
    }

    /// Returns true if the run reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.run_state.is_terminal()
    }

    /// Serializes the snapshot to JSON.
    ///
    /// # Errors
    ///
    /// Returns the serde error if serialization fails.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl Default for RunSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{SimulatedExecutor, Stage};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn run_with(n: usize, rounding: ProgressRounding) -> Run {
        let stages = (0..n)
            .map(|i| {
                Stage::new(
                    format!("s{i}"),
                    format!("Stage {i}"),
                    "",
                    Arc::new(SimulatedExecutor::with_delay_ms(1)),
                )
            })
            .collect();
        Run::new(
            StageTemplate::new(stages).unwrap(),
            DocumentHandle::new("contract.pdf", 4096),
            DocumentType::Contract,
            rounding,
        )
    }

    #[test]
    fn test_new_run_all_pending() {
        let run = run_with(4, ProgressRounding::Nearest);
        let snap = run.snapshot();

        assert_eq!(snap.run_state, RunState::Active);
        assert_eq!(snap.statuses(), vec![StageStatus::Pending; 4]);
        assert_eq!(snap.current_stage_index, Some(0));
        assert_eq!(snap.overall_progress, 0);
    }

    #[test]
    fn test_progress_nearest_three_stages() {
        let mut run = run_with(3, ProgressRounding::Nearest);
        let mut seen = Vec::new();
        for i in 0..3 {
            assert!(run.begin_stage(i));
            run.complete_stage(i);
            seen.push(run.snapshot().overall_progress);
        }
        assert_eq!(seen, vec![33, 67, 100]);
        assert_eq!(run.state, RunState::Completed);
    }

    #[test]
    fn test_progress_floor_three_stages() {
        let mut run = run_with(3, ProgressRounding::Floor);
        let mut seen = Vec::new();
        for i in 0..3 {
            run.begin_stage(i);
            run.complete_stage(i);
            seen.push(run.snapshot().overall_progress);
        }
        assert_eq!(seen, vec![33, 66, 100]);
    }

    #[test]
    fn test_complete_last_stage_finishes_run() {
        let mut run = run_with(2, ProgressRounding::Nearest);
        run.begin_stage(0);
        assert_eq!(run.complete_stage(0), None);
        run.begin_stage(1);
        assert_eq!(run.complete_stage(1), Some(RunState::Completed));

        let snap = run.snapshot();
        assert!(snap.finished_at.is_some());
        assert_eq!(snap.current_stage_index, None);
    }

    #[test]
    fn test_fail_stage_records_failure() {
        let mut run = run_with(4, ProgressRounding::Nearest);
        run.begin_stage(0);
        run.complete_stage(0);
        run.begin_stage(1);
        run.fail_stage(1, "signature mismatch");

        let snap = run.snapshot();
        assert_eq!(snap.run_state, RunState::Failed);
        assert_eq!(
            snap.statuses(),
            vec![
                StageStatus::Completed,
                StageStatus::Failed,
                StageStatus::Pending,
                StageStatus::Pending
            ]
        );
        assert_eq!(snap.overall_progress, 25);
        let failure = snap.failure.unwrap();
        assert_eq!(failure.stage_id, "s1");
        assert_eq!(failure.message, "signature mismatch");
    }

    #[test]
    fn test_cancel_aborts_processing_stage() {
        let mut run = run_with(3, ProgressRounding::Nearest);
        run.begin_stage(0);
        run.cancel("user left");

        let snap = run.snapshot();
        assert_eq!(snap.run_state, RunState::Cancelled);
        assert_eq!(snap.count(StageStatus::Aborted), 1);
        assert_eq!(snap.count(StageStatus::Processing), 0);
        assert_eq!(snap.cancel_reason.as_deref(), Some("user left"));
    }

    #[test]
    fn test_illegal_transition_refused() {
        let mut run = run_with(2, ProgressRounding::Nearest);
        // completing a stage that never started
        assert_eq!(run.complete_stage(0), None);
        assert_eq!(run.snapshot().statuses()[0], StageStatus::Pending);

        run.begin_stage(0);
        run.complete_stage(0);
        assert!(!run.begin_stage(0));
        assert_eq!(run.snapshot().statuses()[0], StageStatus::Completed);
    }

    #[test]
    fn test_idle_snapshot() {
        let snap = RunSnapshot::idle();
        assert_eq!(snap.run_state, RunState::Idle);
        assert!(snap.stages.is_empty());
        assert_eq!(snap.overall_progress, 0);
        assert!(snap.processing_stage().is_none());

        let json = snap.to_json().unwrap();
        assert_eq!(json["run_state"], "idle");
    }
}
