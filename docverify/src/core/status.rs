//! Stage status and run state enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The status of one stage within a run.
///
/// Transitions are monotonic: `Pending -> Processing -> {Completed | Failed | Aborted}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not started.
    Pending,
    /// Stage executor is in flight.
    Processing,
    /// Stage executor reported success.
    Completed,
    /// Stage executor reported failure.
    Failed,
    /// Stage was interrupted by cancellation while processing.
    Aborted,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

impl StageStatus {
    /// Returns true if the stage can no longer change.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed | Self::Failed | Self::Aborted)
        )
    }
}

/// The state of the engine's current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No run exists.
    Idle,
    /// Stages are executing.
    Active,
    /// Every stage completed.
    Completed,
    /// A stage failed.
    Failed,
    /// The run was cancelled.
    Cancelled,
}

impl Default for RunState {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl RunState {
    /// Returns true for `Completed`, `Failed` and `Cancelled`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the run accepted the document.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_status_display() {
        assert_eq!(StageStatus::Pending.to_string(), "pending");
        assert_eq!(StageStatus::Processing.to_string(), "processing");
        assert_eq!(StageStatus::Aborted.to_string(), "aborted");
    }

    #[test]
    fn test_stage_status_transitions() {
        assert!(StageStatus::Pending.can_transition_to(StageStatus::Processing));
        assert!(StageStatus::Processing.can_transition_to(StageStatus::Completed));
        assert!(StageStatus::Processing.can_transition_to(StageStatus::Failed));
        assert!(StageStatus::Processing.can_transition_to(StageStatus::Aborted));

        assert!(!StageStatus::Pending.can_transition_to(StageStatus::Completed));
        assert!(!StageStatus::Completed.can_transition_to(StageStatus::Processing));
        assert!(!StageStatus::Failed.can_transition_to(StageStatus::Pending));
    }

    #[test]
    fn test_run_state_is_terminal() {
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(RunState::Cancelled.is_terminal());
        assert!(!RunState::Idle.is_terminal());
        assert!(!RunState::Active.is_terminal());
    }

    #[test]
    fn test_run_state_serialize() {
        let json = serde_json::to_string(&RunState::Cancelled).unwrap();
        assert_eq!(json, r#""cancelled""#);

        let status: StageStatus = serde_json::from_str(r#""processing""#).unwrap();
        assert_eq!(status, StageStatus::Processing);
    }
}
