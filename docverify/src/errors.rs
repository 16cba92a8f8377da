//! Error types for the verification engine.
//!
//! Precondition violations (`AlreadyRunning`, `NotRunning`) and bad input are
//! recoverable and returned to the caller. Stage failures are not errors from
//! the caller's point of view: they are recorded on the run as a
//! [`StageExecutionFailure`] and surface through the terminal snapshot.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::RunState;

/// The main error type for engine operations.
#[derive(Debug, Clone, Error)]
pub enum VerificationError {
    /// The stage template is unusable.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// The arguments passed to `start` were rejected.
    #[error("{0}")]
    InvalidInput(#[from] InvalidInputError),

    /// A run is already active.
    #[error("{0}")]
    AlreadyRunning(#[from] AlreadyRunningError),

    /// No run is active.
    #[error("{0}")]
    NotRunning(#[from] NotRunningError),
}

impl VerificationError {
    /// Returns true if the caller can recover by correcting input or state.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }
}

/// Diagnostic metadata attached to configuration errors.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code (e.g., "CONFIG-001-EMPTY").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
}

impl ErrorInfo {
    /// Creates new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }
}

/// Error raised when a stage template is rejected.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// The stage ids involved in the error.
    pub stages: Vec<String>,
    /// Optional diagnostic info.
    pub error_info: Option<ErrorInfo>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// The template has no stages.
    #[must_use]
    pub fn empty() -> Self {
        Self::new("Stage template has no stages").with_error_info(
            ErrorInfo::new("CONFIG-001-EMPTY", "Cannot run an empty verification pipeline")
                .with_fix_hint("Configure at least one stage before starting a run."),
        )
    }

    /// Two stages share an id.
    #[must_use]
    pub fn duplicate_id(id: &str) -> Self {
        Self::new(format!("Duplicate stage id '{id}'"))
            .with_stages(vec![id.to_string()])
            .with_error_info(
                ErrorInfo::new("CONFIG-002-DUPLICATE", format!("Stage id '{id}' is used more than once"))
                    .with_fix_hint("Give every stage a unique id."),
            )
    }

    /// A stage id is empty or whitespace.
    #[must_use]
    pub fn blank_id(index: usize) -> Self {
        Self::new(format!("Stage at position {index} has a blank id")).with_error_info(
            ErrorInfo::new("CONFIG-003-BLANK_ID", "Stage ids cannot be empty or whitespace-only"),
        )
    }

    /// `start` was called before `configure`.
    #[must_use]
    pub fn not_configured() -> Self {
        Self::new("Engine has no stage template").with_error_info(
            ErrorInfo::new("CONFIG-004-UNCONFIGURED", "No stages have been configured")
                .with_fix_hint("Call configure() before start()."),
        )
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the diagnostic info.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised when the document or document type is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {field}: {reason}")]
pub struct InvalidInputError {
    /// The offending field ("document" or "document_type").
    pub field: String,
    /// Why it was rejected.
    pub reason: String,
}

impl InvalidInputError {
    /// Creates a new invalid input error.
    #[must_use]
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a document rejection.
    #[must_use]
    pub fn document(reason: impl Into<String>) -> Self {
        Self::new("document", reason)
    }

    /// Shorthand for a document type rejection.
    #[must_use]
    pub fn document_type(reason: impl Into<String>) -> Self {
        Self::new("document_type", reason)
    }
}

/// Error raised when starting while a run is active.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("A verification run is already active (run {run_id})")]
pub struct AlreadyRunningError {
    /// The id of the active run.
    pub run_id: uuid::Uuid,
}

/// Error raised when cancelling with no active run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No verification run is active (engine is {state})")]
pub struct NotRunningError {
    /// The state the engine was in.
    pub state: RunState,
}

/// A stage executor reported failure.
///
/// Recorded on the run, never returned from an engine operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("Stage '{stage_id}' failed: {message}")]
pub struct StageExecutionFailure {
    /// The failing stage's id.
    pub stage_id: String,
    /// The failing stage's position.
    pub stage_index: usize,
    /// The executor's failure message.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_codes() {
        assert_eq!(ConfigurationError::empty().code(), Some("CONFIG-001-EMPTY"));

        let dup = ConfigurationError::duplicate_id("scan");
        assert_eq!(dup.code(), Some("CONFIG-002-DUPLICATE"));
        assert_eq!(dup.stages, vec!["scan".to_string()]);
        assert_eq!(dup.to_string(), "Duplicate stage id 'scan'");
    }

    #[test]
    fn test_invalid_input_display() {
        let err = InvalidInputError::document("file name is empty");
        assert_eq!(err.to_string(), "Invalid document: file name is empty");
    }

    #[test]
    fn test_recoverability() {
        let config: VerificationError = ConfigurationError::empty().into();
        assert!(!config.is_recoverable());

        let not_running: VerificationError = NotRunningError { state: RunState::Idle }.into();
        assert!(not_running.is_recoverable());
        assert_eq!(
            not_running.to_string(),
            "No verification run is active (engine is idle)"
        );
    }

    #[test]
    fn test_stage_failure_serialize() {
        let failure = StageExecutionFailure {
            stage_id: "authenticity_check".to_string(),
            stage_index: 1,
            message: "tampering detected".to_string(),
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["stage_index"], 1);
        assert_eq!(
            failure.to_string(),
            "Stage 'authenticity_check' failed: tampering detected"
        );
    }
}
