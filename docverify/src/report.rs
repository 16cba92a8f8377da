//! Verification reports built from terminal snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::core::{DocumentType, RunState, StageStatus};
use crate::pipeline::RunSnapshot;

/// The user-facing verdict of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// Every stage passed; the document is accepted.
    Verified,
    /// A stage failed; the document is rejected.
    Rejected,
    /// The run was stopped before a verdict.
    Cancelled,
}

impl VerificationOutcome {
    /// Maps a terminal run state to an outcome. Non-terminal states map to `None`.
    #[must_use]
    pub fn from_run_state(state: RunState) -> Option<Self> {
        match state {
            RunState::Completed => Some(Self::Verified),
            RunState::Failed => Some(Self::Rejected),
            RunState::Cancelled => Some(Self::Cancelled),
            RunState::Idle | RunState::Active => None,
        }
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verified => write!(f, "verified"),
            Self::Rejected => write!(f, "rejected"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One stage line in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStage {
    /// Stage title.
    pub title: String,
    /// Final status.
    pub status: StageStatus,
}

/// A summary of a finished run, suitable for download or display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// The run the report describes.
    pub run_id: Uuid,
    /// The document's file name.
    pub document_name: String,
    /// The document's classification.
    pub document_type: DocumentType,
    /// The verdict.
    pub outcome: VerificationOutcome,
    /// Short headline.
    pub headline: String,
    /// One-sentence detail.
    pub detail: String,
    /// Completed-stage percentage.
    pub progress: u8,
    /// Per-stage results.
    pub stages: Vec<ReportStage>,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
}

impl VerificationReport {
    /// Builds a report from a terminal snapshot.
    ///
    /// Returns `None` for idle or active snapshots.
    #[must_use]
    pub fn from_snapshot(snapshot: &RunSnapshot) -> Option<Self> {
        let outcome = VerificationOutcome::from_run_state(snapshot.run_state)?;
        let run_id = snapshot.run_id?;
        let document = snapshot.document.as_ref()?;
        let document_type = snapshot.document_type?;

        let (headline, detail) = match outcome {
            VerificationOutcome::Verified => (
                "Document Verified".to_string(),
                "No tampering detected. Document is authentic.".to_string(),
            ),
            VerificationOutcome::Rejected => {
                let detail = snapshot.failure.as_ref().map_or_else(
                    || "A verification stage failed.".to_string(),
                    |failure| {
                        let title = snapshot
                            .stages
                            .get(failure.stage_index)
                            .map_or(failure.stage_id.as_str(), |s| s.title.as_str());
                        format!("{title} failed: {}", failure.message)
                    },
                );
                ("Verification Failed".to_string(), detail)
            }
            VerificationOutcome::Cancelled => (
                "Verification Cancelled".to_string(),
                "The verification was stopped before all stages finished.".to_string(),
            ),
        };

        Some(Self {
            run_id,
            document_name: document.name.clone(),
            document_type,
            outcome,
            headline,
            detail,
            progress: snapshot.overall_progress,
            stages: snapshot
                .stages
                .iter()
                .map(|s| ReportStage {
                    title: s.title.clone(),
                    status: s.status,
                })
                .collect(),
            generated_at: Utc::now(),
        })
    }

    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns the serde error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.headline)?;
        writeln!(f, "{}", self.detail)?;
        writeln!(
            f,
            "Document: {} ({}) - {}% complete",
            self.document_name, self.document_type, self.progress
        )?;
        for stage in &self.stages {
            writeln!(f, "  [{}] {}", stage.status, stage.title)?;
        }
        Ok(())
    }
}
