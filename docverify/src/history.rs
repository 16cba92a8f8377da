//! Verification history.
//!
//! Storage is an external collaborator; the crate defines the
//! [`HistoryStore`] interface, an in-memory implementation, and a sink that
//! records one entry per finished run.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::core::{DocumentType, RunState};
use crate::events::PresentationSink;
use crate::pipeline::RunSnapshot;
use crate::report::VerificationOutcome;

/// One finished verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// The run id.
    pub id: Uuid,
    /// The document's file name.
    pub file_name: String,
    /// The document's classification.
    pub document_type: DocumentType,
    /// The verdict.
    pub outcome: VerificationOutcome,
    /// Completed-stage percentage at the end of the run.
    pub progress: u8,
    /// Id of the stage that failed, for rejected runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<String>,
    /// When the run finished.
    pub recorded_at: DateTime<Utc>,
}

impl VerificationRecord {
    /// Builds a record from a terminal snapshot. Returns `None` otherwise.
    #[must_use]
    pub fn from_snapshot(snapshot: &RunSnapshot) -> Option<Self> {
        let outcome = VerificationOutcome::from_run_state(snapshot.run_state)?;
        Some(Self {
            id: snapshot.run_id?,
            file_name: snapshot.document.as_ref()?.name.clone(),
            document_type: snapshot.document_type?,
            outcome,
            progress: snapshot.overall_progress,
            failed_stage: snapshot.failure.as_ref().map(|f| f.stage_id.clone()),
            recorded_at: snapshot.finished_at.unwrap_or_else(Utc::now),
        })
    }
}

/// Aggregate counts over a history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// All records.
    pub total: usize,
    /// Verified documents.
    pub verified: usize,
    /// Rejected documents.
    pub rejected: usize,
    /// Cancelled runs.
    pub cancelled: usize,
}

/// Storage backend for verification history.
pub trait HistoryStore: Send + Sync {
    /// Stores a record.
    fn record(&self, record: VerificationRecord);

    /// Gets a record by run id.
    fn get(&self, id: Uuid) -> Option<VerificationRecord>;

    /// Lists records, newest first.
    fn list(&self) -> Vec<VerificationRecord>;

    /// Returns the number of records.
    fn len(&self) -> usize;

    /// Returns true if nothing has been recorded.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counts records by outcome.
    fn stats(&self) -> HistoryStats {
        self.list()
            .iter()
            .fold(HistoryStats::default(), |mut stats, record| {
                stats.total += 1;
                match record.outcome {
                    VerificationOutcome::Verified => stats.verified += 1,
                    VerificationOutcome::Rejected => stats.rejected += 1,
                    VerificationOutcome::Cancelled => stats.cancelled += 1,
                }
                stats
            })
    }
}

/// In-memory history store, optionally bounded.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    entries: Mutex<Vec<VerificationRecord>>,
    max_entries: Option<usize>,
}

impl InMemoryHistoryStore {
    /// Creates an unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that keeps at most `max_entries`, dropping the oldest.
    #[must_use]
    pub fn bounded(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            max_entries: Some(max_entries),
        }
    }

    /// Removes every record.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn record(&self, record: VerificationRecord) {
        let mut entries = self.entries.lock();
        entries.push(record);
        if let Some(max) = self.max_entries {
            let overflow = entries.len().saturating_sub(max);
            entries.drain(..overflow);
        }
    }

    fn get(&self, id: Uuid) -> Option<VerificationRecord> {
        self.entries.lock().iter().find(|r| r.id == id).cloned()
    }

    fn list(&self) -> Vec<VerificationRecord> {
        self.entries.lock().iter().rev().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Presentation sink that records every finished run into a store.
#[derive(Clone)]
pub struct HistorySink {
    store: Arc<dyn HistoryStore>,
}

impl HistorySink {
    /// Creates a sink writing to `store`.
    #[must_use]
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }
}

impl std::fmt::Debug for HistorySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistorySink")
            .field("records", &self.store.len())
            .finish()
    }
}

impl PresentationSink for HistorySink {
    fn on_snapshot(&self, _snapshot: &RunSnapshot) {}

    fn on_terminal(&self, _state: RunState, snapshot: &RunSnapshot) {
        if let Some(record) = VerificationRecord::from_snapshot(snapshot) {
            debug!(run_id = %record.id, outcome = %record.outcome, "Recording verification");
            self.store.record(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DocumentHandle;

    fn record(name: &str, outcome: VerificationOutcome) -> VerificationRecord {
        VerificationRecord {
            id: Uuid::new_v4(),
            file_name: name.to_string(),
            document_type: DocumentType::Other,
            outcome,
            progress: 100,
            failed_stage: None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_store_lists_newest_first() {
        let store = InMemoryHistoryStore::new();
        store.record(record("a.pdf", VerificationOutcome::Verified));
        store.record(record("b.pdf", VerificationOutcome::Rejected));

        let names: Vec<String> = store.list().into_iter().map(|r| r.file_name).collect();
        assert_eq!(names, vec!["b.pdf", "a.pdf"]);
    }

    #[test]
    fn test_bounded_store_drops_oldest() {
        let store = InMemoryHistoryStore::bounded(2);
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            store.record(record(name, VerificationOutcome::Verified));
        }
        assert_eq!(store.len(), 2);
        assert!(store.list().iter().all(|r| r.file_name != "a.pdf"));
    }

    #[test]
    fn test_stats() {
        let store = InMemoryHistoryStore::new();
        store.record(record("a.pdf", VerificationOutcome::Verified));
        store.record(record("b.pdf", VerificationOutcome::Verified));
        store.record(record("c.pdf", VerificationOutcome::Rejected));
        store.record(record("d.pdf", VerificationOutcome::Cancelled));

        assert_eq!(
            store.stats(),
            HistoryStats {
                total: 4,
                verified: 2,
                rejected: 1,
                cancelled: 1
            }
        );
    }

    #[test]
    fn test_history_sink_records_terminal_only() {
        let store = Arc::new(InMemoryHistoryStore::new());
        let sink = HistorySink::new(store.clone());

        let run_id = Uuid::new_v4();
        let snapshot = RunSnapshot {
            run_id: Some(run_id),
            run_state: RunState::Completed,
            document: Some(DocumentHandle::new("passport_scan.pdf", 10)),
            document_type: Some(DocumentType::GovernmentId),
            overall_progress: 100,
            ..RunSnapshot::idle()
        };

        sink.on_snapshot(&snapshot);
        assert!(store.is_empty());

        sink.on_terminal(RunState::Completed, &snapshot);
        let stored = store.get(run_id).unwrap();
        assert_eq!(stored.outcome, VerificationOutcome::Verified);
        assert_eq!(stored.file_name, "passport_scan.pdf");
    }

    #[test]
    fn test_record_from_idle_is_none() {
        assert!(VerificationRecord::from_snapshot(&RunSnapshot::idle()).is_none());
    }
}
