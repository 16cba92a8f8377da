//! The standard four-stage document verification pipeline.

use std::sync::Arc;
use std::time::Duration;

use super::{SimulatedExecutor, Stage, StageExecutor};

/// `(id, title, description)` of each standard stage, in execution order.
pub const STANDARD_STAGES: [(&str, &str, &str); 4] = [
    (
        "document_analysis",
        "Document Analysis",
        "Scanning document structure and metadata",
    ),
    (
        "authenticity_check",
        "Authenticity Check",
        "AI-powered tampering detection",
    ),
    (
        "blockchain_verification",
        "Blockchain Verification",
        "Creating immutable verification record",
    ),
    (
        "report_generation",
        "Report Generation",
        "Compiling comprehensive verification report",
    ),
];

/// Builds the standard stages, all delegating to one executor.
#[must_use]
pub fn standard_stages(executor: Arc<dyn StageExecutor>) -> Vec<Stage> {
    standard_stages_with(|_| executor.clone())
}

/// Builds the standard stages, asking `factory` for each stage's executor by id.
pub fn standard_stages_with<F>(mut factory: F) -> Vec<Stage>
where
    F: FnMut(&str) -> Arc<dyn StageExecutor>,
{
    STANDARD_STAGES
        .iter()
        .map(|(id, title, description)| Stage::new(*id, *title, *description, factory(id)))
        .collect()
}

/// Builds the standard stages over a [`SimulatedExecutor`] with a fixed delay.
#[must_use]
pub fn simulated_stages(delay: Duration) -> Vec<Stage> {
    standard_stages(Arc::new(SimulatedExecutor::new(delay)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{StageOutcome, SimulatedExecutor};

    #[test]
    fn test_standard_order() {
        let stages = simulated_stages(Duration::from_millis(1));
        let ids: Vec<&str> = stages.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "document_analysis",
                "authenticity_check",
                "blockchain_verification",
                "report_generation"
            ]
        );
        assert_eq!(stages[1].title, "Authenticity Check");
        assert_eq!(stages[3].description, "Compiling comprehensive verification report");
    }

    #[test]
    fn test_factory_receives_ids() {
        let mut seen = Vec::new();
        let stages = standard_stages_with(|id| -> Arc<dyn StageExecutor> {
            seen.push(id.to_string());
            let outcome = if id == "authenticity_check" {
                StageOutcome::failure("tampered")
            } else {
                StageOutcome::success()
            };
            Arc::new(SimulatedExecutor::with_delay_ms(1).with_outcome(outcome))
        });

        assert_eq!(stages.len(), 4);
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], "document_analysis");
    }
}
