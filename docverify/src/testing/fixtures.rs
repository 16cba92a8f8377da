//! Fixtures for pipeline tests.

use std::sync::Arc;

use crate::core::DocumentHandle;
use crate::stages::{Stage, StageExecutor};

/// A small PDF handle that passes the default intake policy.
#[must_use]
pub fn sample_document() -> DocumentHandle {
    DocumentHandle::new("passport_scan.pdf", 2 * 1024 * 1024).with_media_type("application/pdf")
}

/// `n` stages named `stage-0..stage-{n-1}`, all sharing `executor`.
#[must_use]
pub fn uniform_stages(n: usize, executor: &Arc<dyn StageExecutor>) -> Vec<Stage> {
    (0..n)
        .map(|i| {
            Stage::new(
                format!("stage-{i}"),
                format!("Stage {i}"),
                format!("Test stage {i}"),
                executor.clone(),
            )
        })
        .collect()
}

/// One stage per executor, named `stage-0..`, in the given order.
#[must_use]
pub fn stages_over(executors: Vec<Arc<dyn StageExecutor>>) -> Vec<Stage> {
    executors
        .into_iter()
        .enumerate()
        .map(|(i, executor)| {
            Stage::new(
                format!("stage-{i}"),
                format!("Stage {i}"),
                format!("Test stage {i}"),
                executor,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntakeConfig;
    use crate::testing::MockExecutor;

    #[test]
    fn test_sample_document_is_valid() {
        assert!(sample_document().validate(&IntakeConfig::default()).is_ok());
    }

    #[test]
    fn test_uniform_stages() {
        let executor: Arc<dyn StageExecutor> = Arc::new(MockExecutor::new());
        let stages = uniform_stages(3, &executor);
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[2].id, "stage-2");
    }
}
