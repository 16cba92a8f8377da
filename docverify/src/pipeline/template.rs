//! Validated, immutable stage templates.

use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::ConfigurationError;
use crate::stages::Stage;

/// An ordered, non-empty list of stages with unique ids.
///
/// Cloning is cheap; runs hold their own clone so reconfiguring the engine
/// never changes a run that already exists.
#[derive(Debug, Clone)]
pub struct StageTemplate {
    stages: Arc<[Stage]>,
}

impl StageTemplate {
    /// Validates and freezes a stage list.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the list is empty, or any id is
    /// blank or repeated.
    pub fn new(stages: Vec<Stage>) -> Result<Self, ConfigurationError> {
        if stages.is_empty() {
            return Err(ConfigurationError::empty());
        }

        let mut seen = HashSet::with_capacity(stages.len());
        for (index, stage) in stages.iter().enumerate() {
            if stage.id.trim().is_empty() {
                return Err(ConfigurationError::blank_id(index));
            }
            if !seen.insert(stage.id.as_str()) {
                return Err(ConfigurationError::duplicate_id(&stage.id));
            }
        }

        Ok(Self {
            stages: stages.into(),
        })
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false; templates are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the stage at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    /// Returns the stage ids in execution order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::SimulatedExecutor;

    fn stage(id: &str) -> Stage {
        Stage::new(id, id, "", Arc::new(SimulatedExecutor::with_delay_ms(1)))
    }

    #[test]
    fn test_template_keeps_order() {
        let template = StageTemplate::new(vec![stage("c"), stage("a"), stage("b")]).unwrap();
        assert_eq!(template.ids(), vec!["c", "a", "b"]);
        assert_eq!(template.len(), 3);
        assert_eq!(template.get(1).map(|s| s.id.as_str()), Some("a"));
    }

    #[test]
    fn test_template_rejects_empty() {
        let err = StageTemplate::new(Vec::new()).unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-001-EMPTY"));
    }

    #[test]
    fn test_template_rejects_duplicates() {
        let err = StageTemplate::new(vec![stage("scan"), stage("hash"), stage("scan")]).unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-002-DUPLICATE"));
        assert_eq!(err.stages, vec!["scan".to_string()]);
    }

    #[test]
    fn test_template_rejects_blank_id() {
        let err = StageTemplate::new(vec![stage("scan"), stage("  ")]).unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-003-BLANK_ID"));
    }
}
