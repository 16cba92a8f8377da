//! Engine configuration.
//!
//! Every field has a serde default, so a partial JSON document (or `{}`)
//! yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How overall progress is rounded when the stage count does not divide 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressRounding {
    /// Round to the nearest integer, halves up (1/3 -> 33, 2/3 -> 67).
    Nearest,
    /// Round down (1/3 -> 33, 2/3 -> 66).
    Floor,
}

impl Default for ProgressRounding {
    fn default() -> Self {
        Self::Nearest
    }
}

impl ProgressRounding {
    /// Computes `100 * completed / total` under this rounding mode.
    ///
    /// Returns 0 when `total` is 0.
    #[must_use]
    pub fn percent(self, completed: usize, total: usize) -> u8 {
        if total == 0 {
            return 0;
        }
        let completed = completed.min(total);
        let scaled = completed * 100;
        let value = match self {
            Self::Floor => scaled / total,
            Self::Nearest => (scaled * 2 + total) / (total * 2),
        };
        u8::try_from(value).unwrap_or(100)
    }
}

/// Which documents the engine accepts at `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Maximum document size in bytes.
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: u64,
    /// Accepted file extensions, compared case-insensitively.
    #[serde(default = "default_accepted_extensions")]
    pub accepted_extensions: Vec<String>,
}

fn default_max_document_bytes() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_accepted_extensions() -> Vec<String> {
    ["pdf", "jpg", "jpeg", "png"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: default_max_document_bytes(),
            accepted_extensions: default_accepted_extensions(),
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of compact text.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Document intake policy.
    #[serde(default)]
    pub intake: IntakeConfig,
    /// Progress rounding mode.
    #[serde(default)]
    pub progress_rounding: ProgressRounding,
    /// Per-stage delay used by the simulated executor, in milliseconds.
    #[serde(default = "default_simulated_stage_delay_ms")]
    pub simulated_stage_delay_ms: u64,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_simulated_stage_delay_ms() -> u64 {
    2000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            intake: IntakeConfig::default(),
            progress_rounding: ProgressRounding::default(),
            simulated_stage_delay_ms: default_simulated_stage_delay_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns the serde error if the document is malformed.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Sets the progress rounding mode.
    #[must_use]
    pub fn with_progress_rounding(mut self, rounding: ProgressRounding) -> Self {
        self.progress_rounding = rounding;
        self
    }

    /// Sets the maximum document size.
    #[must_use]
    pub fn with_max_document_bytes(mut self, bytes: u64) -> Self {
        self.intake.max_document_bytes = bytes;
        self
    }

    /// Replaces the accepted extensions.
    #[must_use]
    pub fn with_accepted_extensions(
        mut self,
        extensions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.intake.accepted_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the simulated per-stage delay.
    #[must_use]
    pub fn with_simulated_stage_delay_ms(mut self, ms: u64) -> Self {
        self.simulated_stage_delay_ms = ms;
        self
    }

    /// Gets the simulated per-stage delay as a Duration.
    #[must_use]
    pub fn simulated_stage_delay(&self) -> Duration {
        Duration::from_millis(self.simulated_stage_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_nearest_thirds() {
        let r = ProgressRounding::Nearest;
        let seq: Vec<u8> = (0..=3).map(|k| r.percent(k, 3)).collect();
        assert_eq!(seq, vec![0, 33, 67, 100]);
    }

    #[test]
    fn test_percent_floor_thirds() {
        let r = ProgressRounding::Floor;
        let seq: Vec<u8> = (0..=3).map(|k| r.percent(k, 3)).collect();
        assert_eq!(seq, vec![0, 33, 66, 100]);
    }

    #[test]
    fn test_percent_half_rounds_up() {
        // 1/8 = 12.5
        assert_eq!(ProgressRounding::Nearest.percent(1, 8), 13);
        assert_eq!(ProgressRounding::Floor.percent(1, 8), 12);
    }

    #[test]
    fn test_percent_edges() {
        assert_eq!(ProgressRounding::Nearest.percent(0, 0), 0);
        assert_eq!(ProgressRounding::Nearest.percent(4, 4), 100);
        assert_eq!(ProgressRounding::Floor.percent(9, 4), 100);
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.intake.max_document_bytes, 10 * 1024 * 1024);
        assert_eq!(config.intake.accepted_extensions, vec!["pdf", "jpg", "jpeg", "png"]);
        assert_eq!(config.progress_rounding, ProgressRounding::Nearest);
        assert_eq!(config.simulated_stage_delay(), Duration::from_secs(2));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_json_partial() {
        let config = EngineConfig::from_json_str(
            r#"{"progress_rounding": "floor", "intake": {"max_document_bytes": 1024}}"#,
        )
        .unwrap();

        assert_eq!(config.progress_rounding, ProgressRounding::Floor);
        assert_eq!(config.intake.max_document_bytes, 1024);
        assert_eq!(config.intake.accepted_extensions.len(), 4);
        assert_eq!(config.simulated_stage_delay_ms, 2000);
    }

    #[test]
    fn test_from_json_empty_object() {
        assert_eq!(EngineConfig::from_json_str("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_progress_rounding(ProgressRounding::Floor)
            .with_max_document_bytes(5)
            .with_accepted_extensions(["tiff"])
            .with_simulated_stage_delay_ms(10);

        assert_eq!(config.intake.accepted_extensions, vec!["tiff".to_string()]);
        assert_eq!(config.simulated_stage_delay(), Duration::from_millis(10));
    }
}
