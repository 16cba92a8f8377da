//! Pipeline configuration and execution.
//!
//! This module provides:
//! - Validated stage templates
//! - The run record and its render snapshots
//! - The verification engine and its run driver

mod engine;
mod run;
mod template;

pub use engine::{RunDriver, VerificationEngine};
pub(crate) use run::Run;
pub use run::{RunSnapshot, StageView};
pub use template::StageTemplate;
