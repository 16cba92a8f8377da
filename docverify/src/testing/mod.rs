//! Testing utilities for verification pipelines.
//!
//! This module provides:
//! - Deterministic mock executors
//! - Stage list and document fixtures

mod fixtures;
mod mocks;

pub use fixtures::{sample_document, stages_over, uniform_stages};
pub use mocks::{FailingExecutor, GatedExecutor, MockExecutor};
