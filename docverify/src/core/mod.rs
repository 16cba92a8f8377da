//! Core domain model types for docverify.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage status and run state enums
//! - Document handles and document type classification

mod document;
mod status;

pub use document::{DocumentHandle, DocumentType};
pub use status::{RunState, StageStatus};
