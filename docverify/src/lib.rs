//! # Docverify
//!
//! A sequential document verification pipeline engine.
//!
//! Docverify drives one document at a time through an ordered list of
//! verification stages with support for:
//!
//! - **Sequential execution**: stages run strictly one after another
//! - **Exact progress**: progress is derived from completed stages, never time
//! - **Snapshots**: every transition is pushed to a presentation sink as an
//!   immutable copy of the run
//! - **Cancellation and reset**: cooperative cancellation with an
//!   authoritative engine-side state change
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docverify::prelude::*;
//!
//! let engine = VerificationEngine::with_stages(
//!     EngineConfig::default(),
//!     Arc::new(LoggingPresentationSink::default()),
//!     catalog::simulated_stages(Duration::from_secs(2)),
//! )?;
//!
//! let state = engine
//!     .verify(DocumentHandle::new("passport.pdf", 1_048_576), DocumentType::GovernmentId)
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod history;
pub mod observability;
pub mod pipeline;
pub mod report;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{EngineConfig, IntakeConfig, LoggingConfig, ProgressRounding};
    pub use crate::core::{DocumentHandle, DocumentType, RunState, StageStatus};
    pub use crate::errors::{
        AlreadyRunningError, ConfigurationError, InvalidInputError, NotRunningError,
        StageExecutionFailure, VerificationError,
    };
    pub use crate::events::{
        CollectingPresentationSink, FanoutPresentationSink, LoggingPresentationSink,
        NoOpPresentationSink, PresentationSink,
    };
    pub use crate::history::{HistorySink, HistoryStore, InMemoryHistoryStore, VerificationRecord};
    pub use crate::pipeline::{RunDriver, RunSnapshot, StageTemplate, StageView, VerificationEngine};
    pub use crate::report::{VerificationOutcome, VerificationReport};
    pub use crate::stages::{
        catalog, FnExecutor, SimulatedExecutor, Stage, StageContext, StageExecutor, StageOutcome,
    };
}
