//! Presentation sinks.
//!
//! The engine pushes a [`RunSnapshot`](crate::pipeline::RunSnapshot) to its
//! sink after every transition and a terminal notification once per run.

mod sink;

pub use sink::{
    CollectingPresentationSink, FanoutPresentationSink, LoggingPresentationSink,
    NoOpPresentationSink, PresentationSink,
};

#[cfg(test)]
pub use sink::MockPresentationSink;
