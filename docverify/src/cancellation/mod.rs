//! Cooperative cancellation for verification runs.

mod token;

pub use token::CancellationToken;
