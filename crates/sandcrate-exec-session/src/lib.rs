//! # sandcrate-exec-session
//!
//! Execution session lifecycle for the Sandcrate plugin executor.
//!
//! This crate provides:
//! - Output aggregation in arrival order
//! - The execution state machine driven by decoded envelopes
//! - The lifecycle coordinator tying the connection to the session
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on sandcrate-exec-core
//! and sandcrate-exec-transport.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod executor;
pub mod machine;
pub mod output;

// Re-export commonly used types
pub use executor::PluginExecutor;
pub use machine::SessionMachine;
pub use output::{LineKind, OutputAggregator, OutputLine};
