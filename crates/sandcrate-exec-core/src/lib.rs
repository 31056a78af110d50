//! # sandcrate-exec-core
//!
//! Core types for the Sandcrate plugin executor.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other sandcrate-exec crates. It provides:
//!
//! - Plugin identity and execution command types
//! - Session types (SessionId, RunId, Status, SessionState)
//! - Executor configuration loaded from YAML
//! - Error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other sandcrate-exec crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod plugin;
pub mod session;

// Re-export commonly used types
pub use config::{
    AuthSettings, EndpointSettings, ExecutionSettings, ExecutorConfig, LoggingSettings,
    DEFAULT_TIMEOUT_MS, PLUGIN_CHANNEL_PATH,
};
pub use error::{Error, Result};
pub use plugin::{ExecutionCommand, PluginRef};
pub use session::{RunId, SessionId, SessionState, Status};
