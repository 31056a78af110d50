//! Sandcrate plugin executor command-line client.
//!
//! Argument parsing and output rendering live here; the binary entry point
//! is in main.rs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod display;

// Re-export commonly used types
pub use cli::{Cli, Command, RunArgs};
pub use display::{render_line, RunReport};
