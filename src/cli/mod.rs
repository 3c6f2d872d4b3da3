//! Command-line interface
//!
//! Argument structures, routing and the command implementations.

pub mod args;
pub mod commands;
pub mod router;

pub use args::{Cli, Commands, OutputFormat, RunArgs};
pub use router::execute_command;
