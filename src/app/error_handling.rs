//! Error handling utilities
//!
//! This module provides centralized handling of errors that abort a run.

use crate::error::RobogoError;
use tracing::error;

/// Report a fatal error and exit with status 1
///
/// For a `RobogoError` anywhere in the chain the catalog's user message is
/// shown, and with `-v` its remediation and formatted context as well.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {:#}", error);

    match error.chain().find_map(|cause| cause.downcast_ref::<RobogoError>()) {
        Some(robogo_err) => {
            eprintln!("Error: {:#}", error);
            eprintln!("{}", robogo_err.user_message());
            if verbose >= 1 {
                eprintln!("Hint: {}", robogo_err.remediation());
                eprintln!("\n{}", robogo_err.format_with_stack());
            }
        }
        None => {
            eprintln!("Error: {error}");
            if verbose >= 1 {
                eprintln!("\nError chain:");
                for (i, cause) in error.chain().enumerate() {
                    eprintln!("  {}: {}", i, cause);
                }
            }
        }
    }

    std::process::exit(1)
}
