//! CLI command implementations

mod actions;
mod run;

pub use actions::list_actions;
pub use run::{build_runner_config, run_tests};
