//! # Robogo
//!
//! Execution core of a declarative test-automation engine. Test cases are
//! ordered lists of named steps, each invoking an action with arguments.
//!
//! ## Usage
//!
//! ```bash
//! robogo run cases/login.yaml suites/smoke.yaml --parallel --max-concurrency 8
//! ```
//!
//! ## Modules
//!
//! - `actions` - Action trait, registry and the built-in actions
//! - `app` - Process configuration, logging and fatal error reporting
//! - `cli` - Command-line parsing and command implementations
//! - `config` - YAML models for steps, test cases, suites and runner settings
//! - `error` - Typed error model with builder, catalog and diagnostics
//! - `execution` - Dependency grouping, retry, circuit breaking, recovery and runners
//! - `report` - Console and JSON rendering of run results
pub mod actions;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod report;

#[cfg(test)]
mod property_tests;
