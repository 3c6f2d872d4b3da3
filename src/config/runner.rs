//! Runner configuration
//!
//! Built once at startup (from an optional file plus CLI overrides) and passed
//! explicitly to the runner; nothing here is global.

use super::parallel::ParallelConfig;
use crate::error::RobogoError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub parallel: ParallelConfig,

    /// Default upper bound for a single action invocation
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub step_timeout: Option<Duration>,

    /// Upper bound for a whole run
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub run_timeout: Option<Duration>,

    /// Log each retry with its delay and error instead of `Attempt N/M`
    #[serde(default)]
    pub verbose_retry: bool,

    /// Environment variables captured into error context
    #[serde(default)]
    pub capture_env: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            parallel: ParallelConfig::default(),
            step_timeout: None,
            run_timeout: None,
            verbose_retry: false,
            capture_env: Vec::new(),
        }
    }
}

impl RunnerConfig {
    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn with_verbose_retry(mut self, verbose: bool) -> Self {
        self.verbose_retry = verbose;
        self
    }

    pub fn validate(&self) -> Result<(), RobogoError> {
        self.parallel.validate()?;
        if self.step_timeout.is_some_and(|t| t.is_zero()) {
            return Err(RobogoError::configuration("step_timeout must be positive"));
        }
        Ok(())
    }
}
