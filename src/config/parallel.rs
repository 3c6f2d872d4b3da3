//! Parallel execution configuration

use crate::error::{ErrorType, RobogoError};
use serde::{Deserialize, Serialize};

pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 100;

/// Controls which kinds of work may run concurrently and how much of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Run the test cases of a suite concurrently
    #[serde(default = "default_true")]
    pub test_cases: bool,

    /// Run independent steps of a test case concurrently
    #[serde(default = "default_true")]
    pub steps: bool,

    /// Treat HTTP actions as parallel-safe
    #[serde(default = "default_true")]
    pub http_requests: bool,

    /// Treat database actions as parallel-safe
    #[serde(default = "default_true")]
    pub database_operations: bool,

    /// Treat read-only file actions as parallel-safe
    #[serde(default)]
    pub file_operations: bool,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_concurrency: default_max_concurrency(),
            test_cases: true,
            steps: true,
            http_requests: true,
            database_operations: true,
            file_operations: false,
        }
    }
}

impl ParallelConfig {
    /// Parallel execution enabled with the given concurrency
    pub fn enabled_with(max_concurrency: usize) -> Self {
        Self {
            enabled: true,
            max_concurrency,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), RobogoError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.max_concurrency) {
            return Err(RobogoError::builder(
                ErrorType::Configuration,
                format!(
                    "max_concurrency must be between {} and {}, got {}",
                    MIN_CONCURRENCY, MAX_CONCURRENCY, self.max_concurrency
                ),
            )
            .detail("max_concurrency", self.max_concurrency as u64)
            .build());
        }
        Ok(())
    }

    pub fn steps_enabled(&self) -> bool {
        self.enabled && self.steps
    }

    pub fn test_cases_enabled(&self) -> bool {
        self.enabled && self.test_cases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert!(ParallelConfig::enabled_with(1).validate().is_ok());
        assert!(ParallelConfig::enabled_with(100).validate().is_ok());
        assert!(ParallelConfig::enabled_with(0).validate().is_err());
        assert!(ParallelConfig::enabled_with(101).validate().is_err());
    }

    #[test]
    fn test_feature_flags_require_enabled() {
        let mut config = ParallelConfig::default();
        assert!(!config.steps_enabled());
        config.enabled = true;
        assert!(config.steps_enabled());
        config.steps = false;
        assert!(!config.steps_enabled());
        assert!(config.test_cases_enabled());
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: ParallelConfig = serde_yaml::from_str("enabled: true").unwrap();
        assert_eq!(config.max_concurrency, 4);
        assert!(config.http_requests);
        assert!(!config.file_operations);
    }
}
