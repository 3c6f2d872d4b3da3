//! Recovery policy configuration

use super::retry::RetryConfig;
use crate::error::RobogoError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Strategy applied when a step's action fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    #[default]
    None,
    Fallback,
    Skip,
    Retry,
    Circuit,
    /// Unrecognized strategy names, handled like `none`
    #[serde(other)]
    Unknown,
}

/// Recovery configuration declared on a step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default)]
    pub strategy: RecoveryStrategy,

    /// Action invoked with the step's arguments when strategy is `fallback`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_action: Option<String>,

    #[serde(default)]
    pub skip_on_error: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl RecoveryConfig {
    pub fn validate(&self) -> Result<(), RobogoError> {
        if self.strategy == RecoveryStrategy::Fallback
            && self.fallback_action.as_deref().map_or(true, str::is_empty)
        {
            return Err(RobogoError::configuration(
                "fallback recovery requires a fallback_action",
            ));
        }
        if let Some(retry) = &self.retry {
            retry.validate()?;
        }
        if let Some(breaker) = &self.circuit_breaker {
            breaker.validate()?;
        }
        Ok(())
    }
}

/// Circuit breaker configuration for preventing cascading failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of failures to trigger open state
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Number of half-open successes to close the circuit
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// Time the circuit stays open before probing
    #[serde(default = "default_circuit_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Number of requests allowed in half-open state
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    3
}

fn default_circuit_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_requests() -> u32 {
    10
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout: default_circuit_timeout(),
            max_requests: default_max_requests(),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> Result<(), RobogoError> {
        if self.failure_threshold == 0 || self.success_threshold == 0 || self.max_requests == 0 {
            return Err(RobogoError::configuration(
                "circuit breaker thresholds and max_requests must be at least 1",
            ));
        }
        if self.success_threshold > self.max_requests {
            return Err(RobogoError::configuration(format!(
                "success_threshold {} can never be reached with max_requests {}",
                self.success_threshold, self.max_requests
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_strategy_deserializes() {
        let config: RecoveryConfig = serde_yaml::from_str("strategy: teleport").unwrap();
        assert_eq!(config.strategy, RecoveryStrategy::Unknown);
    }

    #[test]
    fn test_circuit_defaults() {
        let config: RecoveryConfig =
            serde_yaml::from_str("strategy: circuit\ncircuit_breaker: {}").unwrap();
        let breaker = config.circuit_breaker.unwrap();
        assert_eq!(breaker, CircuitBreakerConfig::default());
        assert_eq!(breaker.failure_threshold, 5);
        assert_eq!(breaker.success_threshold, 3);
        assert_eq!(breaker.timeout, Duration::from_secs(30));
        assert_eq!(breaker.max_requests, 10);
    }

    #[test]
    fn test_fallback_requires_action() {
        let config = RecoveryConfig {
            strategy: RecoveryStrategy::Fallback,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RecoveryConfig {
            strategy: RecoveryStrategy::Fallback,
            fallback_action: Some("log".into()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unreachable_success_threshold_rejected() {
        let config = CircuitBreakerConfig {
            success_threshold: 4,
            max_requests: 2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
