//! Retry policy configuration

use crate::error::{ErrorType, RobogoError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration declared on a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts, including the first one
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Base delay between attempts
    #[serde(default = "default_delay", with = "humantime_serde")]
    pub delay: Duration,

    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Failure classes that trigger a retry; empty means "use error metadata"
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<RetryCondition>,

    /// Cap applied to every computed delay, zero for uncapped
    #[serde(default, with = "humantime_serde")]
    pub max_delay: Duration,

    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay: default_delay(),
            backoff: BackoffStrategy::default(),
            conditions: Vec::new(),
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Policy used by the `retry` recovery strategy when none is configured
    pub fn recovery_default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
            backoff: BackoffStrategy::Exponential,
            conditions: Vec::new(),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }

    /// Check the invariants of the policy
    pub fn validate(&self) -> Result<(), RobogoError> {
        if self.attempts == 0 {
            return Err(RobogoError::configuration(
                "retry attempts must be at least 1",
            ));
        }
        if !self.max_delay.is_zero() && self.delay > self.max_delay {
            return Err(RobogoError::builder(
                ErrorType::Configuration,
                format!(
                    "retry delay {:?} exceeds max_delay {:?}",
                    self.delay, self.max_delay
                ),
            )
            .detail("delay_ms", self.delay.as_millis() as u64)
            .detail("max_delay_ms", self.max_delay.as_millis() as u64)
            .build());
        }
        Ok(())
    }

    /// True if retries are restricted to specific failure classes
    pub fn has_condition_filter(&self) -> bool {
        !self.conditions.is_empty() && !self.conditions.contains(&RetryCondition::All)
    }
}

/// Backoff strategies for retry delays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay before every retry
    #[default]
    Fixed,
    /// Delay grows by the base delay on every attempt
    Linear,
    /// Delay doubles on every attempt
    Exponential,
}

/// Failure classes a retry policy can be restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryCondition {
    #[serde(rename = "5xx")]
    ServerError,
    #[serde(rename = "4xx")]
    ClientError,
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "connection_error")]
    ConnectionError,
    #[serde(rename = "rate_limit")]
    RateLimit,
    #[serde(rename = "all")]
    All,
}

impl RetryCondition {
    /// Check if a failure falls into this class
    pub fn matches(&self, error_type: Option<ErrorType>, message: &str) -> bool {
        let lower = message.to_lowercase();
        match self {
            RetryCondition::All => true,
            RetryCondition::ServerError => {
                contains_status(&lower, 500..=599) || lower.contains("server error")
            }
            RetryCondition::ClientError => {
                contains_status(&lower, 400..=499) || lower.contains("client error")
            }
            RetryCondition::Timeout => {
                error_type == Some(ErrorType::Timeout)
                    || lower.contains("timeout")
                    || lower.contains("timed out")
                    || lower.contains("deadline exceeded")
            }
            RetryCondition::ConnectionError => {
                error_type == Some(ErrorType::Network)
                    || lower.contains("connection")
                    || lower.contains("refused")
                    || lower.contains("unreachable")
                    || lower.contains("broken pipe")
            }
            RetryCondition::RateLimit => {
                lower.contains("rate limit")
                    || lower.contains("too many requests")
                    || contains_status(&lower, 429..=429)
            }
        }
    }
}

/// Look for a standalone three-digit status code within the given range
fn contains_status(text: &str, range: std::ops::RangeInclusive<u16>) -> bool {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|token| token.len() == 3)
        .filter_map(|token| token.parse::<u16>().ok())
        .any(|code| range.contains(&code))
}

fn default_attempts() -> u32 {
    3
}

fn default_delay() -> Duration {
    Duration::from_secs(1)
}
