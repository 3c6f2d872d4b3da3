//! Retry executor with configurable backoff
//!
//! Retry eligibility is decided in order by a custom [`RetryClassifier`],
//! the [`RobogoError`] retryable flag, and finally a heuristic over the
//! failure message for well-known transient conditions.

use super::backoff::calculate_delay;
use super::context::ExecutionContext;
use crate::config::{BackoffStrategy, RetryCondition, RetryConfig};
use crate::error::{wrap_error, BoxError, ErrorBuilder, ErrorType, RobogoError};
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Message fragments that mark a failure as transient
const TRANSIENT_PATTERNS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection closed",
    "broken pipe",
    "timeout",
    "timed out",
    "deadline exceeded",
    "temporary failure",
    "temporarily unavailable",
    "service unavailable",
    "rate limit",
    "too many requests",
    "try again",
    "network is unreachable",
    "unexpected eof",
    "502",
    "503",
    "504",
];

/// True if the message looks like a transient failure
pub fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Custom retry decision consulted before the error metadata
pub trait RetryClassifier: Send + Sync + fmt::Debug {
    /// `Some(decision)` overrides the default classification, `None` defers
    fn classify(&self, error: &(dyn Error + Send + Sync + 'static)) -> Option<bool>;
}

/// Restricts retries to the configured failure classes
#[derive(Debug, Clone)]
pub struct ConditionClassifier {
    conditions: Vec<RetryCondition>,
}

impl ConditionClassifier {
    pub fn new(conditions: Vec<RetryCondition>) -> Self {
        Self { conditions }
    }
}

impl RetryClassifier for ConditionClassifier {
    fn classify(&self, error: &(dyn Error + Send + Sync + 'static)) -> Option<bool> {
        let typed = error.downcast_ref::<RobogoError>();
        let error_type = typed.map(RobogoError::error_type);
        if matches!(
            error_type,
            Some(ErrorType::Validation | ErrorType::Security | ErrorType::Assertion)
        ) {
            return Some(false);
        }
        let message = error.to_string();
        Some(self.conditions.iter().any(|c| c.matches(error_type, &message)))
    }
}

/// Resolved retry behavior for one executor
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: BackoffStrategy,
    pub max_delay: Duration,
    pub jitter: bool,
    /// Log delay and error with every attempt
    pub verbose: bool,
    classifier: Option<Arc<dyn RetryClassifier>>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        let classifier: Option<Arc<dyn RetryClassifier>> = if config.has_condition_filter() {
            Some(Arc::new(ConditionClassifier::new(config.conditions.clone())))
        } else {
            None
        };
        Self {
            max_attempts: config.attempts.max(1),
            base_delay: config.delay,
            backoff: config.backoff,
            max_delay: config.max_delay,
            jitter: config.jitter,
            verbose: false,
            classifier,
        }
    }
}

impl RetryPolicy {
    pub fn with_classifier(mut self, classifier: Arc<dyn RetryClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        calculate_delay(
            self.base_delay,
            attempt,
            self.backoff,
            self.max_delay,
            self.jitter,
        )
    }
}

/// Bookkeeping for a single `execute` call
#[derive(Debug, Clone)]
pub struct RetryContext {
    pub attempt: u32,
    pub started: Instant,
    pub last_error: Option<String>,
}

impl RetryContext {
    fn new() -> Self {
        Self {
            attempt: 0,
            started: Instant::now(),
            last_error: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Outcome statistics of one retried operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryMetrics {
    pub attempts: u32,
    pub retries: u32,
    pub total_delay: Duration,
    pub elapsed: Duration,
    pub succeeded: bool,
}

impl fmt::Display for RetryMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = if self.succeeded { "succeeded" } else { "failed" };
        write!(
            f,
            "{} after {} attempt(s), {} retries, total delay {:?}, elapsed {:?}",
            outcome, self.attempts, self.retries, self.total_delay, self.elapsed
        )
    }
}

/// Drives repeated invocation of an operation
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    name: String,
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(name: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
        }
    }

    pub fn from_config(name: impl Into<String>, config: &RetryConfig) -> Self {
        Self::new(name, RetryPolicy::from(config))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails terminally or attempts run out
    pub async fn execute<F, Fut, T, E>(
        &self,
        ctx: &ExecutionContext,
        operation: F,
    ) -> Result<T, RobogoError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        self.execute_with_metrics(ctx, operation).await.0
    }

    /// Like [`RetryExecutor::execute`], also returning attempt statistics
    pub async fn execute_with_metrics<F, Fut, T, E>(
        &self,
        ctx: &ExecutionContext,
        mut operation: F,
    ) -> (Result<T, RobogoError>, RetryMetrics)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        let mut state = RetryContext::new();
        let mut metrics = RetryMetrics::default();

        let result = loop {
            if ctx.is_done() {
                break Err(ctx.ended(&self.name).with_detail("attempts", state.attempt));
            }

            state.attempt += 1;
            let err: BoxError = match operation().await {
                Ok(value) => {
                    metrics.succeeded = true;
                    break Ok(value);
                }
                Err(e) => e.into(),
            };
            state.last_error = Some(err.to_string());

            if !self.is_retryable(err.as_ref()) {
                debug!("{}: error is not retryable: {}", self.name, err);
                break Err(wrap_error(
                    err,
                    ErrorType::Execution,
                    format!("{} failed on attempt {}", self.name, state.attempt),
                    None,
                )
                .with_detail("attempts", state.attempt));
            }
            if state.attempt >= self.policy.max_attempts {
                break Err(self.exhausted(err, &state));
            }
            if ctx.is_done() {
                break Err(ctx.ended(&self.name).with_detail("attempts", state.attempt));
            }

            let delay = self.policy.delay_for(state.attempt);
            if self.policy.verbose {
                warn!(
                    "Attempt {}/{} of {} failed, retrying in {:?}: {}",
                    state.attempt, self.policy.max_attempts, self.name, delay, err
                );
            } else {
                warn!(
                    "Attempt {}/{} of {} failed",
                    state.attempt, self.policy.max_attempts, self.name
                );
            }

            if let Err(cancelled) = ctx.sleep(delay, &self.name).await {
                break Err(cancelled.with_detail("attempts", state.attempt));
            }
            metrics.retries += 1;
            metrics.total_delay += delay;
        };

        metrics.attempts = state.attempt;
        metrics.elapsed = state.elapsed();
        if metrics.attempts > 1 {
            info!("{}: {}", self.name, metrics);
        }
        (result, metrics)
    }

    fn is_retryable(&self, err: &(dyn Error + Send + Sync + 'static)) -> bool {
        if let Some(decision) = self
            .policy
            .classifier
            .as_ref()
            .and_then(|c| c.classify(err))
        {
            return decision;
        }
        if let Some(typed) = err.downcast_ref::<RobogoError>() {
            return typed.is_retryable();
        }
        is_transient_message(&err.to_string())
    }

    fn exhausted(&self, err: BoxError, state: &RetryContext) -> RobogoError {
        let elapsed = state.elapsed();
        ErrorBuilder::new(
            ErrorType::Execution,
            format!(
                "{} failed after {} attempt(s): {}",
                self.name, state.attempt, err
            ),
        )
        .shared_cause(Arc::from(err))
        .retryable(false)
        .detail("attempts", state.attempt)
        .detail("elapsed_ms", elapsed.as_millis() as u64)
        .build()
    }
}
