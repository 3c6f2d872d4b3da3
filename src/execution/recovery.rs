//! Recovery strategy dispatch around a single action invocation

use super::circuit_breaker::BreakerRegistry;
use super::context::ExecutionContext;
use super::retry::{RetryExecutor, RetryMetrics, RetryPolicy};
use crate::config::{RecoveryConfig, RecoveryStrategy, RetryConfig};
use crate::error::{RobogoError, Result};
use std::future::{Future, Ready};
use tracing::{debug, warn};

/// How a recovered invocation produced its outcome
#[derive(Debug, Clone)]
pub enum Recovered<T> {
    /// The operation itself succeeded
    Value(T),
    /// The operation failed and the fallback succeeded
    Fallback { value: T, original: RobogoError },
    /// The operation failed and the error was swallowed
    Skipped(RobogoError),
}

impl<T> Recovered<T> {
    /// The produced value, if any
    pub fn into_value(self) -> Option<T> {
        match self {
            Recovered::Value(value) | Recovered::Fallback { value, .. } => Some(value),
            Recovered::Skipped(_) => None,
        }
    }
}

/// Applies a step's [`RecoveryConfig`] to an operation
pub struct RecoveryExecutor<'a> {
    name: &'a str,
    config: &'a RecoveryConfig,
    breakers: &'a BreakerRegistry,
    verbose_retry: bool,
}

impl<'a> RecoveryExecutor<'a> {
    /// `name` identifies the protected operation; circuit breakers are shared
    /// per name through `breakers`
    pub fn new(name: &'a str, config: &'a RecoveryConfig, breakers: &'a BreakerRegistry) -> Self {
        Self {
            name,
            config,
            breakers,
            verbose_retry: false,
        }
    }

    pub fn with_verbose_retry(mut self, verbose: bool) -> Self {
        self.verbose_retry = verbose;
        self
    }

    pub async fn execute<F, Fut, T>(
        &self,
        ctx: &ExecutionContext,
        operation: F,
    ) -> (Result<Recovered<T>>, Option<RetryMetrics>)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with_fallback(ctx, operation, None::<fn() -> Ready<Result<T>>>)
            .await
    }

    /// Dispatch on the configured strategy
    ///
    /// Retry metrics are returned when the `retry` strategy ran.
    pub async fn execute_with_fallback<F, Fut, G, GFut, T>(
        &self,
        ctx: &ExecutionContext,
        mut operation: F,
        fallback: Option<G>,
    ) -> (Result<Recovered<T>>, Option<RetryMetrics>)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<T>>,
    {
        debug!(
            "Executing '{}' with recovery strategy {:?}",
            self.name, self.config.strategy
        );

        match self.config.strategy {
            RecoveryStrategy::None | RecoveryStrategy::Unknown => {
                (operation().await.map(Recovered::Value), None)
            }
            RecoveryStrategy::Fallback => {
                let result = match operation().await {
                    Ok(value) => Ok(Recovered::Value(value)),
                    Err(original) => self.run_fallback(original, fallback).await,
                };
                (result, None)
            }
            RecoveryStrategy::Skip => {
                let result = match operation().await {
                    Ok(value) => Ok(Recovered::Value(value)),
                    Err(err) if self.config.skip_on_error => {
                        warn!("'{}' failed, skipping as configured: {}", self.name, err);
                        Ok(Recovered::Skipped(err))
                    }
                    Err(err) => Err(err),
                };
                (result, None)
            }
            RecoveryStrategy::Retry => {
                let config = self
                    .config
                    .retry
                    .clone()
                    .unwrap_or_else(RetryConfig::recovery_default);
                let policy = RetryPolicy::from(&config).with_verbose(self.verbose_retry);
                let (result, metrics) = RetryExecutor::new(self.name, policy)
                    .execute_with_metrics(ctx, operation)
                    .await;
                (result.map(Recovered::Value), Some(metrics))
            }
            RecoveryStrategy::Circuit => {
                let config = self.config.circuit_breaker.clone().unwrap_or_default();
                let breaker = self.breakers.get_or_create(self.name, &config);
                let result = breaker.execute(ctx, operation).await;
                (result.map(Recovered::Value), None)
            }
        }
    }

    async fn run_fallback<G, GFut, T>(
        &self,
        original: RobogoError,
        fallback: Option<G>,
    ) -> Result<Recovered<T>>
    where
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<T>>,
    {
        let Some(fallback) = fallback else {
            return Err(original.with_breadcrumb(format!(
                "fallback strategy for '{}' has no fallback action",
                self.name
            )));
        };

        warn!("'{}' failed, running fallback: {}", self.name, original);
        match fallback().await {
            Ok(value) => Ok(Recovered::Fallback { value, original }),
            Err(fallback_err) => Err(fallback_err
                .with_breadcrumb(format!("fallback for '{}' failed", self.name))
                .with_detail("original_error", original.to_string())),
        }
    }
}
