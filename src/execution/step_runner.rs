//! Execution of a single action step
//!
//! Evaluates `skip`, substitutes variables (reporting unresolved ones),
//! applies the step timeout and the recovery or retry policy around the
//! action, checks `expect_error`, and produces a masked [`StepResult`].
//! Variables are only read here; binding `result` is left to the caller.

use super::circuit_breaker::BreakerRegistry;
use super::condition;
use super::context::ExecutionContext;
use super::debugger::{analyze, ResolutionReport};
use super::expect_error::check_expectation;
use super::recovery::{Recovered, RecoveryExecutor};
use super::result::StepResult;
use super::retry::{RetryExecutor, RetryMetrics, RetryPolicy};
use super::variables::Variables;
use crate::actions::ActionRegistry;
use crate::config::{RecoveryConfig, RecoveryStrategy, RetryConfig, RunnerConfig, SkipCondition, Step};
use crate::error::{common, Result, RobogoError};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Output of one step: the user-facing result plus the unmasked value to bind
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub result: StepResult,
    pub output: Option<Value>,
}

impl StepOutcome {
    fn without_output(result: StepResult) -> Self {
        Self {
            result,
            output: None,
        }
    }
}

/// Runs action steps against a registry with shared circuit breakers
#[derive(Debug, Clone)]
pub struct StepRunner {
    registry: Arc<ActionRegistry>,
    breakers: Arc<BreakerRegistry>,
    config: Arc<RunnerConfig>,
}

impl StepRunner {
    pub fn new(
        registry: Arc<ActionRegistry>,
        breakers: Arc<BreakerRegistry>,
        config: Arc<RunnerConfig>,
    ) -> Self {
        Self {
            registry,
            breakers,
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    /// Why the step should be skipped, if it should
    pub fn skip_reason(&self, step: &Step, vars: &Variables) -> Result<Option<String>> {
        match &step.skip {
            None | Some(SkipCondition::Flag(false)) => Ok(None),
            Some(SkipCondition::Flag(true)) => Ok(Some("skip: true".to_string())),
            Some(SkipCondition::Expression(expression)) => {
                let substituted = vars.substitute(expression);
                if condition::evaluate(&substituted)? {
                    Ok(Some(format!("skip condition '{}' is true", vars.mask(&substituted))))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Run a step that invokes an action
    pub async fn run_action_step(
        &self,
        ctx: &ExecutionContext,
        step: &Step,
        vars: &Variables,
    ) -> StepOutcome {
        let started = Instant::now();

        match self.skip_reason(step, vars) {
            Ok(Some(reason)) => {
                info!("Step '{}' skipped: {}", step.name, reason);
                return StepOutcome::without_output(StepResult::skipped(&step.name, &step.action, reason));
            }
            Ok(None) => {}
            Err(err) => {
                let err = err.with_breadcrumb("evaluating skip condition");
                return StepOutcome::without_output(self.failed(step, vars, started.elapsed(), err));
            }
        }

        if !self.registry.contains(&step.action) {
            let err = common::unknown_action(&step.action);
            return StepOutcome::without_output(self.failed(step, vars, started.elapsed(), err));
        }

        let (args, options, report) = substitute_inputs(step, vars);
        report.log(&step.name);
        let warnings = report.warnings();

        debug!("Step '{}': invoking action '{}'", step.name, step.action);
        let (outcome, retry_metrics) = self.invoke_with_policies(ctx, step, &args, &options).await;
        let duration = started.elapsed();

        let mut outcome = self.apply_expectation(step, vars, duration, outcome);
        if let Some(metrics) = retry_metrics {
            outcome.result = with_retry_metadata(outcome.result, &metrics);
        }
        outcome.result = outcome.result.with_warnings(warnings);

        match &outcome.result.failure {
            Some(err) => err.log(),
            None => info!(
                "Step '{}' {} in {:?}",
                step.name, outcome.result.status, outcome.result.duration
            ),
        }
        outcome
    }

    /// Apply the step's retry and recovery policies around the action
    ///
    /// A step `retry` runs inside the recovery strategy, so recovery only sees
    /// the failure once retries are exhausted. With the `retry` strategy the
    /// step's policy becomes the strategy's policy instead of nesting.
    async fn invoke_with_policies(
        &self,
        ctx: &ExecutionContext,
        step: &Step,
        args: &[Value],
        options: &HashMap<String, Value>,
    ) -> (Result<Recovered<Value>>, Option<RetryMetrics>) {
        let timeout = step.timeout.or(self.config.step_timeout);
        let action = step.action.as_str();
        let attempt = move || self.invoke(ctx, action, args, options, timeout);

        let Some(recovery) = &step.recovery else {
            return match &step.retry {
                Some(retry) => {
                    let (result, metrics) = self
                        .retry_executor(step, retry)
                        .execute_with_metrics(ctx, attempt)
                        .await;
                    (result.map(Recovered::Value), Some(metrics))
                }
                None => (attempt().await.map(Recovered::Value), None),
            };
        };

        let (recovery, step_retry): (Cow<'_, RecoveryConfig>, Option<RetryExecutor>) =
            match (&step.retry, recovery.strategy) {
                (Some(retry), RecoveryStrategy::Retry) if recovery.retry.is_none() => (
                    Cow::Owned(RecoveryConfig {
                        retry: Some(retry.clone()),
                        ..recovery.clone()
                    }),
                    None,
                ),
                (Some(_), RecoveryStrategy::Retry) => {
                    warn!(
                        "Step '{}': recovery retry policy takes precedence over the step retry",
                        step.name
                    );
                    (Cow::Borrowed(recovery), None)
                }
                (Some(retry), _) => (Cow::Borrowed(recovery), Some(self.retry_executor(step, retry))),
                (None, _) => (Cow::Borrowed(recovery), None),
            };

        let step_retry = step_retry.as_ref();
        let retry_metrics = Mutex::new(None);
        let metrics_slot = &retry_metrics;
        let operation = move || async move {
            match step_retry {
                Some(executor) => {
                    let (result, metrics) = executor.execute_with_metrics(ctx, attempt).await;
                    *metrics_slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(metrics);
                    result
                }
                None => attempt().await,
            }
        };
        let fallback = recovery
            .fallback_action
            .as_deref()
            .map(|name| move || self.invoke(ctx, name, args, options, timeout));

        let (result, recovery_metrics) = RecoveryExecutor::new(action, &recovery, &self.breakers)
            .with_verbose_retry(self.config.verbose_retry)
            .execute_with_fallback(ctx, operation, fallback)
            .await;
        let step_metrics = retry_metrics
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        (result, recovery_metrics.or(step_metrics))
    }

    fn retry_executor(&self, step: &Step, retry: &RetryConfig) -> RetryExecutor {
        let policy = RetryPolicy::from(retry).with_verbose(self.config.verbose_retry);
        RetryExecutor::new(&step.name, policy)
    }

    /// One invocation of the named action, bounded only by `timeout`
    ///
    /// An ended context prevents the call from starting but never interrupts
    /// a call that is already running.
    async fn invoke(
        &self,
        ctx: &ExecutionContext,
        action_name: &str,
        args: &[Value],
        options: &HashMap<String, Value>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let action = self
            .registry
            .get(action_name)
            .ok_or_else(|| common::unknown_action(action_name))?;
        ctx.check(action_name)?;
        let call = action.execute(ctx, args, options);
        match timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or_else(|_| Err(common::timed_out(action_name, limit))),
            None => call.await,
        }
    }

    fn apply_expectation(
        &self,
        step: &Step,
        vars: &Variables,
        duration: Duration,
        outcome: Result<Recovered<Value>>,
    ) -> StepOutcome {
        let outcome = match (&step.expect_error, outcome) {
            (_, Ok(Recovered::Skipped(err))) => {
                let reason = format!("error skipped by recovery: {}", vars.mask(err.message()));
                return StepOutcome::without_output(
                    StepResult::skipped(&step.name, &step.action, reason)
                        .with_metadata("recovery", "skip"),
                );
            }
            (None, outcome) => outcome,
            (Some(expect), Ok(_)) => Err(check_expectation(expect, None)
                .err()
                .unwrap_or_else(|| RobogoError::assertion("expected an error but the step succeeded"))),
            (Some(expect), Err(err)) => match check_expectation(expect, Some(&err)) {
                Ok(()) => {
                    debug!("Step '{}' failed as expected: {}", step.name, err);
                    let output = Value::String(err.message().to_string());
                    let result = StepResult::passed(&step.name, &step.action, duration, Some(vars.mask_value(&output)))
                        .with_metadata("expected_error", vars.mask(&err.to_string()));
                    return StepOutcome {
                        result,
                        output: Some(output),
                    };
                }
                Err(mismatch) => Err(mismatch),
            },
        };

        match outcome {
            Ok(Recovered::Fallback { value, original }) => {
                warn!("Step '{}' recovered by fallback after: {}", step.name, original);
                let result = StepResult::passed(&step.name, &step.action, duration, Some(vars.mask_value(&value)))
                    .with_metadata("recovery", "fallback")
                    .with_warnings(vec![format!(
                        "recovered by fallback after: {}",
                        vars.mask(original.message())
                    )]);
                StepOutcome {
                    result,
                    output: Some(value),
                }
            }
            Ok(recovered) => {
                let value = recovered.into_value();
                let masked = value.as_ref().map(|v| vars.mask_value(v));
                StepOutcome {
                    result: StepResult::passed(&step.name, &step.action, duration, masked),
                    output: value,
                }
            }
            Err(err) => StepOutcome::without_output(self.failed(step, vars, duration, err)),
        }
    }

    /// Enrich and mask a failure into a failed result
    pub fn failed(&self, step: &Step, vars: &Variables, duration: Duration, err: RobogoError) -> StepResult {
        let err = err
            .with_step(&step.name)
            .with_action_if_absent(&step.action)
            .masked(&vars.masked_values());
        let text = vars.mask(&err.to_string());
        StepResult::failed(&step.name, &step.action, duration, err, text)
    }
}

/// Substitute arguments and options, collecting a resolution report
fn substitute_inputs(step: &Step, vars: &Variables) -> (Vec<Value>, HashMap<String, Value>, ResolutionReport) {
    let args: Vec<Value> = step.args.iter().map(|a| vars.substitute_value(a)).collect();
    let options: HashMap<String, Value> = step
        .options
        .iter()
        .map(|(k, v)| (k.clone(), vars.substitute_value(v)))
        .collect();

    let mut report = analyze(
        &Value::Array(step.args.clone()).to_string(),
        &Value::Array(args.clone()).to_string(),
        vars,
    );
    for (key, original) in &step.options {
        if let Some(substituted) = options.get(key) {
            report.merge(analyze(&original.to_string(), &substituted.to_string(), vars));
        }
    }
    (args, options, report)
}

fn with_retry_metadata(result: StepResult, metrics: &RetryMetrics) -> StepResult {
    result
        .with_metadata("retry_attempts", metrics.attempts)
        .with_metadata("retries", metrics.retries)
        .with_metadata("retry_total_delay_ms", metrics.total_delay.as_millis() as u64)
}
