//! Test case and suite runner
//!
//! Steps are partitioned into groups by the dependency analyzer. Groups run in
//! order; the steps of a parallel group run concurrently under a semaphore and
//! their results are reported in declaration order. Control-flow bodies
//! (`if`, `for`, `while`) always run sequentially.

use super::circuit_breaker::{BreakerRegistry, CircuitMetrics};
use super::condition;
use super::context::ExecutionContext;
use super::dependency::{group_steps, StepGroup};
use super::result::{StepResult, TestResult, TestSuiteResult};
use super::step_runner::StepRunner;
use super::variables::{render, Variables};
use crate::actions::ActionRegistry;
use crate::config::{ConditionalBlock, LoopBlock, ParallelConfig, RunnerConfig, Step, TestCase, TestSuite};
use crate::error::{ErrorBuilder, ErrorType, Result, RobogoError};
use chrono::Utc;
use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

const ITERATION_VAR: &str = "iteration";
const ITEM_VAR: &str = "item";

/// Results of a step list and whether it stopped early
#[derive(Debug, Default)]
pub struct StepsOutcome {
    pub results: Vec<StepResult>,
    /// A step failed without `continue_on_failure`, or the context ended
    pub halted: bool,
    pub cancelled: bool,
}

/// Executes test cases and suites
#[derive(Debug, Clone)]
pub struct TestRunner {
    steps: StepRunner,
}

impl TestRunner {
    pub fn new(registry: Arc<ActionRegistry>, config: RunnerConfig) -> Self {
        Self {
            steps: StepRunner::new(registry, Arc::new(BreakerRegistry::new()), Arc::new(config)),
        }
    }

    /// Runner over the built-in actions
    pub fn with_builtins(config: RunnerConfig) -> Self {
        Self::new(Arc::new(ActionRegistry::with_builtins()), config)
    }

    pub fn config(&self) -> &RunnerConfig {
        self.steps.config()
    }

    /// Current metrics of every circuit breaker used so far
    pub fn breaker_metrics(&self) -> Vec<CircuitMetrics> {
        self.steps.breakers().snapshot()
    }

    /// Run a test case with the runner's parallel settings as default
    pub async fn run_test_case(&self, ctx: &ExecutionContext, case: &TestCase) -> TestResult {
        self.run_case_with(ctx, case, &self.config().parallel).await
    }

    async fn run_case_with(
        &self,
        ctx: &ExecutionContext,
        case: &TestCase,
        default_parallel: &ParallelConfig,
    ) -> TestResult {
        let started_at = Utc::now();
        let started = Instant::now();
        info!("Running test case '{}'", case.name);

        let mut vars = match Variables::from_config(&case.variables) {
            Ok(vars) => vars,
            Err(err) => {
                let err = err.with_test_case(&case.name);
                err.log();
                return TestResult::new(
                    &case.name,
                    started_at,
                    started.elapsed(),
                    Vec::new(),
                    Vec::new(),
                    Vec::new(),
                    Some(err.to_string()),
                );
            }
        };
        let parallel = case.parallel.as_ref().unwrap_or(default_parallel);

        let setup = self.run_steps(ctx, &case.setup, &mut vars, None).await;
        let mut error = None;
        let steps = if setup.halted {
            warn!("Setup of '{}' failed, skipping its steps", case.name);
            error = Some(if setup.cancelled {
                ctx.ended(&case.name).to_string()
            } else {
                "setup failed, steps were not run".to_string()
            });
            StepsOutcome::default()
        } else {
            self.run_steps(ctx, &case.steps, &mut vars, Some(parallel)).await
        };
        if steps.cancelled {
            error = Some(ctx.ended(&case.name).to_string());
        }

        // teardown runs even after cancellation, bounded only by step timeouts
        let teardown_ctx = if ctx.is_done() {
            ExecutionContext::new()
        } else {
            ctx.clone()
        };
        let teardown = self.run_steps(&teardown_ctx, &case.teardown, &mut vars, None).await;

        let result = TestResult::new(
            &case.name,
            started_at,
            started.elapsed(),
            setup.results,
            steps.results,
            teardown.results,
            error,
        );
        info!(
            "Test case '{}' {}: {} passed, {} failed, {} skipped in {:?}",
            result.name,
            result.status,
            result.counters.passed,
            result.counters.failed,
            result.counters.skipped,
            result.duration
        );
        result
    }

    /// Run the resolved test cases of a suite
    ///
    /// With `fail_fast`, the first failing test case cancels the others; test
    /// cases that never started are reported as not run.
    pub async fn run_suite(
        &self,
        ctx: &ExecutionContext,
        suite: &TestSuite,
        cases: &[TestCase],
    ) -> TestSuiteResult {
        let started = Instant::now();
        let parallel = suite.parallel.as_ref().unwrap_or(&self.config().parallel);
        let suite_ctx = ctx.child();
        let stop = AtomicBool::new(false);
        info!("Running suite '{}' with {} test case(s)", suite.name, cases.len());

        let results = if parallel.test_cases_enabled() && cases.len() > 1 {
            let semaphore = Arc::new(Semaphore::new(parallel.max_concurrency.max(1)));
            let futures = cases.iter().map(|case| {
                let semaphore = semaphore.clone();
                let suite_ctx = &suite_ctx;
                let stop = &stop;
                async move {
                    let _permit = semaphore.acquire().await;
                    self.run_suite_case(suite_ctx, suite, case, parallel, stop).await
                }
            });
            join_all(futures).await
        } else {
            let mut results = Vec::with_capacity(cases.len());
            for case in cases {
                results.push(self.run_suite_case(&suite_ctx, suite, case, parallel, &stop).await);
            }
            results
        };

        let result = TestSuiteResult::new(&suite.name, started.elapsed(), results);
        info!(
            "Suite '{}': {} passed, {} failed, {} skipped",
            result.name, result.counters.passed, result.counters.failed, result.counters.skipped
        );
        result
    }

    async fn run_suite_case(
        &self,
        suite_ctx: &ExecutionContext,
        suite: &TestSuite,
        case: &TestCase,
        parallel: &ParallelConfig,
        stop: &AtomicBool,
    ) -> TestResult {
        if stop.load(Ordering::SeqCst) {
            return TestResult::not_run(&case.name, "not run: an earlier test case failed (fail_fast)");
        }
        if suite_ctx.is_done() {
            return TestResult::not_run(&case.name, suite_ctx.ended(&case.name).to_string());
        }
        let result = self.run_case_with(suite_ctx, case, parallel).await;
        if !result.is_success() && suite.fail_fast {
            warn!("Test case '{}' failed, stopping suite '{}'", case.name, suite.name);
            stop.store(true, Ordering::SeqCst);
            suite_ctx.cancel();
        }
        result
    }

    /// Run a list of steps, grouping independent ones when `parallel` allows
    pub fn run_steps<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
        steps: &'a [Step],
        vars: &'a mut Variables,
        parallel: Option<&'a ParallelConfig>,
    ) -> BoxFuture<'a, StepsOutcome> {
        async move {
            let mut outcome = StepsOutcome::default();
            let groups = match parallel {
                Some(config) if config.steps_enabled() => group_steps(steps, config),
                _ => (0..steps.len()).map(StepGroup::sequential).collect(),
            };

            for group in groups {
                if ctx.is_done() {
                    warn!("Context ended, {} step(s) not run", steps.len() - outcome.results.len());
                    outcome.halted = true;
                    outcome.cancelled = true;
                    break;
                }

                let results = if group.parallel {
                    let max = parallel.map_or(1, |p| p.max_concurrency.max(1));
                    self.run_parallel_group(ctx, steps, &group.indices, vars, max).await
                } else {
                    let mut results = Vec::with_capacity(group.len());
                    for &index in &group.indices {
                        results.push(self.run_step(ctx, &steps[index], vars).await);
                    }
                    results
                };

                for (result, &index) in results.into_iter().zip(&group.indices) {
                    if result.is_failed() && !steps[index].continue_on_failure {
                        error!("Step '{}' failed, halting remaining steps", result.name);
                        outcome.halted = true;
                    }
                    outcome.results.push(result);
                }
                if outcome.halted {
                    break;
                }
            }
            outcome
        }
        .boxed()
    }

    async fn run_parallel_group(
        &self,
        ctx: &ExecutionContext,
        steps: &[Step],
        indices: &[usize],
        vars: &Variables,
        max_concurrency: usize,
    ) -> Vec<StepResult> {
        debug!("Running {} steps concurrently (max {})", indices.len(), max_concurrency);
        let semaphore = Arc::new(Semaphore::new(max_concurrency));
        let futures = indices.iter().map(|&index| {
            let semaphore = semaphore.clone();
            let step = &steps[index];
            async move {
                let _permit = semaphore.acquire().await;
                self.steps.run_action_step(ctx, step, vars).await.result
            }
        });
        join_all(futures).await
    }

    /// Run one step of any kind, binding its `result` variable
    fn run_step<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
        step: &'a Step,
        vars: &'a mut Variables,
    ) -> BoxFuture<'a, StepResult> {
        async move {
            if !step.has_control_flow() {
                let outcome = self.steps.run_action_step(ctx, step, vars).await;
                if !step.result.is_empty() {
                    if let Some(output) = outcome.output {
                        debug!("Binding '{}' from step '{}'", step.result, step.name);
                        vars.set(&step.result, output);
                    }
                }
                return outcome.result;
            }

            let started = Instant::now();
            let kind = control_flow_kind(step);
            match self.steps.skip_reason(step, vars) {
                Ok(Some(reason)) => return StepResult::skipped(&step.name, kind, reason),
                Ok(None) => {}
                Err(err) => return self.steps.failed(step, vars, started.elapsed(), err),
            }

            let body = if let Some(block) = &step.if_block {
                self.run_if(ctx, step, block, vars).await
            } else if let Some(block) = &step.for_block {
                self.run_for(ctx, block, vars).await
            } else if let Some(block) = &step.while_block {
                self.run_while(ctx, block, vars).await
            } else {
                Ok(ControlFlowOutcome::default())
            };

            match body {
                Ok(body) => body.into_result(self, step, kind, vars, started.elapsed()),
                Err(err) => self.steps.failed(step, vars, started.elapsed(), err),
            }
        }
        .boxed()
    }

    async fn run_if(
        &self,
        ctx: &ExecutionContext,
        step: &Step,
        block: &ConditionalBlock,
        vars: &mut Variables,
    ) -> Result<ControlFlowOutcome> {
        let substituted = vars.substitute(&block.condition);
        let taken = condition::evaluate(&substituted)?;
        debug!("Step '{}': condition '{}' is {}", step.name, vars.mask(&substituted), taken);
        let branch = if taken { &block.then } else { &block.else_steps };
        let body = self.run_steps(ctx, branch, vars, None).await;
        Ok(ControlFlowOutcome {
            children: body.results,
            iterations: None,
            warnings: Vec::new(),
        })
    }

    async fn run_for(
        &self,
        ctx: &ExecutionContext,
        block: &LoopBlock,
        vars: &mut Variables,
    ) -> Result<ControlFlowOutcome> {
        let cap = block.max_iterations as usize;
        let LoopItems { items, total } = loop_items(&block.condition, vars, cap)?;
        let mut warnings = Vec::new();
        if total > cap as u128 {
            let warning = format!(
                "for loop truncated to max_iterations {} (of {} items)",
                cap, total
            );
            warn!("{}", warning);
            warnings.push(warning);
        }

        let saved = LoopScope::save(vars);
        let mut children = Vec::new();
        let mut iterations = 0;
        for (index, item) in items.into_iter().enumerate() {
            iterations = index + 1;
            vars.set(ITERATION_VAR, iterations);
            vars.set(ITEM_VAR, item);
            let body = self.run_steps(ctx, &block.steps, vars, None).await;
            children.extend(label_iteration(body.results, iterations));
            if body.halted {
                break;
            }
        }
        saved.restore(vars);

        Ok(ControlFlowOutcome {
            children,
            iterations: Some(iterations),
            warnings,
        })
    }

    async fn run_while(
        &self,
        ctx: &ExecutionContext,
        block: &LoopBlock,
        vars: &mut Variables,
    ) -> Result<ControlFlowOutcome> {
        let saved = LoopScope::save(vars);
        let mut children = Vec::new();
        let mut warnings = Vec::new();
        let mut iterations = 0usize;

        loop {
            let substituted = vars.substitute(&block.condition);
            if !condition::evaluate(&substituted)? {
                break;
            }
            if iterations >= block.max_iterations as usize {
                let warning = format!(
                    "while loop stopped at max_iterations {} with condition still true",
                    block.max_iterations
                );
                warn!("{}", warning);
                warnings.push(warning);
                break;
            }
            iterations += 1;
            vars.set(ITERATION_VAR, iterations);
            let body = self.run_steps(ctx, &block.steps, vars, None).await;
            children.extend(label_iteration(body.results, iterations));
            if body.halted {
                break;
            }
        }
        saved.restore(vars);

        Ok(ControlFlowOutcome {
            children,
            iterations: Some(iterations),
            warnings,
        })
    }
}

#[derive(Debug, Default)]
struct ControlFlowOutcome {
    children: Vec<StepResult>,
    iterations: Option<usize>,
    warnings: Vec<String>,
}

impl ControlFlowOutcome {
    fn into_result(
        self,
        runner: &TestRunner,
        step: &Step,
        kind: &str,
        vars: &Variables,
        duration: Duration,
    ) -> StepResult {
        let failed: Vec<&StepResult> = self.children.iter().filter(|c| c.is_failed()).collect();
        let mut result = if failed.is_empty() {
            StepResult::passed(&step.name, kind, duration, None)
        } else {
            let first = failed[0];
            let mut builder = ErrorBuilder::new(
                first.error_type.unwrap_or(ErrorType::Execution),
                format!("{} nested step(s) failed, first: {}", failed.len(), first.name),
            )
            .action(kind)
            .retryable(false)
            .without_stack();
            if let Some(cause) = &first.failure {
                builder = builder.cause(cause.clone());
            }
            runner.steps.failed(step, vars, duration, builder.build())
        };
        if let Some(iterations) = self.iterations {
            result = result.with_metadata("iterations", iterations as u64);
        }
        result.with_warnings(self.warnings).with_children(self.children)
    }
}

/// Previous values of the loop variables, restored when a loop ends
struct LoopScope {
    iteration: Option<Value>,
    item: Option<Value>,
}

impl LoopScope {
    fn save(vars: &Variables) -> Self {
        Self {
            iteration: vars.get(ITERATION_VAR).cloned(),
            item: vars.get(ITEM_VAR).cloned(),
        }
    }

    fn restore(self, vars: &mut Variables) {
        for (name, value) in [(ITERATION_VAR, self.iteration), (ITEM_VAR, self.item)] {
            match value {
                Some(value) => vars.set(name, value),
                None => {
                    vars.remove(name);
                }
            }
        }
    }
}

fn control_flow_kind(step: &Step) -> &'static str {
    if step.if_block.is_some() {
        "if"
    } else if step.for_block.is_some() {
        "for"
    } else {
        "while"
    }
}

fn label_iteration(results: Vec<StepResult>, iteration: usize) -> Vec<StepResult> {
    results
        .into_iter()
        .map(|mut r| {
            r.name = format!("{} [{}]", r.name, iteration);
            r
        })
        .collect()
}

/// Leading items of a `for` loop and how many the condition declares
#[derive(Debug)]
struct LoopItems {
    items: Vec<Value>,
    total: u128,
}

impl LoopItems {
    fn listed(mut items: Vec<Value>, cap: usize) -> Self {
        let total = items.len() as u128;
        items.truncate(cap);
        Self { items, total }
    }

    fn counted(count: u64, cap: usize) -> Self {
        Self {
            items: (1..=count).take(cap).map(Value::from).collect(),
            total: u128::from(count),
        }
    }
}

/// Items of a `for` loop: an inclusive range `a..b`, a list `[x, y]`, a count,
/// or a variable holding an array
///
/// At most `cap` items are materialized.
fn loop_items(condition: &str, vars: &Variables, cap: usize) -> Result<LoopItems> {
    let resolved = vars.substitute_value(&Value::String(condition.to_string()));
    let text = match resolved {
        Value::Array(items) => return Ok(LoopItems::listed(items, cap)),
        Value::Number(n) => {
            let count = n.as_u64().ok_or_else(|| invalid_loop(condition))?;
            return Ok(LoopItems::counted(count, cap));
        }
        other => render(&other),
    };
    let text = text.trim();

    if let Some((start, end)) = text.split_once("..") {
        let start: i64 = start.trim().parse().map_err(|_| invalid_loop(condition))?;
        let end: i64 = end.trim().parse().map_err(|_| invalid_loop(condition))?;
        let total = if end < start {
            0
        } else {
            (i128::from(end) - i128::from(start) + 1) as u128
        };
        return Ok(LoopItems {
            items: (start..=end).take(cap).map(Value::from).collect(),
            total,
        });
    }
    if text.starts_with('[') {
        let items: Vec<Value> = serde_yaml::from_str(text).map_err(|e| {
            RobogoError::builder(ErrorType::Validation, format!("invalid for list '{}'", condition))
                .cause(e)
                .build()
        })?;
        return Ok(LoopItems::listed(items, cap));
    }
    let count: u64 = text.parse().map_err(|_| invalid_loop(condition))?;
    Ok(LoopItems::counted(count, cap))
}

fn invalid_loop(condition: &str) -> RobogoError {
    RobogoError::validation(format!(
        "invalid for condition '{}': expected a range (1..5), a list ([a, b]), a count or an array variable",
        condition
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CircuitBreakerConfig, RecoveryConfig, RecoveryStrategy, SkipCondition};
    use crate::execution::result::StepStatus;
    use serde_json::json;

    fn runner() -> TestRunner {
        TestRunner::with_builtins(RunnerConfig::default())
    }

    fn case(steps: Vec<Step>) -> TestCase {
        TestCase {
            name: "case".into(),
            steps,
            ..Default::default()
        }
    }

    #[test]
    fn test_loop_items_forms() {
        let mut vars = Variables::new();
        vars.set("users", json!(["ann", "bob"]));
        let items = |condition: &str| loop_items(condition, &vars, 100).unwrap().items;
        assert_eq!(items("1..3"), vec![json!(1), json!(2), json!(3)]);
        assert_eq!(items("[a, b]"), vec![json!("a"), json!("b")]);
        assert_eq!(items("2"), vec![json!(1), json!(2)]);
        assert_eq!(items("${users}"), vec![json!("ann"), json!("bob")]);
        assert!(items("5..1").is_empty());
        assert!(loop_items("forever", &vars, 100).is_err());
    }

    #[test]
    fn test_loop_items_only_materializes_cap() {
        let vars = Variables::new();
        let huge = loop_items("1..10000000000", &vars, 5).unwrap();
        assert_eq!(huge.items.len(), 5);
        assert_eq!(huge.items[4], json!(5));
        assert_eq!(huge.total, 10_000_000_000);

        let count = loop_items("18446744073709551615", &vars, 3).unwrap();
        assert_eq!(count.items, vec![json!(1), json!(2), json!(3)]);
        assert_eq!(count.total, u128::from(u64::MAX));

        let span = loop_items("-9223372036854775808..9223372036854775807", &vars, 2).unwrap();
        assert_eq!(span.total, 1u128 << 64);
    }

    #[tokio::test]
    async fn test_huge_for_range_runs_max_iterations() {
        let step = Step {
            for_block: Some(LoopBlock {
                condition: "1..10000000000".into(),
                steps: vec![Step::new("tick", "log").with_args(["${iteration}"])],
                max_iterations: 5,
            }),
            ..Step::new("many", "")
        };
        let result = runner()
            .run_step(&ExecutionContext::new(), &step, &mut Variables::new())
            .await;
        assert_eq!(result.status, StepStatus::Passed);
        assert_eq!(result.children.len(), 5);
        assert_eq!(
            result.warnings,
            vec!["for loop truncated to max_iterations 5 (of 10000000000 items)"]
        );
    }

    #[tokio::test]
    async fn test_result_binding_flows_to_later_steps() {
        let steps = vec![
            Step::new("make", "concat").with_args(["a", "b"]).with_result("joined"),
            Step::new("use", "assert").with_args(["${joined} == ab"]),
        ];
        let result = runner().run_test_case(&ExecutionContext::new(), &case(steps)).await;
        assert!(result.is_success(), "{:?}", result);
        assert_eq!(result.counters.passed, 2);
    }

    #[tokio::test]
    async fn test_failure_halts_remaining_steps() {
        let steps = vec![
            Step::new("boom", "fail").with_args(["nope"]),
            Step::new("never", "log").with_args(["unreachable"]),
        ];
        let result = runner().run_test_case(&ExecutionContext::new(), &case(steps)).await;
        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_continue_on_failure() {
        let steps = vec![
            Step {
                continue_on_failure: true,
                ..Step::new("boom", "fail")
            },
            Step::new("after", "log").with_args(["still here"]),
        ];
        let result = runner().run_test_case(&ExecutionContext::new(), &case(steps)).await;
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.counters.failed, 1);
        assert_eq!(result.counters.passed, 1);
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_if_else_branches() {
        let step = Step {
            if_block: Some(ConditionalBlock {
                condition: "${n} > 5".into(),
                then: vec![Step::new("big", "concat").with_args(["big"]).with_result("size")],
                else_steps: vec![Step::new("small", "concat").with_args(["small"]).with_result("size")],
            }),
            ..Step::new("classify", "")
        };
        let mut vars = Variables::new();
        vars.set("n", 2);
        let runner = runner();
        let result = runner.run_step(&ExecutionContext::new(), &step, &mut vars).await;
        assert_eq!(result.status, StepStatus::Passed);
        assert_eq!(result.children.len(), 1);
        assert_eq!(vars.get("size"), Some(&json!("small")));
    }

    #[tokio::test]
    async fn test_for_loop_binds_item_and_restores_scope() {
        let step = Step {
            for_block: Some(LoopBlock {
                condition: "[x, y, z]".into(),
                steps: vec![Step::new("each", "concat").with_args(["${acc:-}", "${item}"]).with_result("acc")],
                max_iterations: 2,
            }),
            ..Step::new("loop", "")
        };
        let mut vars = Variables::new();
        let result = runner().run_step(&ExecutionContext::new(), &step, &mut vars).await;
        assert_eq!(result.status, StepStatus::Passed);
        assert_eq!(result.metadata["iterations"], json!(2));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(vars.get("acc"), Some(&json!("xy")));
        assert!(vars.get(ITEM_VAR).is_none());
        assert_eq!(result.children[1].name, "each [2]");
    }

    #[tokio::test]
    async fn test_while_loop_stops_at_cap() {
        let step = Step {
            while_block: Some(LoopBlock {
                condition: "true".into(),
                steps: vec![Step::new("tick", "log").with_args(["${iteration}"])],
                max_iterations: 3,
            }),
            ..Step::new("spin", "")
        };
        let result = runner()
            .run_step(&ExecutionContext::new(), &step, &mut Variables::new())
            .await;
        assert_eq!(result.status, StepStatus::Passed);
        assert_eq!(result.children.len(), 3);
        assert!(result.warnings[0].contains("max_iterations"));
    }

    #[tokio::test]
    async fn test_nested_failure_fails_loop() {
        let step = Step {
            for_block: Some(LoopBlock {
                condition: "1..3".into(),
                steps: vec![Step {
                    skip: Some(SkipCondition::Expression("${iteration} != 2".into())),
                    ..Step::new("second fails", "fail").with_args(["bad"])
                }],
                max_iterations: 10,
            }),
            ..Step::new("loop", "")
        };
        let result = runner()
            .run_step(&ExecutionContext::new(), &step, &mut Variables::new())
            .await;
        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.metadata["iterations"], json!(2));
        assert_eq!(result.children.len(), 2);
    }

    #[tokio::test]
    async fn test_setup_failure_skips_steps_but_runs_teardown() {
        let case = TestCase {
            name: "guarded".into(),
            setup: vec![Step::new("prepare", "fail")],
            steps: vec![Step::new("main", "log")],
            teardown: vec![Step::new("cleanup", "log").with_args(["bye"])],
            ..Default::default()
        };
        let result = runner().run_test_case(&ExecutionContext::new(), &case).await;
        assert_eq!(result.status, StepStatus::Failed);
        assert!(result.steps.is_empty());
        assert_eq!(result.teardown.len(), 1);
        assert!(result.error.unwrap().contains("setup failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_group_keeps_declaration_order() {
        let steps = vec![
            Step::new("slow", "sleep").with_args(["200ms"]),
            Step::new("fast", "sleep").with_args(["10ms"]),
        ];
        let runner = TestRunner::with_builtins(
            RunnerConfig::default().with_parallel(ParallelConfig::enabled_with(4)),
        );
        let started = tokio::time::Instant::now();
        let result = runner.run_test_case(&ExecutionContext::new(), &case(steps)).await;
        assert!(result.is_success());
        assert_eq!(result.steps[0].name, "slow");
        assert_eq!(result.steps[1].name, "fast");
        assert!(started.elapsed() < Duration::from_millis(300));
    }

    fn sleepers(count: usize) -> Vec<Step> {
        (0..count)
            .map(|i| Step::new(format!("nap {}", i), "sleep").with_args(["100ms"]))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_concurrency_limits_parallel_group() {
        let serial = TestRunner::with_builtins(
            RunnerConfig::default().with_parallel(ParallelConfig::enabled_with(1)),
        );
        let started = tokio::time::Instant::now();
        let result = serial.run_test_case(&ExecutionContext::new(), &case(sleepers(3))).await;
        assert!(result.is_success());
        assert!(started.elapsed() >= Duration::from_millis(300));

        let wide = TestRunner::with_builtins(
            RunnerConfig::default().with_parallel(ParallelConfig::enabled_with(3)),
        );
        let started = tokio::time::Instant::now();
        let result = wide.run_test_case(&ExecutionContext::new(), &case(sleepers(3))).await;
        assert!(result.is_success());
        assert!(started.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_steps_share_one_breaker() {
        let steps = sleepers(4)
            .into_iter()
            .map(|step| Step {
                recovery: Some(RecoveryConfig {
                    strategy: RecoveryStrategy::Circuit,
                    circuit_breaker: Some(CircuitBreakerConfig::default()),
                    ..Default::default()
                }),
                ..step
            })
            .collect();
        let runner = TestRunner::with_builtins(
            RunnerConfig::default().with_parallel(ParallelConfig::enabled_with(4)),
        );
        let started = tokio::time::Instant::now();
        let result = runner.run_test_case(&ExecutionContext::new(), &case(steps)).await;
        assert!(result.is_success(), "{:?}", result);
        assert!(started.elapsed() < Duration::from_millis(200));

        let breakers = runner.breaker_metrics();
        assert_eq!(breakers.len(), 1);
        assert_eq!(breakers[0].name, "sleep");
        assert_eq!(breakers[0].total_requests, 4);
        assert_eq!(breakers[0].rejected_requests, 0);
        assert!(!breakers[0].config_conflict);
    }

    #[tokio::test]
    async fn test_cancelled_context_stops_steps() {
        let ctx = ExecutionContext::new();
        ctx.cancel();
        let result = runner()
            .run_test_case(&ctx, &case(vec![Step::new("a", "log")]))
            .await;
        assert!(result.steps.is_empty());
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_suite_fail_fast() {
        let suite = TestSuite {
            name: "suite".into(),
            fail_fast: true,
            ..Default::default()
        };
        let failing = TestCase {
            name: "first".into(),
            steps: vec![Step::new("boom", "fail")],
            ..Default::default()
        };
        let passing = TestCase {
            name: "second".into(),
            steps: vec![Step::new("ok", "log")],
            ..Default::default()
        };
        let result = runner()
            .run_suite(&ExecutionContext::new(), &suite, &[failing, passing])
            .await;
        assert_eq!(result.counters.failed, 1);
        assert_eq!(result.counters.skipped, 1);
        assert!(!result.is_success());
        assert!(result.results[1].error.as_ref().unwrap().contains("fail_fast"));
    }
}
