//! Execution core
//!
//! Dependency analysis and grouping, backoff, retry, circuit breaking and
//! recovery around each action invocation, variable resolution with its
//! debugger, and the runners that drive steps, test cases and suites.

pub mod backoff;
pub mod circuit_breaker;
pub mod condition;
pub mod context;
pub mod debugger;
pub mod dependency;
pub mod expect_error;
pub mod recovery;
pub mod result;
pub mod retry;
pub mod runner;
pub mod step_runner;
pub mod variables;

pub use backoff::calculate_delay;
pub use circuit_breaker::{BreakerRegistry, CircuitBreaker, CircuitMetrics, CircuitState};
pub use context::ExecutionContext;
pub use debugger::{ResolutionReport, UnresolvedReason};
pub use dependency::{can_steps_run_in_parallel, group_steps, is_independent, StepGroup};
pub use recovery::{Recovered, RecoveryExecutor};
pub use result::{Counters, StepResult, StepStatus, TestResult, TestSuiteResult};
pub use retry::{RetryClassifier, RetryExecutor, RetryMetrics, RetryPolicy};
pub use runner::{StepsOutcome, TestRunner};
pub use step_runner::{StepOutcome, StepRunner};
pub use variables::Variables;
