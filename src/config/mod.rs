//! Declarative configuration consumed by the execution core
//!
//! Everything here is plain deserialized data: steps, retry and recovery
//! policies, parallelism settings, test cases and the runner configuration.

pub mod loader;
pub mod parallel;
pub mod recovery;
pub mod retry;
pub mod runner;
pub mod step;
pub mod test_case;

pub use loader::{is_suite_file, load_runner_config, load_suite, load_test_case};
pub use parallel::ParallelConfig;
pub use recovery::{CircuitBreakerConfig, RecoveryConfig, RecoveryStrategy};
pub use retry::{BackoffStrategy, RetryCondition, RetryConfig};
pub use runner::RunnerConfig;
pub use step::{
    ConditionalBlock, ErrorMatcher, ExpectError, LoopBlock, MatchType, SkipCondition, Step,
};
pub use test_case::{SecretSource, TestCase, TestSuite, VariablesConfig};
