//! Step, test case and suite results

use crate::error::{ErrorType, RobogoError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StepStatus::Passed => "PASSED",
            StepStatus::Failed => "FAILED",
            StepStatus::Skipped => "SKIPPED",
        })
    }
}

/// Outcome of one executed step
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub name: String,
    pub action: String,
    pub status: StepStatus,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    /// Results of the steps nested in a control-flow block
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<StepResult>,
    /// Full error kept for structured logging; `error` holds the masked text
    #[serde(skip)]
    pub failure: Option<RobogoError>,
}

impl StepResult {
    fn base(name: &str, action: &str, status: StepStatus, duration: Duration) -> Self {
        Self {
            name: name.to_string(),
            action: action.to_string(),
            status,
            duration,
            output: None,
            error: None,
            error_type: None,
            skip_reason: None,
            warnings: Vec::new(),
            metadata: BTreeMap::new(),
            children: Vec::new(),
            failure: None,
        }
    }

    pub fn passed(name: &str, action: &str, duration: Duration, output: Option<Value>) -> Self {
        Self {
            output,
            ..Self::base(name, action, StepStatus::Passed, duration)
        }
    }

    /// Failed result; `error_text` is the user-visible (masked) message
    pub fn failed(name: &str, action: &str, duration: Duration, error: RobogoError, error_text: String) -> Self {
        Self {
            error: Some(error_text),
            error_type: Some(error.error_type()),
            failure: Some(error),
            ..Self::base(name, action, StepStatus::Failed, duration)
        }
    }

    pub fn skipped(name: &str, action: &str, reason: impl Into<String>) -> Self {
        Self {
            skip_reason: Some(reason.into()),
            ..Self::base(name, action, StepStatus::Skipped, Duration::ZERO)
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_children(mut self, children: Vec<StepResult>) -> Self {
        self.children = children;
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}

/// Pass/fail/skip counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Counters {
    pub(crate) fn record(&mut self, status: StepStatus) {
        self.total += 1;
        match status {
            StepStatus::Passed => self.passed += 1,
            StepStatus::Failed => self.failed += 1,
            StepStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn merge(&mut self, other: Counters) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    pub fn from_steps(steps: &[StepResult]) -> Self {
        let mut counters = Self::default();
        for step in steps {
            counters.record(step.status);
        }
        counters
    }
}

/// Outcome of one test case
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub name: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub setup: Vec<StepResult>,
    pub steps: Vec<StepResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub teardown: Vec<StepResult>,
    pub counters: Counters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResult {
    /// Assemble the result; the status is failed when any phase failed
    pub fn new(
        name: &str,
        started_at: DateTime<Utc>,
        duration: Duration,
        setup: Vec<StepResult>,
        steps: Vec<StepResult>,
        teardown: Vec<StepResult>,
        error: Option<String>,
    ) -> Self {
        let counters = Counters::from_steps(&steps);
        let any_failed = error.is_some()
            || [&setup, &steps, &teardown]
                .iter()
                .any(|phase| phase.iter().any(StepResult::is_failed));
        let status = if any_failed {
            StepStatus::Failed
        } else if counters.total > 0 && counters.skipped == counters.total {
            StepStatus::Skipped
        } else {
            StepStatus::Passed
        };

        Self {
            name: name.to_string(),
            status,
            started_at,
            duration,
            setup,
            steps,
            teardown,
            counters,
            error,
        }
    }

    /// A test case that never ran
    pub fn not_run(name: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Skipped,
            started_at: Utc::now(),
            duration: Duration::ZERO,
            setup: Vec::new(),
            steps: Vec::new(),
            teardown: Vec::new(),
            counters: Counters::default(),
            error: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status != StepStatus::Failed
    }
}

/// Outcome of a suite of test cases
#[derive(Debug, Clone, Serialize)]
pub struct TestSuiteResult {
    pub name: String,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub results: Vec<TestResult>,
    /// Counters over test cases
    pub counters: Counters,
    /// Counters over the steps of every test case
    pub step_counters: Counters,
}

impl TestSuiteResult {
    pub fn new(name: &str, duration: Duration, results: Vec<TestResult>) -> Self {
        let mut counters = Counters::default();
        let mut step_counters = Counters::default();
        for result in &results {
            counters.record(result.status);
            for step in &result.steps {
                step_counters.record(step.status);
            }
        }
        Self {
            name: name.to_string(),
            duration,
            results,
            counters,
            step_counters,
        }
    }

    pub fn is_success(&self) -> bool {
        self.counters.failed == 0
    }
}
