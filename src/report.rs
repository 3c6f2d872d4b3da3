//! Run report rendering for the console and as JSON

use crate::execution::{CircuitMetrics, Counters, StepResult, StepStatus, TestResult, TestSuiteResult};
use serde::Serialize;
use std::fmt::Write;
use std::time::Duration;

/// Result of one input file
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunEntry {
    Suite(TestSuiteResult),
    TestCase(TestResult),
}

impl RunEntry {
    fn test_results(&self) -> Vec<&TestResult> {
        match self {
            RunEntry::Suite(suite) => suite.results.iter().collect(),
            RunEntry::TestCase(result) => vec![result],
        }
    }
}

/// Everything a `robogo run` produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub entries: Vec<RunEntry>,
    /// Counters over test cases
    pub totals: Counters,
    /// Counters over top-level steps
    pub step_totals: Counters,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub circuit_breakers: Vec<CircuitMetrics>,
}

impl RunReport {
    pub fn new(entries: Vec<RunEntry>, circuit_breakers: Vec<CircuitMetrics>, duration: Duration) -> Self {
        let mut totals = Counters::default();
        let mut step_totals = Counters::default();
        for result in entries.iter().flat_map(RunEntry::test_results) {
            totals.record(result.status);
            step_totals.merge(result.counters);
        }
        Self {
            entries,
            totals,
            step_totals,
            duration,
            circuit_breakers,
        }
    }

    pub fn is_success(&self) -> bool {
        self.totals.failed == 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human readable report; `verbose` adds warnings, metadata and breaker state
    pub fn render_console(&self, verbose: bool) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match entry {
                RunEntry::Suite(suite) => {
                    let _ = writeln!(out, "Suite: {} ({:?})", suite.name, suite.duration);
                    for result in &suite.results {
                        render_test(&mut out, result, verbose, 1);
                    }
                }
                RunEntry::TestCase(result) => render_test(&mut out, result, verbose, 0),
            }
        }

        if verbose && !self.circuit_breakers.is_empty() {
            let _ = writeln!(out, "Circuit breakers:");
            for metrics in &self.circuit_breakers {
                let _ = writeln!(out, "  {}", metrics);
            }
        }

        let _ = writeln!(
            out,
            "Test cases: {} total, {} passed, {} failed, {} skipped | Steps: {} total, {} passed, {} failed, {} skipped | {:?}",
            self.totals.total,
            self.totals.passed,
            self.totals.failed,
            self.totals.skipped,
            self.step_totals.total,
            self.step_totals.passed,
            self.step_totals.failed,
            self.step_totals.skipped,
            self.duration
        );
        let _ = writeln!(out, "{}", if self.is_success() { "PASSED" } else { "FAILED" });
        out
    }
}

fn render_test(out: &mut String, result: &TestResult, verbose: bool, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = writeln!(
        out,
        "{}[{}] {} ({:?})",
        indent, result.status, result.name, result.duration
    );
    if let Some(error) = &result.error {
        let _ = writeln!(out, "{}  error: {}", indent, error);
    }
    for (phase, steps) in [("setup", &result.setup), ("", &result.steps), ("teardown", &result.teardown)] {
        if steps.is_empty() {
            continue;
        }
        if !phase.is_empty() {
            let _ = writeln!(out, "{}  {}:", indent, phase);
        }
        for step in steps {
            render_step(out, step, verbose, depth + 1);
        }
    }
}

fn render_step(out: &mut String, step: &StepResult, verbose: bool, depth: usize) {
    let indent = "  ".repeat(depth);
    let detail = match step.status {
        StepStatus::Failed => step.error.as_deref().map(|e| format!(": {}", e)),
        StepStatus::Skipped => step.skip_reason.as_deref().map(|r| format!(": {}", r)),
        StepStatus::Passed => None,
    };
    let _ = writeln!(
        out,
        "{}{:<7} {} ({:?}){}",
        indent,
        step.status.to_string(),
        step.name,
        step.duration,
        detail.unwrap_or_default()
    );
    if verbose {
        for warning in &step.warnings {
            let _ = writeln!(out, "{}  warning: {}", indent, warning);
        }
        for (key, value) in &step.metadata {
            let _ = writeln!(out, "{}  {}: {}", indent, key, value);
        }
    }
    for child in &step.children {
        render_step(out, child, verbose, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RobogoError;
    use chrono::Utc;

    fn sample() -> RunReport {
        let steps = vec![
            StepResult::passed("ok", "log", Duration::from_millis(2), None)
                .with_warnings(vec!["variable 'x' is not defined".into()]),
            StepResult::failed(
                "bad",
                "fail",
                Duration::ZERO,
                RobogoError::execution("boom"),
                "[E0002] execution: boom".into(),
            ),
        ];
        let failed = TestResult::new("login", Utc::now(), Duration::ZERO, vec![], steps, vec![], None);
        let passed = TestResult::new(
            "health",
            Utc::now(),
            Duration::ZERO,
            vec![],
            vec![StepResult::passed("ping", "log", Duration::ZERO, None)],
            vec![],
            None,
        );
        let suite = TestSuiteResult::new("smoke", Duration::ZERO, vec![passed]);
        RunReport::new(
            vec![RunEntry::Suite(suite), RunEntry::TestCase(failed)],
            Vec::new(),
            Duration::from_millis(5),
        )
    }

    #[test]
    fn test_totals_span_suites_and_cases() {
        let report = sample();
        assert_eq!(report.totals.total, 2);
        assert_eq!(report.totals.failed, 1);
        assert_eq!(report.step_totals.total, 3);
        assert!(!report.is_success());
    }

    #[test]
    fn test_console_output() {
        let report = sample();
        let quiet = report.render_console(false);
        assert!(quiet.contains("Suite: smoke"));
        assert!(quiet.contains("[FAILED] login"));
        assert!(quiet.contains("boom"));
        assert!(!quiet.contains("warning:"));
        assert!(quiet.trim_end().ends_with("FAILED"));

        let verbose = report.render_console(true);
        assert!(verbose.contains("warning: variable 'x' is not defined"));
    }

    #[test]
    fn test_json_output_is_tagged() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(json["entries"][0]["kind"], "suite");
        assert_eq!(json["entries"][1]["kind"], "test_case");
        assert_eq!(json["totals"]["failed"], 1);
        assert!(json.get("circuit_breakers").is_none());
    }
}
