//! Test case and suite definitions

use super::parallel::ParallelConfig;
use super::step::Step;
use crate::error::{ErrorType, RobogoError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// An ordered list of steps with its own variable scope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(alias = "testcase")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub variables: VariablesConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub setup: Vec<Step>,

    #[serde(default)]
    pub steps: Vec<Step>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teardown: Vec<Step>,

    /// Overrides the runner's parallel settings for this test case
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<ParallelConfig>,
}

/// Variables and secrets declared by a test case
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariablesConfig {
    #[serde(default)]
    pub vars: HashMap<String, Value>,

    #[serde(default)]
    pub secrets: HashMap<String, SecretSource>,
}

/// Where a secret's value comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Environment variable holding the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,

    /// Replace the value with `***` in outputs and error messages
    #[serde(default = "default_mask_output")]
    pub mask_output: bool,
}

fn default_mask_output() -> bool {
    true
}

impl SecretSource {
    /// Resolve the secret's value
    pub fn resolve(&self, name: &str) -> Result<String, RobogoError> {
        if let Some(value) = &self.value {
            return Ok(value.clone());
        }
        if let Some(var) = &self.env {
            return std::env::var(var).map_err(|_| {
                RobogoError::builder(
                    ErrorType::Security,
                    format!("secret '{}' references unset environment variable '{}'", name, var),
                )
                .detail("secret", name)
                .build()
            });
        }
        Err(RobogoError::configuration(format!(
            "secret '{}' has neither a value nor an env source",
            name
        )))
    }
}

impl TestCase {
    /// Check structural invariants before execution
    pub fn validate(&self) -> Result<(), RobogoError> {
        if self.name.trim().is_empty() {
            return Err(RobogoError::validation("test case name must not be empty"));
        }
        for steps in [&self.setup, &self.steps, &self.teardown] {
            validate_steps(steps).map_err(|e| e.with_test_case(self.name.clone()))?;
        }
        if let Some(parallel) = &self.parallel {
            parallel.validate()?;
        }
        Ok(())
    }
}

fn validate_steps(steps: &[Step]) -> Result<(), RobogoError> {
    let mut seen = HashSet::new();
    for step in steps {
        if !seen.insert(step.name.as_str()) {
            return Err(RobogoError::validation(format!(
                "duplicate step name '{}'",
                step.name
            ))
            .with_step(step.name.clone()));
        }
        validate_step(step).map_err(|e| e.with_step(step.name.clone()))?;
    }
    Ok(())
}

fn validate_step(step: &Step) -> Result<(), RobogoError> {
    if step.name.trim().is_empty() {
        return Err(RobogoError::validation("step name must not be empty"));
    }

    let flow_fields = [
        step.if_block.is_some(),
        step.for_block.is_some(),
        step.while_block.is_some(),
    ]
    .iter()
    .filter(|set| **set)
    .count();
    if flow_fields > 1 {
        return Err(RobogoError::validation(
            "a step may carry at most one of if, for and while",
        ));
    }
    if flow_fields == 0 && step.action.trim().is_empty() {
        return Err(RobogoError::validation(
            "step must name an action or a control-flow block",
        ));
    }

    if let Some(retry) = &step.retry {
        retry.validate()?;
    }
    if let Some(recovery) = &step.recovery {
        recovery.validate()?;
    }

    if let Some(block) = &step.if_block {
        validate_steps(&block.then)?;
        validate_steps(&block.else_steps)?;
    }
    for block in [&step.for_block, &step.while_block].into_iter().flatten() {
        if block.max_iterations == 0 {
            return Err(RobogoError::validation("max_iterations must be at least 1"));
        }
        validate_steps(&block.steps)?;
    }
    Ok(())
}

/// A named collection of test case files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Test case files, relative to the suite file
    #[serde(default)]
    pub testcases: Vec<String>,

    /// Variables shared by every test case; test case values take precedence
    #[serde(default)]
    pub variables: VariablesConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<ParallelConfig>,

    /// Stop after the first failing test case
    #[serde(default)]
    pub fail_fast: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_step_names_rejected() {
        let case = TestCase {
            name: "dupes".into(),
            steps: vec![Step::new("a", "log"), Step::new("a", "log")],
            ..Default::default()
        };
        let err = case.validate().unwrap_err();
        assert_eq!(err.step(), Some("a"));
        assert_eq!(err.test_case(), Some("dupes"));
    }

    #[test]
    fn test_step_without_action_rejected() {
        let case = TestCase {
            name: "empty".into(),
            steps: vec![Step::new("nothing", "")],
            ..Default::default()
        };
        assert!(case.validate().is_err());
    }

    #[test]
    fn test_secret_resolution() {
        let inline = SecretSource {
            value: Some("hunter2".into()),
            env: None,
            mask_output: true,
        };
        assert_eq!(inline.resolve("pw").unwrap(), "hunter2");

        let missing = SecretSource {
            value: None,
            env: Some("ROBOGO_TEST_SURELY_UNSET_VARIABLE".into()),
            mask_output: true,
        };
        let err = missing.resolve("pw").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Security);
    }

    #[test]
    fn test_deserialize_test_case() {
        let yaml = r#"
testcase: login flow
variables:
  vars:
    base_url: "http://localhost"
  secrets:
    token:
      value: abc
steps:
  - name: greet
    action: log
    args: ["${base_url}"]
"#;
        let case: TestCase = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(case.name, "login flow");
        assert!(case.variables.secrets["token"].mask_output);
        assert_eq!(case.steps.len(), 1);
        assert!(case.validate().is_ok());
    }
}
