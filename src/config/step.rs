//! Step definitions
//!
//! A step invokes one named action with positional arguments and options, and
//! may carry retry/recovery policies, control flow (`if`/`for`/`while`), an
//! error expectation and a skip condition.

use super::recovery::RecoveryConfig;
use super::retry::RetryConfig;
use crate::error::ErrorType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// A named unit of work within a test case
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,

    /// Action identifier resolved through the action registry
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub options: HashMap<String, Value>,

    /// Variable the action's output is bound to
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub result: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery: Option<RecoveryConfig>,

    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    pub if_block: Option<ConditionalBlock>,

    #[serde(rename = "for", default, skip_serializing_if = "Option::is_none")]
    pub for_block: Option<LoopBlock>,

    #[serde(rename = "while", default, skip_serializing_if = "Option::is_none")]
    pub while_block: Option<LoopBlock>,

    #[serde(default)]
    pub continue_on_failure: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_error: Option<ExpectError>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<SkipCondition>,

    /// Upper bound for a single action invocation
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl Step {
    /// Create an action step
    pub fn new(name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn with_args<I, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_result(mut self, variable: impl Into<String>) -> Self {
        self.result = variable.into();
        self
    }

    /// True if the step carries any of `if`, `for` or `while`
    pub fn has_control_flow(&self) -> bool {
        self.if_block.is_some() || self.for_block.is_some() || self.while_block.is_some()
    }
}

/// `if` block: condition plus the steps for each branch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionalBlock {
    pub condition: String,
    #[serde(default)]
    pub then: Vec<Step>,
    #[serde(rename = "else", default, skip_serializing_if = "Vec::is_empty")]
    pub else_steps: Vec<Step>,
}

/// `for` / `while` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopBlock {
    /// Range (`1..5`), list (`[a, b]`) or count for `for`; expression for `while`
    pub condition: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    100
}

impl Default for LoopBlock {
    fn default() -> Self {
        Self {
            condition: String::new(),
            steps: Vec::new(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// Expected error of a step, either a bare substring or a structured matcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpectError {
    Message(String),
    Matcher(ErrorMatcher),
}

/// Structured error expectation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorMatcher {
    #[serde(rename = "type", default)]
    pub match_type: MatchType,
    #[serde(default)]
    pub message: String,
    /// Optional error classification the failure must carry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
}

/// How an expected error message is compared with the actual one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Any,
    #[default]
    Contains,
    Matches,
    Exact,
    StartsWith,
    EndsWith,
    NotContains,
    NotMatches,
}

/// Skip flag or expression evaluated at run time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SkipCondition {
    Flag(bool),
    Expression(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_control_flow_step() {
        let yaml = r#"
name: loop over users
for:
  condition: "1..3"
  steps:
    - name: say
      action: log
      args: ["user ${iteration}"]
"#;
        let step: Step = serde_yaml::from_str(yaml).unwrap();
        assert!(step.has_control_flow());
        let block = step.for_block.unwrap();
        assert_eq!(block.condition, "1..3");
        assert_eq!(block.max_iterations, 100);
        assert_eq!(block.steps.len(), 1);
    }

    #[test]
    fn test_deserialize_expect_error_forms() {
        let simple: Step =
            serde_yaml::from_str("name: a\naction: fail\nexpect_error: \"boom\"").unwrap();
        assert_eq!(simple.expect_error, Some(ExpectError::Message("boom".into())));

        let structured: Step = serde_yaml::from_str(
            "name: a\naction: fail\nexpect_error:\n  type: starts_with\n  message: conn",
        )
        .unwrap();
        match structured.expect_error {
            Some(ExpectError::Matcher(m)) => {
                assert_eq!(m.match_type, MatchType::StartsWith);
                assert_eq!(m.message, "conn");
            }
            other => panic!("unexpected expectation: {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_skip_forms() {
        let flag: Step = serde_yaml::from_str("name: a\naction: log\nskip: true").unwrap();
        assert_eq!(flag.skip, Some(SkipCondition::Flag(true)));

        let expr: Step =
            serde_yaml::from_str("name: a\naction: log\nskip: \"${env} == prod\"").unwrap();
        assert_eq!(
            expr.skip,
            Some(SkipCondition::Expression("${env} == prod".into()))
        );
    }

    #[test]
    fn test_step_timeout_parses_humantime() {
        let step: Step = serde_yaml::from_str("name: a\naction: sleep\ntimeout: 250ms").unwrap();
        assert_eq!(step.timeout, Some(Duration::from_millis(250)));
    }
}
