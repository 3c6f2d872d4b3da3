//! YAML loading of test cases, suites and runner configuration

use super::runner::RunnerConfig;
use super::test_case::{TestCase, TestSuite};
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Load and validate a single test case file
pub async fn load_test_case(path: &Path) -> Result<TestCase> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read test case {}", path.display()))?;
    let test_case: TestCase = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse test case {}", path.display()))?;
    test_case
        .validate()
        .with_context(|| format!("Invalid test case {}", path.display()))?;

    debug!(
        "Loaded test case '{}' with {} steps from {}",
        test_case.name,
        test_case.steps.len(),
        path.display()
    );
    Ok(test_case)
}

/// Load a suite file and every test case it references
///
/// Suite variables are merged into each test case; values declared by the test
/// case itself win.
pub async fn load_suite(path: &Path) -> Result<(TestSuite, Vec<TestCase>)> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read suite {}", path.display()))?;
    let suite: TestSuite = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse suite {}", path.display()))?;

    if suite.testcases.is_empty() {
        return Err(anyhow!("Suite '{}' lists no test cases", suite.name));
    }
    if let Some(parallel) = &suite.parallel {
        parallel.validate()?;
    }

    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut cases = Vec::with_capacity(suite.testcases.len());
    for relative in &suite.testcases {
        let case_path = resolve_relative(&base_dir, relative);
        let mut case = load_test_case(&case_path).await?;
        for (key, value) in &suite.variables.vars {
            case.variables
                .vars
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        for (key, secret) in &suite.variables.secrets {
            case.variables
                .secrets
                .entry(key.clone())
                .or_insert_with(|| secret.clone());
        }
        cases.push(case);
    }

    Ok((suite, cases))
}

/// Load runner configuration from a YAML file
pub async fn load_runner_config(path: &Path) -> Result<RunnerConfig> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: RunnerConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Decide whether a YAML file is a suite (has a `testcases` list)
pub async fn is_suite_file(path: &Path) -> Result<bool> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_yaml::Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(value.get("testcases").is_some())
}

fn resolve_relative(base: &Path, relative: &str) -> PathBuf {
    let candidate = Path::new(relative);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}
