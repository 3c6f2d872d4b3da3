//! `robogo run` implementation
//!
//! Loads every input file up front, so a broken file aborts the run before any
//! test executes, then runs suites and test cases in command-line order.

use crate::app::AppConfig;
use crate::cli::args::{OutputFormat, RunArgs};
use crate::config::{is_suite_file, load_runner_config, load_suite, load_test_case, RunnerConfig, TestCase, TestSuite};
use crate::execution::{ExecutionContext, TestRunner};
use crate::report::{RunEntry, RunReport};
use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tracing::{debug, info};

enum Input {
    Suite(TestSuite, Vec<TestCase>),
    TestCase(TestCase),
}

/// Runner configuration from the optional config file plus CLI overrides
pub async fn build_runner_config(args: &RunArgs, app: &AppConfig) -> Result<RunnerConfig> {
    let mut config = match &args.config {
        Some(path) => load_runner_config(&app.resolve(path)).await?,
        None => RunnerConfig::default(),
    };
    if args.parallel {
        config.parallel.enabled = true;
    }
    if let Some(max) = args.max_concurrency {
        config.parallel.max_concurrency = max;
    }
    if let Some(secs) = args.timeout {
        config.run_timeout = Some(Duration::from_secs(secs));
    }
    if args.verbose_retry {
        config.verbose_retry = true;
    }
    config.validate().context("Invalid runner configuration")?;
    debug!("Runner configuration: {:?}", config);
    Ok(config)
}

/// Run the given files and print the report; returns whether everything passed
pub async fn run_tests(args: RunArgs, app: &AppConfig) -> Result<bool> {
    let config = build_runner_config(&args, app).await?;

    let mut inputs = Vec::with_capacity(args.files.len());
    for file in &args.files {
        let path = app.resolve(file);
        let input = if is_suite_file(&path).await? {
            let (suite, cases) = load_suite(&path).await?;
            Input::Suite(suite, cases)
        } else {
            Input::TestCase(load_test_case(&path).await?)
        };
        inputs.push(input);
    }

    let ctx = match config.run_timeout {
        Some(limit) => ExecutionContext::new().with_timeout(limit),
        None => ExecutionContext::new(),
    };
    let runner = TestRunner::with_builtins(config);
    let started = Instant::now();

    let mut entries = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let entry = match input {
            Input::Suite(suite, cases) => RunEntry::Suite(runner.run_suite(&ctx, suite, cases).await),
            Input::TestCase(case) => RunEntry::TestCase(runner.run_test_case(&ctx, case).await),
        };
        entries.push(entry);
    }

    let report = RunReport::new(entries, runner.breaker_metrics(), started.elapsed());
    match args.output {
        OutputFormat::Console => print!("{}", report.render_console(app.verbose > 0)),
        OutputFormat::Json => println!("{}", report.to_json().context("Failed to serialize report")?),
    }
    info!(
        "Run finished: {} of {} test case(s) failed",
        report.totals.failed, report.totals.total
    );
    Ok(report.is_success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn args(files: Vec<PathBuf>) -> RunArgs {
        RunArgs {
            files,
            parallel: false,
            max_concurrency: None,
            timeout: None,
            output: OutputFormat::Json,
            config: None,
            verbose_retry: false,
        }
    }

    fn app(dir: &TempDir) -> AppConfig {
        AppConfig::default().with_working_dir(dir.path().to_path_buf())
    }

    #[tokio::test]
    async fn test_cli_overrides_config_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("robogo.yaml"),
            "parallel:\n  max_concurrency: 2\nstep_timeout: 5s\n",
        )
        .unwrap();

        let mut run_args = args(vec![]);
        run_args.config = Some(PathBuf::from("robogo.yaml"));
        run_args.parallel = true;
        run_args.timeout = Some(60);

        let config = build_runner_config(&run_args, &app(&dir)).await.unwrap();
        assert!(config.parallel.enabled);
        assert_eq!(config.parallel.max_concurrency, 2);
        assert_eq!(config.step_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.run_timeout, Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_invalid_concurrency_rejected() {
        let dir = TempDir::new().unwrap();
        let mut run_args = args(vec![]);
        run_args.max_concurrency = Some(0);
        assert!(build_runner_config(&run_args, &app(&dir)).await.is_err());
    }

    #[tokio::test]
    async fn test_run_reports_failure() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("ok.yaml"),
            "name: ok\nsteps:\n  - name: hello\n    action: log\n    args: [hi]\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("bad.yaml"),
            "name: bad\nsteps:\n  - name: boom\n    action: fail\n    args: [nope]\n",
        )
        .unwrap();

        let passed = run_tests(args(vec![PathBuf::from("ok.yaml")]), &app(&dir)).await.unwrap();
        assert!(passed);
        let passed = run_tests(
            args(vec![PathBuf::from("ok.yaml"), PathBuf::from("bad.yaml")]),
            &app(&dir),
        )
        .await
        .unwrap();
        assert!(!passed);
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = run_tests(args(vec![PathBuf::from("absent.yaml")]), &app(&dir)).await;
        assert!(result.is_err());
    }
}
