//! Common test utilities and helpers

#![allow(dead_code)]

use anyhow::Result;
use robogo::config::{load_suite, load_test_case, RunnerConfig, TestCase, TestSuite};
use robogo::execution::TestRunner;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Temporary directory holding YAML test files
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    /// Write `content` to `name` inside the workspace
    pub fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    pub async fn test_case(&self, name: &str, content: &str) -> Result<TestCase> {
        let path = self.write(name, content)?;
        load_test_case(&path).await
    }

    pub async fn suite(&self, name: &str, content: &str) -> Result<(TestSuite, Vec<TestCase>)> {
        let path = self.write(name, content)?;
        load_suite(&path).await
    }
}

/// Runner with the built-in actions and default configuration
pub fn runner() -> TestRunner {
    TestRunner::with_builtins(RunnerConfig::default())
}
