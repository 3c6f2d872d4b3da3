//! Structured error model for test execution
//!
//! Every failure raised by the execution core is a [`RobogoError`]: a typed,
//! immutable value carrying catalog-derived severity and retry metadata, an
//! optional cause, provenance (action, step, test case) and diagnostic context.
//!
//! Errors are created once through [`ErrorBuilder`] and enriched on the way up
//! by consuming methods that return the updated value, so a returned error can
//! be cloned and shared between concurrent tasks without synchronization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod builder;
pub mod catalog;
pub mod context;
pub mod format;
pub mod helpers;
pub mod serialization;


pub use builder::ErrorBuilder;
pub use catalog::{catalog_entry, CatalogEntry};
pub use context::{Breadcrumb, ErrorContext, StackFrame};
pub use helpers::{common, wrap_error, ErrorExt};
pub use serialization::SerializableError;

/// Boxed error accepted at wrapping boundaries
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared cause attached to a [`RobogoError`]
pub type ErrorCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Validation,
    Execution,
    Configuration,
    Network,
    Database,
    Timeout,
    Assertion,
    Messaging,
    Template,
    Security,
    Filesystem,
}

impl ErrorType {
    pub const ALL: [ErrorType; 11] = [
        ErrorType::Validation,
        ErrorType::Execution,
        ErrorType::Configuration,
        ErrorType::Network,
        ErrorType::Database,
        ErrorType::Timeout,
        ErrorType::Assertion,
        ErrorType::Messaging,
        ErrorType::Template,
        ErrorType::Security,
        ErrorType::Filesystem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Validation => "validation",
            ErrorType::Execution => "execution",
            ErrorType::Configuration => "configuration",
            ErrorType::Network => "network",
            ErrorType::Database => "database",
            ErrorType::Timeout => "timeout",
            ErrorType::Assertion => "assertion",
            ErrorType::Messaging => "messaging",
            ErrorType::Template => "template",
            ErrorType::Security => "security",
            ErrorType::Filesystem => "filesystem",
        }
    }

    /// Parse a lowercase type name as used in YAML and log output
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How serious a failure is, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// The uniform error value of the execution core
#[derive(Error, Debug, Clone)]
#[error("[E{code:04}] {error_type}: {message}")]
pub struct RobogoError {
    pub(crate) error_type: ErrorType,
    pub(crate) code: u16,
    pub(crate) message: String,
    #[source]
    pub(crate) cause: Option<ErrorCause>,
    pub(crate) action: Option<String>,
    pub(crate) step: Option<String>,
    pub(crate) test_case: Option<String>,
    pub(crate) severity: Severity,
    pub(crate) retryable: bool,
    pub(crate) recoverable: bool,
    pub(crate) details: BTreeMap<String, serde_json::Value>,
    pub(crate) context: ErrorContext,
}

impl RobogoError {
    /// Create an error of the given type with catalog defaults
    #[track_caller]
    pub fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        ErrorBuilder::new(error_type, message).build()
    }

    /// Start a builder for an error of the given type
    pub fn builder(error_type: ErrorType, message: impl Into<String>) -> ErrorBuilder {
        ErrorBuilder::new(error_type, message)
    }

    #[track_caller]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Validation, message)
    }

    #[track_caller]
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Execution, message)
    }

    #[track_caller]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Configuration, message)
    }

    #[track_caller]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Network, message)
    }

    #[track_caller]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Timeout, message)
    }

    #[track_caller]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Assertion, message)
    }

    #[track_caller]
    pub fn template(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Template, message)
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn step(&self) -> Option<&str> {
        self.step.as_deref()
    }

    pub fn test_case(&self) -> Option<&str> {
        self.test_case.as_deref()
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    pub fn details(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.details
    }

    pub fn detail(&self, key: &str) -> Option<&serde_json::Value> {
        self.details.get(key)
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    pub fn correlation_id(&self) -> &str {
        &self.context.correlation_id
    }

    /// Walk the cause chain, nearest cause first
    pub fn cause_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current: Option<&(dyn std::error::Error + 'static)> =
            self.cause.as_deref().map(|c| c as &(dyn std::error::Error + 'static));
        while let Some(err) = current {
            chain.push(err.to_string());
            current = err.source();
        }
        chain
    }

    /// Check whether this error or any of its causes is of the given type
    pub fn has_type(&self, error_type: ErrorType) -> bool {
        if self.error_type == error_type {
            return true;
        }
        let mut current: Option<&(dyn std::error::Error + 'static)> =
            self.cause.as_deref().map(|c| c as &(dyn std::error::Error + 'static));
        while let Some(err) = current {
            if let Some(typed) = err.downcast_ref::<RobogoError>() {
                if typed.error_type == error_type {
                    return true;
                }
            }
            current = err.source();
        }
        false
    }

    /// Set the step this error belongs to
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    /// Set the action only when none is recorded yet
    pub fn with_action_if_absent(mut self, action: impl Into<String>) -> Self {
        if self.action.is_none() {
            self.action = Some(action.into());
        }
        self
    }

    pub fn with_test_case(mut self, test_case: impl Into<String>) -> Self {
        self.test_case = Some(test_case.into());
        self
    }

    /// Append a breadcrumb describing a hop in the error's causal history
    pub fn with_breadcrumb(mut self, message: impl Into<String>) -> Self {
        self.context.breadcrumbs.push(Breadcrumb::new(message));
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    /// Replace every occurrence of the given secret values in user-visible text
    ///
    /// Covers the message, details, breadcrumbs, context snapshots and the
    /// cause chain, so every formatter and serializer sees the masked form.
    pub fn masked(mut self, secrets: &[String]) -> Self {
        let secrets: Vec<&str> = secrets
            .iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect();
        if secrets.is_empty() {
            return self;
        }

        self.message = mask_text(&self.message, &secrets);
        for name in [&mut self.action, &mut self.step, &mut self.test_case]
            .into_iter()
            .flatten()
        {
            *name = mask_text(name, &secrets);
        }
        for value in self.details.values_mut() {
            mask_json(value, &secrets);
        }
        for crumb in &mut self.context.breadcrumbs {
            crumb.message = mask_text(&crumb.message, &secrets);
        }
        for value in self
            .context
            .variables
            .values_mut()
            .chain(self.context.environment.values_mut())
        {
            *value = mask_text(value, &secrets);
        }
        self.cause = self.cause.map(|cause| mask_cause(cause, &secrets));
        self
    }

    /// Remediation text from the catalog for this error's type
    pub fn user_message(&self) -> String {
        let entry = catalog_entry(self.error_type);
        format!("{}: {}", entry.user_message, self.message)
    }

    pub fn remediation(&self) -> &'static str {
        catalog_entry(self.error_type).remediation
    }
}

const MASK: &str = "***";

fn mask_text(text: &str, secrets: &[&str]) -> String {
    secrets
        .iter()
        .fold(text.to_string(), |acc, secret| acc.replace(secret, MASK))
}

fn mask_json(value: &mut serde_json::Value, secrets: &[&str]) {
    match value {
        serde_json::Value::String(text) => *text = mask_text(text, secrets),
        serde_json::Value::Array(items) => items.iter_mut().for_each(|v| mask_json(v, secrets)),
        serde_json::Value::Object(map) => map.values_mut().for_each(|v| mask_json(v, secrets)),
        _ => {}
    }
}

/// Cause text with secrets removed, keeping the depth of the original chain
#[derive(Error, Debug)]
#[error("{message}")]
struct MaskedCause {
    message: String,
    #[source]
    source: Option<Box<MaskedCause>>,
}

fn mask_cause(cause: ErrorCause, secrets: &[&str]) -> ErrorCause {
    if let Some(typed) = cause.downcast_ref::<RobogoError>() {
        let owned: Vec<String> = secrets.iter().map(|s| s.to_string()).collect();
        return Arc::new(typed.clone().masked(&owned));
    }

    let mut chain = Vec::new();
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(&*cause);
    while let Some(err) = current {
        chain.push(err.to_string());
        current = err.source();
    }
    if !chain
        .iter()
        .any(|text| secrets.iter().any(|secret| text.contains(secret)))
    {
        return cause;
    }

    let masked = chain.iter().rev().fold(None, |source, text| {
        Some(Box::new(MaskedCause {
            message: mask_text(text, secrets),
            source,
        }))
    });
    match masked {
        Some(head) => Arc::new(*head) as ErrorCause,
        None => cause,
    }
}

/// Type alias for Results using RobogoError
pub type Result<T> = std::result::Result<T, RobogoError>;

impl From<std::io::Error> for RobogoError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let (error_type, message) = match err.kind() {
            ErrorKind::NotFound => (ErrorType::Filesystem, "File or directory not found"),
            ErrorKind::PermissionDenied => (ErrorType::Filesystem, "Permission denied"),
            ErrorKind::AlreadyExists => (ErrorType::Filesystem, "Already exists"),
            ErrorKind::InvalidInput | ErrorKind::InvalidData => {
                (ErrorType::Validation, "Invalid data")
            }
            ErrorKind::TimedOut => (ErrorType::Timeout, "Operation timed out"),
            ErrorKind::ConnectionRefused => (ErrorType::Network, "Connection refused"),
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                (ErrorType::Network, "Connection reset")
            }
            _ => (ErrorType::Filesystem, "IO operation failed"),
        };

        ErrorBuilder::new(error_type, message).cause(err).build()
    }
}

impl From<serde_yaml::Error> for RobogoError {
    #[track_caller]
    fn from(err: serde_yaml::Error) -> Self {
        ErrorBuilder::new(ErrorType::Configuration, "Invalid YAML syntax")
            .cause(err)
            .build()
    }
}

impl From<serde_json::Error> for RobogoError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        ErrorBuilder::new(ErrorType::Validation, "Invalid JSON value")
            .cause(err)
            .build()
    }
}

impl From<regex::Error> for RobogoError {
    #[track_caller]
    fn from(err: regex::Error) -> Self {
        ErrorBuilder::new(ErrorType::Template, "Invalid regular expression")
            .cause(err)
            .build()
    }
}
