//! Builder for [`RobogoError`] values
//!
//! The builder seeds severity, code and retry/recovery flags from the static
//! catalog and then accepts chained enrichments. Unless disabled, `build()`
//! records the caller's location and captures a backtrace.

use super::catalog::catalog_entry;
use super::context::{Breadcrumb, ErrorContext, StackFrame};
use super::{ErrorCause, ErrorType, RobogoError, Severity};
use std::backtrace::Backtrace;
use std::collections::{BTreeMap, HashMap};
use std::panic::Location;
use std::sync::Arc;

/// Chained constructor for [`RobogoError`]
#[derive(Debug)]
pub struct ErrorBuilder {
    error_type: ErrorType,
    message: String,
    cause: Option<ErrorCause>,
    action: Option<String>,
    step: Option<String>,
    test_case: Option<String>,
    severity: Severity,
    retryable: bool,
    recoverable: bool,
    details: BTreeMap<String, serde_json::Value>,
    context: ErrorContext,
    capture_stack: bool,
}

impl ErrorBuilder {
    /// Start a new error, seeding defaults from the catalog
    pub fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        let entry = catalog_entry(error_type);
        Self {
            error_type,
            message: message.into(),
            cause: None,
            action: None,
            step: None,
            test_case: None,
            severity: entry.severity,
            retryable: entry.retryable,
            recoverable: entry.recoverable,
            details: BTreeMap::new(),
            context: ErrorContext::default(),
            capture_stack: true,
        }
    }

    /// Attach the underlying error
    pub fn cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Attach an already shared cause
    pub fn shared_cause(mut self, cause: ErrorCause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    pub fn test_case(mut self, test_case: impl Into<String>) -> Self {
        self.test_case = Some(test_case.into());
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Record the action's arguments and options under `arguments` / `options`
    pub fn arguments(
        mut self,
        args: &[serde_json::Value],
        options: &HashMap<String, serde_json::Value>,
    ) -> Self {
        self.details
            .insert("arguments".to_string(), serde_json::Value::Array(args.to_vec()));
        if !options.is_empty() {
            let map: serde_json::Map<String, serde_json::Value> = options
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            self.details
                .insert("options".to_string(), serde_json::Value::Object(map));
        }
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.context.correlation_id = id.into();
        self
    }

    pub fn breadcrumb(mut self, message: impl Into<String>) -> Self {
        self.context.breadcrumbs.push(Breadcrumb::new(message));
        self
    }

    /// Snapshot of the variables visible when the error occurred
    pub fn variables(mut self, variables: BTreeMap<String, String>) -> Self {
        self.context.variables = variables;
        self
    }

    /// Snapshot of selected environment variables
    pub fn environment<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        for key in keys {
            let key = key.as_ref();
            if let Ok(value) = std::env::var(key) {
                self.context.environment.insert(key.to_string(), value);
            }
        }
        self
    }

    /// Skip call-site and backtrace capture
    pub fn without_stack(mut self) -> Self {
        self.capture_stack = false;
        self
    }

    /// Finish the error
    #[track_caller]
    pub fn build(self) -> RobogoError {
        let mut context = self.context;
        if self.capture_stack {
            context.call_site = Some(StackFrame::from_location(Location::caller()));
            context.backtrace = Some(Arc::new(Backtrace::force_capture()));
        }

        RobogoError {
            error_type: self.error_type,
            code: catalog_entry(self.error_type).code,
            message: self.message,
            cause: self.cause,
            action: self.action,
            step: self.step,
            test_case: self.test_case,
            severity: self.severity,
            retryable: self.retryable,
            recoverable: self.recoverable,
            details: self.details,
            context,
        }
    }
}
