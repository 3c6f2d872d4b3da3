use super::{BoxError, ErrorBuilder, ErrorType, RobogoError};

/// Wrap an arbitrary error into a [`RobogoError`]
///
/// Idempotent on errors that already are a `RobogoError`: those are annotated
/// with a breadcrumb (and the action, when none is recorded) instead of being
/// wrapped a second time.
#[track_caller]
pub fn wrap_error(
    err: impl Into<BoxError>,
    error_type: ErrorType,
    message: impl Into<String>,
    action: Option<&str>,
) -> RobogoError {
    let message = message.into();
    match err.into().downcast::<RobogoError>() {
        Ok(existing) => {
            let annotated = (*existing).with_breadcrumb(message);
            match action {
                Some(action) => annotated.with_action_if_absent(action),
                None => annotated,
            }
        }
        Err(other) => {
            let mut builder = ErrorBuilder::new(error_type, message).shared_cause(other.into());
            if let Some(action) = action {
                builder = builder.action(action);
            }
            builder.build()
        }
    }
}

/// Extension trait for convenient error conversion
pub trait ErrorExt<T> {
    /// Convert the error into a typed [`RobogoError`], wrapping idempotently
    fn typed(self, error_type: ErrorType, message: impl Into<String>) -> Result<T, RobogoError>;

    fn to_validation_error(self, message: impl Into<String>) -> Result<T, RobogoError>;
    fn to_execution_error(self, message: impl Into<String>) -> Result<T, RobogoError>;
    fn to_configuration_error(self, message: impl Into<String>) -> Result<T, RobogoError>;
}

impl<T, E> ErrorExt<T> for Result<T, E>
where
    E: Into<BoxError>,
{
    #[track_caller]
    fn typed(self, error_type: ErrorType, message: impl Into<String>) -> Result<T, RobogoError> {
        match self {
            Ok(value) => Ok(value),
            Err(e) => Err(wrap_error(e, error_type, message, None)),
        }
    }

    #[track_caller]
    fn to_validation_error(self, message: impl Into<String>) -> Result<T, RobogoError> {
        self.typed(ErrorType::Validation, message)
    }

    #[track_caller]
    fn to_execution_error(self, message: impl Into<String>) -> Result<T, RobogoError> {
        self.typed(ErrorType::Execution, message)
    }

    #[track_caller]
    fn to_configuration_error(self, message: impl Into<String>) -> Result<T, RobogoError> {
        self.typed(ErrorType::Configuration, message)
    }
}

/// Helper functions for common error scenarios
pub mod common {
    use super::*;
    use std::time::Duration;

    /// The governing context was cancelled explicitly
    #[track_caller]
    pub fn cancelled(operation: &str) -> RobogoError {
        ErrorBuilder::new(ErrorType::Timeout, format!("{} cancelled", operation))
            .retryable(false)
            .detail("reason", "cancelled")
            .build()
    }

    /// The governing context's deadline passed
    #[track_caller]
    pub fn deadline_exceeded(operation: &str) -> RobogoError {
        ErrorBuilder::new(
            ErrorType::Timeout,
            format!("{} cancelled: context deadline exceeded", operation),
        )
        .retryable(false)
        .detail("reason", "deadline_exceeded")
        .build()
    }

    /// An operation did not complete within its time limit
    #[track_caller]
    pub fn timed_out(operation: &str, limit: Duration) -> RobogoError {
        ErrorBuilder::new(
            ErrorType::Timeout,
            format!("{} timed out after {:?}", operation, limit),
        )
        .detail("timeout_ms", limit.as_millis() as u64)
        .build()
    }

    /// A circuit breaker refused the request
    #[track_caller]
    pub fn circuit_open(name: &str, reason: &str) -> RobogoError {
        ErrorBuilder::new(
            ErrorType::Execution,
            format!("circuit breaker '{}' is open: {}", name, reason),
        )
        .retryable(false)
        .detail("circuit_breaker", name)
        .build()
    }

    /// No action is registered under the given name
    #[track_caller]
    pub fn unknown_action(action: &str) -> RobogoError {
        ErrorBuilder::new(ErrorType::Validation, format!("unknown action '{}'", action))
            .action(action)
            .build()
    }

    /// An action received an argument it cannot use
    #[track_caller]
    pub fn invalid_argument(action: &str, message: impl Into<String>) -> RobogoError {
        ErrorBuilder::new(ErrorType::Validation, message)
            .action(action)
            .build()
    }

    /// A required option or argument is missing
    #[track_caller]
    pub fn missing_argument(action: &str, name: &str) -> RobogoError {
        ErrorBuilder::new(
            ErrorType::Validation,
            format!("{} requires argument '{}'", action, name),
        )
        .action(action)
        .build()
    }
}
