//! Text renderings of [`RobogoError`]
//!
//! - `compact()`: single line, `type=... | message | cause=...`
//! - `format_with_stack()`: multi-line report with the first frames of the stack
//! - `summary()`: ordered key/value pairs for log ingestion

use super::RobogoError;
use std::fmt::Write as _;
use tracing::{error, warn};

/// Frames printed by [`RobogoError::format_with_stack`] before truncating
pub const DISPLAYED_STACK_FRAMES: usize = 10;

impl RobogoError {
    /// Single-line rendering
    pub fn compact(&self) -> String {
        let mut out = format!("type={} | {}", self.error_type, self.message);
        if let Some(cause) = &self.cause {
            let _ = write!(out, " | cause={}", cause);
        }
        out
    }

    /// Multi-line rendering including breadcrumbs and the captured stack
    pub fn format_with_stack(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self);
        let _ = writeln!(
            out,
            "  severity: {} | retryable: {} | recoverable: {}",
            self.severity, self.retryable, self.recoverable
        );
        if let Some(test_case) = &self.test_case {
            let _ = writeln!(out, "  test case: {}", test_case);
        }
        if let Some(step) = &self.step {
            let _ = writeln!(out, "  step: {}", step);
        }
        if let Some(action) = &self.action {
            let _ = writeln!(out, "  action: {}", action);
        }
        for cause in self.cause_chain() {
            let _ = writeln!(out, "  caused by: {}", cause);
        }
        let _ = writeln!(out, "  correlation id: {}", self.context.correlation_id);

        if !self.context.breadcrumbs.is_empty() {
            let _ = writeln!(out, "  breadcrumbs:");
            for crumb in &self.context.breadcrumbs {
                let _ = writeln!(
                    out,
                    "    - [{}] {}",
                    crumb.timestamp.format("%H:%M:%S%.3f"),
                    crumb.message
                );
            }
        }

        let frames = self.context.stack_frames();
        if !frames.is_empty() {
            let _ = writeln!(out, "  stack trace:");
            for (index, frame) in frames.iter().take(DISPLAYED_STACK_FRAMES).enumerate() {
                let _ = writeln!(out, "    {}: {}", index, frame);
            }
            if frames.len() > DISPLAYED_STACK_FRAMES {
                let _ = writeln!(
                    out,
                    "    ... (truncated, {} more frames)",
                    frames.len() - DISPLAYED_STACK_FRAMES
                );
            }
        }

        out
    }

    /// Ordered key/value summary
    pub fn summary(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("error_type".to_string(), self.error_type.to_string()),
            ("code".to_string(), format!("E{:04}", self.code)),
            ("message".to_string(), self.message.clone()),
            ("severity".to_string(), self.severity.to_string()),
            ("retryable".to_string(), self.retryable.to_string()),
            ("recoverable".to_string(), self.recoverable.to_string()),
            (
                "correlation_id".to_string(),
                self.context.correlation_id.clone(),
            ),
        ];
        if let Some(action) = &self.action {
            fields.push(("action".to_string(), action.clone()));
        }
        if let Some(step) = &self.step {
            fields.push(("step".to_string(), step.clone()));
        }
        if let Some(test_case) = &self.test_case {
            fields.push(("test_case".to_string(), test_case.clone()));
        }
        if let Some(cause) = &self.cause {
            fields.push(("cause".to_string(), cause.to_string()));
        }
        for (key, value) in &self.details {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            fields.push((format!("detail.{}", key), rendered));
        }
        if !self.context.breadcrumbs.is_empty() {
            fields.push((
                "breadcrumbs".to_string(),
                self.context.breadcrumbs.len().to_string(),
            ));
        }
        fields
    }

    /// Summary rendered as `key=value` pairs separated by spaces
    pub fn summary_line(&self) -> String {
        self.summary()
            .into_iter()
            .map(|(k, v)| {
                if v.contains(' ') {
                    format!("{}={:?}", k, v)
                } else {
                    format!("{}={}", k, v)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Emit a structured log event at a level matching the error's severity
    pub fn log(&self) {
        let summary = self.summary_line();
        match self.severity {
            super::Severity::Low | super::Severity::Medium => warn!(
                error_type = %self.error_type,
                correlation_id = %self.context.correlation_id,
                "{}",
                summary
            ),
            super::Severity::High | super::Severity::Critical => error!(
                error_type = %self.error_type,
                correlation_id = %self.context.correlation_id,
                "{}",
                summary
            ),
        }
    }
}
