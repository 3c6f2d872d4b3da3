//! Diagnostic context attached to every error
//!
//! Holds the correlation id, breadcrumbs, variable and environment snapshots and
//! the captured call stack. The raw backtrace is resolved into frames only when
//! it is formatted or serialized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;
use std::collections::BTreeMap;
use std::panic::Location;
use std::sync::Arc;

/// Maximum number of frames kept from a captured backtrace
pub const MAX_STACK_DEPTH: usize = 32;

/// A timestamped note in an error's causal history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl Breadcrumb {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }
}

/// One frame of a captured call stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl StackFrame {
    pub(crate) fn from_location(location: &Location<'_>) -> Self {
        Self {
            function: "<call site>".to_string(),
            file: Some(location.file().to_string()),
            line: Some(location.line()),
        }
    }
}

impl std::fmt::Display for StackFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{} at {}:{}", self.function, file, line),
            (Some(file), None) => write!(f, "{} at {}", self.function, file),
            _ => f.write_str(&self.function),
        }
    }
}

/// Correlation and diagnostic data for an error
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub variables: BTreeMap<String, String>,
    pub environment: BTreeMap<String, String>,
    pub call_site: Option<StackFrame>,
    pub(crate) backtrace: Option<Arc<Backtrace>>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            breadcrumbs: Vec::new(),
            variables: BTreeMap::new(),
            environment: BTreeMap::new(),
            call_site: None,
            backtrace: None,
        }
    }
}

impl ErrorContext {
    /// Call site followed by up to [`MAX_STACK_DEPTH`] resolved backtrace frames
    pub fn stack_frames(&self) -> Vec<StackFrame> {
        let mut frames = Vec::new();
        if let Some(site) = &self.call_site {
            frames.push(site.clone());
        }
        if let Some(bt) = &self.backtrace {
            frames.extend(parse_backtrace(&bt.to_string(), MAX_STACK_DEPTH));
        }
        frames
    }

    pub fn has_stack(&self) -> bool {
        self.call_site.is_some() || self.backtrace.is_some()
    }
}

/// Parse the textual form of a `std::backtrace::Backtrace`
///
/// Frames belonging to the backtrace machinery and to the error builder itself
/// are dropped so the first frame is the code that raised the error.
pub(crate) fn parse_backtrace(text: &str, limit: usize) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(location) = trimmed.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                let (file, line_no) = split_location(location);
                frame.file = Some(file);
                frame.line = line_no;
            }
            continue;
        }

        let Some((index, function)) = trimmed.split_once(": ") else {
            continue;
        };
        if index.parse::<usize>().is_err() {
            continue;
        }
        frames.push(StackFrame {
            function: function.to_string(),
            file: None,
            line: None,
        });
    }

    frames
        .into_iter()
        .filter(|f| !is_internal_frame(&f.function))
        .take(limit)
        .collect()
}

fn split_location(location: &str) -> (String, Option<u32>) {
    // "path/to/file.rs:12:5"
    let mut parts = location.rsplitn(3, ':');
    let _column = parts.next();
    let line = parts.next().and_then(|l| l.parse::<u32>().ok());
    match (line, parts.next()) {
        (Some(line), Some(file)) => (file.to_string(), Some(line)),
        _ => (location.to_string(), None),
    }
}

fn is_internal_frame(function: &str) -> bool {
    function.starts_with("std::backtrace")
        || function.starts_with("<std::backtrace")
        || function.starts_with("robogo::error::builder")
        || function.starts_with("<robogo::error::builder")
}
