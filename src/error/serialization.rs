use super::{Breadcrumb, ErrorType, RobogoError, Severity, StackFrame};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serializable error representation for JSON output
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SerializableError {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub code: u16,
    pub message: String,
    pub severity: Severity,
    pub retryable: bool,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub details: BTreeMap<String, serde_json::Value>,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub breadcrumbs: Vec<Breadcrumb>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub variables: BTreeMap<String, String>,
    /// Cause chain, nearest cause first
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub causes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub stack: Vec<StackFrame>,
}

impl From<&RobogoError> for SerializableError {
    fn from(error: &RobogoError) -> Self {
        Self {
            error_type: error.error_type,
            code: error.code,
            message: error.message.clone(),
            severity: error.severity,
            retryable: error.retryable,
            recoverable: error.recoverable,
            action: error.action.clone(),
            step: error.step.clone(),
            test_case: error.test_case.clone(),
            details: error.details.clone(),
            correlation_id: error.context.correlation_id.clone(),
            breadcrumbs: error.context.breadcrumbs.clone(),
            variables: error.context.variables.clone(),
            causes: error.cause_chain(),
            stack: error.context.stack_frames(),
        }
    }
}

impl RobogoError {
    /// Convert error to JSON value
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(SerializableError::from(self))
            .unwrap_or_else(|_| serde_json::json!({ "error": "Serialization failed" }))
    }

    /// Convert error to JSON string
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(&SerializableError::from(self))
            .unwrap_or_else(|_| r#"{"error":"Serialization failed"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorBuilder;

    #[test]
    fn test_basic_serialization() {
        let error = ErrorBuilder::new(ErrorType::Configuration, "missing field")
            .without_stack()
            .build();

        let serialized = SerializableError::from(&error);
        assert_eq!(serialized.error_type, ErrorType::Configuration);
        assert_eq!(serialized.code, 1100);
        assert!(serialized.causes.is_empty());
        assert!(serialized.stack.is_empty());
    }

    #[test]
    fn test_to_json_uses_snake_case_names() {
        let error = ErrorBuilder::new(ErrorType::Timeout, "too slow")
            .step("wait")
            .without_stack()
            .build();

        let json = error.to_json();
        assert_eq!(json["type"], "timeout");
        assert_eq!(json["severity"], "medium");
        assert_eq!(json["step"], "wait");
        assert!(json.get("action").is_none());
    }

    #[test]
    fn test_cause_chain_serialized() {
        let inner = RobogoError::network("connection reset");
        let outer = ErrorBuilder::new(ErrorType::Execution, "request failed")
            .cause(inner)
            .build();

        let serialized = SerializableError::from(&outer);
        assert_eq!(serialized.causes.len(), 1);
        assert!(serialized.causes[0].contains("connection reset"));
    }
}
