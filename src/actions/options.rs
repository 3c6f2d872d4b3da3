//! Field-by-field decoding of action options
//!
//! Each built-in action declares a plain options struct and fills it through
//! an [`OptionReader`], so option names are spelled out once and type errors
//! surface as validation errors naming the offending field.

use crate::error::{common, RobogoError};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

pub struct OptionReader<'a> {
    action: &'a str,
    options: &'a HashMap<String, Value>,
}

impl<'a> OptionReader<'a> {
    pub fn new(action: &'a str, options: &'a HashMap<String, Value>) -> Self {
        Self { action, options }
    }

    pub fn string(&self, key: &str) -> Result<Option<String>, RobogoError> {
        match self.options.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Ok(Some(other.to_string())),
        }
    }

    pub fn bool(&self, key: &str) -> Result<Option<bool>, RobogoError> {
        match self.options.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Some(true)),
                "false" | "no" | "0" => Ok(Some(false)),
                _ => Err(self.invalid(key, "a boolean")),
            },
            Some(_) => Err(self.invalid(key, "a boolean")),
        }
    }

    pub fn i64(&self, key: &str) -> Result<Option<i64>, RobogoError> {
        match self.options.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => as_i64(value)
                .map(Some)
                .ok_or_else(|| self.invalid(key, "an integer")),
        }
    }

    pub fn duration(&self, key: &str) -> Result<Option<Duration>, RobogoError> {
        match self.options.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => as_duration(value)
                .map(Some)
                .ok_or_else(|| self.invalid(key, "a duration")),
        }
    }

    fn invalid(&self, key: &str, expected: &str) -> RobogoError {
        common::invalid_argument(
            self.action,
            format!("{}: option '{}' must be {}", self.action, key, expected),
        )
    }
}

/// Integer view of a number or numeric string
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Duration from seconds (number) or a humantime string such as `250ms`
pub fn as_duration(value: &Value) -> Option<Duration> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64),
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<f64>() {
                Ok(secs) if secs.is_finite() && secs >= 0.0 => Some(Duration::from_secs_f64(secs)),
                Ok(_) => None,
                Err(_) => humantime_serde::re::humantime::parse_duration(s).ok(),
            }
        }
        _ => None,
    }
}
