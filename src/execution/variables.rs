//! Variable store and `${...}` substitution
//!
//! Supports dotted access into JSON values (`${resp.body.id}`, `${items.0}`),
//! defaults (`${name:-fallback}`) and a `SECRETS.` namespace whose masked
//! values are replaced by `***` in anything shown to the user. Placeholders
//! that cannot be resolved are left in place.

use crate::config::VariablesConfig;
use crate::error::RobogoError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub const SECRETS_PREFIX: &str = "SECRETS.";
pub const MASK: &str = "***";

pub(crate) static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([^}]+)\}").expect("Invalid placeholder regex")
});

#[derive(Debug, Clone)]
struct Secret {
    value: String,
    masked: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: HashMap<String, Value>,
    secrets: HashMap<String, Secret>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the initial scope of a test case, resolving its secrets
    pub fn from_config(config: &VariablesConfig) -> Result<Self, RobogoError> {
        let mut vars = Self {
            values: config.vars.clone(),
            secrets: HashMap::new(),
        };
        for (name, source) in &config.secrets {
            let value = source.resolve(name)?;
            vars.set_secret(name, value, source.mask_output);
        }
        Ok(vars)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn set_secret(&mut self, name: impl Into<String>, value: impl Into<String>, masked: bool) {
        self.secrets.insert(
            name.into(),
            Secret {
                value: value.into(),
                masked,
            },
        );
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Resolve a reference such as `user`, `resp.body.id` or `SECRETS.token`
    pub fn lookup(&self, reference: &str) -> Option<Value> {
        let reference = reference.trim();
        if let Some(secret) = reference.strip_prefix(SECRETS_PREFIX) {
            return self
                .secrets
                .get(secret)
                .map(|s| Value::String(s.value.clone()));
        }
        if let Some(value) = self.values.get(reference) {
            return Some(value.clone());
        }

        let mut segments = reference.split('.');
        let root = self.values.get(segments.next()?)?;
        segments
            .try_fold(root, |current, segment| match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
            .cloned()
    }

    /// Whether `name` (without the `SECRETS.` prefix) is a masked secret;
    /// `None` if no such secret exists
    pub fn is_masked_secret(&self, name: &str) -> Option<bool> {
        self.secrets.get(name).map(|s| s.masked)
    }

    /// Replace every resolvable placeholder in `template`
    pub fn substitute(&self, template: &str) -> String {
        PLACEHOLDER_RE
            .replace_all(template, |caps: &regex::Captures<'_>| {
                match self.resolve_expression(&caps[1]) {
                    Some(value) => render(&value),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Substitute recursively inside a JSON value
    ///
    /// A string that consists of exactly one placeholder is replaced by the
    /// referenced value itself, keeping its JSON type.
    pub fn substitute_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => {
                if let Some(caps) = PLACEHOLDER_RE.captures(s) {
                    if caps[0].len() == s.len() {
                        if let Some(resolved) = self.resolve_expression(&caps[1]) {
                            return resolved;
                        }
                    }
                }
                Value::String(self.substitute(s))
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.substitute_value(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.substitute_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn resolve_expression(&self, expression: &str) -> Option<Value> {
        match expression.split_once(":-") {
            Some((name, default)) => self
                .lookup(name)
                .or_else(|| Some(Value::String(default.to_string()))),
            None => self.lookup(expression),
        }
    }

    /// Values of every secret configured for masking
    pub fn masked_values(&self) -> Vec<String> {
        self.secrets
            .values()
            .filter(|s| s.masked && !s.value.is_empty())
            .map(|s| s.value.clone())
            .collect()
    }

    /// Replace masked secret values in user-visible text
    pub fn mask(&self, text: &str) -> String {
        self.masked_values()
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), MASK))
    }

    /// Mask secret values inside a JSON value
    pub fn mask_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.mask(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.mask_value(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.mask_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Rendered, masked copy of every plain variable for error context
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), self.mask(&render(v))))
            .collect()
    }
}

/// Text form of a value as it appears after substitution
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
