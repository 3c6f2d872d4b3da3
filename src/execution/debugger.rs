//! Diagnostics for `${...}` placeholder resolution
//!
//! Compares a template with its substituted form to report which references
//! resolved, which came from secrets, and why the rest did not resolve. The
//! report is informational; it never changes the outcome of a step.

use super::variables::{Variables, PLACEHOLDER_RE, SECRETS_PREFIX};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// No variable of that name exists
    NotDefined,
    /// The variable exists but the placeholder survived substitution
    NotSubstituted,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnresolvedReason::NotDefined => "not defined",
            UnresolvedReason::NotSubstituted => "defined but not substituted",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPlaceholder {
    pub name: String,
    pub secret: bool,
    pub masked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedPlaceholder {
    pub name: String,
    pub reason: UnresolvedReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    pub resolved: Vec<ResolvedPlaceholder>,
    pub unresolved: Vec<UnresolvedPlaceholder>,
}

impl ResolutionReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// One line per unresolved placeholder
    pub fn warnings(&self) -> Vec<String> {
        self.unresolved
            .iter()
            .map(|u| format!("variable '{}' is {}", u.name, u.reason))
            .collect()
    }

    /// Log unresolved placeholders against the given step
    pub fn log(&self, step: &str) {
        for warning in self.warnings() {
            warn!("Step '{}': {}", step, warning);
        }
    }

    pub fn merge(&mut self, other: ResolutionReport) {
        self.resolved.extend(other.resolved);
        self.unresolved.extend(other.unresolved);
    }
}

/// Every distinct placeholder expression in `text`, in order of appearance
pub fn extract_placeholders(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    PLACEHOLDER_RE
        .captures_iter(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Classify the placeholders of `original` given its substituted form
pub fn analyze(original: &str, substituted: &str, vars: &Variables) -> ResolutionReport {
    let remaining: HashSet<String> = extract_placeholders(substituted).into_iter().collect();
    let mut report = ResolutionReport::default();

    for name in extract_placeholders(original) {
        if remaining.contains(&name) {
            let reason = if vars.lookup(&name).is_some() {
                UnresolvedReason::NotSubstituted
            } else {
                UnresolvedReason::NotDefined
            };
            report.unresolved.push(UnresolvedPlaceholder { name, reason });
        } else {
            let secret_name = name.strip_prefix(SECRETS_PREFIX);
            let masked = secret_name
                .and_then(|s| vars.is_masked_secret(s))
                .unwrap_or(false);
            report.resolved.push(ResolvedPlaceholder {
                secret: secret_name.is_some(),
                masked,
                name,
            });
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> Variables {
        let mut vars = Variables::new();
        vars.set("user", "ada");
        vars.set_secret("token", "t0k", true);
        vars
    }

    #[test]
    fn test_resolved_and_secret_classification() {
        let vars = vars();
        let original = "${user} uses ${SECRETS.token}";
        let report = analyze(original, &vars.substitute(original), &vars);

        assert!(report.is_complete());
        assert_eq!(
            report.resolved,
            vec![
                ResolvedPlaceholder { name: "user".into(), secret: false, masked: false },
                ResolvedPlaceholder { name: "SECRETS.token".into(), secret: true, masked: true },
            ]
        );
    }

    #[test]
    fn test_not_defined() {
        let vars = vars();
        let report = analyze("${ghost}", "${ghost}", &vars);
        assert_eq!(report.unresolved[0].reason, UnresolvedReason::NotDefined);
        assert_eq!(report.warnings(), vec!["variable 'ghost' is not defined"]);
    }

    #[test]
    fn test_defined_but_not_substituted() {
        let vars = vars();
        let report = analyze("${user}", "${user}", &vars);
        assert_eq!(report.unresolved[0].reason, UnresolvedReason::NotSubstituted);
    }

    #[test]
    fn test_duplicates_reported_once() {
        assert_eq!(extract_placeholders("${a} ${b} ${a}"), vec!["a", "b"]);
    }
}
