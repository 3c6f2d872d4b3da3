//! Matching of actual failures against a step's `expect_error`

use crate::config::{ErrorMatcher, ExpectError, MatchType};
use crate::error::{ErrorBuilder, ErrorType, RobogoError};
use regex::Regex;

/// Check an action outcome against an expectation
///
/// `Ok(())` means the expectation holds and the step passes. A successful
/// action never satisfies an expectation.
pub fn check_expectation(expect: &ExpectError, error: Option<&RobogoError>) -> Result<(), RobogoError> {
    let matcher = match expect {
        ExpectError::Message(message) => ErrorMatcher {
            match_type: MatchType::Contains,
            message: message.clone(),
            error_type: None,
        },
        ExpectError::Matcher(matcher) => matcher.clone(),
    };

    let Some(error) = error else {
        return Err(ErrorBuilder::new(
            ErrorType::Assertion,
            format!(
                "expected an error ({} '{}') but the step succeeded",
                describe(matcher.match_type),
                matcher.message
            ),
        )
        .without_stack()
        .build());
    };

    if let Some(expected_type) = matcher.error_type {
        if !error.has_type(expected_type) {
            return Err(mismatch(
                format!(
                    "expected error of type {} but got {}",
                    expected_type,
                    error.error_type()
                ),
                error,
            ));
        }
    }

    if message_matches(&matcher, error.message())? {
        Ok(())
    } else {
        Err(mismatch(
            format!(
                "error '{}' does not satisfy {} '{}'",
                error.message(),
                describe(matcher.match_type),
                matcher.message
            ),
            error,
        ))
    }
}

fn message_matches(matcher: &ErrorMatcher, actual: &str) -> Result<bool, RobogoError> {
    let expected = matcher.message.as_str();
    let matched = match matcher.match_type {
        MatchType::Any => true,
        MatchType::Contains => actual.contains(expected),
        MatchType::NotContains => !actual.contains(expected),
        MatchType::Exact => actual == expected,
        MatchType::StartsWith => actual.starts_with(expected),
        MatchType::EndsWith => actual.ends_with(expected),
        MatchType::Matches => Regex::new(expected)?.is_match(actual),
        MatchType::NotMatches => !Regex::new(expected)?.is_match(actual),
    };
    Ok(matched)
}

fn mismatch(message: String, actual: &RobogoError) -> RobogoError {
    ErrorBuilder::new(ErrorType::Assertion, message)
        .cause(actual.clone())
        .without_stack()
        .build()
}

fn describe(match_type: MatchType) -> &'static str {
    match match_type {
        MatchType::Any => "any",
        MatchType::Contains => "contains",
        MatchType::Matches => "matches",
        MatchType::Exact => "exact",
        MatchType::StartsWith => "starts_with",
        MatchType::EndsWith => "ends_with",
        MatchType::NotContains => "not_contains",
        MatchType::NotMatches => "not_matches",
    }
}
