//! Evaluation of `if` / `while` / `skip` / `assert` expressions
//!
//! Expressions are evaluated after variable substitution. Supported forms:
//! `||`, `&&`, `!`, parentheses, the comparisons `==`, `!=`, `>`, `<`, `>=`,
//! `<=`, the word operators `contains`, `starts_with`, `ends_with`, and the
//! truthiness of a bare operand. Comparisons are numeric when both sides
//! parse as numbers and lexical otherwise.

use crate::error::RobogoError;
use std::cmp::Ordering;

const SYMBOL_OPERATORS: [&str; 6] = [">=", "<=", "==", "!=", ">", "<"];
const WORD_OPERATORS: [&str; 3] = ["contains", "starts_with", "ends_with"];

/// Evaluate a substituted expression to a boolean
pub fn evaluate(expression: &str) -> Result<bool, RobogoError> {
    let expr = expression.trim();
    if expr.is_empty() {
        return Err(RobogoError::validation("empty condition expression"));
    }

    if let Some(parts) = split_top_level(expr, "||") {
        for part in parts {
            if evaluate(part)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    if let Some(parts) = split_top_level(expr, "&&") {
        for part in parts {
            if !evaluate(part)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }
    if let Some(inner) = strip_outer_parens(expr) {
        return evaluate(inner);
    }
    if let Some(rest) = expr.strip_prefix('!') {
        if !rest.starts_with('=') {
            return evaluate(rest).map(|b| !b);
        }
    }

    match find_operator(expr) {
        Some((index, op)) => {
            let left = unquote(expr[..index].trim());
            let right = unquote(expr[index + op.len()..].trim());
            compare(left, op, right)
        }
        None => Ok(is_truthy(unquote(expr))),
    }
}

/// Truthiness of a bare operand
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty()
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("null")
        || value.eq_ignore_ascii_case("no")
        || value == "0")
}

fn compare(left: &str, op: &str, right: &str) -> Result<bool, RobogoError> {
    let ordering = match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(l), Ok(r)) => l.partial_cmp(&r),
        _ => Some(left.cmp(right)),
    };

    let result = match op {
        "==" => ordering == Some(Ordering::Equal),
        "!=" => ordering != Some(Ordering::Equal),
        ">" => ordering == Some(Ordering::Greater),
        "<" => ordering == Some(Ordering::Less),
        ">=" => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        "<=" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        "contains" => left.contains(right),
        "starts_with" => left.starts_with(right),
        "ends_with" => left.ends_with(right),
        other => {
            return Err(RobogoError::validation(format!(
                "unsupported operator '{}'",
                other
            )))
        }
    };
    Ok(result)
}

/// Byte offsets of characters outside quotes and at parenthesis depth zero
fn top_level_positions(expr: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;

    for (i, c) in expr.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth -= 1,
            (None, _) if depth == 0 => positions.push(i),
            _ => {}
        }
    }
    positions
}

fn split_top_level<'a>(expr: &'a str, separator: &str) -> Option<Vec<&'a str>> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut skip_until = 0;

    for i in top_level_positions(expr) {
        if i < skip_until {
            continue;
        }
        if expr[i..].starts_with(separator) {
            parts.push(&expr[start..i]);
            start = i + separator.len();
            skip_until = start;
        }
    }
    if parts.is_empty() {
        return None;
    }
    parts.push(&expr[start..]);
    Some(parts)
}

fn strip_outer_parens(expr: &str) -> Option<&str> {
    let inner = expr.strip_prefix('(')?.strip_suffix(')')?;
    // "(a) == (b)" starts and ends with parens that do not pair up
    let mut depth = 0i32;
    for c in inner.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    Some(inner)
}

fn find_operator(expr: &str) -> Option<(usize, &'static str)> {
    for i in top_level_positions(expr) {
        let rest = &expr[i..];
        if let Some(op) = SYMBOL_OPERATORS.iter().find(|op| rest.starts_with(*op)) {
            return Some((i, *op));
        }
        let preceded_by_space = expr[..i].ends_with(char::is_whitespace);
        if preceded_by_space {
            for op in WORD_OPERATORS {
                if rest.starts_with(op) && rest[op.len()..].starts_with(char::is_whitespace) {
                    return Some((i, op));
                }
            }
        }
    }
    None
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for q in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(q).and_then(|v| v.strip_suffix(q)) {
            return inner;
        }
    }
    value
}
