//! Built-in actions
//!
//! `log`, `sleep`, `get_time`, `get_random`, `length`, `concat`, `assert` and
//! `fail`. Each decodes its options into a dedicated struct.

use super::options::{as_duration, as_i64, OptionReader};
use super::{Action, ActionRegistry};
use crate::error::{common, ErrorBuilder, ErrorType, Result};
use crate::execution::condition;
use crate::execution::variables::render;
use crate::execution::ExecutionContext;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub fn register_all(registry: &mut ActionRegistry) {
    registry.register(Arc::new(LogAction));
    registry.register(Arc::new(SleepAction));
    registry.register(Arc::new(GetTimeAction));
    registry.register(Arc::new(GetRandomAction));
    registry.register(Arc::new(LengthAction));
    registry.register(Arc::new(ConcatAction));
    registry.register(Arc::new(AssertAction));
    registry.register(Arc::new(FailAction));
}

fn joined(args: &[Value]) -> String {
    args.iter().map(render).collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Debug,
    Info,
    Warn,
}

struct LogOptions {
    level: LogLevel,
}

impl LogOptions {
    fn decode(options: &HashMap<String, Value>) -> Result<Self> {
        let reader = OptionReader::new("log", options);
        let level = match reader.string("level")?.as_deref() {
            None | Some("info") => LogLevel::Info,
            Some("debug") => LogLevel::Debug,
            Some("warn") | Some("warning") => LogLevel::Warn,
            Some(other) => {
                return Err(common::invalid_argument(
                    "log",
                    format!("log: unknown level '{}'", other),
                ))
            }
        };
        Ok(Self { level })
    }
}

/// Log the space-joined arguments and return them as a string
pub struct LogAction;

#[async_trait]
impl Action for LogAction {
    fn name(&self) -> &str {
        "log"
    }

    fn description(&self) -> &str {
        "Log a message"
    }

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        args: &[Value],
        options: &HashMap<String, Value>,
    ) -> Result<Value> {
        let opts = LogOptions::decode(options)?;
        let message = joined(args);
        match opts.level {
            LogLevel::Debug => debug!("{}", message),
            LogLevel::Info => info!("{}", message),
            LogLevel::Warn => warn!("{}", message),
        }
        Ok(Value::String(message))
    }
}

/// Sleep for the duration given as first argument
pub struct SleepAction;

#[async_trait]
impl Action for SleepAction {
    fn name(&self) -> &str {
        "sleep"
    }

    fn description(&self) -> &str {
        "Pause for a duration (seconds or 250ms style)"
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: &[Value],
        _options: &HashMap<String, Value>,
    ) -> Result<Value> {
        let arg = args
            .first()
            .ok_or_else(|| common::missing_argument("sleep", "duration"))?;
        let duration = as_duration(arg).ok_or_else(|| {
            common::invalid_argument("sleep", format!("sleep: invalid duration {}", arg))
        })?;
        ctx.sleep(duration, "sleep").await?;
        Ok(Value::from(duration.as_millis() as u64))
    }
}

struct TimeOptions {
    format: String,
}

impl TimeOptions {
    fn decode(args: &[Value], options: &HashMap<String, Value>) -> Result<Self> {
        let reader = OptionReader::new("get_time", options);
        let format = match args.first() {
            Some(arg) => render(arg),
            None => reader.string("format")?.unwrap_or_else(|| "iso".to_string()),
        };
        Ok(Self { format })
    }
}

/// Current time as RFC 3339, unix seconds, unix millis or a strftime pattern
pub struct GetTimeAction;

#[async_trait]
impl Action for GetTimeAction {
    fn name(&self) -> &str {
        "get_time"
    }

    fn description(&self) -> &str {
        "Current time (iso, unix, unix_ms or strftime pattern)"
    }

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        args: &[Value],
        options: &HashMap<String, Value>,
    ) -> Result<Value> {
        let opts = TimeOptions::decode(args, options)?;
        let now = Utc::now();
        let value = match opts.format.as_str() {
            "iso" | "rfc3339" => Value::String(now.to_rfc3339()),
            "unix" => Value::from(now.timestamp()),
            "unix_ms" => Value::from(now.timestamp_millis()),
            pattern => {
                use std::fmt::Write;
                let mut formatted = String::new();
                write!(formatted, "{}", now.format(pattern)).map_err(|_| {
                    common::invalid_argument(
                        "get_time",
                        format!("get_time: invalid format '{}'", pattern),
                    )
                })?;
                Value::String(formatted)
            }
        };
        Ok(value)
    }
}

struct RandomOptions {
    min: i64,
    max: i64,
}

impl RandomOptions {
    fn decode(args: &[Value], options: &HashMap<String, Value>) -> Result<Self> {
        let reader = OptionReader::new("get_random", options);
        let positional: Vec<i64> = args
            .iter()
            .map(|a| {
                as_i64(a).ok_or_else(|| {
                    common::invalid_argument("get_random", format!("get_random: {} is not an integer", a))
                })
            })
            .collect::<Result<_>>()?;

        let (min, max) = match positional.as_slice() {
            [] => (
                reader.i64("min")?.unwrap_or(0),
                reader.i64("max")?.unwrap_or(100),
            ),
            [max] => (0, *max),
            [min, max, ..] => (*min, *max),
        };
        if min > max {
            return Err(common::invalid_argument(
                "get_random",
                format!("get_random: min {} exceeds max {}", min, max),
            ));
        }
        Ok(Self { min, max })
    }
}

/// Random integer in `[min, max]`
pub struct GetRandomAction;

#[async_trait]
impl Action for GetRandomAction {
    fn name(&self) -> &str {
        "get_random"
    }

    fn description(&self) -> &str {
        "Random integer between min and max (inclusive)"
    }

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        args: &[Value],
        options: &HashMap<String, Value>,
    ) -> Result<Value> {
        let opts = RandomOptions::decode(args, options)?;
        let value = rand::rng().random_range(opts.min..=opts.max);
        Ok(Value::from(value))
    }
}

/// Length of a string (in characters), array or object
pub struct LengthAction;

#[async_trait]
impl Action for LengthAction {
    fn name(&self) -> &str {
        "length"
    }

    fn description(&self) -> &str {
        "Length of a string, array or object"
    }

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        args: &[Value],
        _options: &HashMap<String, Value>,
    ) -> Result<Value> {
        let value = args
            .first()
            .ok_or_else(|| common::missing_argument("length", "value"))?;
        let length = match value {
            Value::String(s) => s.chars().count(),
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            Value::Null => 0,
            other => {
                return Err(common::invalid_argument(
                    "length",
                    format!("length: {} has no length", other),
                ))
            }
        };
        Ok(Value::from(length as u64))
    }
}

/// Concatenate the rendered arguments
pub struct ConcatAction;

#[async_trait]
impl Action for ConcatAction {
    fn name(&self) -> &str {
        "concat"
    }

    fn description(&self) -> &str {
        "Concatenate arguments into one string"
    }

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        args: &[Value],
        _options: &HashMap<String, Value>,
    ) -> Result<Value> {
        Ok(Value::String(args.iter().map(render).collect()))
    }
}

struct AssertOptions {
    message: Option<String>,
}

impl AssertOptions {
    fn decode(options: &HashMap<String, Value>) -> Result<Self> {
        let reader = OptionReader::new("assert", options);
        Ok(Self {
            message: reader.string("message")?,
        })
    }
}

/// Assert an expression (`["${x} > 1"]`) or a triple (`[actual, op, expected]`)
pub struct AssertAction;

#[async_trait]
impl Action for AssertAction {
    fn name(&self) -> &str {
        "assert"
    }

    fn description(&self) -> &str {
        "Fail unless the given condition holds"
    }

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        args: &[Value],
        options: &HashMap<String, Value>,
    ) -> Result<Value> {
        let opts = AssertOptions::decode(options)?;
        let expression = match args {
            [] => return Err(common::missing_argument("assert", "condition")),
            [single] => render(single),
            [actual, op, expected, ..] => format!(
                "'{}' {} '{}'",
                render(actual),
                render(op),
                render(expected)
            ),
            _ => {
                return Err(common::invalid_argument(
                    "assert",
                    "assert: expected a condition or [actual, operator, expected]",
                ))
            }
        };

        if condition::evaluate(&expression)? {
            Ok(Value::Bool(true))
        } else {
            let message = opts
                .message
                .unwrap_or_else(|| format!("assertion failed: {}", expression));
            Err(ErrorBuilder::new(ErrorType::Assertion, message)
                .action("assert")
                .detail("expression", expression)
                .build())
        }
    }
}

struct FailOptions {
    error_type: ErrorType,
    retryable: Option<bool>,
}

impl FailOptions {
    fn decode(options: &HashMap<String, Value>) -> Result<Self> {
        let reader = OptionReader::new("fail", options);
        let error_type = match reader.string("type")? {
            Some(name) => ErrorType::parse(&name).ok_or_else(|| {
                common::invalid_argument("fail", format!("fail: unknown error type '{}'", name))
            })?,
            None => ErrorType::Execution,
        };
        Ok(Self {
            error_type,
            retryable: reader.bool("retryable")?,
        })
    }
}

/// Always fail with the given message and error type
pub struct FailAction;

#[async_trait]
impl Action for FailAction {
    fn name(&self) -> &str {
        "fail"
    }

    fn description(&self) -> &str {
        "Fail with a message (option `type` selects the error type)"
    }

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        args: &[Value],
        options: &HashMap<String, Value>,
    ) -> Result<Value> {
        let opts = FailOptions::decode(options)?;
        let message = if args.is_empty() {
            "step failed".to_string()
        } else {
            joined(args)
        };
        let mut builder = ErrorBuilder::new(opts.error_type, message).action("fail");
        if let Some(retryable) = opts.retryable {
            builder = builder.retryable(retryable);
        }
        Err(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RobogoError;
    use serde_json::json;
    use std::time::Duration;

    fn millis(value: &Value) -> Option<Duration> {
        value.as_u64().map(Duration::from_millis)
    }

    async fn run(action: &dyn Action, args: Vec<Value>) -> Result<Value> {
        action
            .execute(&ExecutionContext::new(), &args, &HashMap::new())
            .await
    }

    async fn run_with(
        action: &dyn Action,
        args: Vec<Value>,
        options: Vec<(&str, Value)>,
    ) -> Result<Value> {
        let options = options
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        action
            .execute(&ExecutionContext::new(), &args, &options)
            .await
    }

    #[tokio::test]
    async fn test_log_joins_arguments() {
        let out = run(&LogAction, vec![json!("hello"), json!(42)]).await.unwrap();
        assert_eq!(out, json!("hello 42"));

        let err = run_with(&LogAction, vec![json!("x")], vec![("level", json!("loud"))])
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_accepts_humantime() {
        let out = run(&SleepAction, vec![json!("250ms")]).await.unwrap();
        assert_eq!(millis(&out), Some(Duration::from_millis(250)));
        assert!(run(&SleepAction, vec![]).await.is_err());
    }

    #[tokio::test]
    async fn test_sleep_observes_cancellation() {
        let ctx = ExecutionContext::new();
        ctx.cancel();
        let err = SleepAction
            .execute(&ctx, &[json!(30)], &HashMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Timeout);
    }

    #[tokio::test]
    async fn test_get_time_formats() {
        assert!(run(&GetTimeAction, vec![]).await.unwrap().is_string());
        assert!(run(&GetTimeAction, vec![json!("unix")]).await.unwrap().is_i64());
        let year = run(&GetTimeAction, vec![json!("%Y")]).await.unwrap();
        assert_eq!(year.as_str().map(str::len), Some(4));
    }

    #[tokio::test]
    async fn test_get_random_bounds() {
        for _ in 0..20 {
            let v = run(&GetRandomAction, vec![json!(5), json!(7)]).await.unwrap();
            let v = v.as_i64().unwrap();
            assert!((5..=7).contains(&v));
        }
        assert!(run(&GetRandomAction, vec![json!(9), json!(1)]).await.is_err());
        let v = run_with(&GetRandomAction, vec![], vec![("min", json!(3)), ("max", json!(3))])
            .await
            .unwrap();
        assert_eq!(v, json!(3));
    }

    #[tokio::test]
    async fn test_length() {
        assert_eq!(run(&LengthAction, vec![json!("héllo")]).await.unwrap(), json!(5));
        assert_eq!(run(&LengthAction, vec![json!([1, 2])]).await.unwrap(), json!(2));
        assert!(run(&LengthAction, vec![json!(3)]).await.is_err());
    }

    #[tokio::test]
    async fn test_concat() {
        let out = run(&ConcatAction, vec![json!("a"), json!(1), json!(true)]).await.unwrap();
        assert_eq!(out, json!("a1true"));
    }

    #[tokio::test]
    async fn test_assert_forms() {
        assert!(run(&AssertAction, vec![json!("2 > 1")]).await.is_ok());
        assert!(run(&AssertAction, vec![json!(200), json!("=="), json!(200)]).await.is_ok());

        let err = run_with(
            &AssertAction,
            vec![json!("a"), json!("=="), json!("b")],
            vec![("message", json!("values differ"))],
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Assertion);
        assert_eq!(err.message(), "values differ");
    }

    #[tokio::test]
    async fn test_fail_uses_type_and_override() {
        let err = run_with(
            &FailAction,
            vec![json!("upstream"), json!("down")],
            vec![("type", json!("network")), ("retryable", json!(false))],
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Network);
        assert_eq!(err.message(), "upstream down");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unused_error_type_rejected() {
        let mut options = HashMap::new();
        options.insert("type".to_string(), json!("cosmic"));
        let err: RobogoError = FailOptions::decode(&options).err().unwrap();
        assert_eq!(err.error_type(), ErrorType::Validation);
    }
}
