//! Retry, backoff, circuit breaker and recovery behavior through the public API

use robogo::config::{
    BackoffStrategy, CircuitBreakerConfig, RecoveryConfig, RecoveryStrategy, RetryConfig,
};
use robogo::error::RobogoError;
use robogo::execution::{
    calculate_delay, BreakerRegistry, CircuitBreaker, CircuitState, ExecutionContext, Recovered,
    RecoveryExecutor, RetryExecutor,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn breaker_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: 2,
        success_threshold: 1,
        timeout: Duration::from_secs(10),
        max_requests: 1,
    }
}

#[test]
fn test_backoff_strategies() {
    let base = Duration::from_secs(1);
    assert_eq!(
        calculate_delay(base, 3, BackoffStrategy::Exponential, Duration::ZERO, false),
        Duration::from_secs(4)
    );
    assert_eq!(
        calculate_delay(base, 3, BackoffStrategy::Linear, Duration::ZERO, false),
        Duration::from_secs(3)
    );
    assert_eq!(
        calculate_delay(base, 3, BackoffStrategy::Fixed, Duration::ZERO, false),
        base
    );
    assert_eq!(
        calculate_delay(base, 10, BackoffStrategy::Exponential, Duration::from_secs(30), false),
        Duration::from_secs(30)
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_gives_up_after_attempts() {
    let config = RetryConfig {
        attempts: 3,
        delay: Duration::from_millis(100),
        backoff: BackoffStrategy::Exponential,
        ..Default::default()
    };
    let calls = AtomicU32::new(0);
    let executor = RetryExecutor::from_config("flaky", &config);

    let (result, metrics) = executor
        .execute_with_metrics(&ExecutionContext::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(RobogoError::network("connection refused").with_retryable(true)) }
        })
        .await;

    let err = result.unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(err.detail("attempts"), Some(&serde_json::json!(3)));
    assert_eq!(metrics.retries, 2);
    assert_eq!(metrics.total_delay, Duration::from_millis(300));
    assert!(!metrics.succeeded);
}

#[tokio::test(start_paused = true)]
async fn test_retry_stops_on_non_retryable_error() {
    let calls = AtomicU32::new(0);
    let executor = RetryExecutor::from_config("strict", &RetryConfig::default());

    let result = executor
        .execute(&ExecutionContext::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(RobogoError::validation("bad input")) }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_circuit_breaker_lifecycle() {
    let ctx = ExecutionContext::new();
    let breaker = CircuitBreaker::new("payments", breaker_config());

    for _ in 0..2 {
        let result = breaker
            .execute(&ctx, || async { Err::<(), _>(RobogoError::network("down")) })
            .await;
        assert!(result.is_err());
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    let rejected = breaker.execute(&ctx, || async { Ok::<_, RobogoError>(()) }).await;
    assert!(rejected.unwrap_err().to_string().contains("is open"));
    assert_eq!(breaker.metrics().rejected_requests, 1);

    tokio::time::advance(Duration::from_secs(10)).await;
    let trial = breaker.execute(&ctx, || async { Ok::<_, RobogoError>(7) }).await;
    assert_eq!(trial.unwrap(), 7);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_failure_reopens() {
    let ctx = ExecutionContext::new();
    let breaker = CircuitBreaker::new("search", breaker_config());
    for _ in 0..2 {
        let _ = breaker
            .execute(&ctx, || async { Err::<(), _>(RobogoError::network("down")) })
            .await;
    }

    tokio::time::advance(Duration::from_secs(11)).await;
    let _ = breaker
        .execute(&ctx, || async { Err::<(), _>(RobogoError::network("still down")) })
        .await;
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test]
async fn test_circuit_recovery_shares_breaker_by_name() {
    let registry = BreakerRegistry::new();
    let config = RecoveryConfig {
        strategy: RecoveryStrategy::Circuit,
        circuit_breaker: Some(CircuitBreakerConfig {
            failure_threshold: 1,
            ..breaker_config()
        }),
        ..Default::default()
    };
    let calls = AtomicU32::new(0);
    let ctx = ExecutionContext::new();

    for _ in 0..2 {
        let executor = RecoveryExecutor::new("http_get", &config, &registry);
        let (result, _) = executor
            .execute(&ctx, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(RobogoError::network("unreachable")) }
            })
            .await;
        assert!(result.is_err());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let snapshot = registry.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].state, CircuitState::Open);
}

#[tokio::test]
async fn test_skip_recovery_swallows_error() {
    let registry = BreakerRegistry::new();
    let config = RecoveryConfig {
        strategy: RecoveryStrategy::Skip,
        skip_on_error: true,
        ..Default::default()
    };
    let executor = RecoveryExecutor::new("cleanup", &config, &registry);

    let (result, metrics) = executor
        .execute(&ExecutionContext::new(), || async {
            Err::<(), _>(RobogoError::execution("nothing to clean"))
        })
        .await;

    assert!(matches!(result, Ok(Recovered::Skipped(_))));
    assert!(metrics.is_none());
}
