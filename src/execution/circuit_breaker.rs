//! Three-state circuit breaker
//!
//! `closed` passes requests and counts consecutive failures; reaching the
//! failure threshold opens the circuit. `open` rejects everything until the
//! timeout has elapsed since the last failure, then admits the next request
//! as a `half_open` trial. `half_open` admits up to `max_requests` trials;
//! any failure reopens the circuit and `success_threshold` successes close it.
//!
//! State lives behind a mutex that is only held for bookkeeping, never across
//! the protected operation.

use super::context::ExecutionContext;
use crate::config::CircuitBreakerConfig;
use crate::error::{common, wrap_error, BoxError, ErrorType, RobogoError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        })
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    successes: u32,
    half_open_requests: u32,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
    total_requests: u64,
    rejected_requests: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            half_open_requests: 0,
            last_failure: None,
            last_failure_at: None,
            total_requests: 0,
            rejected_requests: 0,
        }
    }
}

/// Point-in-time view of a breaker's counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitMetrics {
    pub name: String,
    pub state: CircuitState,
    pub failures: u32,
    pub successes: u32,
    pub total_requests: u64,
    pub rejected_requests: u64,
    pub last_failure: Option<DateTime<Utc>>,
    /// Requested elsewhere in the run with a different configuration
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub config_conflict: bool,
}

impl fmt::Display for CircuitMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "circuit '{}': state={} failures={} successes={} requests={} rejected={}",
            self.name,
            self.state,
            self.failures,
            self.successes,
            self.total_requests,
            self.rejected_requests
        )?;
        match self.last_failure {
            Some(at) => write!(f, " last_failure={}", at.to_rfc3339()),
            None => write!(f, " last_failure=never"),
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn metrics(&self) -> CircuitMetrics {
        let inner = self.lock();
        CircuitMetrics {
            name: self.name.clone(),
            state: inner.state,
            failures: inner.failures,
            successes: inner.successes,
            total_requests: inner.total_requests,
            rejected_requests: inner.rejected_requests,
            last_failure: inner.last_failure_at,
            config_conflict: false,
        }
    }

    /// Run `operation` if the circuit admits it, recording the outcome
    pub async fn execute<F, Fut, T, E>(
        &self,
        ctx: &ExecutionContext,
        operation: F,
    ) -> Result<T, RobogoError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        ctx.check(&self.name)?;
        self.try_acquire()?;

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(wrap_error(
                    err,
                    ErrorType::Execution,
                    format!("circuit '{}' recorded a failure", self.name),
                    None,
                ))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_acquire(&self) -> Result<(), RobogoError> {
        let mut inner = self.lock();
        inner.total_requests += 1;

        let state = inner.state;
        match state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure
                    .map_or(true, |at| at.elapsed() >= self.config.timeout);
                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_requests = 1;
                    inner.successes = 0;
                    info!("Circuit breaker '{}' half-open, probing", self.name);
                    Ok(())
                } else {
                    inner.rejected_requests += 1;
                    Err(
                        common::circuit_open(&self.name, "rejecting requests until cool-down elapses")
                            .with_detail("failures", inner.failures),
                    )
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_requests < self.config.max_requests {
                    inner.half_open_requests += 1;
                    Ok(())
                } else {
                    inner.rejected_requests += 1;
                    Err(common::circuit_open(&self.name, "half-open trial limit reached"))
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        let state = inner.state;
        match state {
            CircuitState::Closed => inner.failures = 0,
            CircuitState::HalfOpen => {
                inner.successes += 1;
                if inner.successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    inner.successes = 0;
                    inner.half_open_requests = 0;
                    info!("Circuit breaker '{}' closed", self.name);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        inner.failures += 1;
        inner.last_failure = Some(Instant::now());
        inner.last_failure_at = Some(Utc::now());

        let state = inner.state;
        match state {
            CircuitState::Closed if inner.failures >= self.config.failure_threshold => {
                inner.state = CircuitState::Open;
                warn!(
                    "Circuit breaker '{}' opened after {} failures",
                    self.name, inner.failures
                );
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.successes = 0;
                warn!("Circuit breaker '{}' reopened by a failed trial request", self.name);
            }
            _ => {}
        }
    }
}

#[derive(Debug, Default)]
struct Registered {
    breakers: HashMap<String, Arc<CircuitBreaker>>,
    conflicts: BTreeSet<String>,
}

/// Breakers shared per protected operation for a whole run
///
/// The first configuration registered under a name wins. Later requests with
/// a different configuration share that breaker and are reported as conflicts.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    registered: Mutex<Registered>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing breaker for `name`, or a new one built from `config`
    pub fn get_or_create(&self, name: &str, config: &CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        let mut registered = self.registered.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = registered.breakers.get(name).cloned() {
            if existing.config != *config && registered.conflicts.insert(name.to_string()) {
                warn!(
                    "Circuit breaker '{}' already exists with {:?}; ignoring conflicting {:?}",
                    name, existing.config, config
                );
            }
            return existing;
        }

        debug!("Creating circuit breaker '{}'", name);
        let breaker = Arc::new(CircuitBreaker::new(name, config.clone()));
        registered.breakers.insert(name.to_string(), Arc::clone(&breaker));
        breaker
    }

    /// Names requested with a configuration different from the registered one
    pub fn conflicts(&self) -> Vec<String> {
        let registered = self.registered.lock().unwrap_or_else(PoisonError::into_inner);
        registered.conflicts.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> Vec<CircuitMetrics> {
        let registered = self.registered.lock().unwrap_or_else(PoisonError::into_inner);
        let mut metrics: Vec<_> = registered
            .breakers
            .values()
            .map(|b| CircuitMetrics {
                config_conflict: registered.conflicts.contains(&b.name),
                ..b.metrics()
            })
            .collect();
        metrics.sort_by(|a, b| a.name.cmp(&b.name));
        metrics
    }
}
