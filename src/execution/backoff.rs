//! Retry delay calculation

use crate::config::BackoffStrategy;
use rand::Rng;
use std::time::Duration;

/// Delay before the retry following attempt `attempt` (1-based)
///
/// The strategy result is capped at `max_delay` (zero means uncapped) before
/// jitter is applied. Jitter only ever adds, by less than a quarter of the
/// capped delay.
pub fn calculate_delay(
    base: Duration,
    attempt: u32,
    strategy: BackoffStrategy,
    max_delay: Duration,
    jitter: bool,
) -> Duration {
    let delay = capped_delay(base, attempt, strategy, max_delay);
    if jitter {
        add_jitter(delay)
    } else {
        delay
    }
}

/// Strategy delay with the cap applied, without jitter
pub fn capped_delay(
    base: Duration,
    attempt: u32,
    strategy: BackoffStrategy,
    max_delay: Duration,
) -> Duration {
    let attempt = attempt.max(1);
    let raw = match strategy {
        BackoffStrategy::Fixed => base,
        BackoffStrategy::Linear => base.saturating_mul(attempt),
        BackoffStrategy::Exponential => {
            let factor = 2u32.checked_pow(attempt - 1).unwrap_or(u32::MAX);
            base.saturating_mul(factor)
        }
    };

    if max_delay.is_zero() {
        raw
    } else {
        raw.min(max_delay)
    }
}

/// Add a uniformly random amount in `[0, delay / 4)`
pub fn add_jitter(delay: Duration) -> Duration {
    let quarter = u64::try_from((delay / 4).as_nanos()).unwrap_or(u64::MAX);
    if quarter == 0 {
        return delay;
    }
    let extra = rand::rng().random_range(0..quarter);
    delay.saturating_add(Duration::from_nanos(extra))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_exponential_third_attempt() {
        let delay = calculate_delay(SECOND, 3, BackoffStrategy::Exponential, Duration::ZERO, false);
        assert_eq!(delay, Duration::from_secs(4));
    }

    #[test]
    fn test_strategies() {
        let none = Duration::ZERO;
        assert_eq!(capped_delay(SECOND, 5, BackoffStrategy::Fixed, none), SECOND);
        assert_eq!(
            capped_delay(SECOND, 5, BackoffStrategy::Linear, none),
            Duration::from_secs(5)
        );
        assert_eq!(capped_delay(SECOND, 1, BackoffStrategy::Exponential, none), SECOND);
    }

    #[test]
    fn test_cap_applies_before_jitter() {
        let cap = Duration::from_secs(10);
        assert_eq!(capped_delay(SECOND, 8, BackoffStrategy::Exponential, cap), cap);

        for _ in 0..50 {
            let delay = calculate_delay(SECOND, 8, BackoffStrategy::Exponential, cap, true);
            assert!(delay >= cap);
            assert!(delay < cap + cap / 4);
        }
    }

    #[test]
    fn test_huge_attempt_saturates() {
        let delay = capped_delay(SECOND, 200, BackoffStrategy::Exponential, Duration::ZERO);
        assert!(delay >= Duration::from_secs(u32::MAX as u64));
    }

    #[test]
    fn test_zero_delay_has_no_jitter() {
        assert_eq!(add_jitter(Duration::ZERO), Duration::ZERO);
    }
}
