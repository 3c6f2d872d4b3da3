//! Property-based tests for grouping and backoff

#[cfg(test)]
mod tests {
    use crate::config::{BackoffStrategy, ParallelConfig, Step};
    use crate::execution::backoff::{add_jitter, calculate_delay};
    use crate::execution::dependency::{can_steps_run_in_parallel, group_steps, variable_references};
    use proptest::prelude::*;
    use std::time::Duration;

    fn arb_step() -> impl Strategy<Value = Step> {
        let actions = prop::sample::select(vec!["log", "sleep", "get_time", "http", "assert", "postgres"]);
        let vars = prop::sample::select(vec!["a", "b", "c"]);
        (
            "[a-z]{1,6}",
            actions,
            prop::collection::vec(vars.clone(), 0..3),
            prop::option::of(vars),
            any::<bool>(),
        )
            .prop_map(|(name, action, refs, result, continue_on_failure)| {
                let args: Vec<String> = refs.iter().map(|r| format!("${{{}}}", r)).collect();
                let mut step = Step::new(name, action).with_args(args);
                if let Some(result) = result {
                    step = step.with_result(result);
                }
                step.continue_on_failure = continue_on_failure;
                step
            })
    }

    // Property test: parallel compatibility is symmetric
    proptest! {
        #[test]
        fn test_parallel_relation_symmetric(a in arb_step(), b in arb_step()) {
            let config = ParallelConfig::enabled_with(4);
            prop_assert_eq!(
                can_steps_run_in_parallel(&a, &b, &config),
                can_steps_run_in_parallel(&b, &a, &config)
            );
        }
    }

    // Property test: grouping covers every step once, in order, and never
    // puts a producer and its consumer in the same group
    proptest! {
        #[test]
        fn test_groups_preserve_order_and_dependencies(
            steps in prop::collection::vec(arb_step(), 0..12)
        ) {
            let config = ParallelConfig::enabled_with(4);
            let groups = group_steps(&steps, &config);
            let flattened: Vec<usize> = groups.iter().flat_map(|g| g.indices.clone()).collect();
            prop_assert_eq!(flattened, (0..steps.len()).collect::<Vec<_>>());

            for group in groups.iter().filter(|g| g.parallel) {
                for &i in &group.indices {
                    for &j in &group.indices {
                        if i == j || steps[i].result.is_empty() {
                            continue;
                        }
                        prop_assert!(!variable_references(&steps[j]).contains(&steps[i].result));
                    }
                }
            }
        }
    }

    // Property test: exponential backoff is non-decreasing and pinned at the cap
    proptest! {
        #[test]
        fn test_exponential_backoff_monotonic(
            base_ms in 1u64..2_000,
            max_ms in 0u64..120_000,
            attempts in 1u32..40,
        ) {
            let base = Duration::from_millis(base_ms);
            let max_delay = Duration::from_millis(max_ms);
            let mut previous = Duration::ZERO;
            let mut capped = false;
            for attempt in 1..=attempts {
                let delay = calculate_delay(base, attempt, BackoffStrategy::Exponential, max_delay, false);
                prop_assert!(delay >= previous);
                if !max_delay.is_zero() {
                    prop_assert!(delay <= max_delay);
                    if capped {
                        prop_assert_eq!(delay, max_delay);
                    }
                    capped = delay == max_delay;
                }
                previous = delay;
            }
        }
    }

    // Property test: jitter adds less than a quarter of the delay
    proptest! {
        #[test]
        fn test_jitter_bounds(delay_ms in 0u64..10_000_000) {
            let delay = Duration::from_millis(delay_ms);
            let jittered = add_jitter(delay);
            prop_assert!(jittered >= delay);
            if delay.is_zero() {
                prop_assert_eq!(jittered, delay);
            } else {
                prop_assert!(jittered < delay + delay / 4);
            }
        }
    }
}
