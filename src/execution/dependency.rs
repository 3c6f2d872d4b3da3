//! Dependency analysis and parallel grouping of steps
//!
//! A step is *independent* when it has no ordering side effects of its own:
//! no control flow, no result binding, no error expectation, no
//! `continue_on_failure`, and an action from the parallel-safe allow-list.
//! Independent steps are packed greedily into groups whose members are
//! pairwise free of producer/consumer variable edges. The packing is
//! conservative: it may under-parallelize but never pairs dependent steps.

use super::variables::PLACEHOLDER_RE;
use crate::config::{ParallelConfig, Step};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Coarse side-effect class of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionClass {
    /// Local, side-effect-bounded queries and logging
    Basic,
    Http,
    Database,
    /// Read-only file access
    File,
    /// Everything else; never grouped
    Unsafe,
}

/// Classify an action by name
pub fn action_class(action: &str) -> ActionClass {
    match action {
        "log" | "sleep" | "get_time" | "get_random" | "length" => ActionClass::Basic,
        "http" | "http_get" | "http_post" => ActionClass::Http,
        "postgres" | "spanner" => ActionClass::Database,
        "read_file" | "file_exists" => ActionClass::File,
        _ => ActionClass::Unsafe,
    }
}

fn class_allowed(class: ActionClass, config: &ParallelConfig) -> bool {
    match class {
        ActionClass::Basic => true,
        ActionClass::Http => config.http_requests,
        ActionClass::Database => config.database_operations,
        ActionClass::File => config.file_operations,
        ActionClass::Unsafe => false,
    }
}

/// True if the step may share a parallel group with other independent steps
pub fn is_independent(step: &Step, config: &ParallelConfig) -> bool {
    !step.has_control_flow()
        && step.result.is_empty()
        && step.expect_error.is_none()
        && !step.continue_on_failure
        && class_allowed(action_class(&step.action), config)
}

/// Root names of every `${...}` reference in the step's arguments and options
///
/// `${resp.body.id}` contributes `resp`; secret references contribute
/// `SECRETS`.
pub fn variable_references(step: &Step) -> HashSet<String> {
    let mut names = HashSet::new();
    for arg in &step.args {
        collect_references(arg, &mut names);
    }
    for value in step.options.values() {
        collect_references(value, &mut names);
    }
    names
}

fn collect_references(value: &Value, names: &mut HashSet<String>) {
    match value {
        Value::String(s) => {
            for caps in PLACEHOLDER_RE.captures_iter(s) {
                let expression = &caps[1];
                let reference = expression.split(":-").next().unwrap_or(expression).trim();
                let root = reference.split('.').next().unwrap_or(reference);
                names.insert(root.to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_references(v, names)),
        Value::Object(map) => map.values().for_each(|v| collect_references(v, names)),
        _ => {}
    }
}

/// True if `producer` binds a variable that `consumer` reads
fn produces_for(producer: &Step, consumer: &Step) -> bool {
    !producer.result.is_empty() && variable_references(consumer).contains(&producer.result)
}

/// Pairwise parallel-safety; symmetric in its step arguments
pub fn can_steps_run_in_parallel(a: &Step, b: &Step, config: &ParallelConfig) -> bool {
    is_independent(a, config)
        && is_independent(b, config)
        && !produces_for(a, b)
        && !produces_for(b, a)
}

/// A run of consecutive steps, by index into the analyzed slice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepGroup {
    pub indices: Vec<usize>,
    pub parallel: bool,
}

impl StepGroup {
    pub(crate) fn sequential(index: usize) -> Self {
        Self {
            indices: vec![index],
            parallel: false,
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Partition steps into ordered groups, each safe to run concurrently
///
/// Greedy single pass: the open group grows while the candidate is
/// compatible with every member, and closes on the first incompatibility or
/// non-independent step.
pub fn group_steps(steps: &[Step], config: &ParallelConfig) -> Vec<StepGroup> {
    let mut groups = Vec::new();
    let mut current: Vec<usize> = Vec::new();

    for (index, step) in steps.iter().enumerate() {
        if !is_independent(step, config) {
            flush(&mut current, &mut groups);
            groups.push(StepGroup::sequential(index));
            continue;
        }

        let compatible = current
            .iter()
            .all(|&member| can_steps_run_in_parallel(&steps[member], step, config));
        if !compatible {
            flush(&mut current, &mut groups);
        }
        current.push(index);
    }
    flush(&mut current, &mut groups);

    debug!(
        "Grouped {} steps into {} groups ({} parallel)",
        steps.len(),
        groups.len(),
        groups.iter().filter(|g| g.parallel).count()
    );
    groups
}

fn flush(current: &mut Vec<usize>, groups: &mut Vec<StepGroup>) {
    if current.is_empty() {
        return;
    }
    let indices = std::mem::take(current);
    let parallel = indices.len() > 1;
    groups.push(StepGroup { indices, parallel });
}
