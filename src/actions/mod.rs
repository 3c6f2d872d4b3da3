//! Action registry
//!
//! Steps name their action by string; the registry maps that name to an
//! [`Action`] implementation.

pub mod builtin;
mod options;

use crate::error::Result;
use crate::execution::ExecutionContext;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub use options::OptionReader;

/// An operation invoked by steps
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Run the action with already substituted arguments and options
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: &[Value],
        options: &HashMap<String, Value>,
    ) -> Result<Value>;
}

#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in action
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    pub fn register(&mut self, action: Arc<dyn Action>) {
        self.actions.insert(action.name().to_string(), action);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn list(&self) -> Vec<(&str, &str)> {
        let mut actions: Vec<_> = self
            .actions
            .iter()
            .map(|(name, action)| (name.as_str(), action.description()))
            .collect();
        actions.sort_by_key(|(name, _)| *name);
        actions
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.list().into_iter().map(|(name, _)| name).collect();
        f.debug_struct("ActionRegistry").field("actions", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Action for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn execute(
            &self,
            _ctx: &ExecutionContext,
            args: &[Value],
            _options: &HashMap<String, Value>,
        ) -> Result<Value> {
            Ok(Value::Array(args.to_vec()))
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ActionRegistry::with_builtins();
        for name in ["log", "sleep", "get_time", "get_random", "length", "concat", "assert", "fail"] {
            assert!(registry.contains(name), "missing builtin {}", name);
        }
    }

    #[tokio::test]
    async fn test_custom_action() {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(Echo));
        let action = registry.get("echo").unwrap();
        let output = action
            .execute(&ExecutionContext::new(), &[Value::from(1)], &HashMap::new())
            .await
            .unwrap();
        assert_eq!(output, serde_json::json!([1]));
        assert!(registry.get("missing").is_none());
    }
}
