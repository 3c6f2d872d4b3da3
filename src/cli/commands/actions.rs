//! `robogo actions`

use crate::actions::ActionRegistry;

/// Print every built-in action with its description
pub fn list_actions() {
    let registry = ActionRegistry::with_builtins();
    for (name, description) in registry.list() {
        println!("{:<12} {}", name, description);
    }
}
