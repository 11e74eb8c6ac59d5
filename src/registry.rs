//! Action parameter metadata.
//!
//! The registry maps controller name to action name to the ordered list of
//! parameter names consulted by the argument binder. It is populated while
//! controllers register their actions, before serving begins, and is only
//! read afterwards. Binding is purely positional: the recorded order must
//! match the invocation thunk's argument order exactly.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, HashMap<String, Vec<String>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, controller: &str, action: &str, params: Vec<String>) {
        self.actions
            .entry(controller.to_string())
            .or_default()
            .insert(action.to_string(), params);
    }

    /// Ordered parameter names for an action, or None when the action was
    /// never registered.
    pub fn lookup(&self, controller: &str, action: &str) -> Option<&[String]> {
        self.actions
            .get(controller)?
            .get(action)
            .map(|v| v.as_slice())
    }

    pub fn has_controller(&self, controller: &str) -> bool {
        self.actions.contains_key(controller)
    }
}
