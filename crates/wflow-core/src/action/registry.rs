//! Action registry for runtime lookup by name.
//!
//! Maps a registered action name to a factory that builds a fresh
//! [`BoxAction`] for every step invocation. Populated explicitly by an
//! initialization routine at process start.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::box_action::BoxAction;

/// Builds a fresh action instance.
pub type ActionFactory = Arc<dyn Fn() -> BoxAction + Send + Sync>;

/// A registry entry.
#[derive(Clone)]
pub struct RegisteredAction {
    pub name: String,
    pub label: String,
    factory: ActionFactory,
}

impl RegisteredAction {
    pub fn create(&self) -> BoxAction {
        (self.factory)()
    }

    pub fn factory(&self) -> ActionFactory {
        Arc::clone(&self.factory)
    }
}

impl fmt::Debug for RegisteredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredAction")
            .field("name", &self.name)
            .field("label", &self.label)
            .finish()
    }
}

/// Registry of available actions, indexed by name. Cheap to clone.
#[derive(Clone, Default, Debug)]
pub struct ActionRegistry {
    actions: BTreeMap<String, RegisteredAction>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action factory under the given name.
    ///
    /// If an action with this name already exists, it is replaced.
    pub fn register<F>(&mut self, name: impl Into<String>, label: impl Into<String>, factory: F)
    where
        F: Fn() -> BoxAction + Send + Sync + 'static,
    {
        let name = name.into();
        if self.actions.contains_key(&name) {
            tracing::warn!(action = %name, "replacing previously registered action");
        }
        self.actions.insert(
            name.clone(),
            RegisteredAction {
                name,
                label: label.into(),
                factory: Arc::new(factory),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredAction> {
        self.actions.get(name)
    }

    /// Build a fresh instance of the named action.
    pub fn create(&self, name: &str) -> Option<BoxAction> {
        self.actions.get(name).map(RegisteredAction::create)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredAction> {
        self.actions.values()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
