//! Static tool registry and startup context.
//!
//! Tools are registered explicitly at startup as fixed descriptors and
//! validated at registration time. The [`InitContext`] is built once by
//! the host bootstrap and passed by reference to whatever needs it; there
//! is no process-wide mutable state.

use std::fmt;

use thiserror::Error;

use crate::params::{CameraOutputSpec, SolveParameters};

/// Immutable startup context shared with tool actions.
#[derive(Clone, Debug)]
pub struct InitContext {
    pub solve_defaults: SolveParameters,
    pub output_defaults: CameraOutputSpec,
    pub log_level: log::LevelFilter,
}

impl Default for InitContext {
    fn default() -> Self {
        Self {
            solve_defaults: SolveParameters::default(),
            output_defaults: CameraOutputSpec::default(),
            log_level: log::LevelFilter::Info,
        }
    }
}

/// Entry point invoked when a tool's menu item is activated.
pub type ToolAction = Box<dyn Fn(&InitContext) + Send + Sync>;

/// Fixed descriptor for a registered tool.
pub struct ToolDescriptor {
    /// Stable identifier, unique within a registry.
    pub name: &'static str,
    /// Label shown in the host menu.
    pub menu_name: String,
    pub action: ToolAction,
}

impl ToolDescriptor {
    pub fn new(
        name: &'static str,
        menu_name: impl Into<String>,
        action: impl Fn(&InitContext) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            menu_name: menu_name.into(),
            action: Box::new(action),
        }
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("menu_name", &self.menu_name)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool name must not be empty")]
    EmptyName,
    #[error("tool `{0}` has an empty menu label")]
    EmptyMenuName(&'static str),
    #[error("tool `{0}` is already registered")]
    DuplicateName(&'static str),
}

/// Explicit, statically assembled tool list. Iteration order is
/// registration order.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a descriptor.
    pub fn register(&mut self, tool: ToolDescriptor) -> Result<(), RegistryError> {
        if tool.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if tool.menu_name.is_empty() {
            return Err(RegistryError::EmptyMenuName(tool.name));
        }
        if self.tools.iter().any(|t| t.name == tool.name) {
            return Err(RegistryError::DuplicateName(tool.name));
        }
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn registers_and_invokes_actions() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor::new("auto_solve", "Auto Solve", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        let ctx = InitContext::default();
        (registry.get("auto_solve").unwrap().action)(&ctx);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejects_duplicates_and_empty_names() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor::new("a", "A", |_| {}))
            .unwrap();
        assert_eq!(
            registry.register(ToolDescriptor::new("a", "A again", |_| {})),
            Err(RegistryError::DuplicateName("a"))
        );
        assert_eq!(
            registry.register(ToolDescriptor::new("", "Nameless", |_| {})),
            Err(RegistryError::EmptyName)
        );
        assert_eq!(
            registry.register(ToolDescriptor::new("b", "", |_| {})),
            Err(RegistryError::EmptyMenuName("b"))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn preserves_registration_order() {
        let mut registry = ToolRegistry::new();
        for (name, label) in [("one", "One"), ("two", "Two"), ("three", "Three")] {
            registry
                .register(ToolDescriptor::new(name, label, |_| {}))
                .unwrap();
        }
        let names: Vec<_> = registry.tools().iter().map(|t| t.name).collect();
        assert_eq!(names, ["one", "two", "three"]);
    }
}
