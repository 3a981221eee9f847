//! Process-wide collection of toolkits.

use std::collections::BTreeMap;
use std::sync::RwLock;

use aitools_primitives::Permissions;
use tracing::{debug, info};

use crate::error::{ToolError, ToolResult};
use crate::toolkit::Toolkit;

/// Registry of toolkits keyed by name.
///
/// Lookups hand out filtered copies; registered toolkits are never mutated.
#[derive(Default)]
pub struct ToolkitRegistry {
    inner: RwLock<BTreeMap<String, Toolkit>>,
}

impl std::fmt::Debug for ToolkitRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().expect("toolkit registry poisoned");
        let names: Vec<_> = inner.keys().cloned().collect();
        f.debug_struct("ToolkitRegistry")
            .field("toolkits", &names)
            .finish()
    }
}

impl ToolkitRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a toolkit.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateToolkit`] if a toolkit with the same
    /// name is already registered. The existing toolkit is kept.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn register_toolkit(&self, toolkit: Toolkit) -> ToolResult<()> {
        let mut inner = self.inner.write().expect("toolkit registry poisoned");
        if inner.contains_key(toolkit.name()) {
            return Err(ToolError::DuplicateToolkit {
                name: toolkit.name().to_owned(),
            });
        }

        info!(
            toolkit = toolkit.name(),
            tools = toolkit.tools().len(),
            "registered toolkit"
        );
        inner.insert(toolkit.name().to_owned(), toolkit);
        Ok(())
    }

    /// Returns a copy of the named toolkit holding only the tools whose
    /// permission flags exactly equal `query`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::ToolkitNotFound`] for an unknown name.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn get_toolkit(&self, name: &str, query: Permissions) -> ToolResult<Toolkit> {
        let inner = self.inner.read().expect("toolkit registry poisoned");
        let toolkit = inner.get(name).ok_or_else(|| ToolError::ToolkitNotFound {
            name: name.to_owned(),
        })?;

        let tools = toolkit.find_tools(query);
        debug!(toolkit = name, ?query, matched = tools.len(), "filtered toolkit");
        Ok(Toolkit::with_tools(toolkit.name(), tools))
    }

    /// Returns every registered toolkit, unfiltered, in name order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn list(&self) -> Vec<Toolkit> {
        let inner = self.inner.read().expect("toolkit registry poisoned");
        inner.values().cloned().collect()
    }

    /// Returns `true` if a toolkit with the name is registered.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        let inner = self.inner.read().expect("toolkit registry poisoned");
        inner.contains_key(name)
    }

    /// Returns the number of registered toolkits.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().expect("toolkit registry poisoned").len()
    }

    /// Returns `true` when nothing is registered.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
