//! Named, deduplicated groupings of tools.

use std::collections::BTreeMap;
use std::collections::btree_map::{Entry, Values};
use std::hash::{Hash, Hasher};

use aitools_primitives::Permissions;
use serde::{Serialize, Serializer};

use crate::error::{ToolError, ToolResult};
use crate::spec::ToolSpec;

/// Set of tools keyed by name.
#[derive(Clone, Debug, Default)]
pub struct ToolSet {
    tools: BTreeMap<String, ToolSpec>,
}

impl ToolSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set, failing on the first repeated name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] for a repeated name.
    pub fn from_tools<I>(tools: I) -> ToolResult<Self>
    where
        I: IntoIterator<Item = ToolSpec>,
    {
        let mut set = Self::new();
        for tool in tools {
            set.insert(tool)?;
        }
        Ok(set)
    }

    /// Inserts a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if a tool with the same name is
    /// present; the set is left unchanged.
    pub fn insert(&mut self, tool: ToolSpec) -> ToolResult<()> {
        match self.tools.entry(tool.name().to_owned()) {
            Entry::Occupied(entry) => Err(ToolError::DuplicateTool {
                name: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(tool);
                Ok(())
            }
        }
    }

    /// Returns the tool with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    /// Returns `true` if a tool with the same name is present.
    #[must_use]
    pub fn contains(&self, tool: &ToolSpec) -> bool {
        self.tools.contains_key(tool.name())
    }

    /// Returns the number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Iterates tools in name order.
    pub fn iter(&self) -> Values<'_, String, ToolSpec> {
        self.tools.values()
    }

    /// Returns the tool names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }
}

impl<'a> IntoIterator for &'a ToolSet {
    type Item = &'a ToolSpec;
    type IntoIter = Values<'a, String, ToolSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for ToolSet {
    type Item = ToolSpec;
    type IntoIter = std::collections::btree_map::IntoValues<String, ToolSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.tools.into_values()
    }
}

impl Serialize for ToolSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.iter())
    }
}

/// A named group of tools. Identity is the name.
#[derive(Clone, Debug, Serialize)]
pub struct Toolkit {
    name: String,
    tools: ToolSet,
}

impl Toolkit {
    /// Creates an empty toolkit.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_tools(name, ToolSet::new())
    }

    /// Creates a toolkit holding the given tools.
    #[must_use]
    pub fn with_tools(name: impl Into<String>, tools: ToolSet) -> Self {
        Self {
            name: name.into(),
            tools,
        }
    }

    /// Returns the toolkit name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tools.
    #[must_use]
    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Adds a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] on a name collision.
    pub fn add_tool(&mut self, tool: ToolSpec) -> ToolResult<()> {
        self.tools.insert(tool)
    }

    /// Returns the tools whose four permission flags exactly equal `query`.
    ///
    /// Note the semantics: this is not "has at least these permissions". A
    /// query for `read` returns only tools flagged read and nothing else, and
    /// the all-false query returns only tools with no flags at all.
    #[must_use]
    pub fn find_tools(&self, query: Permissions) -> ToolSet {
        let tools = self
            .tools
            .iter()
            .filter(|tool| tool.permissions().matches_exactly(query))
            .map(|tool| (tool.name().to_owned(), tool.clone()))
            .collect();
        ToolSet { tools }
    }
}

impl PartialEq for Toolkit {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Toolkit {}

impl Hash for Toolkit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
