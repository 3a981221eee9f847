//! Tool specifications: a callable plus metadata and permission flags.

use std::fmt;
use std::hash::{Hash, Hasher};

use aitools_primitives::Permissions;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::callable::{Arguments, Callable, Invocation};
use crate::error::ToolResult;
use crate::metadata::{InputSchema, ToolMetadata};

/// A registered tool.
///
/// Equality and hashing use the tool name only, so a [`ToolSet`](crate::ToolSet)
/// can never hold two tools with the same name.
#[derive(Clone)]
pub struct ToolSpec {
    metadata: ToolMetadata,
    permissions: Permissions,
    invocation: Invocation,
}

impl ToolSpec {
    /// Builds a tool whose metadata is inferred from the callable.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::MetadataInference`](crate::ToolError::MetadataInference)
    /// when the callable has no usable name.
    pub fn new(callable: Callable) -> ToolResult<Self> {
        let metadata = ToolMetadata::infer(&callable)?;
        Ok(Self::from_parts(metadata, callable.into_invocation()))
    }

    /// Builds a tool from caller-supplied metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`](crate::ToolError::InvalidMetadata)
    /// when `name`, `description`, or `inputSchema` is missing or malformed.
    pub fn with_metadata(callable: Callable, metadata: Value) -> ToolResult<Self> {
        let metadata = ToolMetadata::from_value(metadata, callable.name())?;
        Ok(Self::from_parts(metadata, callable.into_invocation()))
    }

    /// Assembles a tool from already validated parts.
    #[must_use]
    pub fn from_parts(metadata: ToolMetadata, invocation: Invocation) -> Self {
        Self {
            metadata,
            permissions: Permissions::NONE,
            invocation,
        }
    }

    /// Replaces the permission flags.
    #[must_use]
    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    /// Returns the tool description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.metadata.description()
    }

    /// Returns the input schema.
    #[must_use]
    pub fn input_schema(&self) -> &InputSchema {
        self.metadata.input_schema()
    }

    /// Returns the full metadata.
    #[must_use]
    pub fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    /// Returns the permission flags.
    #[must_use]
    pub const fn permissions(&self) -> Permissions {
        self.permissions
    }

    /// Returns the invocation.
    #[must_use]
    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    /// Invokes the tool, awaiting it when deferred.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by the tool implementation.
    pub async fn invoke(&self, arguments: Arguments) -> ToolResult<Value> {
        self.invocation.invoke(arguments).await
    }
}

impl PartialEq for ToolSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for ToolSpec {}

impl Hash for ToolSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name())
            .field("permissions", &self.permissions)
            .field("invocation", &self.invocation)
            .finish_non_exhaustive()
    }
}

/// Serializes as the listing entry: metadata fields plus the four flags.
/// Flag keys carried in supplied metadata are replaced by the tool's own.
impl Serialize for ToolSpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut entry = match self.metadata.to_value() {
            Value::Object(object) => object,
            _ => Map::new(),
        };
        let flags = self.permissions;
        entry.insert("read".into(), Value::Bool(flags.read));
        entry.insert("write".into(), Value::Bool(flags.write));
        entry.insert("execute".into(), Value::Bool(flags.execute));
        entry.insert("delete".into(), Value::Bool(flags.delete));
        entry.serialize(serializer)
    }
}
