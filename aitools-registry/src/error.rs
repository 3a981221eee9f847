//! Errors produced by tool construction, registration, and invocation.

use thiserror::Error;

/// Result alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors produced by tool construction, registration, and invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Metadata could not be inferred from the callable.
    #[error("unable to infer tool metadata: {reason}")]
    MetadataInference {
        /// Human-readable reason for the failure.
        reason: String,
    },

    /// Supplied metadata failed validation.
    #[error("invalid metadata for tool `{tool}`: `{field}` {reason}")]
    InvalidMetadata {
        /// Name the tool was meant to be registered under.
        tool: String,
        /// Offending metadata field.
        field: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Tool name collided with a tool already in the set.
    #[error("tool with name '{name}' already exists in the set")]
    DuplicateTool {
        /// Name of the offending tool.
        name: String,
    },

    /// Toolkit name collided with a toolkit already in the registry.
    #[error("toolkit with name '{name}' already exists")]
    DuplicateToolkit {
        /// Name of the offending toolkit.
        name: String,
    },

    /// Requested toolkit does not exist.
    #[error("toolkit with name '{name}' not found in registry")]
    ToolkitNotFound {
        /// Name of the missing toolkit.
        name: String,
    },

    /// Arguments could not be bound to the tool's parameters.
    #[error("invalid arguments for tool `{tool}`: {reason}")]
    InvalidArguments {
        /// Tool being invoked.
        tool: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Tool execution failed.
    #[error("tool execution failed: {reason}")]
    Execution {
        /// Human-readable error returned by the tool implementation.
        reason: String,
    },

    /// A primitive type rejected its input.
    #[error(transparent)]
    Primitive(#[from] aitools_primitives::Error),
}

impl ToolError {
    /// Creates an execution error from the supplied reason.
    #[must_use]
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
        }
    }

    /// Creates an argument binding error for the named tool.
    #[must_use]
    pub fn invalid_arguments(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_metadata(
        tool: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidMetadata {
            tool: tool.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_metadata_names_field_and_tool() {
        let err = ToolError::invalid_metadata("echo", "inputSchema", "is missing");
        let msg = err.to_string();
        assert!(msg.contains("echo"));
        assert!(msg.contains("inputSchema"));
    }

    #[test]
    fn duplicate_toolkit_message() {
        let err = ToolError::DuplicateToolkit {
            name: "DuplicateToolkit".into(),
        };
        assert_eq!(
            err.to_string(),
            "toolkit with name 'DuplicateToolkit' already exists"
        );
    }
}
