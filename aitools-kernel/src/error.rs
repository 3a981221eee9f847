//! Error types for discovery and engine configuration.

use thiserror::Error;

/// Result alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Failures met while scanning extensions.
///
/// Apart from [`DiscoveryError::InvalidSchema`], these are logged and skipped
/// by the engine rather than returned to the caller.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The extension identifier could not be resolved.
    #[error("failed to load extension '{extension}': {reason}")]
    ImportFailure {
        /// Extension identifier.
        extension: String,
        /// Loader-provided reason.
        reason: String,
    },

    /// The extension does not expose a tool provider.
    #[error("extension '{extension}' does not provide tools")]
    MissingHook {
        /// Extension identifier.
        extension: String,
    },

    /// The tool provider itself failed.
    #[error("tool provider of extension '{extension}' failed: {reason}")]
    InvalidProviderReturn {
        /// Extension identifier.
        extension: String,
        /// Provider-supplied reason.
        reason: String,
    },

    /// Tool metadata did not satisfy the configured schema.
    #[error("tool '{tool}' from extension '{extension}' failed schema validation: {reason}")]
    SchemaValidation {
        /// Extension identifier.
        extension: String,
        /// Name of the rejected tool.
        tool: String,
        /// First validation error reported by the schema.
        reason: String,
    },

    /// A provider entry could not be turned into a tool.
    #[error("extension '{extension}' returned an entry that is not a tool: {reason}")]
    NotAToolSpec {
        /// Extension identifier.
        extension: String,
        /// Why the entry was rejected.
        reason: String,
    },

    /// The configured metadata schema is not a valid JSON Schema.
    #[error("invalid metadata schema: {reason}")]
    InvalidSchema {
        /// Compiler error.
        reason: String,
    },
}

impl DiscoveryError {
    pub(crate) fn import_failure(extension: &str, reason: impl Into<String>) -> Self {
        Self::ImportFailure {
            extension: extension.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Result alias for engine configuration checks.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Engine configuration was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A configuration value is out of range.
    #[error("invalid engine configuration: {0}")]
    Invalid(&'static str),
}
