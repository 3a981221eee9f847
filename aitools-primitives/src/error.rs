//! Shared error definitions for tool primitives.

use thiserror::Error;

/// Result alias used by the primitive types.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Tool identifier failed validation.
    #[error("invalid tool name `{name}`: {reason}")]
    InvalidToolName {
        /// The offending name.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// A JSON type tag was not one of the supported parameter types.
    #[error("unknown parameter type `{name}`")]
    UnknownParamType {
        /// The unrecognised type tag.
        name: String,
    },
}
