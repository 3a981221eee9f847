//! Core shared types for the server AI tools registry.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod name;
mod param;
mod permissions;

/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Validated tool identifier.
pub use name::ToolName;
/// Parameter descriptors used to build input schemas.
pub use param::{ParamDescriptor, ParamType};
/// Descriptive permission flags attached to every tool.
pub use permissions::Permissions;
