//! Tool registry, discovery, and dispatch for server AI tools.
//!
//! This facade bundles the workspace crates behind feature flags. Crates
//! that want the `#[tool]` attribute through this facade pass the registry
//! path explicitly: `#[tool(crate = "server_ai_tools::registry")]`.

#![warn(missing_docs, clippy::pedantic)]

/// Shared primitives: permission flags, parameter descriptors, tool names.
pub use aitools_primitives as primitives;

/// Tool specifications, toolkits, and the toolkit registry.
pub use aitools_registry as registry;

/// Discovery and dispatch engines (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use aitools_kernel as kernel;

/// File and environment configuration (enabled by `config` feature).
#[cfg(feature = "config")]
pub use aitools_config as config;

/// Tracing subscriber setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use aitools_telemetry as telemetry;

#[cfg(feature = "app")]
mod app;

#[cfg(feature = "app")]
pub use app::{
    AppError, AppResult, DiscoveredToolsPayload, Routes, ServerToolsApp, ToolkitsPayload,
};
