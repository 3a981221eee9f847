//! Discovery and dispatch for extension-provided tools.
//!
//! [`DiscoveryEngine`] walks extension identifiers through an
//! [`ExtensionLoader`], collects the tools each extension's [`ToolProvider`]
//! returns, and optionally validates their metadata against a JSON Schema.
//! [`Dispatcher`] turns opaque call requests into tool invocations and
//! returns one outcome per request, in request order.

#![warn(missing_docs, clippy::pedantic)]

mod config;
pub mod discovery;
pub mod dispatch;
mod error;

pub use config::{DiscoveryConfig, DiscoveryMode, DispatchConfig};
pub use discovery::{
    DiscoveredTool, DiscoveryEngine, DiscoveryReport, Extension, ExtensionLoader,
    ExtensionRegistration, InventoryExtensionLoader, ProviderError, ProviderResult,
    StaticExtensionLoader, ToolProvider,
};
pub use dispatch::{
    CallError, CallErrorKind, CallOutcome, CallParser, Dispatcher, ParseCall, ParseError,
    ParseResult, ParsedCall,
};
pub use error::{ConfigError, ConfigResult, DiscoveryError, DiscoveryResult};

#[doc(hidden)]
pub use inventory;
