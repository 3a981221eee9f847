//! The extension application: a process-wide toolkit registry plus the
//! discovery and dispatch engines, configured from [`ServerToolsConfig`].

use std::fmt;
use std::sync::Arc;

use aitools_config::{ConfigError, ServerToolsConfig};
use aitools_kernel::{
    CallOutcome, CallParser, DiscoveredTool, DiscoveryEngine, DiscoveryError, DispatchConfig,
    Dispatcher, ExtensionLoader,
};
use aitools_primitives::Permissions;
use aitools_registry::{ToolError, Toolkit, ToolkitRegistry};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

const TOOLKITS_ROUTE: &str = "/api/toolkits";

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Failures surfaced by [`ServerToolsApp`].
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The discovery engine rejected its configuration.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The dispatch engine rejected its configuration.
    #[error(transparent)]
    Dispatch(#[from] aitools_kernel::ConfigError),

    /// A registry operation failed.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Body of the toolkit listing route.
#[derive(Debug, Clone, Serialize)]
pub struct ToolkitsPayload {
    /// Every registered toolkit with its tools.
    pub toolkits: Vec<Toolkit>,
}

/// Body of the tool discovery route.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredToolsPayload {
    /// Tools found by the latest discovery pass.
    pub discovered_tools: Vec<DiscoveredTool>,
}

/// Route paths the host should mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routes {
    /// Serves [`ToolkitsPayload`].
    pub toolkits: String,
    /// Serves [`DiscoveredToolsPayload`].
    pub tools: String,
}

/// Extension application state.
pub struct ServerToolsApp<L> {
    registry: Arc<ToolkitRegistry>,
    discovery: DiscoveryEngine<L>,
    dispatch: DispatchConfig,
    parser: CallParser,
    extensions: Vec<String>,
    base_url: String,
}

impl<L> fmt::Debug for ServerToolsApp<L>
where
    L: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerToolsApp")
            .field("registry", &self.registry)
            .field("discovery", &self.discovery)
            .field("dispatch", &self.dispatch)
            .field("parser", &self.parser)
            .field("extensions", &self.extensions)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl<L> ServerToolsApp<L>
where
    L: ExtensionLoader,
{
    /// Builds the application from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] for invalid settings or an unreadable
    /// schema, and [`AppError::Discovery`] when the schema does not compile.
    pub fn new(loader: L, config: &ServerToolsConfig) -> AppResult<Self> {
        config.validate()?;
        let discovery = DiscoveryEngine::new(loader, config.discovery_config()?)?;
        let dispatch = config.dispatch_config();
        let parser = config.call_parser()?;

        info!(
            base_url = config.base_url(),
            mode = ?config.discovery_mode(),
            extensions = config.discovery().extensions.len(),
            "server AI tools extension initialized"
        );

        Ok(Self {
            registry: Arc::new(ToolkitRegistry::new()),
            discovery,
            dispatch,
            parser,
            extensions: config.discovery().extensions.clone(),
            base_url: config.base_url().to_owned(),
        })
    }

    /// Replaces the request parser, typically with a custom one.
    #[must_use]
    pub fn with_parser(mut self, parser: CallParser) -> Self {
        self.parser = parser;
        self
    }

    /// Returns the shared toolkit registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ToolkitRegistry> {
        &self.registry
    }

    /// Returns the discovery engine.
    #[must_use]
    pub fn discovery(&self) -> &DiscoveryEngine<L> {
        &self.discovery
    }

    /// Returns the configured route prefix.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the routes to mount.
    #[must_use]
    pub fn routes(&self) -> Routes {
        Routes {
            toolkits: TOOLKITS_ROUTE.to_owned(),
            tools: format!("{}/tools", self.base_url.trim_end_matches('/')),
        }
    }

    /// Registers a toolkit with the shared registry.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tool`] wrapping [`ToolError::DuplicateToolkit`].
    pub fn register_toolkit(&self, toolkit: Toolkit) -> AppResult<()> {
        self.registry.register_toolkit(toolkit)?;
        Ok(())
    }

    /// Returns the named toolkit filtered to tools whose flags exactly equal
    /// `query`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tool`] wrapping [`ToolError::ToolkitNotFound`].
    pub fn get_toolkit(&self, name: &str, query: Permissions) -> AppResult<Toolkit> {
        Ok(self.registry.get_toolkit(name, query)?)
    }

    /// Returns the identifiers scanned by discovery: the configured list, or
    /// every identifier the loader knows when none are configured.
    #[must_use]
    pub fn extension_ids(&self) -> Vec<String> {
        if self.extensions.is_empty() {
            self.discovery.loader().extension_ids()
        } else {
            self.extensions.clone()
        }
    }

    /// Builds the toolkit listing.
    #[must_use]
    pub fn toolkits_payload(&self) -> ToolkitsPayload {
        ToolkitsPayload {
            toolkits: self.registry.list(),
        }
    }

    /// Runs a discovery pass in the configured mode.
    #[must_use]
    pub fn discovered_tools_payload(&self) -> DiscoveredToolsPayload {
        DiscoveredToolsPayload {
            discovered_tools: self.discovery.discover(&self.extension_ids()),
        }
    }

    /// Builds a dispatcher over a fresh discovery pass.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dispatch`] when the dispatch settings are invalid.
    pub fn dispatcher(&self) -> AppResult<Dispatcher> {
        let specs = self.discovery.discover_specs(&self.extension_ids());
        debug!(tools = specs.len(), "building dispatcher");
        let dispatcher = Dispatcher::new(specs)
            .with_parser(self.parser.clone())
            .with_config(self.dispatch)?;
        Ok(dispatcher)
    }

    /// Discovers tools and runs `requests` against them. The output is
    /// aligned with the input.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dispatch`] when the dispatch settings are invalid.
    /// Per-request failures are returned inline.
    pub async fn run_calls(&self, requests: &[Value]) -> AppResult<Vec<CallOutcome>> {
        let dispatcher = self.dispatcher()?;
        Ok(dispatcher.run(requests).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use aitools_kernel::StaticExtensionLoader;

    #[test]
    fn routes_follow_base_url() {
        let config =
            ServerToolsConfig::from_json_str(r#"{"base_url": "/ai-tools/"}"#).expect("config");
        let app = ServerToolsApp::new(StaticExtensionLoader::new(), &config).expect("app");

        assert_eq!(
            app.routes(),
            Routes {
                toolkits: "/api/toolkits".into(),
                tools: "/ai-tools/tools".into(),
            }
        );
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let config = ServerToolsConfig::from_json_str(r#"{"dispatch": {"parser": "yaml"}}"#)
            .expect("config");
        let err = ServerToolsApp::new(StaticExtensionLoader::new(), &config).expect_err("parser");
        assert!(matches!(err, AppError::Config(_)));
    }
}
