//! Extension scanning.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use aitools_registry::{ToolMetadata, ToolResult, ToolSpec};
use jsonschema::Validator;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{DiscoveryConfig, DiscoveryMode};
use crate::dispatch::panic_message;
use crate::error::{DiscoveryError, DiscoveryResult};

/// Result alias for tool providers.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Failure reported by a tool provider as a whole.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct ProviderError {
    reason: String,
}

impl ProviderError {
    /// Creates a provider error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns the reason.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Capability of an extension that contributes tools.
///
/// Called on every discovery pass; tools are never cached between passes.
pub trait ToolProvider: Send + Sync {
    /// Returns the tools currently offered. Individual entries may fail
    /// without affecting their siblings.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when no tools can be listed at all.
    fn list_tools(&self) -> ProviderResult<Vec<ToolResult<ToolSpec>>>;
}

/// A loaded extension.
pub trait Extension: Send + Sync {
    /// Human-readable extension name.
    fn name(&self) -> &str;

    /// Returns the tool provider, or `None` when the extension has no tools.
    fn tool_provider(&self) -> Option<&dyn ToolProvider> {
        None
    }
}

/// Resolves extension identifiers to loaded extensions.
pub trait ExtensionLoader: Send + Sync {
    /// Loads the extension registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::ImportFailure`] for an unknown or broken
    /// extension.
    fn load(&self, id: &str) -> DiscoveryResult<Arc<dyn Extension>>;

    /// Returns every identifier this loader can resolve.
    fn extension_ids(&self) -> Vec<String>;
}

/// In-process table of extensions, kept in insertion order.
#[derive(Clone, Default)]
pub struct StaticExtensionLoader {
    extensions: Vec<(String, Arc<dyn Extension>)>,
}

impl fmt::Debug for StaticExtensionLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<_> = self.extensions.iter().map(|(id, _)| id.as_str()).collect();
        f.debug_struct("StaticExtensionLoader")
            .field("extensions", &ids)
            .finish()
    }
}

impl StaticExtensionLoader {
    /// Creates an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an extension, returning the loader for chaining.
    #[must_use]
    pub fn with_extension(mut self, id: impl Into<String>, extension: Arc<dyn Extension>) -> Self {
        self.insert(id, extension);
        self
    }

    /// Adds or replaces an extension.
    pub fn insert(&mut self, id: impl Into<String>, extension: Arc<dyn Extension>) {
        let id = id.into();
        match self.extensions.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = extension,
            None => self.extensions.push((id, extension)),
        }
    }
}

impl ExtensionLoader for StaticExtensionLoader {
    fn load(&self, id: &str) -> DiscoveryResult<Arc<dyn Extension>> {
        self.extensions
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, extension)| Arc::clone(extension))
            .ok_or_else(|| DiscoveryError::import_failure(id, "no extension with this identifier"))
    }

    fn extension_ids(&self) -> Vec<String> {
        self.extensions.iter().map(|(id, _)| id.clone()).collect()
    }
}

/// Link-time extension registration collected by [`InventoryExtensionLoader`].
///
/// ```rust,ignore
/// aitools_kernel::inventory::submit! {
///     ExtensionRegistration::new("notebook_tools", || Arc::new(NotebookTools))
/// }
/// ```
pub struct ExtensionRegistration {
    id: &'static str,
    factory: fn() -> Arc<dyn Extension>,
}

impl ExtensionRegistration {
    /// Creates a registration usable in `inventory::submit!`.
    #[must_use]
    pub const fn new(id: &'static str, factory: fn() -> Arc<dyn Extension>) -> Self {
        Self { id, factory }
    }

    /// Returns the extension identifier.
    #[must_use]
    pub const fn id(&self) -> &'static str {
        self.id
    }

    /// Builds a fresh extension instance.
    #[must_use]
    pub fn build(&self) -> Arc<dyn Extension> {
        (self.factory)()
    }
}

inventory::collect!(ExtensionRegistration);

/// Loader over every [`ExtensionRegistration`] linked into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct InventoryExtensionLoader;

impl ExtensionLoader for InventoryExtensionLoader {
    fn load(&self, id: &str) -> DiscoveryResult<Arc<dyn Extension>> {
        inventory::iter::<ExtensionRegistration>
            .into_iter()
            .find(|registration| registration.id == id)
            .map(ExtensionRegistration::build)
            .ok_or_else(|| DiscoveryError::import_failure(id, "extension is not linked into this binary"))
    }

    fn extension_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = inventory::iter::<ExtensionRegistration>
            .into_iter()
            .map(|registration| registration.id.to_owned())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// One discovery result.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum DiscoveredTool {
    /// Metadata only.
    Metadata(ToolMetadata),
    /// Complete tool specification.
    Full(ToolSpec),
}

impl DiscoveredTool {
    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Metadata(metadata) => metadata.name(),
            Self::Full(spec) => spec.name(),
        }
    }

    /// Returns the metadata.
    #[must_use]
    pub fn metadata(&self) -> &ToolMetadata {
        match self {
            Self::Metadata(metadata) => metadata,
            Self::Full(spec) => spec.metadata(),
        }
    }

    /// Returns the specification when discovered in full mode.
    #[must_use]
    pub fn spec(&self) -> Option<&ToolSpec> {
        match self {
            Self::Metadata(_) => None,
            Self::Full(spec) => Some(spec),
        }
    }

    /// Consumes the entry, returning the specification when present.
    #[must_use]
    pub fn into_spec(self) -> Option<ToolSpec> {
        match self {
            Self::Metadata(_) => None,
            Self::Full(spec) => Some(spec),
        }
    }
}

/// Counts of what a discovery pass kept and skipped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Extensions that loaded.
    pub extensions_loaded: usize,
    /// Tools returned.
    pub tools: usize,
    /// Extensions that failed to load.
    pub import_failures: usize,
    /// Extensions without a tool provider.
    pub missing_hooks: usize,
    /// Providers that failed outright.
    pub provider_failures: usize,
    /// Provider entries that were not tools.
    pub invalid_entries: usize,
    /// Tools rejected by the metadata schema.
    pub schema_rejections: usize,
}

impl DiscoveryReport {
    /// Total number of skipped extensions and entries, excluding extensions
    /// that simply have no tools.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.import_failures + self.provider_failures + self.invalid_entries + self.schema_rejections
    }
}

/// Scans extensions for tools.
pub struct DiscoveryEngine<L> {
    loader: L,
    config: DiscoveryConfig,
    validator: Option<Validator>,
}

impl<L: fmt::Debug> fmt::Debug for DiscoveryEngine<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryEngine")
            .field("loader", &self.loader)
            .field("mode", &self.config.mode())
            .field("schema_configured", &self.validator.is_some())
            .finish()
    }
}

impl<L> DiscoveryEngine<L>
where
    L: ExtensionLoader,
{
    /// Creates an engine, compiling the configured schema once.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::InvalidSchema`] when the schema does not
    /// compile.
    pub fn new(loader: L, config: DiscoveryConfig) -> DiscoveryResult<Self> {
        config.validate()?;
        let validator = config
            .schema()
            .map(jsonschema::validator_for)
            .transpose()
            .map_err(|err| DiscoveryError::InvalidSchema {
                reason: err.to_string(),
            })?;

        Ok(Self {
            loader,
            config,
            validator,
        })
    }

    /// Returns the loader.
    #[must_use]
    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Discovers tools from `ids` in the configured mode.
    pub fn discover<S: AsRef<str>>(&self, ids: &[S]) -> Vec<DiscoveredTool> {
        self.discover_as(ids, self.config.mode())
    }

    /// Discovers tools from `ids` in the given mode.
    pub fn discover_as<S: AsRef<str>>(&self, ids: &[S], mode: DiscoveryMode) -> Vec<DiscoveredTool> {
        self.discover_with_report(ids, mode).0
    }

    /// Discovers tools and reports what was skipped.
    ///
    /// Results keep extension order, then provider order. A failing
    /// extension, provider, or entry is logged and skipped; the scan always
    /// completes.
    pub fn discover_with_report<S: AsRef<str>>(
        &self,
        ids: &[S],
        mode: DiscoveryMode,
    ) -> (Vec<DiscoveredTool>, DiscoveryReport) {
        let (specs, report) = self.scan(ids);
        let tools = specs
            .into_iter()
            .map(|spec| match mode {
                DiscoveryMode::MetadataOnly => DiscoveredTool::Metadata(spec.metadata().clone()),
                DiscoveryMode::Full => DiscoveredTool::Full(spec),
            })
            .collect();
        (tools, report)
    }

    /// Discovers complete specifications regardless of the configured mode.
    pub fn discover_specs<S: AsRef<str>>(&self, ids: &[S]) -> Vec<ToolSpec> {
        self.scan(ids).0
    }

    /// Discovers tools from every identifier the loader knows.
    pub fn discover_all(&self) -> Vec<DiscoveredTool> {
        let ids = self.loader.extension_ids();
        self.discover(&ids)
    }

    fn scan<S: AsRef<str>>(&self, ids: &[S]) -> (Vec<ToolSpec>, DiscoveryReport) {
        let mut report = DiscoveryReport::default();
        let mut specs = Vec::new();

        for id in ids {
            let id = id.as_ref();
            let extension = match self.loader.load(id) {
                Ok(extension) => extension,
                Err(err) => {
                    warn!(extension = %id, error = %err, "skipping extension");
                    report.import_failures += 1;
                    continue;
                }
            };
            report.extensions_loaded += 1;

            let Some(provider) = extension.tool_provider() else {
                let err = DiscoveryError::MissingHook {
                    extension: id.to_owned(),
                };
                debug!(extension = %id, error = %err, "skipping extension");
                report.missing_hooks += 1;
                continue;
            };

            let listed = panic::catch_unwind(AssertUnwindSafe(|| provider.list_tools()))
                .unwrap_or_else(|payload| {
                    Err(ProviderError::new(format!(
                        "provider panicked: {}",
                        panic_message(payload.as_ref())
                    )))
                });
            let entries = match listed {
                Ok(entries) => entries,
                Err(err) => {
                    let err = DiscoveryError::InvalidProviderReturn {
                        extension: id.to_owned(),
                        reason: err.to_string(),
                    };
                    warn!(extension = %id, error = %err, "skipping tool provider");
                    report.provider_failures += 1;
                    continue;
                }
            };

            for entry in entries {
                let spec = match entry {
                    Ok(spec) => spec,
                    Err(err) => {
                        let err = DiscoveryError::NotAToolSpec {
                            extension: id.to_owned(),
                            reason: err.to_string(),
                        };
                        warn!(extension = %id, error = %err, "skipping provider entry");
                        report.invalid_entries += 1;
                        continue;
                    }
                };

                if let Err(err) = self.check_schema(id, &spec) {
                    warn!(extension = %id, tool = spec.name(), error = %err, "skipping tool");
                    report.schema_rejections += 1;
                    continue;
                }

                specs.push(spec);
            }
        }

        report.tools = specs.len();
        info!(
            extensions = report.extensions_loaded,
            tools = report.tools,
            skipped = report.skipped(),
            "discovery pass complete"
        );
        (specs, report)
    }

    fn check_schema(&self, extension: &str, spec: &ToolSpec) -> DiscoveryResult<()> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };

        let instance = spec.metadata().to_value();
        match validator.iter_errors(&instance).next() {
            Some(err) => Err(DiscoveryError::SchemaValidation {
                extension: extension.to_owned(),
                tool: spec.name().to_owned(),
                reason: err.to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use aitools_primitives::Permissions;
    use aitools_registry::{Callable, ParamType, ToolError};
    use serde_json::{Value, json};

    struct Notebook;

    impl ToolProvider for Notebook {
        fn list_tools(&self) -> ProviderResult<Vec<ToolResult<ToolSpec>>> {
            Ok(vec![
                ToolSpec::new(
                    Callable::immediate(|_| Ok(Value::Null))
                        .named("read_cell")
                        .with_doc("Read a cell")
                        .with_param("index", ParamType::Integer),
                )
                .map(|spec| spec.with_permissions(Permissions::NONE.with_read())),
                Err(ToolError::MetadataInference {
                    reason: "unable to extract name from callable".into(),
                }),
                ToolSpec::new(Callable::immediate(|_| Ok(Value::Null)).named("run_cell")),
            ])
        }
    }

    impl Extension for Notebook {
        fn name(&self) -> &str {
            "notebook"
        }

        fn tool_provider(&self) -> Option<&dyn ToolProvider> {
            Some(self)
        }
    }

    struct Silent;

    impl Extension for Silent {
        fn name(&self) -> &str {
            "silent"
        }
    }

    struct Broken;

    impl ToolProvider for Broken {
        fn list_tools(&self) -> ProviderResult<Vec<ToolResult<ToolSpec>>> {
            Err(ProviderError::new("kernel gateway unavailable"))
        }
    }

    impl Extension for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn tool_provider(&self) -> Option<&dyn ToolProvider> {
            Some(self)
        }
    }

    struct Panicking;

    impl ToolProvider for Panicking {
        fn list_tools(&self) -> ProviderResult<Vec<ToolResult<ToolSpec>>> {
            panic!("provider state corrupted")
        }
    }

    impl Extension for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn tool_provider(&self) -> Option<&dyn ToolProvider> {
            Some(self)
        }
    }

    fn loader() -> StaticExtensionLoader {
        StaticExtensionLoader::new()
            .with_extension("notebook", Arc::new(Notebook))
            .with_extension("silent", Arc::new(Silent))
            .with_extension("broken", Arc::new(Broken))
    }

    fn engine(config: DiscoveryConfig) -> DiscoveryEngine<StaticExtensionLoader> {
        DiscoveryEngine::new(loader(), config).expect("engine")
    }

    #[test]
    fn skips_invalid_entries_and_keeps_siblings() {
        let engine = engine(DiscoveryConfig::default());
        let (tools, report) =
            engine.discover_with_report(&["notebook"], DiscoveryMode::Full);

        let names: Vec<_> = tools.iter().map(DiscoveredTool::name).collect();
        assert_eq!(names, ["read_cell", "run_cell"]);
        assert_eq!(report.invalid_entries, 1);
        assert!(tools.iter().all(|tool| tool.spec().is_some()));
    }

    #[test]
    fn extensions_without_provider_contribute_nothing() {
        let engine = engine(DiscoveryConfig::default());
        let (tools, report) = engine.discover_with_report(&["silent"], DiscoveryMode::Full);
        assert!(tools.is_empty());
        assert_eq!(report.missing_hooks, 1);
        assert_eq!(report.skipped(), 0);
    }

    #[test]
    fn failures_do_not_stop_the_scan() {
        let engine = engine(DiscoveryConfig::default());
        let (tools, report) = engine.discover_with_report(
            &["missing", "broken", "silent", "notebook"],
            DiscoveryMode::MetadataOnly,
        );

        assert_eq!(tools.len(), 2);
        assert_eq!(report.import_failures, 1);
        assert_eq!(report.provider_failures, 1);
        assert_eq!(report.extensions_loaded, 3);
        assert!(matches!(tools[0], DiscoveredTool::Metadata(_)));
    }

    #[test]
    fn panicking_provider_is_skipped() {
        let loader = StaticExtensionLoader::new()
            .with_extension("panicking", Arc::new(Panicking))
            .with_extension("notebook", Arc::new(Notebook));
        let engine = DiscoveryEngine::new(loader, DiscoveryConfig::default()).expect("engine");

        let (tools, report) =
            engine.discover_with_report(&["panicking", "notebook"], DiscoveryMode::Full);

        let names: Vec<_> = tools.iter().map(DiscoveredTool::name).collect();
        assert_eq!(names, ["read_cell", "run_cell"]);
        assert_eq!(report.provider_failures, 1);
        assert_eq!(report.extensions_loaded, 2);
    }

    #[test]
    fn metadata_mode_serializes_plain_metadata() {
        let engine = engine(DiscoveryConfig::new(DiscoveryMode::MetadataOnly));
        let tools = engine.discover(&["notebook"]);
        let value = serde_json::to_value(&tools[0]).unwrap();

        assert_eq!(value["name"], "read_cell");
        assert_eq!(value["inputSchema"]["properties"]["index"]["type"], "integer");
        assert!(value.get("read").is_none());
    }

    #[test]
    fn full_mode_serializes_listing_entry() {
        let engine = engine(DiscoveryConfig::default());
        let tools = engine.discover(&["notebook"]);
        let value = serde_json::to_value(&tools[0]).unwrap();
        assert_eq!(value["read"], true);
    }

    #[test]
    fn schema_rejects_non_matching_tools() {
        let schema = json!({
            "type": "object",
            "properties": {
                "description": {"type": "string", "minLength": 1}
            }
        });
        let engine = engine(DiscoveryConfig::default().with_schema(schema));
        let (tools, report) = engine.discover_with_report(&["notebook"], DiscoveryMode::Full);

        let names: Vec<_> = tools.iter().map(DiscoveredTool::name).collect();
        assert_eq!(names, ["read_cell"]);
        assert_eq!(report.schema_rejections, 1);
    }

    #[test]
    fn invalid_schema_is_rejected_up_front() {
        let schema = json!({"type": "not-a-type"});
        let err = DiscoveryEngine::new(loader(), DiscoveryConfig::default().with_schema(schema))
            .expect_err("invalid schema");
        assert!(matches!(err, DiscoveryError::InvalidSchema { .. }));
    }

    #[test]
    fn discover_all_uses_loader_ids() {
        let engine = engine(DiscoveryConfig::default());
        assert_eq!(engine.discover_all().len(), 2);
        assert_eq!(engine.discover_specs(&["notebook"]).len(), 2);
    }

    #[test]
    fn static_loader_replaces_existing_id() {
        let mut loader = StaticExtensionLoader::new().with_extension("x", Arc::new(Silent));
        loader.insert("x", Arc::new(Notebook));
        assert_eq!(loader.extension_ids(), ["x"]);
        assert_eq!(loader.load("x").unwrap().name(), "notebook");
        assert!(matches!(
            loader.load("y"),
            Err(DiscoveryError::ImportFailure { .. })
        ));
    }

    fn build_silent() -> Arc<dyn Extension> {
        Arc::new(Silent)
    }

    inventory::submit! {
        ExtensionRegistration::new("inventory_silent", build_silent)
    }

    #[test]
    fn inventory_loader_finds_linked_registrations() {
        let loader = InventoryExtensionLoader;
        assert!(loader.extension_ids().contains(&"inventory_silent".to_owned()));
        assert_eq!(loader.load("inventory_silent").unwrap().name(), "silent");
        assert!(loader.load("not_linked").is_err());
    }
}
