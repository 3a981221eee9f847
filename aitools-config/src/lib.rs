//! Configuration for the server AI tools extension.
//!
//! Settings are read from a JSON file and then adjusted through `AITOOLS_*`
//! environment variables:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `AITOOLS_LOG` | replaces `telemetry.filter` |
//! | `AITOOLS_METADATA_ONLY` | replaces `discovery.metadata_only` |
//! | `AITOOLS_TIMEOUT_MS` | replaces `dispatch.timeout_ms` |

#![warn(missing_docs, clippy::pedantic)]

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use aitools_kernel::{CallParser, DiscoveryConfig, DiscoveryMode, DispatchConfig};
use aitools_telemetry::TelemetryConfig;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

/// Route prefix used when none is configured.
pub const DEFAULT_BASE_URL: &str = "/jupyter-server-ai-tools";

const ENV_LOG: &str = "AITOOLS_LOG";
const ENV_METADATA_ONLY: &str = "AITOOLS_METADATA_ONLY";
const ENV_TIMEOUT_MS: &str = "AITOOLS_TIMEOUT_MS";

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file could not be read.
    #[error("failed to read `{path}`: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// JSON could not be parsed.
    #[error("failed to parse {what}: {source}")]
    Parse {
        /// What was being parsed.
        what: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A setting has an unusable value.
    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        /// Setting or variable name.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// `discovery` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Return metadata objects instead of full tool specifications.
    pub metadata_only: bool,
    /// Extension identifiers to scan, in order. Empty means every known
    /// extension.
    pub extensions: Vec<String>,
    /// JSON Schema file tool metadata must satisfy.
    pub schema_path: Option<PathBuf>,
}

/// `dispatch` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Parser tag.
    pub parser: String,
    /// Per-invocation timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            parser: "default".to_owned(),
            timeout_ms: None,
        }
    }
}

/// Complete extension configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerToolsConfig {
    base_url: String,
    discovery: DiscoverySettings,
    dispatch: DispatchSettings,
    telemetry: TelemetryConfig,
}

impl Default for ServerToolsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            discovery: DiscoverySettings::default(),
            dispatch: DispatchSettings::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl ServerToolsConfig {
    /// Parses a JSON document. Missing sections take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or mistyped fields.
    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            what: "configuration".into(),
            source,
        })
    }

    /// Reads a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = read(path)?;
        let config = Self::from_json_str(&raw)?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Applies overrides looked up by variable name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(filter) = lookup(ENV_LOG) {
            debug!(variable = ENV_LOG, %filter, "overriding log filter");
            self.telemetry = TelemetryConfig::new(filter)
                .with_target(self.telemetry.shows_target())
                .with_format(self.telemetry.format());
        }

        if let Some(raw) = lookup(ENV_METADATA_ONLY) {
            let metadata_only = parse_flag(&raw).ok_or_else(|| {
                ConfigError::invalid(ENV_METADATA_ONLY, format!("`{raw}` is not a boolean"))
            })?;
            debug!(variable = ENV_METADATA_ONLY, metadata_only, "overriding discovery mode");
            self.discovery.metadata_only = metadata_only;
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            let timeout = raw
                .trim()
                .parse::<u64>()
                .map_err(|err| ConfigError::invalid(ENV_TIMEOUT_MS, err.to_string()))?;
            debug!(variable = ENV_TIMEOUT_MS, timeout, "overriding invocation timeout");
            self.dispatch.timeout_ms = Some(timeout);
        }

        Ok(())
    }

    /// Applies overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable does not parse.
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Checks values that deserialization cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad setting.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.base_url.starts_with('/') {
            return Err(ConfigError::invalid("base_url", "must start with `/`"));
        }
        if let Some(id) = self
            .discovery
            .extensions
            .iter()
            .find(|id| id.trim().is_empty())
        {
            return Err(ConfigError::invalid(
                "discovery.extensions",
                format!("`{id}` is not an extension identifier"),
            ));
        }
        self.call_parser()?;
        self.dispatch_config()
            .validate()
            .map_err(|err| ConfigError::invalid("dispatch.timeout_ms", err.to_string()))
    }

    /// Returns the route prefix.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the discovery section.
    #[must_use]
    pub fn discovery(&self) -> &DiscoverySettings {
        &self.discovery
    }

    /// Returns the dispatch section.
    #[must_use]
    pub fn dispatch(&self) -> &DispatchSettings {
        &self.dispatch
    }

    /// Returns the telemetry section.
    #[must_use]
    pub fn telemetry(&self) -> &TelemetryConfig {
        &self.telemetry
    }

    /// Returns the configured discovery mode.
    #[must_use]
    pub const fn discovery_mode(&self) -> DiscoveryMode {
        if self.discovery.metadata_only {
            DiscoveryMode::MetadataOnly
        } else {
            DiscoveryMode::Full
        }
    }

    /// Reads the metadata schema, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load_schema(&self) -> ConfigResult<Option<Value>> {
        let Some(path) = &self.discovery.schema_path else {
            return Ok(None);
        };
        let raw = read(path)?;
        let schema = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            what: format!("schema `{}`", path.display()),
            source,
        })?;
        Ok(Some(schema))
    }

    /// Builds the discovery engine settings, reading the schema file.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::load_schema`] failures.
    pub fn discovery_config(&self) -> ConfigResult<DiscoveryConfig> {
        let config = DiscoveryConfig::new(self.discovery_mode());
        Ok(match self.load_schema()? {
            Some(schema) => config.with_schema(schema),
            None => config,
        })
    }

    /// Builds the dispatch engine settings.
    #[must_use]
    pub fn dispatch_config(&self) -> DispatchConfig {
        match self.dispatch.timeout_ms {
            Some(ms) => DispatchConfig::new().with_invocation_timeout(Duration::from_millis(ms)),
            None => DispatchConfig::new(),
        }
    }

    /// Resolves the parser tag.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unknown tag.
    pub fn call_parser(&self) -> ConfigResult<CallParser> {
        self.dispatch
            .parser
            .parse()
            .map_err(|err: aitools_kernel::ParseError| {
                ConfigError::invalid("dispatch.parser", err.to_string())
            })
    }
}

fn read(path: &Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_owned(),
        source,
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = ServerToolsConfig::from_json_str("{}").expect("parse");
        assert_eq!(config, ServerToolsConfig::default());
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.discovery_mode(), DiscoveryMode::Full);
        assert!(config.dispatch_config().invocation_timeout().is_none());
        assert!(matches!(config.call_parser(), Ok(CallParser::Default)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_all_sections() {
        let config = ServerToolsConfig::from_json_str(
            r#"{
                "base_url": "/tools",
                "discovery": {"metadata_only": true, "extensions": ["notebook", "terminal"]},
                "dispatch": {"parser": "default", "timeout_ms": 250},
                "telemetry": {"filter": "debug", "with_target": true}
            }"#,
        )
        .expect("parse");

        assert_eq!(config.base_url(), "/tools");
        assert_eq!(config.discovery_mode(), DiscoveryMode::MetadataOnly);
        assert_eq!(config.discovery().extensions, ["notebook", "terminal"]);
        assert_eq!(
            config.dispatch_config().invocation_timeout(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(config.telemetry().filter(), "debug");
        assert!(config.telemetry().shows_target());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = ServerToolsConfig::from_json_str(r#"{"dispatch": {"timeout_ms": "soon"}}"#)
            .expect_err("mistyped");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = ServerToolsConfig::default();
        config
            .apply_overrides(lookup(&[
                ("AITOOLS_LOG", "aitools_kernel=trace"),
                ("AITOOLS_METADATA_ONLY", "yes"),
                ("AITOOLS_TIMEOUT_MS", "1500"),
            ]))
            .expect("overrides");

        assert_eq!(config.telemetry().filter(), "aitools_kernel=trace");
        assert_eq!(config.discovery_mode(), DiscoveryMode::MetadataOnly);
        assert_eq!(config.dispatch().timeout_ms, Some(1500));
    }

    #[test]
    fn bad_override_names_variable() {
        let mut config = ServerToolsConfig::default();
        let err = config
            .apply_overrides(lookup(&[("AITOOLS_METADATA_ONLY", "maybe")]))
            .expect_err("not a flag");
        assert!(matches!(err, ConfigError::Invalid { field, .. } if field == "AITOOLS_METADATA_ONLY"));
    }

    #[test]
    fn validation_catches_bad_values() {
        let config = ServerToolsConfig::from_json_str(r#"{"base_url": "tools"}"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "base_url", .. })
        ));

        let config =
            ServerToolsConfig::from_json_str(r#"{"dispatch": {"parser": "xml"}}"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "dispatch.parser", .. })
        ));

        let config =
            ServerToolsConfig::from_json_str(r#"{"dispatch": {"timeout_ms": 0}}"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "dispatch.timeout_ms", .. })
        ));
    }

    #[test]
    fn loads_file_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let schema_path = dir.path().join("schema.json");
        std::fs::write(&schema_path, r#"{"type": "object", "required": ["name"]}"#).unwrap();
        let config_path = dir.path().join("config.json");
        let document = serde_json::json!({
            "discovery": {"schema_path": schema_path}
        });
        std::fs::write(&config_path, document.to_string()).unwrap();

        let config = ServerToolsConfig::load(&config_path).expect("load");
        let discovery = config.discovery_config().expect("schema");
        assert_eq!(discovery.schema().unwrap()["required"][0], "name");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ServerToolsConfig::load("/definitely/not/here.json").expect_err("missing");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
