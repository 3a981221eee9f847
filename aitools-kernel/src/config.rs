//! Runtime configuration for the discovery and dispatch engines.

use std::time::Duration;

use serde_json::Value;

use crate::error::{ConfigError, ConfigResult, DiscoveryError, DiscoveryResult};

/// Shape of the entries a discovery pass returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DiscoveryMode {
    /// Metadata objects only.
    MetadataOnly,
    /// Complete tool specifications, callable included.
    #[default]
    Full,
}

/// Discovery engine settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryConfig {
    mode: DiscoveryMode,
    schema: Option<Value>,
}

impl DiscoveryConfig {
    /// Creates a configuration with the given mode and no schema.
    #[must_use]
    pub const fn new(mode: DiscoveryMode) -> Self {
        Self { mode, schema: None }
    }

    /// Validates every discovered tool's metadata against `schema`.
    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Returns the discovery mode.
    #[must_use]
    pub const fn mode(&self) -> DiscoveryMode {
        self.mode
    }

    /// Returns the metadata schema, if any.
    #[must_use]
    pub fn schema(&self) -> Option<&Value> {
        self.schema.as_ref()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::InvalidSchema`] when the schema is neither
    /// an object nor a boolean.
    pub fn validate(&self) -> DiscoveryResult<()> {
        match &self.schema {
            None | Some(Value::Object(_) | Value::Bool(_)) => Ok(()),
            Some(_) => Err(DiscoveryError::InvalidSchema {
                reason: "schema must be a JSON object or boolean".into(),
            }),
        }
    }
}

/// Dispatch engine settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchConfig {
    invocation_timeout: Option<Duration>,
}

impl DispatchConfig {
    /// Creates a configuration without an invocation timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            invocation_timeout: None,
        }
    }

    /// Bounds each tool invocation by `timeout`. Dispatch then has to run
    /// inside a Tokio runtime with the time driver enabled.
    #[must_use]
    pub const fn with_invocation_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout = Some(timeout);
        self
    }

    /// Returns the per-invocation timeout.
    #[must_use]
    pub const fn invocation_timeout(self) -> Option<Duration> {
        self.invocation_timeout
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero timeout.
    pub fn validate(self) -> ConfigResult<()> {
        if self.invocation_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(ConfigError::Invalid(
                "invocation timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn defaults() {
        let discovery = DiscoveryConfig::default();
        assert_eq!(discovery.mode(), DiscoveryMode::Full);
        assert!(discovery.schema().is_none());
        assert!(discovery.validate().is_ok());

        assert!(DispatchConfig::default().invocation_timeout().is_none());
    }

    #[test]
    fn schema_must_be_object_or_bool() {
        let config = DiscoveryConfig::new(DiscoveryMode::MetadataOnly).with_schema(json!(12));
        assert!(matches!(
            config.validate(),
            Err(DiscoveryError::InvalidSchema { .. })
        ));

        let config = DiscoveryConfig::default().with_schema(json!(true));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = DispatchConfig::new().with_invocation_timeout(Duration::ZERO);
        assert_eq!(
            config.validate(),
            Err(ConfigError::Invalid(
                "invocation timeout must be greater than zero"
            ))
        );

        let config = DispatchConfig::new().with_invocation_timeout(Duration::from_millis(50));
        assert!(config.validate().is_ok());
    }
}
