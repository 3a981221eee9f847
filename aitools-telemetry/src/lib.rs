//! Tracing setup for hosts and demos.
//!
//! Libraries in this workspace only emit `tracing` events; installing a
//! subscriber is left to the binary, through [`init_tracing`].

#![warn(missing_docs, clippy::pedantic)]

use anyhow::{Context, anyhow};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Output layout of formatted events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line events with fields inline.
    #[default]
    Compact,
    /// The default `tracing-subscriber` layout, spans included.
    Full,
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    filter: String,
    with_target: bool,
    format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_owned(),
            with_target: false,
            format: LogFormat::default(),
        }
    }
}

impl TelemetryConfig {
    /// Creates settings with the given filter directive.
    #[must_use]
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Self::default()
        }
    }

    /// Shows or hides event targets.
    #[must_use]
    pub const fn with_target(mut self, with_target: bool) -> Self {
        self.with_target = with_target;
        self
    }

    /// Selects the output layout.
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Returns the filter directive used when `RUST_LOG` is unset.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Returns `true` when event targets are shown.
    #[must_use]
    pub const fn shows_target(&self) -> bool {
        self.with_target
    }

    /// Returns the output layout.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }
}

/// Installs a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Returns `false`
/// without touching anything when a global subscriber is already set.
///
/// # Errors
///
/// Returns an error when the filter directive does not parse or the
/// subscriber cannot be installed.
pub fn init_tracing(config: &TelemetryConfig) -> anyhow::Result<bool> {
    if tracing::dispatcher::has_been_set() {
        tracing::debug!("tracing subscriber already installed");
        return Ok(false);
    }

    let filter = build_filter(config, EnvFilter::try_from_default_env())?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.shows_target());

    let installed = match config.format() {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Full => builder.try_init(),
    };
    installed.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;
    Ok(true)
}

/// Prefers the filter read from `RUST_LOG`, falling back to the configured
/// directive when the variable is unset or unusable.
fn build_filter<E>(
    config: &TelemetryConfig,
    from_env: Result<EnvFilter, E>,
) -> anyhow::Result<EnvFilter> {
    match from_env {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(config.filter())
            .with_context(|| format!("invalid log filter `{}`", config.filter())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.filter(), "info");
        assert!(!config.shows_target());
        assert_eq!(config.format(), LogFormat::Compact);
    }

    #[test]
    fn deserializes_partial_settings() {
        let config: TelemetryConfig =
            serde_json::from_str(r#"{"filter": "aitools_kernel=debug", "format": "full"}"#)
                .expect("parse");
        assert_eq!(config.filter(), "aitools_kernel=debug");
        assert_eq!(config.format(), LogFormat::Full);
        assert!(!config.shows_target());
    }

    #[test]
    fn environment_overrides_configured_filter() {
        let config = TelemetryConfig::new("warn");
        let filter = build_filter(&config, Ok::<_, ()>(EnvFilter::new("debug"))).expect("filter");
        assert!(filter.to_string().contains("debug"));

        let filter = build_filter(&config, Err(())).expect("filter");
        assert!(filter.to_string().contains("warn"));
    }

    #[test]
    fn invalid_configured_filter_is_reported() {
        let config = TelemetryConfig::new("aitools=loudest");
        let err = build_filter(&config, Err(())).expect_err("invalid");
        assert!(err.to_string().contains("aitools=loudest"));
    }
}
