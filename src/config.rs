//! Configuration types for reqlog.
//!
//! Config is loaded once at startup from a TOML file and validated before the
//! server opens its port. Every section is optional; a missing file means
//! "all defaults".
//!
//! # Example
//! ```toml
//! [server]
//! port = 3000
//!
//! [logging]
//! level      = "info"
//! format     = "json"
//! sink       = "tracing"
//! msg_prefix = "[api] "
//!
//! [logging.engine]
//! redact = ["req.headers.authorization"]
//! ```

use std::{path::Path, str::FromStr};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::level_filters::LevelFilter;

use crate::error::LoggerError;
use crate::logger::LoggerOptions;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("parsing config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.server.port != 0, "server.port must be non-zero");
        self.logging
            .level_filter()
            .context("invalid logging.level")?;
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port for the demo API (default: 3000).
    #[serde(default = "defaults::port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: defaults::port(),
        }
    }
}

/// How the tracing subscriber renders lines.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Where the logging engine sends records.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Through `tracing`, rendered by the installed subscriber.
    #[default]
    Tracing,
    /// Raw JSON lines on stdout.
    Stdout,
}

/// The `[logging]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Root threshold: `off`, `error`, `warn`, `info`, `debug` or `trace`.
    #[serde(default = "defaults::level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub sink: SinkKind,

    /// Prefix for every message written by the `api` logger.
    #[serde(default)]
    pub msg_prefix: Option<String>,

    /// Engine-specific options, passed through to the logger untouched.
    #[serde(default)]
    pub engine: Map<String, Value>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::level(),
            format: LogFormat::default(),
            sink: SinkKind::default(),
            msg_prefix: None,
            engine: Map::new(),
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> Result<LevelFilter, LoggerError> {
        LevelFilter::from_str(&self.level).map_err(|_| LoggerError::InvalidLevel(self.level.clone()))
    }

    /// Options for the middleware's namespaced logger.
    pub fn logger_options(&self) -> LoggerOptions {
        LoggerOptions {
            msg_prefix: self.msg_prefix.clone(),
            engine: self.engine.clone(),
            ..LoggerOptions::default()
        }
    }
}

mod defaults {
    pub fn port() -> u16 { 3000 }
    pub fn level() -> String { "info".into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Parsing & validation
    // -----------------------------------------------------------------------

    #[test]
    fn parse_example_config() {
        let content = include_str!("../config.example.toml");
        let config: Config = toml::from_str(content).expect("example config should parse");
        config.validate().expect("example config should be valid");
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").expect("should parse");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.sink, SinkKind::Tracing);
        assert!(config.logging.engine.is_empty());
    }

    #[test]
    fn validation_rejects_unknown_level() {
        let config: Config = toml::from_str("[logging]\nlevel = \"loud\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_port_zero() {
        let config: Config = toml::from_str("[server]\nport = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default(Path::new("/nonexistent/reqlog.toml")).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    // -----------------------------------------------------------------------
    // Logging section
    // -----------------------------------------------------------------------

    #[test]
    fn level_filter_parses_case_insensitively() {
        let logging = LoggingConfig {
            level: "DEBUG".into(),
            ..LoggingConfig::default()
        };
        assert_eq!(logging.level_filter().unwrap(), LevelFilter::DEBUG);
    }

    #[test]
    fn engine_table_is_passed_through_to_logger_options() {
        let config: Config = toml::from_str(
            r#"
            [logging]
            format     = "json"
            sink       = "stdout"
            msg_prefix = "[api] "

            [logging.engine]
            depth = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.sink, SinkKind::Stdout);

        let options = config.logging.logger_options();
        assert_eq!(options.msg_prefix.as_deref(), Some("[api] "));
        assert_eq!(options.engine["depth"], serde_json::json!(3));
        assert!(options.formatters.log.is_none());
    }
}
