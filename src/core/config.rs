//! Configuration for the text graph tools
//!
//! Settings come from an optional TOML file, then `TG_*` environment
//! overrides, then validation.

use crate::core::error::{Error, Result};
use crate::storage::codec::RecordFormat;
use crate::{log_info, log_warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file looked up by [`Config::load`]
pub const DEFAULT_CONFIG_FILE: &str = "textgraph.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store and persistence settings
    pub storage: StorageConfig,

    /// Graph server / client settings
    pub protocol: ProtocolConfig,

    /// Graph-description export settings
    pub export: ExportConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Record format used when a new file is created
    pub default_format: RecordFormat,

    /// Write a recovery snapshot every N transactions (0 = never)
    pub snapshot_interval: usize,
}

/// Protocol configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Server program spawned by the process transport
    pub server_program: String,

    /// Extra arguments passed before the graph path
    pub server_args: Vec<String>,

    /// Write the graph back to its file when input ends
    pub persist_on_exit: bool,
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Renderer program receiving the description on stdin
    pub renderer: String,

    /// Renderer arguments
    pub renderer_args: Vec<String>,

    /// Default neighborhood radius for diagrams
    pub neighborhood_levels: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Colored output
    pub ansi: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default_format: RecordFormat::IdTagged,
            snapshot_interval: 5,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            server_program: "textgraph-server".to_string(),
            server_args: Vec::new(),
            persist_on_exit: false,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            renderer: "dot".to_string(),
            renderer_args: vec!["-T".to_string(), "xlib".to_string(), "/dev/stdin".to_string()],
            neighborhood_levels: 4,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            ansi: false,
        }
    }
}

impl Config {
    /// Load configuration from `textgraph.toml` (if present) and the environment
    pub fn load() -> Result<Self> {
        let mut config = if Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::from_file(DEFAULT_CONFIG_FILE)?
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        use std::env;

        if let Ok(level) = env::var("TG_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(interval) = env::var("TG_SNAPSHOT_INTERVAL") {
            self.storage.snapshot_interval = interval
                .parse()
                .map_err(|e| Error::config(format!("Invalid snapshot interval: {}", e)))?;
        }

        if let Ok(format) = env::var("TG_DEFAULT_FORMAT") {
            self.storage.default_format = match format.as_str() {
                "id_tagged" => RecordFormat::IdTagged,
                "positional" => RecordFormat::Positional,
                other => {
                    return Err(Error::config(format!(
                        "Invalid record format: {}. Valid options: id_tagged, positional",
                        other
                    )))
                }
            };
        }

        if let Ok(renderer) = env::var("TG_RENDERER") {
            self.export.renderer = renderer;
        }

        if let Ok(program) = env::var("TG_SERVER_PROGRAM") {
            self.protocol.server_program = program;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(Error::config("Invalid log level")),
        }

        if self.export.renderer.is_empty() {
            return Err(Error::config("Renderer program must not be empty"));
        }

        if self.protocol.server_program.is_empty() {
            return Err(Error::config("Server program must not be empty"));
        }

        Ok(())
    }
}

/// Load configuration from a file, or fall back to [`Config::load`]
pub fn load_config_or_default(path: Option<&str>) -> Config {
    let loaded = match path {
        Some(path) => Config::from_file(path).and_then(|config| {
            config.validate()?;
            Ok(config)
        }),
        None => Config::load(),
    };

    match loaded {
        Ok(config) => {
            if let Some(path) = path {
                log_info!("Loaded configuration from: {}", path);
            }
            config
        }
        Err(e) => {
            log_warn!("Failed to load configuration: {}. Using defaults.", e);
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.snapshot_interval, 5);
        assert_eq!(config.export.neighborhood_levels, 4);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [storage]
            default_format = "positional"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.default_format, RecordFormat::Positional);
        assert_eq!(config.storage.snapshot_interval, 5);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.export.renderer, "dot");
    }

    #[test]
    fn invalid_level_is_rejected() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn unreadable_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::from_file(dir.path().join("missing.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
