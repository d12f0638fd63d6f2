//! Configuration management for schema tooling
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (index-schema.toml)
//! - Environment variables (INDEX_SCHEMA__*)
//!
//! ## Example config file (index-schema.toml):
//! ```toml
//! [connection]
//! index_prefix = "staging"
//! include_system_indices = false
//!
//! [output]
//! format = "pretty"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchemaConfig {
    /// Connection naming settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Output settings for the CLI
    #[serde(default)]
    pub output: OutputConfig,
}

/// Connection configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConnectionConfig {
    /// Prefix applied to every index name
    #[serde(default)]
    pub index_prefix: Option<String>,

    /// Whether index listings include system (dot-prefixed) indexes
    #[serde(default)]
    pub include_system_indices: bool,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

impl OutputFormat {
    pub fn render(&self, value: &serde_json::Value) -> Result<String> {
        let rendered = match self {
            OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
            OutputFormat::Compact => serde_json::to_string(value)?,
        };
        Ok(rendered)
    }
}

impl SchemaConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, layering a specific file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = [
            "index-schema.toml",
            ".index-schema.toml",
            "config/index-schema.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "index-schema") {
            let xdg_config = config_dir.config_dir().join("index-schema.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("INDEX_SCHEMA")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Message(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
