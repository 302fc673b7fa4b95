//! Configuration for resource conversion
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (convert.toml)
//! - Environment variables (CONVERT__*)
//!
//! ## Example config file (convert.toml):
//! ```toml
//! [output]
//! format = "json"
//! default_version = "v1beta1"
//!
//! [registry]
//! schema_dirs = ["./extra-schemas"]
//!
//! [input]
//! recursive = true
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::codec::OutputFormat;
use crate::driver::TargetVersion;
use crate::error::Result;
use crate::registry::SchemaRegistry;

/// Main configuration for the converter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Extra schema definitions
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Input discovery settings
    #[serde(default)]
    pub input: InputConfig,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Serialization format (yaml or json)
    #[serde(default)]
    pub format: OutputFormat,

    /// Target version used when none is given on the command line
    #[serde(default)]
    pub default_version: Option<String>,
}

/// Registry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Directories of additional kind definitions, loaded after the built-in ones
    #[serde(default)]
    pub schema_dirs: Vec<PathBuf>,
}

/// Input configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    /// Descend into subdirectories of directory inputs
    #[serde(default)]
    pub recursive: bool,
}

impl ConvertConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the default locations
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["convert.toml", ".convert.toml", "config/convert.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("io", "cert-manager", "resource-convert") {
            let xdg_config = config_dir.config_dir().join("convert.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Environment variables (CONVERT__OUTPUT__FORMAT=json)
        builder = builder.add_source(
            Environment::with_prefix("CONVERT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Configured default target, if any
    pub fn default_target(&self) -> Result<Option<TargetVersion>> {
        self.output
            .default_version
            .as_deref()
            .map(str::parse)
            .transpose()
    }

    /// Extra schema directories, relative paths resolved against the current directory
    pub fn schema_dirs(&self) -> Result<Vec<PathBuf>> {
        self.registry
            .schema_dirs
            .iter()
            .map(|p| -> Result<PathBuf> {
                if p.is_absolute() {
                    Ok(p.clone())
                } else {
                    Ok(std::env::current_dir()?.join(p))
                }
            })
            .collect()
    }

    /// Built-in definitions plus every configured schema directory
    pub fn build_registry(&self) -> Result<SchemaRegistry> {
        let mut builder = SchemaRegistry::builder().load_builtin()?;
        for dir in self.schema_dirs()? {
            builder = builder.load_dir(&dir)?;
        }
        builder.build()
    }
}
