//! Configuration for implore-simple
//!
//! Controls how a session connects and whether convenience calls may
//! create a view on their own when none is active.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::local::BUILTIN_URL;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// URL passed to the engine when the session connects
    pub connection_url: String,

    /// Let `get_active_view_or_create` create a view when none is active
    pub auto_create_view: bool,

    /// View definition created by `get_active_view_or_create`
    pub default_view: String,

    /// Satellite ranks of a parallel run neither connect nor extend
    pub satellite: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connection_url: BUILTIN_URL.to_string(),
            auto_create_view: true,
            default_view: "RenderView".to_string(),
            satellite: false,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load a TOML configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Standard configuration location: ~/.implore/simple.toml
    pub fn standard_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".implore").join("simple.toml"))
    }

    /// Load from the standard location, falling back to defaults when the
    /// file does not exist.
    pub fn load_standard() -> Result<Self, ConfigError> {
        match Self::standard_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading session configuration from {:?}", path);
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection_url.trim().is_empty() {
            return Err(ConfigError::MissingField("connection_url".to_string()));
        }

        if self.default_view.trim().is_empty() {
            return Err(ConfigError::MissingField("default_view".to_string()));
        }

        if self.default_view.chars().any(char::is_whitespace) {
            return Err(ConfigError::OutOfRange(format!(
                "default_view '{}' must be a definition name, not a label",
                self.default_view
            )));
        }

        Ok(())
    }
}
