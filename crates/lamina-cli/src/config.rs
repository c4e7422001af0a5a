//! TOML run configuration.

use std::path::Path;

use anyhow::{Context, Result};
use lamina_slicer::{Planes, SliceSettings};
use serde::{Deserialize, Serialize};

/// Contents of a `lamina.toml` file. Every table and field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tolerances and parallelism.
    pub settings: SliceSettings,
    /// Where to cut.
    pub planes: Planes,
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).context("invalid configuration")?;
        config.settings.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }
}
