//! Driver configuration
//!
//! Loaded once from a YAML file and handed by value to the driver factory.
//! Every section has defaults, so a file only needs the values that differ.

use crate::drivers::clustered::ClusteredConfig;
use crate::drivers::lvm::LvmConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Top-level configuration selecting and configuring one share driver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Driver name understood by `DriverFactory` (`clustered`, `ontap`, `lvm`)
    pub driver: String,
    pub clustered: ClusteredConfig,
    pub lvm: LvmConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            driver: "clustered".to_string(),
            clustered: ClusteredConfig::default(),
            lvm: LvmConfig::default(),
        }
    }
}

impl DriverConfig {
    /// Load and validate a YAML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading driver configuration from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the section of the selected driver
    pub fn validate(&self) -> Result<()> {
        match self.driver.to_lowercase().as_str() {
            "clustered" | "ontap" => self.clustered.validate(),
            "lvm" => self.lvm.validate(),
            other => Err(Error::Configuration(format!("unknown share driver: {}", other))),
        }
    }
}

/// Report the first of `fields` whose value is empty
pub(crate) fn require_set(fields: &[(&str, &str)]) -> Result<()> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err(Error::Configuration(format!("{} is not set", name))),
        None => Ok(()),
    }
}
