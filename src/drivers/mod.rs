//! Share driver adapters
//!
//! Implementations of the `ShareDriver` port:
//! - Clustered: volumes on a clustered NAS controller over its XML API
//! - LVM: local logical volumes exported by the kernel NFS server or Samba

pub mod clustered;
pub mod lvm;

pub use clustered::{ClusteredConfig, ClusteredShareDriver};
pub use lvm::{LvmConfig, LvmShareDriver};

use crate::config::DriverConfig;
use crate::domain::ports::ShareDriver;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Factory for share drivers
pub struct DriverFactory;

impl DriverFactory {
    /// Create a driver by name
    pub fn create(name: &str, config: &DriverConfig) -> Result<Arc<dyn ShareDriver>> {
        match name.to_lowercase().as_str() {
            "clustered" | "ontap" => Ok(Arc::new(ClusteredShareDriver::new(config.clustered.clone())?)),
            "lvm" => Ok(Arc::new(LvmShareDriver::new(config.lvm.clone()))),
            _ => Err(Error::Configuration(format!("unknown share driver: {}", name))),
        }
    }

    /// Create the driver selected by the configuration
    pub fn from_config(config: &DriverConfig) -> Result<Arc<dyn ShareDriver>> {
        Self::create(&config.driver, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_create_by_name() {
        let mut config = DriverConfig::default();
        config.clustered.hostname = "filer.example".into();
        config.clustered.password = "secret".into();

        let driver = DriverFactory::create("ONTAP", &config).unwrap();
        assert_eq!(driver.backend_name(), "clustered");

        let driver = DriverFactory::create("lvm", &config).unwrap();
        assert_eq!(driver.backend_name(), "LVM");
    }

    #[test]
    fn test_unknown_driver() {
        let config = DriverConfig {
            driver: "glusterfs".into(),
            ..Default::default()
        };
        let Err(err) = DriverFactory::from_config(&config) else {
            panic!("glusterfs driver was created");
        };
        assert_matches!(err, Error::Configuration(msg) if msg.contains("glusterfs"));
    }
}
