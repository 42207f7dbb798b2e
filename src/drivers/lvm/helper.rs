//! Protocol helper port of the LVM driver

use crate::domain::share::AccessRule;
use crate::error::Result;
use async_trait::async_trait;

/// Exposes a locally mounted volume over one protocol
#[async_trait]
pub trait ExportHelper: Send + Sync {
    /// Check the protocol server is usable
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Export `local_path` as `share_name`, returning the export location
    ///
    /// With `recreate` an existing export of the same name is replaced
    /// instead of failing.
    async fn create_export(&self, local_path: &str, share_name: &str, recreate: bool) -> Result<String>;

    async fn remove_export(&self, local_path: &str, share_name: &str) -> Result<()>;

    async fn allow_access(&self, local_path: &str, share_name: &str, access: &AccessRule) -> Result<()>;

    async fn deny_access(&self, local_path: &str, share_name: &str, access: &AccessRule) -> Result<()>;
}
