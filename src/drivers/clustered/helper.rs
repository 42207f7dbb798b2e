//! Protocol helper port of the clustered driver

use crate::domain::share::{AccessRule, Share};
use crate::error::Result;
use async_trait::async_trait;

/// Protocol-specific exposure and access control of a share
#[async_trait]
pub trait NasHelper: Send + Sync {
    /// Expose the share's volume on `target`, returning its export location
    async fn create_share(&self, target: &str, share: &Share) -> Result<String>;

    /// Remove the export created by `create_share`
    async fn delete_share(&self, share: &Share) -> Result<()>;

    async fn allow_access(&self, share: &Share, access: &AccessRule) -> Result<()>;

    async fn deny_access(&self, share: &Share, access: &AccessRule) -> Result<()>;

    /// Controller host encoded in the share's export location
    fn get_target(&self, share: &Share) -> Option<String>;
}
