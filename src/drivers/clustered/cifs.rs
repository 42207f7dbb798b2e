//! CIFS helper of the clustered driver
//!
//! Shares are named after the backing volume and access is managed per user
//! through share ACEs. Host based rules are not supported.

use super::helper::NasHelper;
use crate::domain::export::CifsExport;
use crate::domain::naming::share_name;
use crate::domain::share::{AccessRule, AccessType, Share};
use crate::error::{Error, Result};
use crate::zapi::{ControllerClient, Element};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

const EVERYONE: &str = "everyone";

pub struct CifsHelper {
    client: Arc<ControllerClient>,
}

impl CifsHelper {
    pub fn new(client: Arc<ControllerClient>) -> Self {
        Self { client }
    }

    async fn ensure_service_running(&self) -> Result<()> {
        let response = self.client.invoke(Element::new("cifs-status")).await?;
        let status = response.results().child_content("status").unwrap_or_default();
        debug!("CIFS service status: {}", status);

        if status == "stopped" {
            info!("Starting CIFS service");
            let started = self.client.invoke_unchecked(Element::new("cifs-start")).await?;
            if !started.passed() {
                warn!("cifs-start reported: {}", started.reason());
            }
        }
        Ok(())
    }

    async fn set_mixed_security(&self, volume_path: &str) -> Result<()> {
        let args = ["qtree", "security", volume_path, "mixed"]
            .into_iter()
            .map(|arg| Element::leaf("arg", arg));
        let request = Element::new("system-cli").with_child(Element::new("args").with_children(args));
        self.client.invoke(request).await?;
        Ok(())
    }

    async fn remove_ace(&self, user: &str, share_name: &str) -> Result<()> {
        let request = Element::new("cifs-share-ace-delete")
            .with_child_content("user-name", user)
            .with_child_content("share-name", share_name);
        self.client.invoke(request).await?;
        Ok(())
    }

    async fn user_exists(&self, user: &str) -> Result<bool> {
        let response = self
            .client
            .invoke_unchecked(Element::new("useradmin-user-list").with_child_content("user-name", user))
            .await?;
        Ok(response.passed())
    }
}

/// Export of `share`, failing when its location names no host or share
fn known_export(share: &Share) -> Result<CifsExport> {
    let export = known_export(share)?;
    if export.host.is_empty() || export.share_name.is_empty() {
        return Err(Error::UnknownExportLocation {
            share_id: share.id.clone(),
        });
    }
    Ok(export)
}

#[async_trait]
impl NasHelper for CifsHelper {
    async fn create_share(&self, target: &str, share: &Share) -> Result<String> {
        let name = share_name(&share.id);
        let volume_path = format!("/vol/{}", name);
        info!("Creating CIFS share {} on {}", name, target);

        self.ensure_service_running().await?;
        self.set_mixed_security(&volume_path).await?;

        let add = Element::new("cifs-share-add")
            .with_child_content("path", volume_path.as_str())
            .with_child_content("share-name", name.as_str());
        self.client.invoke(add).await?;
        self.remove_ace(EVERYONE, &name).await?;

        let address = match self.client.resolve_host_address(target).await? {
            Some(address) => address,
            None => {
                warn!("No address known for {}, exporting by name", target);
                target.to_string()
            }
        };
        Ok(CifsExport::new(address, name).location())
    }

    async fn delete_share(&self, share: &Share) -> Result<()> {
        let export = known_export(share)?;
        info!("Deleting CIFS share {}", export.share_name);

        let request = Element::new("cifs-share-delete").with_child_content("share-name", export.share_name);
        self.client.invoke(request).await?;
        Ok(())
    }

    async fn allow_access(&self, share: &Share, access: &AccessRule) -> Result<()> {
        access.require(AccessType::UserPassword, share.share_proto)?;
        let export = known_export(share)?;
        let user = access.access_to.trim();

        if !self.user_exists(user).await? {
            return Err(Error::UserNotFound {
                user: user.to_string(),
                target: export.host,
            });
        }

        info!("Granting {} access to CIFS share {}", user, export.share_name);
        let request = Element::new("cifs-share-ace-set")
            .with_child_content("access-rights", "rwx")
            .with_child_content("share-name", export.share_name)
            .with_child_content("user-name", user);
        self.client.invoke(request).await?;
        Ok(())
    }

    async fn deny_access(&self, share: &Share, access: &AccessRule) -> Result<()> {
        access.require(AccessType::UserPassword, share.share_proto)?;
        let export = known_export(share)?;
        let user = access.access_to.trim();

        info!("Revoking {} access to CIFS share {}", user, export.share_name);
        self.remove_ace(user, &export.share_name).await
    }

    fn get_target(&self, share: &Share) -> Option<String> {
        CifsExport::parse(share.export_location.as_deref()).target()
    }
}
