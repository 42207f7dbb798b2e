//! Kernel NFS server helper driven through `exportfs`

use super::helper::ExportHelper;
use crate::domain::export::NfsExport;
use crate::domain::ports::{CommandExecutor, CommandOptions};
use crate::domain::share::{AccessRule, AccessType, ShareProtocol};
use crate::error::{Error, Result};
use crate::executor::cmd;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct ExportfsHelper {
    executor: Arc<dyn CommandExecutor>,
    export_ip: String,
}

impl ExportfsHelper {
    pub fn new(executor: Arc<dyn CommandExecutor>, export_ip: impl Into<String>) -> Self {
        Self {
            executor,
            export_ip: export_ip.into(),
        }
    }
}

/// Whether `exportfs` output lists `host` for `path`
///
/// `exportfs` prints the path followed by whitespace and the client, with
/// long paths wrapped onto the next line.
fn export_listed(listing: &str, path: &str, host: &str) -> bool {
    listing
        .match_indices(path)
        .any(|(idx, _)| listing[idx + path.len()..].trim_start().starts_with(host))
}

#[async_trait]
impl ExportHelper for ExportfsHelper {
    async fn init(&self) -> Result<()> {
        self.executor
            .execute(&cmd(["exportfs"]), CommandOptions::root())
            .await
            .map_err(|e| Error::ShareBackend(format!("NFS server not found: {}", e)))?;
        Ok(())
    }

    async fn create_export(&self, local_path: &str, _share_name: &str, _recreate: bool) -> Result<String> {
        Ok(NfsExport::new(self.export_ip.as_str(), local_path).location())
    }

    async fn remove_export(&self, _local_path: &str, _share_name: &str) -> Result<()> {
        Ok(())
    }

    async fn allow_access(&self, local_path: &str, _share_name: &str, access: &AccessRule) -> Result<()> {
        access.require(AccessType::Ip, ShareProtocol::Nfs)?;

        let listing = self
            .executor
            .execute(&cmd(["exportfs"]), CommandOptions::root())
            .await?
            .stdout;

        for host in access.targets() {
            if export_listed(&listing, local_path, &host) {
                return Err(Error::AccessExists {
                    access_type: access.access_type.to_string(),
                    access: host,
                });
            }
            info!("Exporting {} to {}", local_path, host);
            let client = format!("{}:{}", host, local_path);
            self.executor
                .execute(
                    &cmd(["exportfs", "-o", "rw,no_subtree_check", client.as_str()]),
                    CommandOptions::root(),
                )
                .await?;
        }
        Ok(())
    }

    async fn deny_access(&self, local_path: &str, _share_name: &str, access: &AccessRule) -> Result<()> {
        access.require(AccessType::Ip, ShareProtocol::Nfs)?;

        for host in access.targets() {
            info!("Unexporting {} from {}", local_path, host);
            let client = format!("{}:{}", host, local_path);
            self.executor
                .execute(&cmd(["exportfs", "-u", client.as_str()]), CommandOptions::root().unchecked())
                .await?;
        }
        Ok(())
    }
}
