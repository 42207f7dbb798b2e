//! Samba helper driven through the registry configuration (`net conf`)
//!
//! Samba must be configured with `include = registry` so shares can be
//! managed at runtime.

use super::helper::ExportHelper;
use crate::domain::export::CifsExport;
use crate::domain::ports::{CommandExecutor, CommandOptions};
use crate::domain::share::{AccessRule, AccessType, ShareProtocol};
use crate::error::{Error, Result};
use crate::executor::cmd;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_PARAMETERS: [(&str, &str); 4] = [
    ("browseable", "yes"),
    ("create mask", "0755"),
    ("hosts deny", "0.0.0.0/0"),
    ("hosts allow", "127.0.0.1"),
];

pub struct NetConfHelper {
    executor: Arc<dyn CommandExecutor>,
    export_ip: String,
}

impl NetConfHelper {
    pub fn new(executor: Arc<dyn CommandExecutor>, export_ip: impl Into<String>) -> Self {
        Self {
            executor,
            export_ip: export_ip.into(),
        }
    }

    async fn net_conf(&self, args: &[&str]) -> Result<String> {
        let mut command = cmd(["net", "conf"]);
        command.extend(args.iter().map(|a| a.to_string()));
        Ok(self.executor.execute(&command, CommandOptions::root()).await?.stdout)
    }

    async fn add_share(&self, local_path: &str, share_name: &str) -> Result<()> {
        self.net_conf(&["addshare", share_name, local_path, "writeable=y", "guest_ok=y"])
            .await
            .map(|_| ())
    }

    async fn allowed_hosts(&self, share_name: &str) -> Result<Vec<String>> {
        let out = self.net_conf(&["getparm", share_name, "hosts allow"]).await?;
        Ok(out.split_whitespace().map(str::to_string).collect())
    }

    async fn set_allowed_hosts(&self, share_name: &str, hosts: &[String]) -> Result<()> {
        let value = hosts.join(" ");
        debug!("Setting hosts allow of {} to {:?}", share_name, value);
        self.net_conf(&["setparm", share_name, "hosts allow", value.as_str()])
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ExportHelper for NetConfHelper {
    async fn create_export(&self, local_path: &str, share_name: &str, recreate: bool) -> Result<String> {
        info!("Adding Samba share {} for {}", share_name, local_path);
        match self.add_share(local_path, share_name).await {
            Ok(()) => {}
            Err(e) if e.stderr().contains("already exists") => {
                if !recreate {
                    return Err(Error::ShareBackend(format!(
                        "Share section {} already defined",
                        share_name
                    )));
                }
                self.net_conf(&["delshare", share_name]).await?;
                self.add_share(local_path, share_name).await?;
            }
            Err(e) => return Err(e),
        }

        for (name, value) in DEFAULT_PARAMETERS {
            self.net_conf(&["setparm", share_name, name, value]).await?;
        }
        Ok(CifsExport::new(self.export_ip.as_str(), share_name).location())
    }

    async fn remove_export(&self, _local_path: &str, share_name: &str) -> Result<()> {
        info!("Removing Samba share {}", share_name);
        match self.net_conf(&["delshare", share_name]).await {
            Ok(_) => {}
            Err(e) if e.stderr().contains("SBC_ERR_NO_SUCH_SERVICE") => {
                debug!("Samba share {} does not exist", share_name)
            }
            Err(e) => return Err(e),
        }
        self.executor
            .execute(&cmd(["smbcontrol", "all", "close-share", share_name]), CommandOptions::root())
            .await?;
        Ok(())
    }

    async fn allow_access(&self, _local_path: &str, share_name: &str, access: &AccessRule) -> Result<()> {
        access.require(AccessType::Ip, ShareProtocol::Cifs)?;

        let mut hosts = self.allowed_hosts(share_name).await?;
        for host in access.targets() {
            if hosts.contains(&host) {
                return Err(Error::AccessExists {
                    access_type: access.access_type.to_string(),
                    access: host,
                });
            }
            hosts.push(host);
        }
        self.set_allowed_hosts(share_name, &hosts).await
    }

    async fn deny_access(&self, _local_path: &str, share_name: &str, access: &AccessRule) -> Result<()> {
        access.require(AccessType::Ip, ShareProtocol::Cifs)?;

        let denied = access.targets();
        let mut hosts = self.allowed_hosts(share_name).await?;
        hosts.retain(|host| !denied.contains(host));
        self.set_allowed_hosts(share_name, &hosts).await
    }
}
