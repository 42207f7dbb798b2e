//! Local LVM Share Driver
//!
//! Backs each share with a logical volume in one volume group, mounts it
//! under the export root and exposes the mount point through the kernel NFS
//! server or Samba. Volume management commands go through the retry layer.

pub mod cifs;
pub mod helper;
pub mod nfs;

#[cfg(test)]
pub(crate) mod testing;

pub use cifs::NetConfHelper;
pub use helper::ExportHelper;
pub use nfs::ExportfsHelper;

use crate::config::require_set;
use crate::domain::naming::{share_name, snapshot_name};
use crate::domain::ports::{CommandExecutor, CommandOptions, RequestContext, ShareDriver, ShareStats};
use crate::domain::share::{AccessRule, Share, ShareProtocol, Snapshot};
use crate::error::{Error, Result};
use crate::executor::{cmd, try_execute, ProcessExecutor};
use crate::registry::{BackendRegistry, ShareLocks};
use crate::retry::RetryConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the LVM driver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LvmConfig {
    /// Name reported in share stats
    pub backend_name: String,
    /// Volume group holding the share volumes
    pub volume_group: String,
    /// Directory the share volumes are mounted under
    pub export_root: String,
    /// Address put into export locations
    pub export_ip: Option<String>,
    /// Mirror count for new volumes, 0 disables mirroring
    pub mirrors: u32,
    /// Command prefix for privileged commands
    pub root_helper: String,
    pub reserved_percentage: u8,
    pub enabled_protocols: Vec<ShareProtocol>,
    pub retry: RetryConfig,
}

impl Default for LvmConfig {
    fn default() -> Self {
        Self {
            backend_name: "LVM".to_string(),
            volume_group: "cinder-shares".to_string(),
            export_root: "/var/lib/nas-provisioner/mnt".to_string(),
            export_ip: None,
            mirrors: 0,
            root_helper: "sudo".to_string(),
            reserved_percentage: 0,
            enabled_protocols: vec![ShareProtocol::Nfs, ShareProtocol::Cifs],
            retry: RetryConfig::default(),
        }
    }
}

impl LvmConfig {
    pub fn validate(&self) -> Result<()> {
        require_set(&[
            ("volume_group", self.volume_group.as_str()),
            ("export_root", self.export_root.as_str()),
        ])?;
        if self.reserved_percentage > 100 {
            return Err(Error::Configuration(format!(
                "reserved_percentage must be at most 100, got {}",
                self.reserved_percentage
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Share driver backed by local logical volumes
pub struct LvmShareDriver {
    config: LvmConfig,
    executor: Arc<dyn CommandExecutor>,
    helpers: HashMap<ShareProtocol, Box<dyn ExportHelper>>,
    registry: BackendRegistry,
    access_locks: ShareLocks,
    stats: RwLock<Option<ShareStats>>,
}

impl LvmShareDriver {
    /// Create a driver running real commands through the root helper
    pub fn new(config: LvmConfig) -> Self {
        let executor = Arc::new(ProcessExecutor::new(&config.root_helper));
        Self::with_executor(config, executor)
    }

    pub fn with_executor(config: LvmConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        let export_ip = config.export_ip.clone().unwrap_or_default();
        let mut helpers: HashMap<ShareProtocol, Box<dyn ExportHelper>> = HashMap::new();
        for proto in &config.enabled_protocols {
            let helper: Box<dyn ExportHelper> = match proto {
                ShareProtocol::Nfs => Box::new(ExportfsHelper::new(executor.clone(), export_ip.as_str())),
                ShareProtocol::Cifs => Box::new(NetConfHelper::new(executor.clone(), export_ip.as_str())),
            };
            helpers.insert(*proto, helper);
        }

        Self {
            config,
            executor,
            helpers,
            registry: BackendRegistry::new(),
            access_locks: ShareLocks::new(),
            stats: RwLock::new(None),
        }
    }

    fn helper(&self, proto: ShareProtocol) -> Result<&dyn ExportHelper> {
        self.helpers
            .get(&proto)
            .map(|helper| &**helper)
            .ok_or_else(|| Error::UnsupportedProtocol {
                protocol: proto.to_string(),
            })
    }

    /// Device-mapper path of a volume in the share volume group
    fn local_path(&self, volume: &str) -> String {
        format!(
            "/dev/mapper/{}-{}",
            self.config.volume_group.replace('-', "--"),
            volume.replace('-', "--")
        )
    }

    fn mount_path(&self, volume: &str) -> String {
        Path::new(&self.config.export_root)
            .join(volume)
            .to_string_lossy()
            .into_owned()
    }

    async fn run(&self, command: Vec<String>) -> Result<String> {
        Ok(self.executor.execute(&command, CommandOptions::root()).await?.stdout)
    }

    async fn run_retried(&self, command: Vec<String>) -> Result<String> {
        let output = try_execute(self.executor.as_ref(), &self.config.retry, &command, CommandOptions::root()).await?;
        Ok(output.stdout)
    }

    async fn create_volume(&self, volume: &str, size_gb: u64) -> Result<()> {
        let size = format!("{}G", size_gb);
        let mut command = cmd(["lvcreate", "-L", size.as_str(), "-n", volume, self.config.volume_group.as_str()]);

        if self.config.mirrors > 0 {
            let mirrors = self.config.mirrors.to_string();
            command.extend(cmd(["-m", mirrors.as_str(), "--nosync"]));
            if let Some(region) = mirror_region_size(size_gb) {
                let region = region.to_string();
                command.extend(cmd(["-R", region.as_str()]));
            }
        }

        info!("Creating logical volume {} ({})", volume, size);
        self.run_retried(command).await.map(|_| ())
    }

    async fn remove_volume(&self, volume: &str) -> Result<()> {
        info!("Removing logical volume {}", volume);
        let lv = format!("{}/{}", self.config.volume_group, volume);
        self.run_retried(cmd(["lvremove", "-f", lv.as_str()])).await.map(|_| ())
    }

    /// Block copy between two volumes, using O_DIRECT when supported
    async fn copy_volume(&self, src: &str, dest: &str, size_gb: u64) -> Result<()> {
        let input = format!("if={}", src);
        let output = format!("of={}", dest);

        let mut direct = cmd(["iflag=direct", "oflag=direct"]);
        let probe = cmd(["dd", "count=0", input.as_str(), output.as_str(), "iflag=direct", "oflag=direct"]);
        if let Err(e) = self.run(probe).await {
            debug!("O_DIRECT not supported, copying buffered: {}", e);
            direct.clear();
        }

        let count = format!("count={}", size_gb * 1024);
        let mut copy = cmd(["dd", input.as_str(), output.as_str(), count.as_str(), "bs=1M"]);
        copy.extend(direct);
        info!("Copying {} to {}", src, dest);
        self.run(copy).await.map(|_| ())
    }

    /// Mount the share volume, tolerating one that is already mounted
    async fn mount_device(&self, volume: &str) -> Result<String> {
        let device = self.local_path(volume);
        let mount_path = self.mount_path(volume);

        self.executor
            .execute(&cmd(["mkdir", "-p", mount_path.as_str()]), CommandOptions::default())
            .await?;

        let mounted = async {
            self.run(cmd(["mount", device.as_str(), mount_path.as_str()])).await?;
            self.run(cmd(["chmod", "777", mount_path.as_str()])).await
        }
        .await;

        match mounted {
            Ok(_) => {}
            Err(e) if e.stderr().contains("already mounted") => {
                warn!("{} is already mounted", device);
            }
            Err(e) => return Err(e),
        }
        Ok(mount_path)
    }

    async fn update_share_stats(&self) -> ShareStats {
        debug!("Updating share stats of {}", self.config.backend_name);
        let mut stats = ShareStats {
            share_backend_name: self.config.backend_name.clone(),
            vendor_name: "Open Source".to_string(),
            driver_version: "1.0".to_string(),
            storage_protocol: "NFS_CIFS".to_string(),
            total_capacity_gb: 0.0,
            free_capacity_gb: 0.0,
            reserved_percentage: self.config.reserved_percentage,
            qos_support: false,
        };

        let command = cmd([
            "vgs",
            "--noheadings",
            "--nosuffix",
            "--unit=G",
            "-o",
            "name,size,free",
            self.config.volume_group.as_str(),
        ]);
        match self.run(command).await {
            Ok(out) => {
                let fields: Vec<&str> = out.split_whitespace().collect();
                if let [_, total, free, ..] = fields.as_slice() {
                    stats.total_capacity_gb = total.parse().unwrap_or_default();
                    stats.free_capacity_gb = free.parse().unwrap_or_default();
                }
            }
            Err(e) => error!("Error retrieving volume group status: {}", e.stderr()),
        }
        stats
    }
}

/// Region size for mirrored volumes: next power of two of the size in TiB,
/// only for volumes of 1.5 TiB and more
fn mirror_region_size(size_gb: u64) -> Option<u64> {
    let terabytes = size_gb as f64 / 1024.0;
    if terabytes < 1.5 {
        return None;
    }
    Some(2f64.powf(terabytes.log2().ceil()) as u64)
}

#[async_trait]
impl ShareDriver for LvmShareDriver {
    fn backend_name(&self) -> &str {
        &self.config.backend_name
    }

    async fn do_setup(&self, _ctx: &RequestContext) -> Result<()> {
        for (proto, helper) in &self.helpers {
            debug!("Initializing {} helper", proto);
            helper.init().await?;
        }
        Ok(())
    }

    async fn check_for_setup_error(&self) -> Result<()> {
        let out = self.run(cmd(["vgs", "--noheadings", "-o", "name"])).await?;
        if !out.split_whitespace().any(|vg| vg == self.config.volume_group) {
            return Err(Error::Configuration(format!(
                "share volume group {} doesn't exist",
                self.config.volume_group
            )));
        }
        require_set(&[("export_ip", self.config.export_ip.as_deref().unwrap_or_default())])
    }

    async fn allocate_container(&self, _ctx: &RequestContext, share: &Share) -> Result<()> {
        let volume = share_name(&share.id);
        self.create_volume(&volume, share.size).await?;
        self.run(cmd(["mkfs.ext4", self.local_path(&volume).as_str()])).await?;
        self.registry.remember(&share.id, &self.config.volume_group);
        Ok(())
    }

    async fn allocate_container_from_snapshot(
        &self,
        _ctx: &RequestContext,
        share: &Share,
        snapshot: &Snapshot,
    ) -> Result<()> {
        let volume = share_name(&share.id);
        self.create_volume(&volume, share.size).await?;
        self.copy_volume(
            &self.local_path(&snapshot_name(&snapshot.id)),
            &self.local_path(&volume),
            snapshot.share_size,
        )
        .await?;
        self.registry.remember(&share.id, &self.config.volume_group);
        Ok(())
    }

    async fn deallocate_container(&self, _ctx: &RequestContext, share: &Share) -> Result<()> {
        self.remove_volume(&share_name(&share.id)).await?;
        self.registry.forget(&share.id);
        Ok(())
    }

    async fn create_share(&self, _ctx: &RequestContext, share: &Share) -> Result<String> {
        let helper = self.helper(share.share_proto)?;
        let volume = share_name(&share.id);
        let location = helper
            .create_export(&self.mount_path(&volume), &volume, false)
            .await?;
        info!("Share {} exported at {}", share.id, location);
        Ok(location)
    }

    async fn delete_share(&self, _ctx: &RequestContext, share: &Share) -> Result<()> {
        let helper = self.helper(share.share_proto)?;
        let volume = share_name(&share.id);
        match helper.remove_export(&self.mount_path(&volume), &volume).await {
            Err(e @ Error::ProcessExecution { .. }) => {
                info!("Can't remove share {}: {}", share.id, e);
                Ok(())
            }
            other => other,
        }
    }

    async fn create_export(&self, _ctx: &RequestContext, share: &Share) -> Result<Option<String>> {
        let mount_path = self.mount_device(&share_name(&share.id)).await?;
        Ok(Some(mount_path))
    }

    async fn remove_export(&self, _ctx: &RequestContext, share: &Share) -> Result<()> {
        let volume = share_name(&share.id);
        let mount_path = self.mount_path(&volume);
        if tokio::fs::metadata(&mount_path).await.is_err() {
            return Ok(());
        }

        match self.run(cmd(["umount", "-f", mount_path.as_str()])).await {
            Ok(_) => {}
            Err(e) if e.stderr().contains("device is busy") => {
                return Err(Error::ShareBusy { share_name: volume });
            }
            Err(e) => info!("Unable to umount {}: {}", mount_path, e),
        }

        if let Err(e) = tokio::fs::remove_dir(&mount_path).await {
            info!("Unable to delete {}: {}", mount_path, e);
        }
        Ok(())
    }

    async fn create_snapshot(&self, _ctx: &RequestContext, snapshot: &Snapshot) -> Result<()> {
        let name = snapshot_name(&snapshot.id);
        let origin = format!("{}/{}", self.config.volume_group, share_name(&snapshot.share_id));
        let size = format!("{}G", snapshot.share_size);
        info!("Creating snapshot {} of {}", name, origin);

        self.run_retried(cmd([
            "lvcreate",
            "-L",
            size.as_str(),
            "--name",
            name.as_str(),
            "--snapshot",
            origin.as_str(),
        ]))
        .await
        .map(|_| ())
    }

    async fn delete_snapshot(&self, _ctx: &RequestContext, snapshot: &Snapshot) -> Result<()> {
        self.remove_volume(&snapshot_name(&snapshot.id)).await
    }

    async fn ensure_share(&self, _ctx: &RequestContext, share: &Share) -> Result<()> {
        let helper = self.helper(share.share_proto)?;
        let volume = share_name(&share.id);
        let mount_path = self.mount_device(&volume).await?;
        helper.create_export(&mount_path, &volume, true).await?;
        self.registry.remember(&share.id, &self.config.volume_group);
        Ok(())
    }

    async fn allow_access(&self, _ctx: &RequestContext, share: &Share, access: &AccessRule) -> Result<()> {
        let helper = self.helper(share.share_proto)?;
        let volume = share_name(&share.id);
        let _guard = self.access_locks.lock(&share.id).await;
        helper.allow_access(&self.mount_path(&volume), &volume, access).await
    }

    async fn deny_access(&self, _ctx: &RequestContext, share: &Share, access: &AccessRule) -> Result<()> {
        let helper = self.helper(share.share_proto)?;
        let volume = share_name(&share.id);
        let _guard = self.access_locks.lock(&share.id).await;
        helper.deny_access(&self.mount_path(&volume), &volume, access).await
    }

    fn get_target(&self, share: &Share) -> Option<String> {
        self.registry.lookup(&share.id)
    }

    async fn get_share_stats(&self, refresh: bool) -> Result<ShareStats> {
        if !refresh {
            if let Some(stats) = self.stats.read().await.clone() {
                return Ok(stats);
            }
        }
        let stats = self.update_share_stats().await;
        *self.stats.write().await = Some(stats.clone());
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedExecutor;
    use super::*;
    use assert_matches::assert_matches;

    fn config(export_root: &str) -> LvmConfig {
        LvmConfig {
            export_root: export_root.to_string(),
            export_ip: Some("10.0.0.9".into()),
            retry: RetryConfig {
                max_attempts: 3,
                unit_ms: 1,
            },
            ..Default::default()
        }
    }

    fn driver(executor: Arc<ScriptedExecutor>) -> LvmShareDriver {
        LvmShareDriver::with_executor(config("/srv/shares"), executor)
    }

    fn ctx() -> RequestContext {
        RequestContext::new("req-lvm")
    }

    #[tokio::test]
    async fn test_allocate_container() {
        let executor = Arc::new(ScriptedExecutor::new());
        let driver = driver(executor.clone());
        let share = Share::new("ab-cd", 5, "nfs").unwrap();

        driver.allocate_container(&ctx(), &share).await.unwrap();

        assert_eq!(
            executor.commands(),
            vec![
                "lvcreate -L 5G -n share_ab_cd cinder-shares",
                "mkfs.ext4 /dev/mapper/cinder--shares-share_ab_cd"
            ]
        );
        assert!(executor.options().iter().all(|o| o.run_as_root));
        assert_eq!(driver.get_target(&share).as_deref(), Some("cinder-shares"));
    }

    #[tokio::test]
    async fn test_lvcreate_retried_on_failure() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.exit("lvcreate", 5, "Insufficient free extents");
        executor.exit("lvcreate", 5, "Insufficient free extents");
        let driver = driver(executor.clone());
        let share = Share::new("ab-cd", 5, "nfs").unwrap();

        driver.allocate_container(&ctx(), &share).await.unwrap();

        let lvcreates = executor
            .commands()
            .iter()
            .filter(|c| c.starts_with("lvcreate"))
            .count();
        assert_eq!(lvcreates, 3);
    }

    #[tokio::test]
    async fn test_lvcreate_gives_up_after_bound() {
        let executor = Arc::new(ScriptedExecutor::new());
        for _ in 0..3 {
            executor.exit("lvcreate", 5, "Insufficient free extents");
        }
        let driver = driver(executor.clone());
        let share = Share::new("ab-cd", 5, "nfs").unwrap();

        let err = driver.allocate_container(&ctx(), &share).await.unwrap_err();
        assert_eq!(err.stderr(), "Insufficient free extents");
        assert_eq!(executor.commands().len(), 3);
        assert_eq!(driver.get_target(&share), None);
    }

    #[tokio::test]
    async fn test_mirrored_volume_region_size() {
        let executor = Arc::new(ScriptedExecutor::new());
        let config = LvmConfig {
            mirrors: 2,
            ..config("/srv/shares")
        };
        let driver = LvmShareDriver::with_executor(config, executor.clone());

        driver.create_volume("share_big", 2048).await.unwrap();
        driver.create_volume("share_small", 100).await.unwrap();

        let commands = executor.commands();
        assert_eq!(commands[0], "lvcreate -L 2048G -n share_big cinder-shares -m 2 --nosync -R 2");
        assert_eq!(commands[1], "lvcreate -L 100G -n share_small cinder-shares -m 2 --nosync");
    }

    #[test]
    fn test_mirror_region_size() {
        assert_eq!(mirror_region_size(1024), None);
        assert_eq!(mirror_region_size(1536), Some(2));
        assert_eq!(mirror_region_size(3072), Some(4));
        assert_eq!(mirror_region_size(8192), Some(8));
    }

    #[tokio::test]
    async fn test_allocate_from_snapshot_falls_back_to_buffered_copy() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.exit("dd count=0", 1, "Invalid argument");
        let driver = driver(executor.clone());
        let share = Share::new("new", 5, "nfs").unwrap();
        let snapshot = Snapshot::new("s-1", "old", 5);

        driver
            .allocate_container_from_snapshot(&ctx(), &share, &snapshot)
            .await
            .unwrap();

        let commands = executor.commands();
        assert_eq!(
            commands.last().map(String::as_str),
            Some(
                "dd if=/dev/mapper/cinder--shares-share_snapshot_s_1 \
                 of=/dev/mapper/cinder--shares-share_new count=5120 bs=1M"
            )
        );
    }

    #[tokio::test]
    async fn test_copy_uses_direct_io_when_supported() {
        let executor = Arc::new(ScriptedExecutor::new());
        let driver = driver(executor.clone());

        driver.copy_volume("/dev/a", "/dev/b", 1).await.unwrap();

        assert_eq!(
            executor.commands(),
            vec![
                "dd count=0 if=/dev/a of=/dev/b iflag=direct oflag=direct",
                "dd if=/dev/a of=/dev/b count=1024 bs=1M iflag=direct oflag=direct"
            ]
        );
    }

    #[tokio::test]
    async fn test_create_export_tolerates_mounted_device() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.exit("mount", 32, "mount: /dev/mapper/x is already mounted");
        let driver = driver(executor.clone());
        let share = Share::new("ab", 1, "nfs").unwrap();

        let location = driver.create_export(&ctx(), &share).await.unwrap();

        assert_eq!(location.as_deref(), Some("/srv/shares/share_ab"));
        assert_eq!(
            executor.commands(),
            vec![
                "mkdir -p /srv/shares/share_ab",
                "mount /dev/mapper/cinder--shares-share_ab /srv/shares/share_ab"
            ]
        );
        assert!(!executor.options()[0].run_as_root);
    }

    #[tokio::test]
    async fn test_remove_export_busy_device() {
        let root = tempfile::tempdir().unwrap();
        let executor = Arc::new(ScriptedExecutor::new());
        executor.exit("umount", 16, "umount: /srv: device is busy");
        let driver = LvmShareDriver::with_executor(config(root.path().to_str().unwrap()), executor.clone());
        std::fs::create_dir(root.path().join("share_ab")).unwrap();
        let share = Share::new("ab", 1, "nfs").unwrap();

        let err = driver.remove_export(&ctx(), &share).await.unwrap_err();
        assert_matches!(err, Error::ShareBusy { share_name } if share_name == "share_ab");
        assert!(root.path().join("share_ab").exists());
    }

    #[tokio::test]
    async fn test_remove_export_unmounts_and_removes_dir() {
        let root = tempfile::tempdir().unwrap();
        let executor = Arc::new(ScriptedExecutor::new());
        let driver = LvmShareDriver::with_executor(config(root.path().to_str().unwrap()), executor.clone());
        std::fs::create_dir(root.path().join("share_ab")).unwrap();
        let share = Share::new("ab", 1, "nfs").unwrap();

        driver.remove_export(&ctx(), &share).await.unwrap();
        assert!(!root.path().join("share_ab").exists());
        assert_eq!(executor.commands().len(), 1);

        // Nothing mounted any more.
        driver.remove_export(&ctx(), &share).await.unwrap();
        assert_eq!(executor.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_nfs_share_and_access() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.output("exportfs", "/srv/shares/share_ab\n\t\t10.0.0.1\n");
        let driver = driver(executor.clone());
        let share = Share::new("ab", 1, "nfs").unwrap();

        let location = driver.create_share(&ctx(), &share).await.unwrap();
        assert_eq!(location, "10.0.0.9:/srv/shares/share_ab");

        let err = driver
            .allow_access(&ctx(), &share, &AccessRule::ip("10.0.0.1"))
            .await
            .unwrap_err();
        assert_matches!(err, Error::AccessExists { access, .. } if access == "10.0.0.1");

        driver
            .allow_access(&ctx(), &share, &AccessRule::ip("10.0.0.2"))
            .await
            .unwrap();
        driver
            .deny_access(&ctx(), &share, &AccessRule::ip("10.0.0.2"))
            .await
            .unwrap();

        let commands = executor.commands();
        assert!(commands.contains(&"exportfs -o rw,no_subtree_check 10.0.0.2:/srv/shares/share_ab".to_string()));
        assert_eq!(
            commands.last().map(String::as_str),
            Some("exportfs -u 10.0.0.2:/srv/shares/share_ab")
        );
        assert!(!executor.options().last().unwrap().check_exit_code);
    }

    #[tokio::test]
    async fn test_cifs_export_exists() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.exit("net conf addshare", 255, "ERROR: share share_ab already exists");
        let driver = driver(executor.clone());
        let share = Share::new("ab", 1, "cifs").unwrap();

        let err = driver.create_share(&ctx(), &share).await.unwrap_err();
        assert_matches!(err, Error::ShareBackend(_));
    }

    #[tokio::test]
    async fn test_ensure_cifs_share_recreates_export() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.exit("net conf addshare", 255, "ERROR: share share_ab already exists");
        let driver = driver(executor.clone());
        let share = Share::new("ab", 1, "cifs").unwrap();

        driver.ensure_share(&ctx(), &share).await.unwrap();

        let commands = executor.commands();
        let net: Vec<_> = commands.iter().filter(|c| c.starts_with("net conf")).collect();
        assert_eq!(net[0], "net conf addshare share_ab /srv/shares/share_ab writeable=y guest_ok=y");
        assert_eq!(net[1], "net conf delshare share_ab");
        assert_eq!(net[2], "net conf addshare share_ab /srv/shares/share_ab writeable=y guest_ok=y");
        assert_eq!(net.len(), 7);
        assert_eq!(driver.get_target(&share).as_deref(), Some("cinder-shares"));
    }

    #[tokio::test]
    async fn test_cifs_allow_and_deny_hosts() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.output("net conf getparm", "127.0.0.1\n");
        executor.output("net conf getparm", "127.0.0.1 10.0.0.4\n");
        let driver = driver(executor.clone());
        let share = Share::new("ab", 1, "cifs").unwrap();

        driver
            .allow_access(&ctx(), &share, &AccessRule::ip("10.0.0.4"))
            .await
            .unwrap();
        driver
            .deny_access(&ctx(), &share, &AccessRule::ip("10.0.0.4"))
            .await
            .unwrap();

        let setparms: Vec<_> = executor
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("net conf setparm"))
            .collect();
        assert_eq!(
            setparms,
            vec![
                "net conf setparm share_ab hosts allow 127.0.0.1 10.0.0.4",
                "net conf setparm share_ab hosts allow 127.0.0.1"
            ]
        );
    }

    #[tokio::test]
    async fn test_cifs_rejects_user_rules() {
        let executor = Arc::new(ScriptedExecutor::new());
        let driver = driver(executor.clone());
        let share = Share::new("ab", 1, "cifs").unwrap();

        let err = driver
            .allow_access(&ctx(), &share, &AccessRule::user("alice"))
            .await
            .unwrap_err();
        assert_matches!(err, Error::UnsupportedAccessType { .. });
        assert!(executor.commands().is_empty());
    }

    #[tokio::test]
    async fn test_delete_cifs_share_missing_service() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.exit("net conf delshare", 255, "SBC_ERR_NO_SUCH_SERVICE");
        let driver = driver(executor.clone());
        let share = Share::new("ab", 1, "cifs").unwrap();

        driver.delete_share(&ctx(), &share).await.unwrap();
        assert_eq!(
            executor.commands().last().map(String::as_str),
            Some("smbcontrol all close-share share_ab")
        );
    }

    #[tokio::test]
    async fn test_snapshots() {
        let executor = Arc::new(ScriptedExecutor::new());
        let driver = driver(executor.clone());
        let snapshot = Snapshot::new("s-1", "ab-cd", 5);

        driver.create_snapshot(&ctx(), &snapshot).await.unwrap();
        driver.delete_snapshot(&ctx(), &snapshot).await.unwrap();

        assert_eq!(
            executor.commands(),
            vec![
                "lvcreate -L 5G --name share_snapshot_s_1 --snapshot cinder-shares/share_ab_cd",
                "lvremove -f cinder-shares/share_snapshot_s_1"
            ]
        );
    }

    #[tokio::test]
    async fn test_deallocate_forgets_share() {
        let executor = Arc::new(ScriptedExecutor::new());
        let driver = driver(executor.clone());
        let share = Share::new("ab-cd", 5, "nfs").unwrap();
        driver.allocate_container(&ctx(), &share).await.unwrap();

        driver.deallocate_container(&ctx(), &share).await.unwrap();

        assert_eq!(
            executor.commands().last().map(String::as_str),
            Some("lvremove -f cinder-shares/share_ab_cd")
        );
        assert_eq!(driver.get_target(&share), None);
    }

    #[tokio::test]
    async fn test_check_for_setup_error() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.output("vgs", "  cinder-shares\n  system\n");
        executor.output("vgs", "  system\n");
        let driver = driver(executor.clone());

        driver.check_for_setup_error().await.unwrap();
        assert_matches!(
            driver.check_for_setup_error().await,
            Err(Error::Configuration(msg)) if msg.contains("cinder-shares")
        );

        let unset = LvmShareDriver::with_executor(
            LvmConfig {
                export_ip: None,
                ..config("/srv/shares")
            },
            executor.clone(),
        );
        executor.output("vgs", "  cinder-shares\n");
        assert_matches!(
            unset.check_for_setup_error().await,
            Err(Error::Configuration(msg)) if msg.contains("export_ip")
        );
    }

    #[tokio::test]
    async fn test_share_stats() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.output("vgs", "  cinder-shares   100.00   40.50\n");
        let driver = driver(executor.clone());

        let stats = driver.get_share_stats(true).await.unwrap();
        assert_eq!(stats.share_backend_name, "LVM");
        assert_eq!(stats.total_capacity_gb, 100.0);
        assert_eq!(stats.free_capacity_gb, 40.5);

        let cached = driver.get_share_stats(false).await.unwrap();
        assert_eq!(cached, stats);
        assert_eq!(executor.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_share_stats_when_vgs_fails() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.exit("vgs", 5, "Volume group not found");
        let driver = driver(executor.clone());

        let stats = driver.get_share_stats(true).await.unwrap();
        assert_eq!(stats.total_capacity_gb, 0.0);
        assert_eq!(stats.free_capacity_gb, 0.0);
    }

    #[tokio::test]
    async fn test_do_setup_requires_nfs_server() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.exit("exportfs", 127, "exportfs: command not found");
        let config = LvmConfig {
            enabled_protocols: vec![ShareProtocol::Nfs],
            ..config("/srv/shares")
        };
        let driver = LvmShareDriver::with_executor(config, executor);

        assert_matches!(driver.do_setup(&ctx()).await, Err(Error::ShareBackend(_)));
    }
}
