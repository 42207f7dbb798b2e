//! Clustered Storage Controller Driver
//!
//! Provisions shares as volumes on a clustered NAS controller reached over
//! its XML request API. Placement picks the aggregate with the most free
//! space; NFS and CIFS exposure is delegated to protocol helpers.

pub mod cifs;
pub mod helper;
pub mod nfs;

pub use cifs::CifsHelper;
pub use helper::NasHelper;
pub use nfs::NfsHelper;

use crate::config::require_set;
use crate::domain::naming::{share_name, snapshot_name};
use crate::domain::ports::{RequestContext, ShareDriver, ShareStats};
use crate::domain::share::{AccessRule, Share, ShareProtocol, Snapshot};
use crate::error::{Error, Result};
use crate::placement::{apply_reserve, container_size_gb, select_pool};
use crate::registry::{BackendRegistry, ShareLocks};
use crate::retry::RetryConfig;
use crate::zapi::{ApiVersion, ControllerClient, ControllerTransport, Element, HttpTransport, TransportType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const VENDOR_NAME: &str = "NetApp";
const DRIVER_VERSION: &str = "1.0";
const GIB: f64 = (1u64 << 30) as f64;

/// Controller error number for "volume is already offline"
const EVOLUME_OFFLINE: &str = "13042";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the clustered controller driver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteredConfig {
    /// Name reported in share stats
    pub backend_name: String,
    pub transport_type: TransportType,
    /// Controller hostname or address
    pub hostname: String,
    /// Controller port, scheme default when unset
    pub port: Option<u16>,
    pub login: String,
    pub password: String,
    /// Logical partition requests are tunnelled to
    pub vserver: String,
    pub api_version: ApiVersion,
    /// Inflation applied to the requested size when creating a volume
    pub size_multiplier: f64,
    /// Percentage of free aggregate space held back from placement
    pub reserved_percentage: u8,
    /// Host granted access when a new NFS export is created
    pub nfs_bootstrap_host: String,
    pub enabled_protocols: Vec<ShareProtocol>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for ClusteredConfig {
    fn default() -> Self {
        Self {
            backend_name: "clustered".to_string(),
            transport_type: TransportType::Http,
            hostname: String::new(),
            port: None,
            login: "admin".to_string(),
            password: String::new(),
            vserver: "openstack".to_string(),
            api_version: ApiVersion::default(),
            size_multiplier: 1.2,
            reserved_percentage: 0,
            nfs_bootstrap_host: "localhost".to_string(),
            enabled_protocols: vec![ShareProtocol::Nfs, ShareProtocol::Cifs],
            timeout_secs: 60,
            retry: RetryConfig::default(),
        }
    }
}

impl ClusteredConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        require_set(&[
            ("hostname", self.hostname.as_str()),
            ("login", self.login.as_str()),
            ("password", self.password.as_str()),
            ("vserver", self.vserver.as_str()),
        ])?;
        if self.reserved_percentage > 100 {
            return Err(Error::Configuration(format!(
                "reserved_percentage must be at most 100, got {}",
                self.reserved_percentage
            )));
        }
        if !self.size_multiplier.is_finite() || self.size_multiplier <= 0.0 {
            return Err(Error::Configuration(format!(
                "size_multiplier must be positive, got {}",
                self.size_multiplier
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Share driver for a clustered NAS controller
pub struct ClusteredShareDriver {
    config: ClusteredConfig,
    client: Arc<ControllerClient>,
    helpers: HashMap<ShareProtocol, Box<dyn NasHelper>>,
    registry: BackendRegistry,
    access_locks: ShareLocks,
    stats: RwLock<Option<ShareStats>>,
}

impl ClusteredShareDriver {
    /// Create a driver talking HTTP(S) to the configured controller
    pub fn new(config: ClusteredConfig) -> Result<Self> {
        let transport = HttpTransport::new(
            config.transport_type,
            &config.hostname,
            config.port,
            &config.login,
            &config.password,
            config.timeout(),
        )?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a driver on top of an existing transport
    pub fn with_transport(config: ClusteredConfig, transport: Arc<dyn ControllerTransport>) -> Self {
        let client = Arc::new(
            ControllerClient::new(transport, config.api_version, config.retry.clone())
                .with_vserver(config.vserver.clone()),
        );

        let mut helpers: HashMap<ShareProtocol, Box<dyn NasHelper>> = HashMap::new();
        for proto in &config.enabled_protocols {
            let helper: Box<dyn NasHelper> = match proto {
                ShareProtocol::Nfs => Box::new(NfsHelper::new(client.clone(), config.nfs_bootstrap_host.clone())),
                ShareProtocol::Cifs => Box::new(CifsHelper::new(client.clone())),
            };
            helpers.insert(*proto, helper);
        }

        Self {
            config,
            client,
            helpers,
            registry: BackendRegistry::new(),
            access_locks: ShareLocks::new(),
            stats: RwLock::new(None),
        }
    }

    /// Controller client shared with the protocol helpers
    pub fn client(&self) -> &ControllerClient {
        &self.client
    }

    fn helper(&self, proto: ShareProtocol) -> Result<&dyn NasHelper> {
        self.helpers
            .get(&proto)
            .map(|helper| &**helper)
            .ok_or_else(|| Error::UnsupportedProtocol {
                protocol: proto.to_string(),
            })
    }

    /// Take a volume offline, tolerating one that already is
    async fn offline_volume(&self, name: &str) -> Result<()> {
        let response = self
            .client
            .invoke_unchecked(Element::new("volume-offline").with_child_content("name", name))
            .await?;

        match response.into_checked() {
            Ok(_) => Ok(()),
            Err(Error::RemoteInvocation { reason, errno, .. })
                if errno == EVOLUME_OFFLINE || reason.to_lowercase().contains("already offline") =>
            {
                info!("Volume {} is already offline", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Fail with `SnapshotBusy` if the controller reports the snapshot busy
    async fn check_snapshot_idle(&self, volume: &str, snapshot: &str) -> Result<()> {
        let response = self
            .client
            .invoke(Element::new("snapshot-list-info").with_child_content("volume", volume))
            .await?;

        let busy = response
            .results()
            .child("snapshots")
            .into_iter()
            .flat_map(|s| s.children_named("snapshot-info"))
            .any(|info| info.child_content("name") == Some(snapshot) && info.child_content("busy") == Some("true"));

        if busy {
            return Err(Error::SnapshotBusy {
                snapshot_name: snapshot.to_string(),
            });
        }
        Ok(())
    }

    async fn update_share_stats(&self) -> Result<ShareStats> {
        debug!("Updating share stats of {}", self.config.backend_name);
        let pools = self.client.get_available_pools().await?;
        let free_bytes: u64 = pools.values().sum();
        let free_gb = free_bytes as f64 / GIB;

        Ok(ShareStats {
            share_backend_name: self.config.backend_name.clone(),
            vendor_name: VENDOR_NAME.to_string(),
            driver_version: DRIVER_VERSION.to_string(),
            storage_protocol: "NFS_CIFS".to_string(),
            total_capacity_gb: free_gb,
            free_capacity_gb: free_gb,
            reserved_percentage: self.config.reserved_percentage,
            qos_support: false,
        })
    }
}

#[async_trait]
impl ShareDriver for ClusteredShareDriver {
    fn backend_name(&self) -> &str {
        &self.config.backend_name
    }

    async fn do_setup(&self, ctx: &RequestContext) -> Result<()> {
        info!(
            "Setting up clustered driver for vserver {} on {} ({})",
            self.config.vserver, self.config.hostname, ctx.request_id
        );
        let pools = self.client.get_available_pools().await?;
        info!("Vserver {} has {} aggregates", self.config.vserver, pools.len());
        Ok(())
    }

    async fn check_for_setup_error(&self) -> Result<()> {
        self.config.validate()
    }

    async fn allocate_container(&self, _ctx: &RequestContext, share: &Share) -> Result<()> {
        let pools = self.client.get_available_pools().await?;
        let pools = apply_reserve(&pools, self.config.reserved_percentage);
        let aggregate = select_pool(&pools, &self.config.vserver)?;

        let name = share_name(&share.id);
        let size = container_size_gb(share.size, self.config.size_multiplier);
        info!("Creating volume {} ({}g) on aggregate {}", name, size, aggregate);

        let request = Element::new("volume-create")
            .with_child_content("containing-aggr-name", aggregate)
            .with_child_content("junction-path", format!("/vol/{}", name))
            .with_child_content("size", format!("{}g", size))
            .with_child_content("volume", name);
        self.client.invoke(request).await?;

        self.registry.remember(&share.id, &self.config.hostname);
        Ok(())
    }

    async fn allocate_container_from_snapshot(
        &self,
        _ctx: &RequestContext,
        share: &Share,
        snapshot: &Snapshot,
    ) -> Result<()> {
        let name = share_name(&share.id);
        let parent = share_name(&snapshot.share_id);
        let parent_snapshot = snapshot_name(&snapshot.id);
        info!("Cloning volume {} from {}@{}", name, parent, parent_snapshot);

        let request = Element::new("volume-clone-create")
            .with_child_content("volume", name)
            .with_child_content("parent-volume", parent)
            .with_child_content("parent-snapshot", parent_snapshot);
        self.client.invoke(request).await?;

        self.registry.remember(&share.id, &self.config.hostname);
        Ok(())
    }

    async fn deallocate_container(&self, _ctx: &RequestContext, share: &Share) -> Result<()> {
        let name = share_name(&share.id);
        info!("Destroying volume {}", name);

        self.offline_volume(&name).await?;
        self.client
            .invoke(Element::new("volume-destroy").with_child_content("name", name))
            .await?;

        self.registry.forget(&share.id);
        Ok(())
    }

    async fn create_share(&self, _ctx: &RequestContext, share: &Share) -> Result<String> {
        let helper = self.helper(share.share_proto)?;
        let target = self
            .registry
            .lookup(&share.id)
            .unwrap_or_else(|| self.config.hostname.clone());

        let location = helper.create_share(&target, share).await?;
        info!("Share {} exported at {}", share.id, location);
        Ok(location)
    }

    async fn delete_share(&self, _ctx: &RequestContext, share: &Share) -> Result<()> {
        let helper = self.helper(share.share_proto)?;
        // A share that failed to provision has no export to remove.
        if helper.get_target(share).is_none() {
            debug!("Share {} has no export location, nothing to delete", share.id);
            return Ok(());
        }
        helper.delete_share(share).await
    }

    async fn create_snapshot(&self, _ctx: &RequestContext, snapshot: &Snapshot) -> Result<()> {
        let volume = share_name(&snapshot.share_id);
        let name = snapshot_name(&snapshot.id);
        info!("Creating snapshot {} of {}", name, volume);

        let request = Element::new("snapshot-create")
            .with_child_content("volume", volume)
            .with_child_content("snapshot", name);
        self.client.invoke(request).await?;
        Ok(())
    }

    async fn delete_snapshot(&self, _ctx: &RequestContext, snapshot: &Snapshot) -> Result<()> {
        let volume = share_name(&snapshot.share_id);
        let name = snapshot_name(&snapshot.id);

        self.check_snapshot_idle(&volume, &name).await?;

        info!("Deleting snapshot {} of {}", name, volume);
        let request = Element::new("snapshot-delete")
            .with_child_content("snapshot", name)
            .with_child_content("volume", volume);
        self.client.invoke(request).await?;
        Ok(())
    }

    async fn ensure_share(&self, _ctx: &RequestContext, share: &Share) -> Result<()> {
        let helper = self.helper(share.share_proto)?;
        match helper.get_target(share) {
            Some(target) => self.registry.remember(&share.id, &target),
            None => warn!("Share {} has no usable export location", share.id),
        }
        Ok(())
    }

    async fn allow_access(&self, _ctx: &RequestContext, share: &Share, access: &AccessRule) -> Result<()> {
        let helper = self.helper(share.share_proto)?;
        let _guard = self.access_locks.lock(&share.id).await;
        helper.allow_access(share, access).await
    }

    async fn deny_access(&self, _ctx: &RequestContext, share: &Share, access: &AccessRule) -> Result<()> {
        let helper = self.helper(share.share_proto)?;
        let _guard = self.access_locks.lock(&share.id).await;
        helper.deny_access(share, access).await
    }

    fn get_target(&self, share: &Share) -> Option<String> {
        self.registry.lookup(&share.id).or_else(|| {
            self.helper(share.share_proto)
                .ok()
                .and_then(|helper| helper.get_target(share))
        })
    }

    async fn get_share_stats(&self, refresh: bool) -> Result<ShareStats> {
        if !refresh {
            if let Some(stats) = self.stats.read().await.clone() {
                return Ok(stats);
            }
        }
        let stats = self.update_share_stats().await?;
        *self.stats.write().await = Some(stats.clone());
        Ok(stats)
    }
}
