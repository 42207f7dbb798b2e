//! Domain Ports - Core trait definitions for the share provisioner
//!
//! These traits define the boundaries between the provisioning logic and the
//! outside world. Drivers implement [`ShareDriver`]; the manager layer only
//! ever holds an `Arc<dyn ShareDriver>`.

use crate::domain::share::{AccessRule, Share, Snapshot};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Request Context
// =============================================================================

/// Opaque per-call context passed through from the manager layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Request identifier, used to correlate log lines
    pub request_id: String,
    /// Project the request runs on behalf of
    pub project_id: Option<String>,
    /// When the manager accepted the request
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            project_id: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Context for calls that originate inside this process
    pub fn admin() -> Self {
        Self::new("admin")
    }
}

// =============================================================================
// Share Stats
// =============================================================================

/// Capacity and capability report of a share backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareStats {
    pub share_backend_name: String,
    pub vendor_name: String,
    pub driver_version: String,
    pub storage_protocol: String,
    pub total_capacity_gb: f64,
    pub free_capacity_gb: f64,
    pub reserved_percentage: u8,
    pub qos_support: bool,
}

// =============================================================================
// Share Driver Port
// =============================================================================

/// Capability interface every share backend implements
#[async_trait]
pub trait ShareDriver: Send + Sync {
    /// Backend name used in logs and stats
    fn backend_name(&self) -> &str;

    /// One-time initialization after the driver is loaded
    async fn do_setup(&self, _ctx: &RequestContext) -> Result<()> {
        Ok(())
    }

    /// Fail if prerequisites of the backend are not met
    async fn check_for_setup_error(&self) -> Result<()>;

    /// Reserve backing storage for a share and record which backend owns it
    async fn allocate_container(&self, ctx: &RequestContext, share: &Share) -> Result<()>;

    /// Create the backing storage of `share` as a clone of `snapshot`
    async fn allocate_container_from_snapshot(
        &self,
        ctx: &RequestContext,
        share: &Share,
        snapshot: &Snapshot,
    ) -> Result<()>;

    /// Release the backing storage of a share
    async fn deallocate_container(&self, ctx: &RequestContext, share: &Share) -> Result<()>;

    /// Expose the share over its protocol, returning the export location
    async fn create_share(&self, ctx: &RequestContext, share: &Share) -> Result<String>;

    /// Stop exposing the share
    async fn delete_share(&self, ctx: &RequestContext, share: &Share) -> Result<()>;

    /// Prepare the share for export, returning a provider location if any
    async fn create_export(&self, _ctx: &RequestContext, _share: &Share) -> Result<Option<String>> {
        Ok(None)
    }

    /// Undo `create_export`
    async fn remove_export(&self, _ctx: &RequestContext, _share: &Share) -> Result<()> {
        Ok(())
    }

    async fn create_snapshot(&self, ctx: &RequestContext, snapshot: &Snapshot) -> Result<()>;

    async fn delete_snapshot(&self, ctx: &RequestContext, snapshot: &Snapshot) -> Result<()>;

    /// Re-register a share this process does not track (e.g. after restart)
    async fn ensure_share(&self, ctx: &RequestContext, share: &Share) -> Result<()>;

    async fn allow_access(
        &self,
        ctx: &RequestContext,
        share: &Share,
        access: &AccessRule,
    ) -> Result<()>;

    async fn deny_access(
        &self,
        ctx: &RequestContext,
        share: &Share,
        access: &AccessRule,
    ) -> Result<()>;

    /// Backend device serving the share, `None` if unknown
    fn get_target(&self, share: &Share) -> Option<String>;

    /// Backend capacity report; `refresh` forces a new query
    async fn get_share_stats(&self, refresh: bool) -> Result<ShareStats>;
}

// =============================================================================
// Command Executor Port
// =============================================================================

/// Options for a local command
#[derive(Debug, Clone, Copy)]
pub struct CommandOptions {
    /// Prefix the command with the configured root helper
    pub run_as_root: bool,
    /// Treat a non-zero exit status as a failure
    pub check_exit_code: bool,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            run_as_root: false,
            check_exit_code: true,
        }
    }
}

impl CommandOptions {
    pub fn root() -> Self {
        Self {
            run_as_root: true,
            check_exit_code: true,
        }
    }

    pub fn unchecked(mut self) -> Self {
        self.check_exit_code = false;
        self
    }
}

/// Captured output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Port for running local commands
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command` to completion; a failure is `Error::ProcessExecution`
    async fn execute(&self, command: &[String], options: CommandOptions) -> Result<CommandOutput>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ShareDriverRef = Arc<dyn ShareDriver>;
pub type CommandExecutorRef = Arc<dyn CommandExecutor>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_options() {
        let opts = CommandOptions::root().unchecked();
        assert!(opts.run_as_root);
        assert!(!opts.check_exit_code);
        assert!(CommandOptions::default().check_exit_code);
    }

    #[test]
    fn test_share_stats_serialize() {
        let stats = ShareStats {
            share_backend_name: "lvm".into(),
            vendor_name: "Open Source".into(),
            driver_version: "1.0".into(),
            storage_protocol: "NFS_CIFS".into(),
            total_capacity_gb: 10.0,
            free_capacity_gb: 4.5,
            reserved_percentage: 0,
            qos_support: false,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["free_capacity_gb"], 4.5);
        assert_eq!(json["storage_protocol"], "NFS_CIFS");
    }
}
