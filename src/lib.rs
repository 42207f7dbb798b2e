//! NAS Provisioner - Share Provisioning Core
//!
//! Backend-agnostic provisioning of NFS and CIFS shares. A uniform
//! [`ShareDriver`] interface sits in front of two backends: a clustered NAS
//! controller driven over its XML request API, and local LVM volumes
//! exported by the kernel NFS server or Samba.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                          ShareDriver (facade)                               │
//! │  allocate / clone / deallocate · create / delete share · snapshots · access │
//! ├──────────────────────────────────────┬──────────────────────────────────────┤
//! │       Clustered Controller           │            Local LVM                 │
//! │  ┌────────────┐  ┌────────────────┐  │  ┌──────────────┐  ┌──────────────┐  │
//! │  │ Placement  │  │ NFS / CIFS     │  │  │ exportfs     │  │ net conf     │  │
//! │  │ Selector   │  │ helpers        │  │  │ helper       │  │ helper       │  │
//! │  └─────┬──────┘  └───────┬────────┘  │  └──────┬───────┘  └──────┬───────┘  │
//! │        └────────┬────────┘           │         └────────┬────────┘          │
//! │        ┌────────┴─────────┐          │         ┌────────┴─────────┐         │
//! │        │ Controller Client│          │         │ Command Executor │         │
//! │        │ (XML over HTTP)  │          │         │ (root helper)    │         │
//! │        └──────────────────┘          │         └──────────────────┘         │
//! ├──────────────────────────────────────┴──────────────────────────────────────┤
//! │        Backend Location Registry  ·  Resilient Invocation (retry)           │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`domain`]: Share records, canonical naming and the driver ports
//! - [`drivers`]: Clustered controller and LVM driver adapters
//! - [`zapi`]: XML request codec and controller client
//! - [`placement`]: Aggregate selection and container sizing
//! - [`registry`]: Share to backend device mapping
//! - [`retry`]: Bounded quadratic retry of transient failures
//! - [`error`]: Error types and handling

pub mod config;
pub mod domain;
pub mod drivers;
pub mod error;
pub mod executor;
pub mod placement;
pub mod registry;
pub mod retry;
pub mod zapi;

// Re-export commonly used types
pub use config::DriverConfig;

pub use domain::naming::{share_name, snapshot_name};

pub use domain::ports::{
    CommandExecutor, CommandOptions, CommandOutput, RequestContext, ShareDriver, ShareStats,
};

pub use domain::share::{
    AccessRule, AccessState, AccessType, LifecycleStatus, Share, ShareProtocol, Snapshot,
};

pub use drivers::{
    ClusteredConfig, ClusteredShareDriver, DriverFactory, LvmConfig, LvmShareDriver,
};

pub use error::{Error, Result};

pub use executor::ProcessExecutor;

pub use registry::BackendRegistry;

pub use retry::RetryConfig;

pub use zapi::{ControllerClient, ControllerTransport, Element, HttpTransport, TransportType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
