//! Share, snapshot and access rule records
//!
//! These are owned by the API/persistence layer. Drivers receive a copy per
//! call and hand back derived fields (the export location) without storing
//! the record.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// =============================================================================
// Protocols
// =============================================================================

/// NAS protocol a share is exposed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ShareProtocol {
    Nfs,
    Cifs,
}

impl ShareProtocol {
    /// All known protocols, in helper lookup order
    pub const ALL: [ShareProtocol; 2] = [ShareProtocol::Cifs, ShareProtocol::Nfs];

    /// Helper key the declared protocol string is matched against
    pub fn key(&self) -> &'static str {
        match self {
            ShareProtocol::Nfs => "NFS",
            ShareProtocol::Cifs => "CIFS",
        }
    }
}

impl FromStr for ShareProtocol {
    type Err = Error;

    /// Resolve a declared protocol string by case-insensitive prefix match
    /// against the helper keys, so `nfs`, `NFSv4` and `cifs` all resolve.
    fn from_str(declared: &str) -> Result<Self> {
        let upper = declared.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|proto| upper.starts_with(proto.key()))
            .ok_or_else(|| Error::UnsupportedProtocol {
                protocol: declared.to_string(),
            })
    }
}

impl TryFrom<String> for ShareProtocol {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ShareProtocol> for String {
    fn from(proto: ShareProtocol) -> Self {
        proto.key().to_string()
    }
}

impl std::fmt::Display for ShareProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

// =============================================================================
// Lifecycle Status
// =============================================================================

/// Lifecycle status of a share or snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    #[default]
    Creating,
    Available,
    Deleting,
    Deleted,
    Error,
    ErrorDeleting,
}

// =============================================================================
// Share
// =============================================================================

/// A logical share request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    /// Globally unique identifier
    pub id: String,
    /// Declared size in GiB
    pub size: u64,
    /// Protocol, resolved once when the record is built
    pub share_proto: ShareProtocol,
    /// Protocol-specific host and path, unset until provisioned
    #[serde(default)]
    pub export_location: Option<String>,
    #[serde(default)]
    pub status: LifecycleStatus,
}

impl Share {
    /// Build a share record, resolving the declared protocol string
    pub fn new(id: impl Into<String>, size: u64, declared_proto: &str) -> Result<Self> {
        Ok(Self {
            id: id.into(),
            size,
            share_proto: declared_proto.parse()?,
            export_location: None,
            status: LifecycleStatus::Creating,
        })
    }

    pub fn with_export_location(mut self, location: impl Into<String>) -> Self {
        self.export_location = Some(location.into());
        self
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// A point-in-time snapshot of a share
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    /// Identifier of the share the snapshot was taken from
    pub share_id: String,
    /// Size of the parent share in GiB
    #[serde(default)]
    pub share_size: u64,
    #[serde(default)]
    pub status: LifecycleStatus,
}

impl Snapshot {
    pub fn new(id: impl Into<String>, share_id: impl Into<String>, share_size: u64) -> Self {
        Self {
            id: id.into(),
            share_id: share_id.into(),
            share_size,
            status: LifecycleStatus::Creating,
        }
    }
}

// =============================================================================
// Access Rules
// =============================================================================

/// Kind of principal an access rule grants to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    /// Host IP address (or hostname) based access
    #[serde(rename = "ip")]
    Ip,
    /// Username/password based access
    #[serde(rename = "passwd")]
    UserPassword,
}

impl std::fmt::Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessType::Ip => write!(f, "ip"),
            AccessType::UserPassword => write!(f, "passwd"),
        }
    }
}

impl FromStr for AccessType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ip" => Ok(AccessType::Ip),
            "passwd" | "user" => Ok(AccessType::UserPassword),
            other => Err(Error::UnsupportedAccessType {
                access_type: other.to_string(),
                protocol: "any".to_string(),
            }),
        }
    }
}

/// State of an access rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessState {
    #[default]
    New,
    Active,
    Deleting,
    Deleted,
    Error,
}

/// An access rule supplied with an allow/deny call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    pub access_type: AccessType,
    /// Host(s) or user name the rule applies to
    pub access_to: String,
    #[serde(default)]
    pub state: AccessState,
}

impl AccessRule {
    pub fn new(access_type: AccessType, access_to: impl Into<String>) -> Self {
        Self {
            access_type,
            access_to: access_to.into(),
            state: AccessState::New,
        }
    }

    pub fn ip(host: impl Into<String>) -> Self {
        Self::new(AccessType::Ip, host)
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self::new(AccessType::UserPassword, name)
    }

    /// Individual targets of the rule; a comma separated `access_to` names
    /// several hosts at once.
    pub fn targets(&self) -> Vec<String> {
        self.access_to
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Fail with `UnsupportedAccessType` unless the rule has the given type
    pub fn require(&self, expected: AccessType, protocol: ShareProtocol) -> Result<()> {
        if self.access_type == expected {
            Ok(())
        } else {
            Err(Error::UnsupportedAccessType {
                access_type: self.access_type.to_string(),
                protocol: protocol.to_string(),
            })
        }
    }
}
