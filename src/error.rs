//! Error types for the NAS provisioner
//!
//! Provides structured error types for the share drivers, the storage
//! controller client, the command executor and configuration loading.

use thiserror::Error;

/// Unified error type for the provisioning core
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Storage Controller Errors
    // =========================================================================
    #[error("API {operation} failed: {reason} (errno {errno})")]
    RemoteInvocation {
        operation: String,
        reason: String,
        errno: String,
    },

    #[error("Controller transport error: {0}")]
    Transport(String),

    #[error("Controller returned HTTP {status} for {operation}")]
    HttpStatus { operation: String, status: u16 },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed response to {operation}: {reason}")]
    MalformedResponse { operation: String, reason: String },

    // =========================================================================
    // Local Execution Errors
    // =========================================================================
    #[error("Command `{command}` failed (exit code {exit_code:?}): {stderr}")]
    ProcessExecution {
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    // =========================================================================
    // Placement Errors
    // =========================================================================
    #[error("No aggregates available for vserver {vserver}")]
    NoPoolsAvailable { vserver: String },

    // =========================================================================
    // Share Errors
    // =========================================================================
    #[error("Invalid NAS protocol supplied: {protocol}")]
    UnsupportedProtocol { protocol: String },

    #[error("Access type {access_type} is not supported for {protocol} shares")]
    UnsupportedAccessType {
        access_type: String,
        protocol: String,
    },

    #[error("User {user} does not exist on {target}")]
    UserNotFound { user: String, target: String },

    #[error("Snapshot {snapshot_name} is busy")]
    SnapshotBusy { snapshot_name: String },

    #[error("Share {share_id} has no usable export location")]
    UnknownExportLocation { share_id: String },

    #[error("Share {share_name} is busy")]
    ShareBusy { share_name: String },

    #[error("Share access {access_type}:{access} exists")]
    AccessExists { access_type: String, access: String },

    #[error("Share backend error: {0}")]
    ShareBackend(String),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error is transient and worth another attempt
    ///
    /// Only process and network level failures qualify. Failures reported by
    /// the controller itself are logical and are never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::ProcessExecution { .. } | Error::Transport(_) => true,
            Error::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Error::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Build a `RemoteInvocation` error from a controller-reported failure
    pub fn remote(
        operation: impl Into<String>,
        reason: impl Into<String>,
        errno: impl Into<String>,
    ) -> Self {
        Error::RemoteInvocation {
            operation: operation.into(),
            reason: reason.into(),
            errno: errno.into(),
        }
    }

    /// Build a `MalformedResponse` error
    pub fn malformed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedResponse {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Standard error output of a failed command, empty for other errors
    pub fn stderr(&self) -> &str {
        match self {
            Error::ProcessExecution { stderr, .. } => stderr,
            _ => "",
        }
    }

    /// Standard output of a failed command, empty for other errors
    pub fn stdout(&self) -> &str {
        match self {
            Error::ProcessExecution { stdout, .. } => stdout,
            _ => "",
        }
    }
}

/// Result type alias for the provisioner
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let err = Error::ProcessExecution {
            command: "lvcreate".into(),
            exit_code: Some(5),
            stdout: String::new(),
            stderr: "timeout".into(),
        };
        assert!(err.is_transient());
        assert_eq!(err.stderr(), "timeout");

        let err = Error::HttpStatus {
            operation: "vserver-get".into(),
            status: 503,
        };
        assert!(err.is_transient());

        let err = Error::HttpStatus {
            operation: "vserver-get".into(),
            status: 401,
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn test_logical_errors_not_transient() {
        assert!(!Error::remote("volume-create", "no space", "13001").is_transient());
        assert!(!Error::NoPoolsAvailable {
            vserver: "vs0".into()
        }
        .is_transient());
        assert!(!Error::SnapshotBusy {
            snapshot_name: "share_snapshot_1".into()
        }
        .is_transient());
        assert!(!Error::Configuration("missing login".into()).is_transient());
        assert!(!Error::UnknownExportLocation {
            share_id: "5e-01".into()
        }
        .is_transient());
    }

    #[test]
    fn test_remote_error_message() {
        let err = Error::remote("snapshot-delete", "Snapshot is in use", "13023");
        assert_eq!(
            err.to_string(),
            "API snapshot-delete failed: Snapshot is in use (errno 13023)"
        );
        assert_eq!(err.stdout(), "");
    }
}
