//! Export location encoding
//!
//! NFS locations are `host:path`, CIFS locations are `//host/share`. Parsing
//! never fails: a malformed or missing location decodes to empty fields,
//! which callers treat as an unknown target.

/// Parsed NFS export location
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NfsExport {
    pub host: String,
    pub path: String,
}

impl NfsExport {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
        }
    }

    /// Decode a `host:path` string; anything other than exactly two fields
    /// yields empty host and path.
    pub fn parse(location: Option<&str>) -> Self {
        let Some(location) = location else {
            return Self::default();
        };
        let mut fields = location.split(':');
        match (fields.next(), fields.next(), fields.next()) {
            (Some(host), Some(path), None) => Self::new(host, path),
            _ => Self::default(),
        }
    }

    /// Host portion, `None` when unknown
    pub fn target(&self) -> Option<String> {
        (!self.host.is_empty()).then(|| self.host.clone())
    }

    pub fn location(&self) -> String {
        format!("{}:{}", self.host, self.path)
    }
}

/// Parsed CIFS export location
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CifsExport {
    pub host: String,
    pub share_name: String,
}

impl CifsExport {
    pub fn new(host: impl Into<String>, share_name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            share_name: share_name.into(),
        }
    }

    /// Decode a `//host/share` string
    pub fn parse(location: Option<&str>) -> Self {
        let Some(location) = location else {
            return Self::default();
        };
        let fields: Vec<&str> = location.split('/').collect();
        match fields.as_slice() {
            ["", "", host, share] => Self::new(*host, *share),
            _ => Self::default(),
        }
    }

    /// Host portion, `None` when unknown
    pub fn target(&self) -> Option<String> {
        (!self.host.is_empty()).then(|| self.host.clone())
    }

    pub fn location(&self) -> String {
        format!("//{}/{}", self.host, self.share_name)
    }
}
