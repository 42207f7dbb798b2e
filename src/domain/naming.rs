//! Canonical backend object names
//!
//! Controller object names may contain letters, digits and underscores and
//! must start with a letter or underscore. Every other character of an
//! identifier is substituted with an underscore behind a fixed prefix.

const SHARE_PREFIX: &str = "share_";
const SNAPSHOT_PREFIX: &str = "share_snapshot_";

/// Backend name of the volume backing a share
pub fn share_name(share_id: &str) -> String {
    canonical(SHARE_PREFIX, share_id)
}

/// Backend name of a share snapshot
pub fn snapshot_name(snapshot_id: &str) -> String {
    canonical(SNAPSHOT_PREFIX, snapshot_id)
}

fn canonical(prefix: &str, id: &str) -> String {
    let mut name = String::with_capacity(prefix.len() + id.len());
    name.push_str(prefix);
    name.extend(
        id.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }),
    );
    name
}
