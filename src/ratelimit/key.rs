//! Composite key generation and namespace inference.

use std::fmt;

/// A key that uniquely identifies a rate-limited action.
///
/// Both parts are opaque; empty strings are accepted and simply produce
/// degenerate keys such as `"."`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionKey {
    /// The calling module or resource type
    pub namespace: String,
    /// The remote API action within the namespace
    pub action: String,
}

impl ActionKey {
    /// Create a new key from a namespace and action.
    pub fn new(namespace: &str, action: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            action: action.to_string(),
        }
    }

    /// The `"<namespace>.<action>"` form used in the limit table.
    pub fn composite(&self) -> String {
        format!("{}.{}", self.namespace, self.action)
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.action)
    }
}

/// Derive a namespace from a source path: the file name with its directory
/// and final extension removed.
///
/// `"src/services/service_vod.rs"` becomes `"service_vod"`.
pub fn namespace_from_path(path: &str) -> &str {
    let file = path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path);
    match file.rfind('.') {
        Some(0) | None => file,
        Some(idx) => &file[..idx],
    }
}
