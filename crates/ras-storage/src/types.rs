use serde::{Deserialize, Serialize};

/// Result of a `stat` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    /// Current size of the storage in bytes.
    pub size: u64,
}

/// Options forwarded to a backend when it is constructed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Whether reads are permitted.
    pub readable: bool,
    /// Whether writes, deletes and creation are permitted.
    pub writable: bool,
    /// Discard existing content on open.
    pub truncate: bool,
    /// Resize the storage to exactly this many bytes on open.
    pub size: Option<u64>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            readable: true,
            writable: true,
            truncate: false,
            size: None,
        }
    }
}

impl OpenOptions {
    /// Read-only access to existing content.
    pub fn read_only() -> Self {
        Self {
            writable: false,
            ..Default::default()
        }
    }
}

/// Lifecycle flags of a storage object.
///
/// These are the only properties a pending handle reports before its
/// backend exists; all three are `false` until then.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStatus {
    pub opened: bool,
    pub closed: bool,
    pub destroyed: bool,
}
