//! Entries on either side of a sync, keyed by relative path.

use crate::remote::RemoteNode;
use chrono::{DateTime, Utc};
use drivesync_types::{NodeId, RelPath};
use std::path::PathBuf;

/// Anything that can be matched by relative path.
pub trait SyncEntry {
    /// Path from the sync root.
    fn rel_path(&self) -> &RelPath;

    /// Whether the entry is a directory.
    fn is_dir(&self) -> bool;

    /// Human-readable kind for messages.
    fn kind(&self) -> &'static str {
        if self.is_dir() { "directory" } else { "file" }
    }
}

/// A file or directory under the local sync root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    /// Absolute path on disk.
    pub abs_path: PathBuf,
    /// Path from the local sync root.
    pub rel_path: RelPath,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modification time.
    pub modified_at: DateTime<Utc>,
}

impl SyncEntry for LocalEntry {
    fn rel_path(&self) -> &RelPath {
        &self.rel_path
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }
}

/// A remote node placed in the tree by its reconstructed relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Path from the remote sync root.
    pub rel_path: RelPath,
    /// The underlying node.
    pub node: RemoteNode,
}

impl RemoteEntry {
    /// Shorthand for the node id.
    pub fn id(&self) -> &NodeId {
        &self.node.id
    }
}

impl SyncEntry for RemoteEntry {
    fn rel_path(&self) -> &RelPath {
        &self.rel_path
    }

    fn is_dir(&self) -> bool {
        self.node.is_dir
    }
}
