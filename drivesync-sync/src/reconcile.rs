//! Local/remote tree diff.
//!
//! Entries are matched by relative path only. Names, ids and node kinds play
//! no part in matching; a path that is a directory on one side and a file on
//! the other is reported as an error rather than guessed at.

use crate::entry::{LocalEntry, RemoteEntry, SyncEntry};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use drivesync_types::RelPath;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use tokio::io::AsyncReadExt;

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Decides whether a matched pair of files differs in content.
#[async_trait]
pub trait Comparer: Send + Sync {
    /// Returns true if `local` and `remote` hold different content.
    async fn changed(&self, local: &LocalEntry, remote: &RemoteEntry) -> SyncResult<bool>;
}

/// Hashes the local file with SHA-256 and compares it to the remote checksum.
///
/// A remote node without a checksum is always treated as changed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumComparer;

impl ChecksumComparer {
    /// Lowercase hex SHA-256 of a local file.
    pub async fn file_checksum(path: &Path) -> SyncResult<String> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| SyncError::io(format!("failed to open {}", path.display()), e))?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; HASH_BUFFER_SIZE];
        loop {
            let n = file
                .read(&mut buf)
                .await
                .map_err(|e| SyncError::io(format!("failed to read {}", path.display()), e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

#[async_trait]
impl Comparer for ChecksumComparer {
    async fn changed(&self, local: &LocalEntry, remote: &RemoteEntry) -> SyncResult<bool> {
        let Some(remote_sum) = remote.node.checksum.as_deref() else {
            return Ok(true);
        };
        let local_sum = Self::file_checksum(&local.abs_path).await?;
        Ok(!local_sum.eq_ignore_ascii_case(remote_sum))
    }
}

/// Compares byte sizes only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeComparer;

#[async_trait]
impl Comparer for SizeComparer {
    async fn changed(&self, local: &LocalEntry, remote: &RemoteEntry) -> SyncResult<bool> {
        Ok(local.size != remote.node.size)
    }
}

/// A file present on both sides whose content differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedPair {
    pub local: LocalEntry,
    pub remote: RemoteEntry,
}

impl ChangedPair {
    pub fn rel_path(&self) -> &RelPath {
        &self.local.rel_path
    }
}

/// Result of reconciling a local and a remote tree.
///
/// The `missing_*` sets and the `extraneous_*` sets describe the same
/// unmatched entries from the two directions: `missing_remote_*` together
/// equal `extraneous_local`, and `missing_local_*` equal `extraneous_remote`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Local directories with no remote counterpart.
    pub missing_remote_dirs: Vec<LocalEntry>,
    /// Local files with no remote counterpart.
    pub missing_remote_files: Vec<LocalEntry>,
    /// Remote directories with no local counterpart.
    pub missing_local_dirs: Vec<RemoteEntry>,
    /// Remote files with no local counterpart.
    pub missing_local_files: Vec<RemoteEntry>,
    /// Files on both sides whose content differs.
    pub changed: Vec<ChangedPair>,
    /// Remote entries absent locally.
    pub extraneous_remote: Vec<RemoteEntry>,
    /// Local entries absent remotely.
    pub extraneous_local: Vec<LocalEntry>,
}

impl ChangeSet {
    /// True if both trees already agree.
    pub fn is_empty(&self) -> bool {
        self.extraneous_local.is_empty()
            && self.extraneous_remote.is_empty()
            && self.changed.is_empty()
    }
}

/// Diffs `local` against `remote`.
///
/// Runs in O(|L| + |R|) lookups; `comparer` is consulted once per matched
/// pair of files. Root entries on either side are ignored.
pub async fn reconcile(
    local: &[LocalEntry],
    remote: &[RemoteEntry],
    comparer: &dyn Comparer,
) -> SyncResult<ChangeSet> {
    let local_index: HashMap<&RelPath, &LocalEntry> =
        local.iter().map(|e| (&e.rel_path, e)).collect();
    let remote_index: HashMap<&RelPath, &RemoteEntry> =
        remote.iter().map(|e| (&e.rel_path, e)).collect();

    let mut changes = ChangeSet::default();

    for entry in local.iter().filter(|e| !e.rel_path.is_root()) {
        match remote_index.get(&entry.rel_path) {
            Some(counterpart) => {
                if entry.is_dir != counterpart.is_dir() {
                    return Err(SyncError::KindMismatch {
                        path: entry.rel_path.to_string(),
                        local: entry.kind(),
                        remote: counterpart.kind(),
                    });
                }
                if !entry.is_dir && comparer.changed(entry, counterpart).await? {
                    changes.changed.push(ChangedPair {
                        local: entry.clone(),
                        remote: (*counterpart).clone(),
                    });
                }
            }
            None => {
                if entry.is_dir {
                    changes.missing_remote_dirs.push(entry.clone());
                } else {
                    changes.missing_remote_files.push(entry.clone());
                }
                changes.extraneous_local.push(entry.clone());
            }
        }
    }

    for entry in remote.iter().filter(|e| !e.rel_path.is_root()) {
        if local_index.contains_key(&entry.rel_path) {
            continue;
        }
        if entry.is_dir() {
            changes.missing_local_dirs.push(entry.clone());
        } else {
            changes.missing_local_files.push(entry.clone());
        }
        changes.extraneous_remote.push(entry.clone());
    }

    Ok(changes)
}
