//! Local tree collector.
//!
//! Walks the local sync root and produces one [`LocalEntry`] per file and
//! directory below it. Any read error aborts the whole walk so that no
//! partial tree is ever reconciled.

use crate::entry::LocalEntry;
use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use drivesync_types::RelPath;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Checks that `root` exists and is a directory.
pub async fn check_root(root: &Path) -> SyncResult<()> {
    let metadata = fs::metadata(root)
        .await
        .map_err(|e| SyncError::LocalRootInvalid {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;
    if !metadata.is_dir() {
        return Err(SyncError::LocalRootInvalid {
            path: root.display().to_string(),
            reason: "not a directory".to_string(),
        });
    }
    Ok(())
}

/// Collects every entry below `root`, sorted by relative path.
///
/// The root itself is not part of the result. Symbolic links and special
/// files are skipped.
pub async fn collect(root: &Path) -> SyncResult<Vec<LocalEntry>> {
    check_root(root).await?;

    let mut entries = Vec::new();
    let mut pending: Vec<(PathBuf, RelPath)> = vec![(root.to_path_buf(), RelPath::root())];

    while let Some((dir, rel_dir)) = pending.pop() {
        let mut read_dir = fs::read_dir(&dir)
            .await
            .map_err(|e| SyncError::io(format!("failed to read directory {}", dir.display()), e))?;

        while let Some(entry) = read_dir.next_entry().await.map_err(|e| {
            SyncError::io(format!("failed to read directory entry in {}", dir.display()), e)
        })? {
            let abs_path = entry.path();
            let name = entry.file_name().into_string().map_err(|raw| {
                SyncError::UnrepresentableName(abs_path_lossy(&dir, &raw))
            })?;
            let rel_path = rel_dir
                .join(&name)
                .map_err(|_| SyncError::UnrepresentableName(abs_path.display().to_string()))?;

            let metadata = fs::symlink_metadata(&abs_path).await.map_err(|e| {
                SyncError::io(format!("failed to read metadata of {}", abs_path.display()), e)
            })?;
            let file_type = metadata.file_type();
            if file_type.is_symlink() || !(file_type.is_dir() || file_type.is_file()) {
                debug!("Skipping special file: {}", abs_path.display());
                continue;
            }

            let modified_at = metadata.modified().map(DateTime::<Utc>::from).map_err(|e| {
                SyncError::io(format!("failed to read mtime of {}", abs_path.display()), e)
            })?;
            let is_dir = file_type.is_dir();

            if is_dir {
                pending.push((abs_path.clone(), rel_path.clone()));
            }

            entries.push(LocalEntry {
                abs_path,
                rel_path,
                is_dir,
                size: if is_dir { 0 } else { metadata.len() },
                modified_at,
            });
        }
    }

    entries.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    debug!("Collected {} local entries under {}", entries.len(), root.display());
    Ok(entries)
}

fn abs_path_lossy(dir: &Path, raw: &std::ffi::OsStr) -> String {
    dir.join(raw).to_string_lossy().into_owned()
}
