//! Per-operation options and transfer configuration.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for a single read buffer.
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Options for a push (local is authoritative).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushOptions {
    /// Delete remote entries that no longer exist locally.
    pub delete_extraneous: bool,
    /// Plan and narrate without touching the remote store.
    pub dry_run: bool,
}

/// Options for a pull (remote is authoritative).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullOptions {
    /// Delete local entries that no longer exist remotely.
    pub delete_extraneous: bool,
    /// Plan and narrate without touching the local filesystem.
    pub dry_run: bool,
}

/// Transfer tuning shared by uploads and downloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Abort a transfer after this many seconds without progress.
    pub idle_timeout_secs: u64,
    /// Read buffer size for uploads, in bytes.
    pub chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 300,
            chunk_size: 8 * 1024 * 1024, // 8 MB
        }
    }
}

impl TransferConfig {
    /// The idle window as a duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Rejects values the executor cannot work with.
    pub fn validate(&self) -> SyncResult<()> {
        if self.idle_timeout_secs == 0 {
            return Err(SyncError::InvalidOptions(
                "idle timeout must be at least one second".to_string(),
            ));
        }
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(SyncError::InvalidOptions(format!(
                "chunk size must be between 1 and {MAX_CHUNK_SIZE} bytes, got {}",
                self.chunk_size
            )));
        }
        Ok(())
    }
}
