//! Guarded content transfers.
//!
//! Uploads and downloads may run for as long as they keep moving bytes. A
//! transfer is aborted when the caller cancels it or when no chunk has moved
//! for the configured idle window; the window restarts on every chunk.

use crate::error::{SyncError, SyncResult};
use crate::remote::ByteStream;
use futures::{StreamExt, TryStreamExt};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Last-progress clock shared between a stream and its watchdog.
#[derive(Debug, Clone)]
pub struct Activity {
    started: Instant,
    last_ms: Arc<AtomicU64>,
}

impl Activity {
    /// Starts a clock with progress recorded now.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            last_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records progress.
    pub fn touch(&self) {
        let elapsed = self.started.elapsed().as_millis() as u64;
        self.last_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    /// When progress was last recorded.
    pub fn last_progress(&self) -> Instant {
        self.started + Duration::from_millis(self.last_ms.load(Ordering::Relaxed))
    }

    /// Resolves once no progress has been recorded for `idle`.
    async fn stalled(&self, idle: Duration) {
        loop {
            let deadline = self.last_progress() + idle;
            if Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep_until(deadline).await;
        }
    }
}

impl Default for Activity {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation and idle-timeout policy for transfers.
#[derive(Debug, Clone)]
pub struct TransferGuard {
    idle_timeout: Duration,
    cancel: CancellationToken,
}

impl TransferGuard {
    /// Creates a guard aborting after `idle_timeout` without progress.
    pub fn new(idle_timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            idle_timeout,
            cancel,
        }
    }

    /// The idle window.
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Fails with [`SyncError::Cancelled`] once the token has fired.
    pub fn check(&self) -> SyncResult<()> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    /// Records progress on `activity` for every chunk `stream` yields.
    pub fn track(&self, stream: ByteStream, activity: &Activity) -> ByteStream {
        let activity = activity.clone();
        stream
            .inspect_ok(move |_| activity.touch())
            .boxed()
    }

    /// Drives `transfer` until it finishes, stalls, or is cancelled.
    pub async fn run<T, F>(&self, activity: &Activity, transfer: F) -> SyncResult<T>
    where
        F: Future<Output = SyncResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SyncError::Cancelled),
            _ = activity.stalled(self.idle_timeout) => {
                debug!("Transfer stalled for {:?}", self.idle_timeout);
                Err(SyncError::IdleTimeout(self.idle_timeout))
            }
            result = transfer => result,
        }
    }
}

/// Opens a local file as a chunked stream.
pub async fn read_file(path: &Path, chunk_size: usize) -> SyncResult<ByteStream> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| SyncError::io(format!("failed to open {}", path.display()), e))?;
    let display = path.display().to_string();
    Ok(ReaderStream::with_capacity(file, chunk_size)
        .map_err(move |e| SyncError::io(format!("failed to read {display}"), e))
        .boxed())
}

/// Writes `stream` to `path`, replacing any existing file.
///
/// Content is staged in [`partial_path`] and renamed over `path` only once
/// the stream has finished; on failure `path` keeps its previous content.
/// Returns the number of bytes written.
pub async fn write_file(stream: ByteStream, path: &Path, activity: &Activity) -> SyncResult<u64> {
    let partial = partial_path(path);
    let written = match write_partial(stream, &partial, activity).await {
        Ok(written) => written,
        Err(e) => {
            discard_partial(path).await;
            return Err(e);
        }
    };
    if let Err(e) = tokio::fs::rename(&partial, path).await {
        discard_partial(path).await;
        return Err(SyncError::io(format!("failed to replace {}", path.display()), e));
    }
    Ok(written)
}

/// Sibling file a download of `path` is staged in.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".incomplete");
    PathBuf::from(name)
}

/// Removes the staging file of an unfinished download of `path`, if any.
pub async fn discard_partial(path: &Path) {
    let partial = partial_path(path);
    match tokio::fs::remove_file(&partial).await {
        Ok(()) => debug!("Discarded {}", partial.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!("Could not remove {}: {}", partial.display(), e),
    }
}

async fn write_partial(mut stream: ByteStream, partial: &Path, activity: &Activity) -> SyncResult<u64> {
    let mut file = tokio::fs::File::create(partial)
        .await
        .map_err(|e| SyncError::io(format!("failed to create {}", partial.display()), e))?;

    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| SyncError::io(format!("failed to write {}", partial.display()), e))?;
        written += chunk.len() as u64;
        activity.touch();
    }
    file.flush()
        .await
        .map_err(|e| SyncError::io(format!("failed to flush {}", partial.display()), e))?;
    Ok(written)
}
