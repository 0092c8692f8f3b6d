//! Sync engine: the caller-facing push and pull operations.
//!
//! A run checks both roots, collects the local and remote trees
//! concurrently, reconciles them and hands the resulting plan to the
//! executor. Nothing is mutated before reconciliation has succeeded.

use crate::entry::RemoteEntry;
use crate::error::{SyncError, SyncResult};
use crate::executor::{Executor, SyncReport};
use crate::local;
use crate::options::{PullOptions, PushOptions, TransferConfig};
use crate::plan::{PullPlan, PushPlan};
use crate::progress::ProgressSink;
use crate::reconcile::{ChecksumComparer, Comparer, reconcile};
use crate::remote::collector;
use crate::remote::{NodeField, NodeQuery, RemoteNode, RemoteStore};
use crate::root::{self, SYNC_ROOT_PROPERTY};
use crate::transfer::TransferGuard;
use drivesync_types::NodeId;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs push and pull synchronizations against one remote store.
pub struct SyncEngine {
    store: Arc<dyn RemoteStore>,
    sink: Arc<dyn ProgressSink>,
    comparer: Arc<dyn Comparer>,
    transfer: TransferConfig,
    cancel: CancellationToken,
}

impl SyncEngine {
    /// Creates an engine using [`ChecksumComparer`] and default transfer settings.
    pub fn new(store: Arc<dyn RemoteStore>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            store,
            sink,
            comparer: Arc::new(ChecksumComparer),
            transfer: TransferConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the content comparer.
    pub fn with_comparer(mut self, comparer: Arc<dyn Comparer>) -> Self {
        self.comparer = comparer;
        self
    }

    /// Replaces the transfer settings after validating them.
    pub fn with_transfer_config(mut self, transfer: TransferConfig) -> SyncResult<Self> {
        transfer.validate()?;
        self.transfer = transfer;
        Ok(self)
    }

    /// Uses `cancel` to abort runs from outside.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels the current and any later run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns the transfer settings.
    pub fn transfer_config(&self) -> &TransferConfig {
        &self.transfer
    }

    /// Returns the store provider name.
    pub fn provider_name(&self) -> &'static str {
        self.store.provider_name()
    }

    fn guard(&self) -> TransferGuard {
        TransferGuard::new(self.transfer.idle_timeout(), self.cancel.clone())
    }

    /// Makes the remote tree below `root_id` match `local_root`.
    ///
    /// A root that has never been synced must be an empty directory; it is
    /// marked as a sync root once the plan has been computed.
    pub async fn push(
        &self,
        local_root: &Path,
        root_id: &NodeId,
        options: PushOptions,
    ) -> SyncResult<SyncReport> {
        info!(
            "Push {} -> {} ({})",
            local_root.display(),
            root_id,
            self.store.provider_name()
        );
        let store = self.store.as_ref();
        let guard = self.guard();
        guard.check()?;

        local::check_root(local_root).await?;
        let needs_marking = root::check_push_root(store, root_id).await?;

        let (local_entries, remote_entries) = tokio::try_join!(
            local::collect(local_root),
            collector::collect(store, root_id),
        )?;
        self.sink.line(&format!(
            "Found {} local and {} remote entries",
            local_entries.len(),
            remote_entries.len()
        ));

        let changes = reconcile(&local_entries, &remote_entries, self.comparer.as_ref()).await?;
        if changes.is_empty() {
            debug!("Local and remote trees already agree");
        }
        let plan = PushPlan::push(changes, options.delete_extraneous);
        self.announce(plan.len());

        if needs_marking && !options.dry_run {
            root::mark_root(store, root_id).await?;
        }

        Executor::new(store, self.sink.as_ref(), &guard, &self.transfer, options.dry_run)
            .push(plan, root_id, &remote_entries)
            .await
    }

    /// Makes `local_root` match the remote tree below `root_id`.
    ///
    /// A missing local root is treated as empty and created before the
    /// first mutation.
    pub async fn pull(
        &self,
        root_id: &NodeId,
        local_root: &Path,
        options: PullOptions,
    ) -> SyncResult<SyncReport> {
        info!(
            "Pull {} -> {} ({})",
            root_id,
            local_root.display(),
            self.store.provider_name()
        );
        let store = self.store.as_ref();
        let guard = self.guard();
        guard.check()?;

        root::require_sync_root(store, root_id).await?;
        let local_exists = match tokio::fs::metadata(local_root).await {
            Ok(_) => {
                local::check_root(local_root).await?;
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                return Err(SyncError::LocalRootInvalid {
                    path: local_root.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let collect_local = async {
            if local_exists {
                local::collect(local_root).await
            } else {
                debug!("Local root {} does not exist yet", local_root.display());
                Ok(Vec::new())
            }
        };
        let (local_entries, remote_entries) =
            tokio::try_join!(collect_local, collector::collect(store, root_id))?;
        self.sink.line(&format!(
            "Found {} local and {} remote entries",
            local_entries.len(),
            remote_entries.len()
        ));

        let changes = reconcile(&local_entries, &remote_entries, self.comparer.as_ref()).await?;
        if changes.is_empty() {
            debug!("Local and remote trees already agree");
        }
        let plan = PullPlan::pull(changes, options.delete_extraneous);
        self.announce(plan.len());

        if !local_exists && !options.dry_run {
            tokio::fs::create_dir_all(local_root).await.map_err(|e| {
                SyncError::io(format!("failed to create {}", local_root.display()), e)
            })?;
        }

        Executor::new(store, self.sink.as_ref(), &guard, &self.transfer, options.dry_run)
            .pull(plan, local_root, &local_entries)
            .await
    }

    /// Lists every directory marked as a sync root, sorted by name.
    pub async fn list_sync_roots(&self) -> SyncResult<Vec<RemoteNode>> {
        let query = NodeQuery::Property {
            key: SYNC_ROOT_PROPERTY.to_string(),
            value: "true".to_string(),
        };
        let mut roots: Vec<RemoteNode> = self
            .store
            .list_nodes(&query, NodeField::ALL)
            .await?
            .into_iter()
            .filter(root::is_sync_root)
            .collect();
        roots.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(roots)
    }

    /// Lists the remote tree of a sync root with relative paths.
    pub async fn list_content(&self, root_id: &NodeId) -> SyncResult<Vec<RemoteEntry>> {
        let store = self.store.as_ref();
        root::require_sync_root(store, root_id).await?;
        collector::collect(store, root_id).await
    }

    fn announce(&self, operations: usize) {
        if operations == 0 {
            self.sink.line("Nothing to do");
        } else {
            self.sink.line(&format!("{operations} operations planned"));
        }
    }
}
