//! Sequential plan execution.
//!
//! Phases run strictly in order and operations one at a time. The first
//! failure aborts the run; nothing already applied is rolled back, and the
//! next run recomputes the plan from the actual state of both trees.

use crate::entry::{LocalEntry, RemoteEntry, SyncEntry};
use crate::error::{SyncError, SyncResult};
use crate::options::TransferConfig;
use crate::plan::{Direction, PullPlan, PushPlan};
use crate::progress::ProgressSink;
use crate::reconcile::ChangedPair;
use crate::remote::{NewNode, NodeUpdate, RemoteStore};
use crate::root::linkage_properties;
use crate::transfer::{self, Activity, TransferGuard};
use drivesync_types::{NodeId, RelPath};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Relative path → materialized location of directories that exist or were created this run.
#[derive(Debug, Clone)]
pub struct TreeMirror<T> {
    entries: HashMap<RelPath, T>,
}

impl<T> TreeMirror<T> {
    /// A mirror that knows only the root.
    pub fn new(root: T) -> Self {
        Self {
            entries: HashMap::from([(RelPath::root(), root)]),
        }
    }

    /// Records where `path` lives.
    pub fn register(&mut self, path: RelPath, location: T) {
        self.entries.insert(path, location);
    }

    /// Looks up a registered path.
    pub fn get(&self, path: &RelPath) -> Option<&T> {
        self.entries.get(path)
    }

    /// Looks up the parent of `path`, which must already be registered.
    pub fn parent_of(&self, path: &RelPath) -> SyncResult<&T> {
        path.parent()
            .and_then(|parent| self.entries.get(&parent))
            .ok_or_else(|| SyncError::UnresolvedParent(path.to_string()))
    }

    /// Registers every directory among `entries` at the location `locate` gives it.
    pub fn register_dirs<'e, E, I>(&mut self, entries: I, locate: impl Fn(&E) -> T)
    where
        E: SyncEntry + 'e,
        I: IntoIterator<Item = &'e E>,
    {
        for entry in entries.into_iter().filter(|e| e.is_dir()) {
            self.register(entry.rel_path().clone(), locate(entry));
        }
    }
}

/// Counts of what a successful run did (or would do, for a dry run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub direction: Direction,
    pub dry_run: bool,
    pub dirs_created: usize,
    pub files_created: usize,
    pub files_updated: usize,
    pub deleted: usize,
}

impl SyncReport {
    fn new(direction: Direction, dry_run: bool) -> Self {
        Self {
            direction,
            dry_run,
            dirs_created: 0,
            files_created: 0,
            files_updated: 0,
            deleted: 0,
        }
    }

    /// Total operations performed.
    pub fn operations(&self) -> usize {
        self.dirs_created + self.files_created + self.files_updated + self.deleted
    }
}

/// Applies a plan one operation at a time.
pub struct Executor<'a> {
    store: &'a dyn RemoteStore,
    sink: &'a dyn ProgressSink,
    guard: &'a TransferGuard,
    chunk_size: usize,
    dry_run: bool,
    step: usize,
    total: usize,
}

impl<'a> Executor<'a> {
    pub fn new(
        store: &'a dyn RemoteStore,
        sink: &'a dyn ProgressSink,
        guard: &'a TransferGuard,
        transfer: &TransferConfig,
        dry_run: bool,
    ) -> Self {
        Self {
            store,
            sink,
            guard,
            chunk_size: transfer.chunk_size,
            dry_run,
            step: 0,
            total: 0,
        }
    }

    fn narrate(&mut self, verb: &str, path: &RelPath) {
        self.step += 1;
        let width = self.total.to_string().len();
        self.sink
            .line(&format!("[{:0width$}/{}] {verb} {path}", self.step, self.total));
    }

    // ── Push ─────────────────────────────────────────────────────

    /// Mirrors the local tree onto the remote store below `root_id`.
    ///
    /// `existing` is the remote tree the plan was computed from; its
    /// directories are the parents new entries may be created under.
    pub async fn push(
        mut self,
        plan: PushPlan,
        root_id: &NodeId,
        existing: &[RemoteEntry],
    ) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new(Direction::Push, self.dry_run);
        let mut mirror = TreeMirror::new(root_id.clone());
        mirror.register_dirs(existing, |entry: &RemoteEntry| entry.id().clone());
        self.total = plan.len();

        for dir in &plan.create_dirs {
            self.guard.check()?;
            self.narrate("Creating directory", &dir.rel_path);
            let id = self
                .create_remote_dir(dir, &mirror, root_id)
                .await
                .map_err(|e| e.during("create directory", dir.rel_path.as_str()))?;
            mirror.register(dir.rel_path.clone(), id);
            report.dirs_created += 1;
        }

        for file in &plan.create_files {
            self.guard.check()?;
            self.narrate("Uploading", &file.rel_path);
            self.upload(file, &mirror, root_id)
                .await
                .map_err(|e| e.during("upload", file.rel_path.as_str()))?;
            report.files_created += 1;
        }

        for pair in &plan.update_files {
            self.guard.check()?;
            self.narrate("Updating", pair.rel_path());
            self.replace_remote(pair)
                .await
                .map_err(|e| e.during("update", pair.rel_path().as_str()))?;
            report.files_updated += 1;
        }

        for entry in &plan.delete {
            self.guard.check()?;
            self.narrate("Deleting remote", &entry.rel_path);
            if !self.dry_run {
                self.store
                    .delete_node(entry.id())
                    .await
                    .map_err(|e| e.during("delete remote", entry.rel_path.as_str()))?;
            }
            report.deleted += 1;
        }

        info!(
            "Push finished: {} operations{}",
            report.operations(),
            if self.dry_run { " (dry run)" } else { "" }
        );
        Ok(report)
    }

    async fn create_remote_dir(
        &self,
        dir: &LocalEntry,
        mirror: &TreeMirror<NodeId>,
        root_id: &NodeId,
    ) -> SyncResult<NodeId> {
        let parent = mirror.parent_of(&dir.rel_path)?.clone();
        let node = self.new_node(&dir.rel_path, parent, true, root_id)?;
        if self.dry_run {
            return Ok(NodeId::generate());
        }
        let created = self.store.create_node(node, None).await?;
        debug!("Created remote directory {} ({})", dir.rel_path, created.id);
        Ok(created.id)
    }

    async fn upload(
        &self,
        file: &LocalEntry,
        mirror: &TreeMirror<NodeId>,
        root_id: &NodeId,
    ) -> SyncResult<()> {
        let parent = mirror.parent_of(&file.rel_path)?.clone();
        let node = self.new_node(&file.rel_path, parent, false, root_id)?;
        if self.dry_run {
            return Ok(());
        }
        let activity = Activity::new();
        let content = transfer::read_file(&file.abs_path, self.chunk_size).await?;
        let content = self.guard.track(content, &activity);
        let created = self
            .guard
            .run(&activity, self.store.create_node(node, Some(content)))
            .await?;
        debug!("Uploaded {} ({} bytes, id {})", file.rel_path, file.size, created.id);
        Ok(())
    }

    async fn replace_remote(&self, pair: &ChangedPair) -> SyncResult<()> {
        if self.dry_run {
            return Ok(());
        }
        let activity = Activity::new();
        let content = transfer::read_file(&pair.local.abs_path, self.chunk_size).await?;
        let content = self.guard.track(content, &activity);
        self.guard
            .run(
                &activity,
                self.store
                    .update_node(pair.remote.id(), NodeUpdate::default(), Some(content)),
            )
            .await?;
        Ok(())
    }

    fn new_node(
        &self,
        path: &RelPath,
        parent: NodeId,
        is_dir: bool,
        root_id: &NodeId,
    ) -> SyncResult<NewNode> {
        let name = path
            .name()
            .ok_or_else(|| SyncError::UnresolvedParent(path.to_string()))?;
        Ok(NewNode {
            name: name.to_string(),
            parent,
            is_dir,
            properties: linkage_properties(root_id),
        })
    }

    // ── Pull ─────────────────────────────────────────────────────

    /// Mirrors the remote tree onto `local_root`.
    ///
    /// `existing` is the local tree the plan was computed from.
    pub async fn pull(
        mut self,
        plan: PullPlan,
        local_root: &Path,
        existing: &[LocalEntry],
    ) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new(Direction::Pull, self.dry_run);
        let mut mirror = TreeMirror::new(local_root.to_path_buf());
        mirror.register_dirs(existing, |entry: &LocalEntry| entry.abs_path.clone());
        self.total = plan.len();

        for dir in &plan.create_dirs {
            self.guard.check()?;
            self.narrate("Creating directory", &dir.rel_path);
            let path = self
                .create_local_dir(dir, &mirror)
                .await
                .map_err(|e| e.during("create directory", dir.rel_path.as_str()))?;
            mirror.register(dir.rel_path.clone(), path);
            report.dirs_created += 1;
        }

        for file in &plan.create_files {
            self.guard.check()?;
            self.narrate("Downloading", &file.rel_path);
            self.download_new(file, &mirror)
                .await
                .map_err(|e| e.during("download", file.rel_path.as_str()))?;
            report.files_created += 1;
        }

        for pair in &plan.update_files {
            self.guard.check()?;
            self.narrate("Updating", pair.rel_path());
            if !self.dry_run {
                self.download_to(pair.remote.id(), &pair.local.abs_path)
                    .await
                    .map_err(|e| e.during("update", pair.rel_path().as_str()))?;
            }
            report.files_updated += 1;
        }

        for entry in &plan.delete {
            self.guard.check()?;
            self.narrate("Deleting local", &entry.rel_path);
            if !self.dry_run {
                remove_local(entry)
                    .await
                    .map_err(|e| e.during("delete local", entry.rel_path.as_str()))?;
            }
            report.deleted += 1;
        }

        info!(
            "Pull finished: {} operations{}",
            report.operations(),
            if self.dry_run { " (dry run)" } else { "" }
        );
        Ok(report)
    }

    async fn create_local_dir(
        &self,
        dir: &RemoteEntry,
        mirror: &TreeMirror<PathBuf>,
    ) -> SyncResult<PathBuf> {
        let path = mirror.parent_of(&dir.rel_path)?.join(&dir.node.name);
        if !self.dry_run {
            tokio::fs::create_dir_all(&path)
                .await
                .map_err(|e| SyncError::io(format!("failed to create {}", path.display()), e))?;
        }
        Ok(path)
    }

    async fn download_new(&self, file: &RemoteEntry, mirror: &TreeMirror<PathBuf>) -> SyncResult<()> {
        let path = mirror.parent_of(&file.rel_path)?.join(&file.node.name);
        if self.dry_run {
            return Ok(());
        }
        self.download_to(file.id(), &path).await
    }

    async fn download_to(&self, id: &NodeId, path: &Path) -> SyncResult<()> {
        let activity = Activity::new();
        let result = self
            .guard
            .run(&activity, async {
                let content = self.store.download(id).await?;
                let content = self.guard.track(content, &activity);
                transfer::write_file(content, path, &activity).await
            })
            .await;
        // A timeout or cancellation drops the write before it can clean up.
        if result.is_err() {
            transfer::discard_partial(path).await;
        }
        let written = result?;
        debug!("Downloaded {} ({} bytes)", path.display(), written);
        Ok(())
    }
}

async fn remove_local(entry: &LocalEntry) -> SyncResult<()> {
    let result = if entry.is_dir {
        tokio::fs::remove_dir(&entry.abs_path).await
    } else {
        tokio::fs::remove_file(&entry.abs_path).await
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SyncError::io(
            format!("failed to remove {}", entry.abs_path.display()),
            e,
        )),
    }
}
