//! Mutation planning.
//!
//! A plan holds the four phases of a run in execution order. Directories are
//! created shallowest first so every parent exists before its children;
//! deletions run in exactly the reverse of that order so children go before
//! their parents.

use crate::entry::{LocalEntry, RemoteEntry, SyncEntry};
use crate::reconcile::{ChangeSet, ChangedPair};
use drivesync_types::RelPath;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Which side is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Local is authoritative; the remote store is mutated.
    Push,
    /// Remote is authoritative; the local tree is mutated.
    Pull,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Push => f.write_str("push"),
            Direction::Pull => f.write_str("pull"),
        }
    }
}

/// Creation order: ascending depth, then path.
pub fn creation_cmp(a: &RelPath, b: &RelPath) -> Ordering {
    a.depth().cmp(&b.depth()).then_with(|| a.cmp(b))
}

/// Sorts entries parents-first.
pub fn sort_for_creation<E: SyncEntry>(entries: &mut [E]) {
    entries.sort_by(|a, b| creation_cmp(a.rel_path(), b.rel_path()));
}

/// Sorts entries children-first, the exact reverse of [`sort_for_creation`].
pub fn sort_for_deletion<E: SyncEntry>(entries: &mut [E]) {
    entries.sort_by(|a, b| creation_cmp(b.rel_path(), a.rel_path()));
}

/// Ordered mutations for one direction.
///
/// `C` is the authoritative entry type being materialized on the other side,
/// `D` the type of entries that may be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationPlan<C, D> {
    /// Direction the plan applies to.
    pub direction: Direction,
    /// Phase 1: directories to create, parents first.
    pub create_dirs: Vec<C>,
    /// Phase 2: files to create.
    pub create_files: Vec<C>,
    /// Phase 3: files whose content is replaced.
    pub update_files: Vec<ChangedPair>,
    /// Phase 4: entries to delete, children first. Empty unless requested.
    pub delete: Vec<D>,
}

/// Local tree mirrored onto the remote store.
pub type PushPlan = MutationPlan<LocalEntry, RemoteEntry>;

/// Remote tree mirrored onto the local filesystem.
pub type PullPlan = MutationPlan<RemoteEntry, LocalEntry>;

impl<C, D> MutationPlan<C, D> {
    /// Total number of operations.
    pub fn len(&self) -> usize {
        self.create_dirs.len() + self.create_files.len() + self.update_files.len() + self.delete.len()
    }

    /// True if the plan performs nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MutationPlan<LocalEntry, RemoteEntry> {
    /// Plans a push from a change set.
    pub fn push(changes: ChangeSet, delete_extraneous: bool) -> Self {
        let mut plan = Self {
            direction: Direction::Push,
            create_dirs: changes.missing_remote_dirs,
            create_files: changes.missing_remote_files,
            update_files: changes.changed,
            delete: if delete_extraneous {
                changes.extraneous_remote
            } else {
                Vec::new()
            },
        };
        plan.order();
        plan
    }
}

impl MutationPlan<RemoteEntry, LocalEntry> {
    /// Plans a pull from a change set.
    pub fn pull(changes: ChangeSet, delete_extraneous: bool) -> Self {
        let mut plan = Self {
            direction: Direction::Pull,
            create_dirs: changes.missing_local_dirs,
            create_files: changes.missing_local_files,
            update_files: changes.changed,
            delete: if delete_extraneous {
                changes.extraneous_local
            } else {
                Vec::new()
            },
        };
        plan.order();
        plan
    }
}

impl<C: SyncEntry, D: SyncEntry> MutationPlan<C, D> {
    fn order(&mut self) {
        sort_for_creation(&mut self.create_dirs);
        sort_for_creation(&mut self.create_files);
        self.update_files
            .sort_by(|a, b| creation_cmp(a.rel_path(), b.rel_path()));
        sort_for_deletion(&mut self.delete);
    }
}
