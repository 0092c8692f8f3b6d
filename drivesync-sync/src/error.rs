//! Error types for the sync layer.

use drivesync_types::NodeId;
use std::time::Duration;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    // ── Setup ────────────────────────────────────────────────────
    /// The remote sync root does not exist.
    #[error("remote root not found: {0}")]
    RemoteRootNotFound(NodeId),

    /// The remote sync root is a file.
    #[error("remote root {0} is not a directory")]
    RootNotDirectory(NodeId),

    /// A root used for the first time must be empty.
    #[error("remote root {0} is not empty; the first sync requires an empty directory")]
    RootNotEmpty(NodeId),

    /// The remote directory has never been pushed to.
    #[error("remote directory {0} is not a sync root")]
    NotSyncRoot(NodeId),

    /// The local root is missing or not a directory.
    #[error("invalid local root {path}: {reason}")]
    LocalRootInvalid { path: String, reason: String },

    /// The remote store has no usable credentials.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Options rejected at the boundary.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    // ── Consistency ──────────────────────────────────────────────
    /// A remote node has zero or several parents.
    #[error("remote node {id} ({name:?}) has {count} parents, expected exactly one")]
    ParentCount { id: NodeId, name: String, count: usize },

    /// Two remote nodes share a name under the same parent.
    #[error("duplicate remote name {name:?} under parent {parent}")]
    DuplicateName { name: String, parent: NodeId },

    /// A remote name cannot be used as a path component.
    #[error("remote node {id} has unusable name {name:?}")]
    InvalidName { id: NodeId, name: String },

    /// A remote node's parent is outside the sync tree.
    #[error("remote node {id} has parent {parent} outside the sync tree")]
    OrphanNode { id: NodeId, parent: NodeId },

    /// Following parents from a node loops back on itself.
    #[error("remote node {0} is part of a parent cycle")]
    ParentCycle(NodeId),

    /// A creation could not find its already-materialized parent.
    #[error("parent directory of {0} was never materialized")]
    UnresolvedParent(String),

    /// The same relative path is a directory on one side and a file on the other.
    #[error("{path} is a {local} locally but a {remote} remotely")]
    KindMismatch {
        path: String,
        local: &'static str,
        remote: &'static str,
    },

    /// A local name that cannot be represented remotely.
    #[error("local name is not valid UTF-8: {0}")]
    UnrepresentableName(String),

    // ── Transient ────────────────────────────────────────────────
    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// The remote API rejected a request.
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Filesystem error.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Interruption ─────────────────────────────────────────────
    /// The caller cancelled the run.
    #[error("operation cancelled")]
    Cancelled,

    /// A transfer made no progress within the idle window.
    #[error("transfer stalled for {0:?}")]
    IdleTimeout(Duration),

    /// A failed step of the mutation plan.
    #[error("{op} {target} failed: {source}")]
    Operation {
        op: &'static str,
        target: String,
        #[source]
        source: Box<SyncError>,
    },
}

impl SyncError {
    /// Builds an I/O error with a short description of what was attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Wraps an error with the operation and target that produced it.
    pub fn during(self, op: &'static str, target: impl Into<String>) -> Self {
        Self::Operation {
            op,
            target: target.into(),
            source: Box::new(self),
        }
    }

    /// Strips `Operation` wrappers.
    pub fn root_cause(&self) -> &SyncError {
        match self {
            Self::Operation { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Errors raised before any mutation because the roots are unusable.
    pub fn is_setup(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::RemoteRootNotFound(_)
                | Self::RootNotDirectory(_)
                | Self::RootNotEmpty(_)
                | Self::NotSyncRoot(_)
                | Self::LocalRootInvalid { .. }
                | Self::Auth(_)
                | Self::InvalidOptions(_)
        )
    }

    /// Errors caused by an inconsistent tree on either side.
    pub fn is_consistency(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::ParentCount { .. }
                | Self::DuplicateName { .. }
                | Self::InvalidName { .. }
                | Self::OrphanNode { .. }
                | Self::ParentCycle(_)
                | Self::UnresolvedParent(_)
                | Self::KindMismatch { .. }
                | Self::UnrepresentableName(_)
        )
    }

    /// Cancellation or an idle timeout.
    pub fn is_interrupted(&self) -> bool {
        matches!(self.root_cause(), Self::Cancelled | Self::IdleTimeout(_))
    }
}
