//! Core type definitions for drivesync.
//!
//! This crate defines the identifiers shared by the sync engine and its
//! collaborators:
//! - Remote node identifiers (opaque strings, UUID v7 when generated locally)
//! - Relative paths, the only key used to match local and remote entries

mod ids;
mod path;

pub use ids::NodeId;
pub use path::RelPath;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid path component {component:?} in {path:?}")]
    InvalidComponent { path: String, component: String },

    #[error("empty node id")]
    EmptyNodeId,
}
