//! One-way tree synchronization between a local directory and a remote
//! node store.
//!
//! # Architecture
//!
//! The remote side is a flat store of nodes linked by parent ids (Google
//! Drive being the production store). A run reduces both sides to lists of
//! entries keyed by relative path and mirrors the source onto the target.
//!
//! ## Components
//!
//! - **Local**: Walks the local root into [`LocalEntry`] values
//! - **Remote**: The [`RemoteStore`] trait, its Drive and in-memory
//!   implementations, and the collector that resolves node paths
//! - **Reconcile**: Partitions both trees into a [`ChangeSet`]
//! - **Plan**: Orders the changes parents-first for creation and
//!   children-first for deletion
//! - **Executor**: Applies the plan, fails fast and narrates progress
//! - **Engine**: Orchestrates the run
//!
//! ## Sync Process
//!
//! 1. **Setup**: Check that both roots are usable
//! 2. **Collect**: Gather local and remote trees concurrently
//! 3. **Reconcile**: Match entries by relative path
//! 4. **Plan**: Order creations, updates and deletions
//! 5. **Execute**: Apply mutations one at a time
//!
//! # Example
//!
//! ```
//! use drivesync_sync::{MemoryStore, MemorySink, SyncEngine};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let engine = SyncEngine::new(store, Arc::new(MemorySink::new()));
//! assert_eq!(engine.provider_name(), "Memory");
//! ```

mod engine;
pub mod entry;
mod error;
pub mod executor;
pub mod local;
mod options;
pub mod plan;
pub mod progress;
pub mod reconcile;
pub mod remote;
pub mod root;
pub mod transfer;

pub use engine::SyncEngine;
pub use entry::{LocalEntry, RemoteEntry, SyncEntry};
pub use error::{SyncError, SyncResult};
pub use executor::{SyncReport, TreeMirror};
pub use options::{MAX_CHUNK_SIZE, PullOptions, PushOptions, TransferConfig};
pub use plan::{Direction, MutationPlan, PullPlan, PushPlan};
pub use progress::{MemorySink, ProgressSink, TracingSink, WriterSink};
pub use reconcile::{ChangeSet, ChangedPair, ChecksumComparer, Comparer, SizeComparer};
pub use remote::{
    ByteStream, DriveConfig, DriveStore, MemoryStore, NewNode, NodeField, NodeQuery, NodeUpdate,
    RemoteNode, RemoteStore, StoreCall,
};
pub use root::{SYNC_ROOT_ID_PROPERTY, SYNC_ROOT_PROPERTY};
