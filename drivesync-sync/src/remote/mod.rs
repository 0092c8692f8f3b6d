//! Remote side of the sync: the store abstraction, its implementations and
//! the tree collector that turns a flat node listing into relative paths.

pub mod collector;
pub mod drive;
pub mod memory;
pub mod store;

pub use drive::{DriveConfig, DriveStore};
pub use memory::{MemoryStore, StoreCall};
pub use store::{ByteStream, NewNode, NodeField, NodeQuery, NodeUpdate, RemoteNode, RemoteStore};
