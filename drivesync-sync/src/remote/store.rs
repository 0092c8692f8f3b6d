//! Remote store abstraction trait.
//!
//! The remote side is a flat node store: every node has an id, a name, a set
//! of parent ids and a property bag. Hierarchy only exists through the parent
//! links.

use crate::error::SyncResult;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use drivesync_types::NodeId;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Chunked file content flowing to or from a store.
pub type ByteStream = BoxStream<'static, SyncResult<Bytes>>;

/// A node as reported by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    /// The node's unique identifier.
    pub id: NodeId,
    /// The node's name (one path component).
    pub name: String,
    /// Parent node ids. Exactly one inside a valid sync tree.
    pub parents: Vec<NodeId>,
    /// Lowercase hex SHA-256 of the content, if the store reports one.
    pub checksum: Option<String>,
    /// Whether the node is a directory.
    pub is_dir: bool,
    /// Content size in bytes (0 for directories).
    pub size: u64,
    /// Last modification time, if reported.
    pub modified_at: Option<DateTime<Utc>>,
    /// String-keyed application properties.
    pub properties: BTreeMap<String, String>,
}

impl RemoteNode {
    /// Returns the property value for `key`, if set.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Metadata for a node to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    /// Name of the new node.
    pub name: String,
    /// Parent directory.
    pub parent: NodeId,
    /// Whether to create a directory.
    pub is_dir: bool,
    /// Properties to set on creation.
    pub properties: BTreeMap<String, String>,
}

/// Metadata changes for an existing node. Empty means content-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeUpdate {
    /// Properties to add or overwrite.
    pub properties: BTreeMap<String, String>,
}

impl NodeUpdate {
    /// Whether the update carries no metadata change.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Predicate for a node listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeQuery {
    /// Nodes whose property `key` equals `value`.
    Property { key: String, value: String },
    /// Direct children of a directory.
    Children(NodeId),
}

/// Node fields a listing asks the store to populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeField {
    Id,
    Name,
    Parents,
    Checksum,
    Kind,
    Size,
    ModifiedAt,
    Properties,
}

impl NodeField {
    /// Fields the tree collector needs.
    pub const TREE: &'static [NodeField] = &[
        NodeField::Id,
        NodeField::Name,
        NodeField::Parents,
        NodeField::Checksum,
        NodeField::Kind,
        NodeField::Size,
        NodeField::ModifiedAt,
    ];

    /// Every field.
    pub const ALL: &'static [NodeField] = &[
        NodeField::Id,
        NodeField::Name,
        NodeField::Parents,
        NodeField::Checksum,
        NodeField::Kind,
        NodeField::Size,
        NodeField::ModifiedAt,
        NodeField::Properties,
    ];
}

/// Abstract remote store interface.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns the name of the store provider.
    fn provider_name(&self) -> &'static str;

    /// Fetches a single node. `Ok(None)` if it does not exist.
    async fn get_node(&self, id: &NodeId) -> SyncResult<Option<RemoteNode>>;

    /// Lists every node matching `query`, following pagination.
    async fn list_nodes(&self, query: &NodeQuery, fields: &[NodeField])
    -> SyncResult<Vec<RemoteNode>>;

    /// Creates a node, optionally with content.
    async fn create_node(&self, node: NewNode, content: Option<ByteStream>)
    -> SyncResult<RemoteNode>;

    /// Updates a node's metadata and/or replaces its content.
    async fn update_node(
        &self,
        id: &NodeId,
        update: NodeUpdate,
        content: Option<ByteStream>,
    ) -> SyncResult<RemoteNode>;

    /// Streams a file node's content.
    async fn download(&self, id: &NodeId) -> SyncResult<ByteStream>;

    /// Deletes a node. Deleting a missing node is not an error.
    async fn delete_node(&self, id: &NodeId) -> SyncResult<()>;
}
