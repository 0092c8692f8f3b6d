//! In-memory remote store.
//!
//! Behaves like a flat node store and records every call it receives, so
//! tests can assert on exactly which mutations a run issued and in what
//! order. Nodes can also be seeded directly, including shapes a real store
//! would never produce through the engine (several parents, duplicates).

use super::store::{
    ByteStream, NewNode, NodeField, NodeQuery, NodeUpdate, RemoteNode, RemoteStore,
};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use drivesync_types::NodeId;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;

const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// A call received by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Get(NodeId),
    List(NodeQuery),
    CreateDir { parent: NodeId, name: String },
    CreateFile { parent: NodeId, name: String },
    Update(NodeId),
    Download(NodeId),
    Delete(NodeId),
}

impl StoreCall {
    /// Whether the call changes the store.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            StoreCall::CreateDir { .. }
                | StoreCall::CreateFile { .. }
                | StoreCall::Update(_)
                | StoreCall::Delete(_)
        )
    }
}

#[derive(Debug, Clone)]
struct StoredNode {
    node: RemoteNode,
    content: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<NodeId, StoredNode>,
    calls: Vec<StoreCall>,
    failing_names: HashSet<String>,
}

impl State {
    fn fail_if_injected(&self, name: &str) -> SyncResult<()> {
        if self.failing_names.contains(name) {
            return Err(SyncError::Api {
                status: 500,
                message: format!("injected failure for {name:?}"),
            });
        }
        Ok(())
    }
}

/// In-memory [`RemoteStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a top-level directory (no parent) and returns its id.
    pub async fn create_root(&self, name: &str) -> NodeId {
        let id = NodeId::generate();
        let node = RemoteNode {
            id: id.clone(),
            name: name.to_string(),
            parents: Vec::new(),
            checksum: None,
            is_dir: true,
            size: 0,
            modified_at: Some(Utc::now()),
            properties: BTreeMap::new(),
        };
        self.insert_node(node, Vec::new()).await;
        id
    }

    /// Seeds a node as-is. The checksum is recomputed for files.
    pub async fn insert_node(&self, mut node: RemoteNode, content: Vec<u8>) {
        if !node.is_dir {
            node.checksum = Some(checksum(&content));
            node.size = content.len() as u64;
        }
        let mut state = self.state.lock().await;
        state
            .nodes
            .insert(node.id.clone(), StoredNode { node, content });
    }

    /// Current state of a node.
    pub async fn node(&self, id: &NodeId) -> Option<RemoteNode> {
        self.state.lock().await.nodes.get(id).map(|n| n.node.clone())
    }

    /// Current content of a file node.
    pub async fn content(&self, id: &NodeId) -> Option<Vec<u8>> {
        self.state.lock().await.nodes.get(id).map(|n| n.content.clone())
    }

    /// All nodes, in id order.
    pub async fn nodes(&self) -> Vec<RemoteNode> {
        self.state
            .lock()
            .await
            .nodes
            .values()
            .map(|n| n.node.clone())
            .collect()
    }

    /// Every call received so far.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().await.calls.clone()
    }

    /// Only the calls that changed the store.
    pub async fn mutations(&self) -> Vec<StoreCall> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    /// Forgets the recorded calls.
    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Makes every create or update of a node called `name` fail.
    pub async fn fail_on_name(&self, name: &str) {
        self.state.lock().await.failing_names.insert(name.to_string());
    }

    async fn collect(content: ByteStream) -> SyncResult<Vec<u8>> {
        let mut content = content;
        let mut buf = Vec::new();
        while let Some(chunk) = content.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf)
    }
}

fn checksum(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn provider_name(&self) -> &'static str {
        "Memory"
    }

    async fn get_node(&self, id: &NodeId) -> SyncResult<Option<RemoteNode>> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Get(id.clone()));
        Ok(state.nodes.get(id).map(|n| n.node.clone()))
    }

    async fn list_nodes(
        &self,
        query: &NodeQuery,
        _fields: &[NodeField],
    ) -> SyncResult<Vec<RemoteNode>> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::List(query.clone()));
        let matches = state
            .nodes
            .values()
            .filter(|stored| match query {
                NodeQuery::Property { key, value } => {
                    stored.node.property(key) == Some(value.as_str())
                }
                NodeQuery::Children(parent) => stored.node.parents.contains(parent),
            })
            .map(|stored| stored.node.clone())
            .collect();
        Ok(matches)
    }

    async fn create_node(
        &self,
        node: NewNode,
        content: Option<ByteStream>,
    ) -> SyncResult<RemoteNode> {
        {
            let mut state = self.state.lock().await;
            state.calls.push(if node.is_dir {
                StoreCall::CreateDir {
                    parent: node.parent.clone(),
                    name: node.name.clone(),
                }
            } else {
                StoreCall::CreateFile {
                    parent: node.parent.clone(),
                    name: node.name.clone(),
                }
            });
            state.fail_if_injected(&node.name)?;
            match state.nodes.get(&node.parent) {
                Some(parent) if parent.node.is_dir => {}
                _ => {
                    return Err(SyncError::Api {
                        status: 404,
                        message: format!("parent {} not found", node.parent),
                    });
                }
            }
        }

        let bytes = match content {
            Some(content) => Self::collect(content).await?,
            None => Vec::new(),
        };

        let created = RemoteNode {
            id: NodeId::generate(),
            name: node.name,
            parents: vec![node.parent],
            checksum: (!node.is_dir).then(|| checksum(&bytes)),
            is_dir: node.is_dir,
            size: bytes.len() as u64,
            modified_at: Some(Utc::now()),
            properties: node.properties,
        };
        let mut state = self.state.lock().await;
        state.nodes.insert(
            created.id.clone(),
            StoredNode {
                node: created.clone(),
                content: bytes,
            },
        );
        Ok(created)
    }

    async fn update_node(
        &self,
        id: &NodeId,
        update: NodeUpdate,
        content: Option<ByteStream>,
    ) -> SyncResult<RemoteNode> {
        {
            let mut state = self.state.lock().await;
            state.calls.push(StoreCall::Update(id.clone()));
            let name = match state.nodes.get(id) {
                Some(stored) => stored.node.name.clone(),
                None => {
                    return Err(SyncError::Api {
                        status: 404,
                        message: format!("node {id} not found"),
                    });
                }
            };
            state.fail_if_injected(&name)?;
        }

        let bytes = match content {
            Some(content) => Some(Self::collect(content).await?),
            None => None,
        };

        let mut state = self.state.lock().await;
        let stored = state.nodes.get_mut(id).ok_or_else(|| SyncError::Api {
            status: 404,
            message: format!("node {id} not found"),
        })?;
        stored.node.properties.extend(update.properties);
        if let Some(bytes) = bytes {
            stored.node.checksum = Some(checksum(&bytes));
            stored.node.size = bytes.len() as u64;
            stored.content = bytes;
        }
        stored.node.modified_at = Some(Utc::now());
        Ok(stored.node.clone())
    }

    async fn download(&self, id: &NodeId) -> SyncResult<ByteStream> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Download(id.clone()));
        let stored = state.nodes.get(id).ok_or_else(|| SyncError::Api {
            status: 404,
            message: format!("node {id} not found"),
        })?;
        let chunks: Vec<SyncResult<Bytes>> = stored
            .content
            .chunks(DOWNLOAD_CHUNK_SIZE)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn delete_node(&self, id: &NodeId) -> SyncResult<()> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Delete(id.clone()));
        state.nodes.remove(id);
        Ok(())
    }
}
