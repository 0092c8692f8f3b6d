//! Sync root marking and setup checks.
//!
//! A remote directory becomes a sync root the first time it is pushed to: it
//! must be empty at that point and is then tagged with [`SYNC_ROOT_PROPERTY`].
//! Every node the engine creates below it carries [`SYNC_ROOT_ID_PROPERTY`]
//! pointing back at the root, which is what the tree listing selects on.

use crate::error::{SyncError, SyncResult};
use crate::remote::{NodeField, NodeQuery, NodeUpdate, RemoteNode, RemoteStore};
use drivesync_types::NodeId;
use std::collections::BTreeMap;
use tracing::info;

/// Property marking a directory as a sync root.
pub const SYNC_ROOT_PROPERTY: &str = "syncRoot";

/// Property linking a synced node to its root.
pub const SYNC_ROOT_ID_PROPERTY: &str = "syncRootId";

/// Whether `node` carries the sync root marker.
pub fn is_sync_root(node: &RemoteNode) -> bool {
    node.is_dir && node.property(SYNC_ROOT_PROPERTY) == Some("true")
}

/// Properties set on every node created below `root_id`.
pub fn linkage_properties(root_id: &NodeId) -> BTreeMap<String, String> {
    BTreeMap::from([(SYNC_ROOT_ID_PROPERTY.to_string(), root_id.to_string())])
}

/// Fetches the root node, requiring it to exist and be a directory.
pub async fn fetch_root(store: &dyn RemoteStore, root_id: &NodeId) -> SyncResult<RemoteNode> {
    let node = store
        .get_node(root_id)
        .await?
        .ok_or_else(|| SyncError::RemoteRootNotFound(root_id.clone()))?;
    if !node.is_dir {
        return Err(SyncError::RootNotDirectory(root_id.clone()));
    }
    Ok(node)
}

/// Checks a push target. Returns true if the root still has to be marked.
pub async fn check_push_root(store: &dyn RemoteStore, root_id: &NodeId) -> SyncResult<bool> {
    let root = fetch_root(store, root_id).await?;
    if is_sync_root(&root) {
        return Ok(false);
    }

    let children = store
        .list_nodes(&NodeQuery::Children(root_id.clone()), &[NodeField::Id])
        .await?;
    if !children.is_empty() {
        return Err(SyncError::RootNotEmpty(root_id.clone()));
    }
    Ok(true)
}

/// Tags `root_id` as a sync root.
pub async fn mark_root(store: &dyn RemoteStore, root_id: &NodeId) -> SyncResult<()> {
    let update = NodeUpdate {
        properties: BTreeMap::from([(SYNC_ROOT_PROPERTY.to_string(), "true".to_string())]),
    };
    store.update_node(root_id, update, None).await?;
    info!("Marked {} as sync root", root_id);
    Ok(())
}

/// Requires `root_id` to be an existing, marked sync root.
pub async fn require_sync_root(store: &dyn RemoteStore, root_id: &NodeId) -> SyncResult<RemoteNode> {
    let root = fetch_root(store, root_id).await?;
    if !is_sync_root(&root) {
        return Err(SyncError::NotSyncRoot(root_id.clone()));
    }
    Ok(root)
}
