//! Remote tree collector.
//!
//! The remote store is flat: hierarchy exists only as parent links. The
//! collector lists every node linked to a sync root, rejects listings that
//! are not a tree, and rebuilds each node's relative path by walking its
//! ancestor chain up to the root.

use super::store::{NodeField, NodeQuery, RemoteNode, RemoteStore};
use crate::entry::RemoteEntry;
use crate::error::{SyncError, SyncResult};
use crate::root::SYNC_ROOT_ID_PROPERTY;
use drivesync_types::{NodeId, RelPath};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Lists and places every node below `root_id`, sorted by relative path.
pub async fn collect(store: &dyn RemoteStore, root_id: &NodeId) -> SyncResult<Vec<RemoteEntry>> {
    let query = NodeQuery::Property {
        key: SYNC_ROOT_ID_PROPERTY.to_string(),
        value: root_id.to_string(),
    };
    let nodes = store.list_nodes(&query, NodeField::TREE).await?;
    debug!("Listed {} remote nodes under root {}", nodes.len(), root_id);
    build_tree(root_id, nodes)
}

/// Validates a flat listing and assigns relative paths.
///
/// Fails before any path is built if a node does not have exactly one
/// parent, has an unusable name, or shares its (name, parent) pair with
/// another node.
pub fn build_tree(root_id: &NodeId, nodes: Vec<RemoteNode>) -> SyncResult<Vec<RemoteEntry>> {
    let nodes: Vec<RemoteNode> = nodes.into_iter().filter(|n| &n.id != root_id).collect();
    validate(&nodes)?;

    let by_id: HashMap<&NodeId, &RemoteNode> = nodes.iter().map(|n| (&n.id, n)).collect();
    let mut resolved: HashMap<NodeId, RelPath> = HashMap::with_capacity(nodes.len() + 1);
    resolved.insert(root_id.clone(), RelPath::root());

    let mut paths = Vec::with_capacity(nodes.len());
    for node in &nodes {
        paths.push(resolve_path(node, &by_id, &mut resolved)?);
    }

    let mut entries: Vec<RemoteEntry> = nodes
        .into_iter()
        .zip(paths)
        .map(|(node, rel_path)| RemoteEntry { rel_path, node })
        .collect();
    entries.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(entries)
}

fn validate(nodes: &[RemoteNode]) -> SyncResult<()> {
    let mut seen: HashSet<(&NodeId, &str)> = HashSet::with_capacity(nodes.len());
    for node in nodes {
        if node.parents.len() != 1 {
            return Err(SyncError::ParentCount {
                id: node.id.clone(),
                name: node.name.clone(),
                count: node.parents.len(),
            });
        }
        if !RelPath::is_valid_component(&node.name) {
            return Err(SyncError::InvalidName {
                id: node.id.clone(),
                name: node.name.clone(),
            });
        }
        if !seen.insert((&node.parents[0], node.name.as_str())) {
            return Err(SyncError::DuplicateName {
                name: node.name.clone(),
                parent: node.parents[0].clone(),
            });
        }
    }
    Ok(())
}

/// Walks up from `start` until a node with a known path, then assigns
/// paths back down the chain. Each node is resolved once overall.
fn resolve_path<'a>(
    start: &'a RemoteNode,
    by_id: &HashMap<&'a NodeId, &'a RemoteNode>,
    resolved: &mut HashMap<NodeId, RelPath>,
) -> SyncResult<RelPath> {
    let mut chain: Vec<&RemoteNode> = Vec::new();
    let mut on_chain: HashSet<&NodeId> = HashSet::new();
    let mut current = start;

    let base = loop {
        if let Some(path) = resolved.get(&current.id) {
            break path.clone();
        }
        if !on_chain.insert(&current.id) {
            return Err(SyncError::ParentCycle(current.id.clone()));
        }
        chain.push(current);

        // validate() guarantees exactly one parent.
        let parent = &current.parents[0];
        if let Some(path) = resolved.get(parent) {
            break path.clone();
        }
        current = by_id
            .get(parent)
            .copied()
            .ok_or_else(|| SyncError::OrphanNode {
                id: current.id.clone(),
                parent: parent.clone(),
            })?;
    };

    let mut path = base;
    for node in chain.iter().rev() {
        path = path.join(&node.name).map_err(|_| SyncError::InvalidName {
            id: node.id.clone(),
            name: node.name.clone(),
        })?;
        resolved.insert(node.id.clone(), path.clone());
    }
    Ok(path)
}
