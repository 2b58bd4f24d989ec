//! Immutable point-in-time snapshots of the watched tree.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::error::{Result, WatcherError};
use crate::node::{Node, NodeId};

/// One snapshot: a mapping from [`NodeId`] to [`Node`].
///
/// An `Index` never changes after construction. `with_node` and `merge`
/// return a new index, and cloning only bumps a reference count, so events
/// can hand the same snapshot to many listeners at once.
#[derive(Debug, Clone)]
pub struct Index {
    nodes: Arc<IndexMap<NodeId, Node>>,
    indexed_at: DateTime<Utc>,
}

impl Index {
    /// An index with no nodes.
    pub fn empty() -> Self {
        Self::from_map(IndexMap::new())
    }

    pub(crate) fn from_map(nodes: IndexMap<NodeId, Node>) -> Self {
        Self {
            nodes: Arc::new(nodes),
            indexed_at: Utc::now(),
        }
    }

    /// Return a new index that also holds `node`, replacing any node with
    /// the same id.
    pub fn with_node(&self, node: Node) -> Self {
        let mut nodes = IndexMap::clone(&self.nodes);
        nodes.insert(node.id.clone(), node);
        Self::from_map(nodes)
    }

    /// Return a new index holding the nodes of both; on id collisions the
    /// node from `other` wins.
    pub fn merge(&self, other: &Index) -> Self {
        let mut nodes = IndexMap::clone(&self.nodes);
        nodes.extend(
            other
                .nodes
                .iter()
                .map(|(id, node)| (id.clone(), node.clone())),
        );
        Self::from_map(nodes)
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Resolve `id`, failing with [`WatcherError::NodeNotFound`] when the
    /// snapshot does not hold it.
    pub fn node(&self, id: &NodeId) -> Result<&Node> {
        self.get(id)
            .ok_or_else(|| WatcherError::NodeNotFound(id.clone()))
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&NodeId, &Node)> {
        self.nodes.iter()
    }

    /// When this snapshot was assembled.
    pub fn indexed_at(&self) -> DateTime<Utc> {
        self.indexed_at
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::empty()
    }
}

/// Two indexes are equal when they hold the same id→node mapping.
impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.nodes, &other.nodes) || *self.nodes == *other.nodes
    }
}

impl Eq for Index {}

impl FromIterator<Node> for Index {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|node| (node.id.clone(), node))
                .collect(),
        )
    }
}
