//! In-memory node table.
//!
//! Nodes live in a `BTreeMap` keyed by id so listings and saves come out in id
//! order without extra sorting. Two allocation policies exist:
//!
//! - `Monotonic`: ids are handed out strictly increasing and never reused
//!   (id-tagged files, where ids are stable across edits).
//! - `Recycle`: tombstoned ids go on a free list and are handed out again,
//!   but never while a live edge still targets them (positional files, where
//!   the id is the line number and holes waste lines).
//!
//! Incoming edges are answered by a live scan, which is always exact.

use crate::core::error::{Error, GraphError, Result, READ_ONLY};
use crate::core::types::{IncomingEdge, Node, NodeId, ROOT_ID};
use crate::storage::NodeBackend;
use crate::{log_debug, log_trace};
use std::collections::BTreeMap;

/// How fresh ids are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPolicy {
    /// Strictly increasing, never reused
    Monotonic,
    /// Reuse unreferenced tombstoned ids first
    Recycle,
}

/// Node table owned by a single store
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    nodes: BTreeMap<NodeId, Node>,
    next_id: NodeId,
    free: Vec<NodeId>,
    policy: IdPolicy,
    read_only: bool,
}

impl MemoryBackend {
    /// Create a table holding only the empty root node
    pub fn new(policy: IdPolicy) -> Self {
        Self::from_nodes(Vec::new(), policy, false)
    }

    /// Build a table from decoded records. The root is added if missing and
    /// tombstoned records seed the free list under [`IdPolicy::Recycle`].
    pub fn from_nodes(nodes: Vec<Node>, policy: IdPolicy, read_only: bool) -> Self {
        let mut table: BTreeMap<NodeId, Node> =
            nodes.into_iter().map(|node| (node.id, node)).collect();
        table
            .entry(ROOT_ID)
            .or_insert_with(|| Node::new(ROOT_ID, "", Vec::new()));

        let next_id = table.keys().next_back().map_or(1, |id| id.saturating_add(1));
        let free = match policy {
            IdPolicy::Monotonic => Vec::new(),
            IdPolicy::Recycle => table
                .values()
                .filter(|node| !node.is_live() && node.id != ROOT_ID)
                .map(|node| node.id)
                .collect(),
        };

        Self {
            nodes: table,
            next_id,
            free,
            policy,
            read_only,
        }
    }

    /// Allocation policy in use
    pub fn policy(&self) -> IdPolicy {
        self.policy
    }

    /// Number of stored entries, placeholders included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the table is empty (never true in practice: the root exists)
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn is_targeted(&self, id: NodeId) -> bool {
        self.nodes
            .values()
            .any(|node| node.is_live() && node.links_to(id))
    }

    fn take_free_id(&mut self) -> Option<NodeId> {
        let position = self.free.iter().rposition(|&id| {
            !self.nodes.get(&id).is_some_and(Node::is_live) && !self.is_targeted(id)
        })?;
        Some(self.free.remove(position))
    }

    fn put(&mut self, node: &Node) {
        self.free.retain(|&id| id != node.id);
        self.next_id = self.next_id.max(node.id.saturating_add(1));
        self.nodes.insert(node.id, node.clone());
    }

    fn remove(&mut self, id: NodeId) {
        self.nodes.remove(&id);
        if self.policy == IdPolicy::Recycle && id != ROOT_ID && !self.free.contains(&id) {
            self.free.push(id);
        }
    }
}

impl NodeBackend for MemoryBackend {
    fn get(&self, id: NodeId) -> Result<Option<Node>> {
        Ok(self.nodes.get(&id).cloned())
    }

    fn entries(&self) -> Result<Vec<Node>> {
        Ok(self.nodes.values().cloned().collect())
    }

    fn live_ids(&self) -> Result<Vec<NodeId>> {
        Ok(self
            .nodes
            .values()
            .filter(|node| node.is_live())
            .map(|node| node.id)
            .collect())
    }

    fn incoming_edges(&self, id: NodeId) -> Result<Vec<IncomingEdge>> {
        Ok(self
            .nodes
            .values()
            .filter(|node| node.is_live())
            .flat_map(|node| {
                node.edges
                    .iter()
                    .filter(move |edge| edge.destination == id)
                    .map(move |edge| IncomingEdge::from_edge(node.id, edge))
            })
            .collect())
    }

    fn allocate(&mut self) -> Result<NodeId> {
        if self.read_only {
            return Err(Error::permission(READ_ONLY));
        }
        let recycled = match self.policy {
            IdPolicy::Recycle => self.take_free_id(),
            IdPolicy::Monotonic => None,
        };
        let id = match recycled {
            Some(id) => {
                log_trace!("Recycling node id {}", id);
                id
            }
            None => {
                let id = self.next_id;
                if self.nodes.contains_key(&id) {
                    return Err(GraphError::IdSpaceExhausted.into());
                }
                self.next_id = id.saturating_add(1);
                id
            }
        };
        self.nodes.insert(id, Node::tombstone(id));
        log_debug!("Allocated node {}", id);
        Ok(id)
    }

    fn commit(&mut self, nodes: &[Node]) -> Result<()> {
        if self.read_only {
            return Err(Error::permission(READ_ONLY));
        }
        for node in nodes {
            if node.is_live() {
                self.put(node);
            } else {
                self.remove(node.id);
            }
        }
        Ok(())
    }

    fn reserve(&mut self, id: NodeId) -> Result<()> {
        if self.read_only {
            return Err(Error::permission(READ_ONLY));
        }
        if !self.nodes.contains_key(&id) {
            self.free.retain(|&free| free != id);
            self.next_id = self.next_id.max(id.saturating_add(1));
            self.nodes.insert(id, Node::tombstone(id));
        }
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}
