//! Structural graph operations
//!
//! Every mutation here goes through stage + apply, so each call is a single
//! transaction and a single undo reverts it. Traversals are iterative with an
//! explicit visited set, so deep chains and cycles are safe.

use crate::core::error::{GraphError, Result};
use crate::core::types::{Edge, Node, NodeId, ROOT_ID};
use crate::storage::{NodeBackend, TextGraph};
use crate::{log_debug, log_info};
use std::collections::{BTreeSet, HashSet, VecDeque};

impl<B: NodeBackend> TextGraph<B> {
    /// Delete `id` and strip every edge that pointed at it, as one transaction.
    pub fn delete_node(&mut self, id: NodeId) -> Result<()> {
        if id == ROOT_ID {
            return Err(GraphError::RootNodeProtected.into());
        }
        self.require_node(id)?;

        let mut origins = BTreeSet::new();
        for incoming in self.incoming_edges(id)? {
            if incoming.origin != id {
                origins.insert(incoming.origin);
            }
        }
        for origin in origins {
            if let Some(node) = self.node(origin)? {
                self.stage(&node.without_edges_to(|dest| dest == id));
            }
        }
        self.stage(&Node::tombstone(id));
        self.apply()?;
        log_info!("Deleted node {}", id);
        Ok(())
    }

    /// Every id reachable from `id` along outgoing edges, `id` included.
    ///
    /// Destinations that do not exist are still reported; they are simply not
    /// expanded further.
    pub fn reachable_set(&self, id: NodeId) -> Result<BTreeSet<NodeId>> {
        self.require_node(id)?;

        let mut visited = BTreeSet::new();
        let mut stack = vec![id];
        visited.insert(id);

        while let Some(current) = stack.pop() {
            let Some(node) = self.node(current)? else {
                continue;
            };
            for edge in &node.edges {
                if visited.insert(edge.destination) {
                    stack.push(edge.destination);
                }
            }
        }

        log_debug!("Node {} reaches {} ids", id, visited.len());
        Ok(visited)
    }

    /// Delete `id` and everything reachable from it, as one transaction.
    ///
    /// Reachability is computed once up front: a node reachable from `id` is
    /// removed even if some surviving node also links to it. The root is never
    /// removed, even when reachable.
    pub fn delete_subtree(&mut self, id: NodeId) -> Result<BTreeSet<NodeId>> {
        if id == ROOT_ID {
            return Err(GraphError::RootNodeProtected.into());
        }
        let mut doomed = self.reachable_set(id)?;
        doomed.remove(&ROOT_ID);

        for node in self.live_nodes()? {
            if doomed.contains(&node.id) {
                continue;
            }
            if node.edges.iter().any(|edge| doomed.contains(&edge.destination)) {
                self.stage(&node.without_edges_to(|dest| doomed.contains(&dest)));
            }
        }
        for &doomed_id in &doomed {
            self.stage(&Node::tombstone(doomed_id));
        }
        self.apply()?;
        log_info!("Deleted subtree of node {} ({} ids)", id, doomed.len());
        Ok(doomed)
    }

    /// Live nodes within `levels` rounds of breadth-first expansion from
    /// `center`, following both outgoing and incoming edges.
    ///
    /// One round yields just the center; each further round adds the next ring.
    /// The returned copies are sorted by id and keep only edges whose
    /// destination is also in the result.
    pub fn neighborhood(&self, center: NodeId, levels: usize) -> Result<Vec<Node>> {
        let center_node = self.require_node(center)?;
        if !center_node.is_live() || levels == 0 {
            return Ok(Vec::new());
        }

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut collected: Vec<Node> = Vec::new();
        let mut frontier: VecDeque<(Node, usize)> = VecDeque::new();
        visited.insert(center);
        frontier.push_back((center_node, 1));

        while let Some((node, depth)) = frontier.pop_front() {
            if depth < levels {
                let outgoing = node.edges.iter().map(|edge| edge.destination);
                let incoming = self
                    .incoming_edges(node.id)?
                    .into_iter()
                    .map(|edge| edge.origin);
                for neighbor in outgoing.chain(incoming) {
                    if !visited.insert(neighbor) {
                        continue;
                    }
                    if let Some(next) = self.node(neighbor)?.filter(Node::is_live) {
                        frontier.push_back((next, depth + 1));
                    }
                }
            }
            collected.push(node);
        }

        let ids: HashSet<NodeId> = collected.iter().map(|node| node.id).collect();
        let mut nodes: Vec<Node> = collected
            .into_iter()
            .map(|node| node.without_edges_to(|dest| !ids.contains(&dest)))
            .collect();
        nodes.sort_by_key(|node| node.id);
        Ok(nodes)
    }

    /// Create an empty node linked from `from` under `label`, as one
    /// transaction. Returns the new id.
    pub fn new_linked_node(&mut self, from: NodeId, label: &str) -> Result<NodeId> {
        let mut origin = self
            .node(from)?
            .filter(Node::is_live)
            .ok_or(GraphError::NodeNotFound { id: from })?;
        let id = self.allocate()?;
        origin.edges.push(Edge::new(label, id));
        self.stage(&Node::new(id, "", Vec::new()));
        self.stage(&origin);
        self.apply()?;
        Ok(id)
    }
}
