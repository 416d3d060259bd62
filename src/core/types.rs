//! Core graph value types
//!
//! Nodes carry an optional text body and an ordered list of outgoing edges.
//! A node whose text is `None` is a tombstone: its id is tracked but it is not
//! part of the live graph.

use serde::{Deserialize, Serialize};

/// Node identifier. Id 0 is the root and always exists.
pub type NodeId = u64;

/// The root node id
pub const ROOT_ID: NodeId = 0;

/// Title used for nodes whose text has no first line
pub const BLANK_TITLE: &str = "<blank-text>";

/// A labeled outgoing link. The origin is the node that owns the edge.
///
/// On the wire and on disk an edge is the pair `[label, destination]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(String, NodeId)", into = "(String, NodeId)")]
pub struct Edge {
    /// Edge label (may be empty)
    pub label: String,
    /// Destination node id
    pub destination: NodeId,
}

impl Edge {
    /// Create a new edge
    pub fn new(label: impl Into<String>, destination: NodeId) -> Self {
        Self {
            label: label.into(),
            destination,
        }
    }
}

impl From<(String, NodeId)> for Edge {
    fn from((label, destination): (String, NodeId)) -> Self {
        Self { label, destination }
    }
}

impl From<Edge> for (String, NodeId) {
    fn from(edge: Edge) -> Self {
        (edge.label, edge.destination)
    }
}

/// An edge seen from its destination: `[origin, label, destination]`.
///
/// Ordering is by origin, then label, then destination, which is the order
/// the server keeps its reverse index in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(NodeId, String, NodeId)", into = "(NodeId, String, NodeId)")]
pub struct IncomingEdge {
    /// Node owning the edge
    pub origin: NodeId,
    /// Edge label
    pub label: String,
    /// Node the edge points at
    pub destination: NodeId,
}

impl IncomingEdge {
    /// Build the incoming view of `edge` owned by `origin`
    pub fn from_edge(origin: NodeId, edge: &Edge) -> Self {
        Self {
            origin,
            label: edge.label.clone(),
            destination: edge.destination,
        }
    }
}

impl From<(NodeId, String, NodeId)> for IncomingEdge {
    fn from((origin, label, destination): (NodeId, String, NodeId)) -> Self {
        Self {
            origin,
            label,
            destination,
        }
    }
}

impl From<IncomingEdge> for (NodeId, String, NodeId) {
    fn from(edge: IncomingEdge) -> Self {
        (edge.origin, edge.label, edge.destination)
    }
}

/// A graph vertex
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    /// Node identifier
    pub id: NodeId,
    /// Text body, `None` for a tombstone
    pub text: Option<String>,
    /// Outgoing edges in display order
    pub edges: Vec<Edge>,
}

impl Node {
    /// Create a live node
    pub fn new(id: NodeId, text: impl Into<String>, edges: Vec<Edge>) -> Self {
        Self {
            id,
            text: Some(text.into()),
            edges,
        }
    }

    /// Create a tombstone for `id`
    pub fn tombstone(id: NodeId) -> Self {
        Self {
            id,
            text: None,
            edges: Vec::new(),
        }
    }

    /// Whether the node is part of the live graph
    pub fn is_live(&self) -> bool {
        self.text.is_some()
    }

    /// First line of the text, or a placeholder for blank text
    pub fn title(&self) -> &str {
        self.text
            .as_deref()
            .and_then(|text| text.lines().next())
            .unwrap_or(BLANK_TITLE)
    }

    /// Whether text and edges match `other` (ids are not compared)
    pub fn same_content(&self, other: &Node) -> bool {
        self.text == other.text && self.edges == other.edges
    }

    /// Whether any outgoing edge points at `destination`
    pub fn links_to(&self, destination: NodeId) -> bool {
        self.edges.iter().any(|edge| edge.destination == destination)
    }

    /// Drop every outgoing edge whose destination satisfies `doomed`
    pub fn without_edges_to(&self, doomed: impl Fn(NodeId) -> bool) -> Node {
        Node {
            id: self.id,
            text: self.text.clone(),
            edges: self
                .edges
                .iter()
                .filter(|edge| !doomed(edge.destination))
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_serializes_as_pair() {
        let edge = Edge::new("next", 4);
        assert_eq!(serde_json::to_string(&edge).unwrap(), r#"["next",4]"#);
        let back: Edge = serde_json::from_str(r#"["next",4]"#).unwrap();
        assert_eq!(back, edge);
    }

    #[test]
    fn incoming_edge_serializes_as_triple() {
        let incoming = IncomingEdge::from_edge(2, &Edge::new("a", 7));
        assert_eq!(serde_json::to_string(&incoming).unwrap(), r#"[2,"a",7]"#);
    }

    #[test]
    fn title_uses_first_line_or_placeholder() {
        assert_eq!(Node::new(1, "first\nsecond", vec![]).title(), "first");
        assert_eq!(Node::new(1, "", vec![]).title(), BLANK_TITLE);
        assert_eq!(Node::tombstone(1).title(), BLANK_TITLE);
    }

    #[test]
    fn without_edges_to_keeps_order() {
        let node = Node::new(
            0,
            "root",
            vec![Edge::new("a", 1), Edge::new("b", 2), Edge::new("c", 3)],
        );
        let trimmed = node.without_edges_to(|id| id == 2);
        assert_eq!(trimmed.edges, vec![Edge::new("a", 1), Edge::new("c", 3)]);
        assert_eq!(trimmed.text.as_deref(), Some("root"));
    }
}
