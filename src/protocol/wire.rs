//! Wire messages of the graph protocol
//!
//! One request line is a JSON array of operations; the server answers with
//! exactly two lines: the resulting nodes and a parallel list of statuses.
//!
//! ```text
//! -> [[1], [2, "text", [["label", 1]]], [3, null], [null, "new"]]
//! <- [[1, "one", [], [[2, "label", 1]]], [2, "text", [["label", 1]], []], ...]
//! <- [null, null, "Square does not exist.", null]
//! ```

use crate::core::error::{Error, OpFailure, OpStatus, Result};
use crate::core::types::{Edge, IncomingEdge, Node, NodeId};
use crate::storage::codec::to_json_line;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Name used for request lines in parse errors
pub(crate) const REQUEST_INPUT: &str = "request";

/// A single operation inside a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// `[id]`
    Query(NodeId),
    /// `[id, text]` or `[id, text, edges]`; omitted edges keep the current ones
    Upsert {
        /// Target id
        id: NodeId,
        /// New text
        text: String,
        /// New edges, if given
        edges: Option<Vec<Edge>>,
    },
    /// `[id, null]`
    Delete(NodeId),
    /// `[null]`, `[null, text]` or `[null, text, edges]`
    Allocate {
        /// Text of the created node; `None` reserves a placeholder
        text: Option<String>,
        /// Edges of the created node
        edges: Vec<Edge>,
    },
}

impl Operation {
    /// Id the operation names explicitly
    pub fn id(&self) -> Option<NodeId> {
        match self {
            Operation::Query(id) | Operation::Delete(id) => Some(*id),
            Operation::Upsert { id, .. } => Some(*id),
            Operation::Allocate { .. } => None,
        }
    }

    /// Whether the operation writes to the graph
    pub fn is_write(&self) -> bool {
        !matches!(self, Operation::Query(_))
    }

    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        let items = value
            .as_array()
            .ok_or_else(|| format!("operation must be an array, got {}", value))?;
        if items.is_empty() || items.len() > 3 {
            return Err(format!("operation must have 1 to 3 elements, got {}", items.len()));
        }

        let text = match items.get(1) {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => return Err(format!("text must be a string or null, got {}", other)),
        };
        let edges = match items.get(2) {
            None => None,
            Some(value) => Some(
                serde_json::from_value::<Vec<Edge>>(value.clone())
                    .map_err(|e| format!("invalid edges: {}", e))?,
            ),
        };

        match &items[0] {
            Value::Null => Ok(Operation::Allocate {
                text,
                edges: edges.unwrap_or_default(),
            }),
            id @ Value::Number(_) => {
                let id = id
                    .as_u64()
                    .ok_or_else(|| format!("node id must be a non-negative integer, got {}", id))?;
                Ok(match (items.len(), text) {
                    (1, _) => Operation::Query(id),
                    (_, None) => Operation::Delete(id),
                    (_, Some(text)) => Operation::Upsert { id, text, edges },
                })
            }
            other => Err(format!("node id must be an integer or null, got {}", other)),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Operation::Query(id) => json!([id]),
            Operation::Upsert {
                id,
                text,
                edges: None,
            } => json!([id, text]),
            Operation::Upsert {
                id,
                text,
                edges: Some(edges),
            } => json!([id, text, edges]),
            Operation::Delete(id) => json!([id, null]),
            Operation::Allocate { text: None, edges } if edges.is_empty() => json!([null]),
            Operation::Allocate { text, edges } => json!([null, text, edges]),
        }
    }
}

impl From<&Node> for Operation {
    /// Operation that makes the server hold exactly this node state
    fn from(node: &Node) -> Self {
        match &node.text {
            Some(text) => Operation::Upsert {
                id: node.id,
                text: text.clone(),
                edges: Some(node.edges.clone()),
            },
            None => Operation::Delete(node.id),
        }
    }
}

/// A parsed request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `[]`: every live node
    ListAll,
    /// Operations answered in order
    Batch(Vec<Operation>),
}

impl Request {
    /// Request for a single operation
    pub fn single(operation: Operation) -> Self {
        Request::Batch(vec![operation])
    }

    /// Parse one request line; `line` is the 1-based line number used in errors.
    ///
    /// A line holding a single operation (`[1]`) is accepted as well as a list
    /// of operations (`[[1], [2]]`).
    pub fn parse(text: &str, line: usize) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| Error::parse(REQUEST_INPUT, line, e))?;
        let items = value
            .as_array()
            .ok_or_else(|| Error::parse(REQUEST_INPUT, line, "request must be an array"))?;

        if items.is_empty() {
            return Ok(Request::ListAll);
        }
        let operations = if items[0].is_array() {
            items
                .iter()
                .map(Operation::from_value)
                .collect::<std::result::Result<Vec<_>, _>>()
        } else {
            Operation::from_value(&value).map(|op| vec![op])
        };
        operations
            .map(Request::Batch)
            .map_err(|message| Error::parse(REQUEST_INPUT, line, message))
    }

    /// Encode as one line (no trailing newline)
    pub fn to_line(&self) -> Result<String> {
        match self {
            Request::ListAll => to_json_line(&Vec::<Value>::new()),
            Request::Batch(operations) => {
                let values: Vec<Value> = operations.iter().map(Operation::to_value).collect();
                to_json_line(&values)
            }
        }
    }
}

/// Node as reported in a reply: `[id, text, edges, incoming]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "(Option<NodeId>, Option<String>, Vec<Edge>, Vec<IncomingEdge>)",
    into = "(Option<NodeId>, Option<String>, Vec<Edge>, Vec<IncomingEdge>)"
)]
pub struct WireNode {
    /// Node id; `None` only for a rejected allocation
    pub id: Option<NodeId>,
    /// Text, `None` for absent or placeholder nodes
    pub text: Option<String>,
    /// Outgoing edges
    pub edges: Vec<Edge>,
    /// Edges pointing at this node, sorted
    pub incoming: Vec<IncomingEdge>,
}

impl WireNode {
    /// Reply entry for an id with nothing stored
    pub fn absent(id: Option<NodeId>) -> Self {
        Self {
            id,
            text: None,
            edges: Vec::new(),
            incoming: Vec::new(),
        }
    }

    /// Store-side node state, if the entry names an id
    pub fn to_node(&self) -> Option<Node> {
        Some(Node {
            id: self.id?,
            text: self.text.clone(),
            edges: self.edges.clone(),
        })
    }
}

type WireTuple = (Option<NodeId>, Option<String>, Vec<Edge>, Vec<IncomingEdge>);

impl From<WireTuple> for WireNode {
    fn from((id, text, edges, incoming): WireTuple) -> Self {
        Self {
            id,
            text,
            edges,
            incoming,
        }
    }
}

impl From<WireNode> for WireTuple {
    fn from(node: WireNode) -> Self {
        (node.id, node.text, node.edges, node.incoming)
    }
}

/// The two reply lines of one request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    /// Resulting node per operation
    pub nodes: Vec<WireNode>,
    /// Status per operation, parallel to `nodes`
    pub statuses: Vec<OpStatus>,
}

impl Response {
    /// Append the outcome of one operation
    pub fn push(&mut self, node: WireNode, status: OpStatus) {
        self.nodes.push(node);
        self.statuses.push(status);
    }

    /// Encode as the node line and the status line
    pub fn to_lines(&self) -> Result<(String, String)> {
        let statuses: Vec<Option<&str>> = self
            .statuses
            .iter()
            .map(|status| status.as_ref().err().map(OpFailure::as_wire))
            .collect();
        Ok((to_json_line(&self.nodes)?, to_json_line(&statuses)?))
    }

    /// Decode the two reply lines written by a server
    pub fn from_lines(nodes: &str, statuses: &str) -> Result<Self> {
        let nodes: Vec<WireNode> = serde_json::from_str(nodes.trim_end())
            .map_err(|e| Error::protocol(format!("bad node line: {}", e)))?;
        let statuses: Vec<Option<String>> = serde_json::from_str(statuses.trim_end())
            .map_err(|e| Error::protocol(format!("bad status line: {}", e)))?;
        if nodes.len() != statuses.len() {
            return Err(Error::protocol(format!(
                "{} nodes but {} statuses",
                nodes.len(),
                statuses.len()
            )));
        }
        let statuses = statuses
            .into_iter()
            .map(|status| match status {
                None => Ok(()),
                Some(reason) => Err(OpFailure::from_wire(&reason)),
            })
            .collect();
        Ok(Self { nodes, statuses })
    }

    /// Pair each node with its status
    pub fn outcomes(&self) -> impl Iterator<Item = (&WireNode, &OpStatus)> {
        self.nodes.iter().zip(&self.statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_operation_shape() {
        let request = Request::parse(
            r#"[[1], [2, "t"], [3, "t", [["l", 1]]], [4, null], [null], [null, "n", [["x", 0]]]]"#,
            1,
        )
        .unwrap();
        assert_eq!(
            request,
            Request::Batch(vec![
                Operation::Query(1),
                Operation::Upsert {
                    id: 2,
                    text: "t".into(),
                    edges: None
                },
                Operation::Upsert {
                    id: 3,
                    text: "t".into(),
                    edges: Some(vec![Edge::new("l", 1)])
                },
                Operation::Delete(4),
                Operation::Allocate {
                    text: None,
                    edges: vec![]
                },
                Operation::Allocate {
                    text: Some("n".into()),
                    edges: vec![Edge::new("x", 0)]
                },
            ])
        );
    }

    #[test]
    fn bare_operation_and_empty_list() {
        assert_eq!(Request::parse("[5]", 1).unwrap(), Request::single(Operation::Query(5)));
        assert_eq!(Request::parse("[]", 1).unwrap(), Request::ListAll);
    }

    #[test]
    fn malformed_lines_name_the_line() {
        for bad in ["[1", "{}", "[[1, 2, 3, 4]]", "[[-1]]", "[[\"x\"]]", "[[1, 5]]", "[[1, \"t\", 3]]"] {
            match Request::parse(bad, 7) {
                Err(Error::Parse { input, line, .. }) => {
                    assert_eq!(input, "request");
                    assert_eq!(line, 7);
                }
                other => panic!("{} parsed as {:?}", bad, other),
            }
        }
    }

    #[test]
    fn request_lines_reparse() {
        let request = Request::Batch(vec![
            Operation::Delete(3),
            Operation::Allocate {
                text: None,
                edges: vec![],
            },
            Operation::Upsert {
                id: 1,
                text: "a".into(),
                edges: Some(vec![Edge::new("b", 2)]),
            },
        ]);
        let line = request.to_line().unwrap();
        assert_eq!(line, r#"[[3, null], [null], [1, "a", [["b", 2]]]]"#);
        assert_eq!(Request::parse(&line, 1).unwrap(), request);
    }

    #[test]
    fn response_lines_use_null_or_reason() {
        let mut response = Response::default();
        response.push(
            WireNode {
                id: Some(1),
                text: Some("T".into()),
                edges: vec![Edge::new("l", 2)],
                incoming: vec![],
            },
            Ok(()),
        );
        response.push(WireNode::absent(Some(9)), Err(OpFailure::NodeNotFound));
        let (nodes, statuses) = response.to_lines().unwrap();
        assert_eq!(nodes, r#"[[1, "T", [["l", 2]], []], [9, null, [], []]]"#);
        assert_eq!(statuses, r#"[null, "Square does not exist."]"#);
        assert_eq!(Response::from_lines(&nodes, &statuses).unwrap(), response);
    }

    #[test]
    fn mismatched_reply_is_a_protocol_error() {
        let err = Response::from_lines("[[1, null, [], []]]", "[]").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
