//! Graph server
//!
//! Owns the authoritative node table plus a reverse index from destination id
//! to the edges targeting it. Requests are answered strictly one at a time, in
//! the order they arrive, which is what keeps several clients consistent.

use crate::core::config::StorageConfig;
use crate::core::error::{Error, OpFailure, OpStatus, Result, IDS_EXHAUSTED, ROOT_PROTECTED};
use crate::core::types::{Edge, IncomingEdge, Node, NodeId, ROOT_ID};
use crate::protocol::wire::{Operation, Request, Response, WireNode, REQUEST_INPUT};
use crate::storage::codec::{self, RecordFormat};
use crate::storage::GraphSource;
use crate::{log_debug, log_info, log_warn};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

/// How malformed request lines are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeMode {
    /// Stop serving and return the parse error
    Strict,
    /// Report the error on the output and keep going
    Repl,
}

/// Protocol server state
#[derive(Debug)]
pub struct GraphServer {
    graph: BTreeMap<NodeId, Node>,
    reverse: BTreeMap<NodeId, Vec<IncomingEdge>>,
    next_id: NodeId,
    read_only: bool,
    line_no: usize,
    source: Option<GraphSource>,
    header: String,
    format: RecordFormat,
    dirty: bool,
}

impl Default for GraphServer {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphServer {
    /// Writable server holding only an empty root
    pub fn new() -> Self {
        Self::from_nodes(Vec::new(), false)
    }

    /// Build a server from decoded nodes
    pub fn from_nodes(nodes: Vec<Node>, read_only: bool) -> Self {
        let mut server = Self {
            graph: BTreeMap::new(),
            reverse: BTreeMap::new(),
            next_id: 0,
            read_only,
            line_no: 0,
            source: None,
            header: String::new(),
            format: RecordFormat::IdTagged,
            dirty: false,
        };
        for node in nodes {
            server.put(node);
        }
        if !server.graph.contains_key(&ROOT_ID) {
            server.put(Node::new(ROOT_ID, "", Vec::new()));
        }
        server
    }

    /// Load the graph served from `source`. Remote sources are served read only.
    pub fn open(source: GraphSource, config: &StorageConfig) -> Result<Self> {
        let document = match source.read()? {
            Some(text) => codec::decode(&source.name(), &text, config.default_format)?,
            None => codec::GraphDocument {
                format: config.default_format,
                ..Default::default()
            },
        };
        let mut server = Self::from_nodes(document.nodes, source.is_read_only());
        log_info!(
            "Serving {} ({} nodes{})",
            source,
            server.graph.len(),
            if server.read_only { ", read only" } else { "" }
        );
        server.header = document.header;
        server.format = document.format;
        server.source = Some(source);
        Ok(server)
    }

    /// Whether writes are rejected
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether a write succeeded since loading or the last save
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Stored entry for `id`, placeholders included
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.get(&id)
    }

    /// Every stored entry in id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.values()
    }

    /// Indexed edges pointing at `id`, sorted
    pub fn incoming(&self, id: NodeId) -> &[IncomingEdge] {
        self.reverse.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Answer one request
    pub fn handle(&mut self, request: Request) -> Response {
        let operations = match request {
            Request::ListAll => self
                .graph
                .values()
                .filter(|node| node.is_live())
                .map(|node| Operation::Query(node.id))
                .collect(),
            Request::Batch(operations) => operations,
        };

        let mut response = Response::default();
        for operation in operations {
            let (node, status) = if self.read_only && operation.is_write() {
                self.reject(&operation)
            } else {
                self.execute(operation)
            };
            response.push(node, status);
        }
        response
    }

    /// Parse and answer one input line.
    ///
    /// Blank and `#` lines yield `Ok(None)`; otherwise the two reply lines.
    pub fn handle_line(&mut self, line: &str) -> Result<Option<(String, String)>> {
        self.line_no += 1;
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let request = Request::parse(line, self.line_no)?;
        self.handle(request).to_lines().map(Some)
    }

    /// Serve requests from `input` until it ends.
    ///
    /// In [`ServeMode::Strict`] a malformed line ends serving with the parse
    /// error; in [`ServeMode::Repl`] the error is written as a line and skipped.
    pub fn serve<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W, mode: ServeMode) -> Result<()> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let result = match std::str::from_utf8(&buf) {
                Ok(line) => self.handle_line(line),
                Err(e) => {
                    self.line_no += 1;
                    Err(Error::parse(REQUEST_INPUT, self.line_no, e))
                }
            };
            match result {
                Ok(Some((nodes, statuses))) => {
                    writeln!(output, "{}", nodes)?;
                    writeln!(output, "{}", statuses)?;
                    output.flush()?;
                }
                Ok(None) => {}
                Err(e @ Error::Parse { .. }) if mode == ServeMode::Repl => {
                    log_warn!("Skipping request: {}", e);
                    writeln!(output, "{}", e)?;
                    output.flush()?;
                }
                Err(e) => return Err(e),
            }
        }
        log_debug!("Input closed after {} lines", self.line_no);
        Ok(())
    }

    /// Write the graph back to the file it was loaded from
    pub fn save(&mut self) -> Result<()> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| Error::config("Server has no backing file"))?;
        if self.read_only {
            return Err(Error::permission(format!("{} is read only.", source)));
        }
        let nodes: Vec<Node> = self.graph.values().cloned().collect();
        source.write(&codec::encode(&self.header, self.format, &nodes)?)?;
        log_info!("Saved {}", source);
        self.dirty = false;
        Ok(())
    }

    fn execute(&mut self, operation: Operation) -> (WireNode, OpStatus) {
        match operation {
            Operation::Query(id) => match self.graph.get(&id) {
                Some(_) => (self.reply(id), Ok(())),
                None => not_found(id),
            },
            Operation::Upsert { id, text, edges } => {
                let edges = edges.unwrap_or_else(|| {
                    self.graph.get(&id).map(|node| node.edges.clone()).unwrap_or_default()
                });
                self.put(Node::new(id, text, edges));
                self.dirty = true;
                (self.reply(id), Ok(()))
            }
            Operation::Delete(ROOT_ID) => (
                self.reply(ROOT_ID),
                Err(OpFailure::Rejected(ROOT_PROTECTED.to_string())),
            ),
            Operation::Delete(id) => match self.take(id) {
                Some(_) => {
                    self.dirty = true;
                    (self.reply(id), Ok(()))
                }
                None => not_found(id),
            },
            Operation::Allocate { text, edges } => {
                let id = self.next_id;
                if self.graph.contains_key(&id) {
                    log_warn!("Node id space exhausted");
                    return (
                        WireNode::absent(None),
                        Err(OpFailure::Rejected(IDS_EXHAUSTED.to_string())),
                    );
                }
                let node = match text {
                    Some(text) => Node::new(id, text, edges),
                    None => Node::tombstone(id),
                };
                self.put(node);
                self.dirty = true;
                log_debug!("Allocated node {}", id);
                (self.reply(id), Ok(()))
            }
        }
    }

    /// Reply for a write refused in read-only mode: the current value, unchanged
    fn reject(&self, operation: &Operation) -> (WireNode, OpStatus) {
        let node = match operation.id() {
            Some(id) if self.graph.contains_key(&id) => self.reply(id),
            id => WireNode::absent(id),
        };
        (node, Err(OpFailure::ReadOnly))
    }

    fn reply(&self, id: NodeId) -> WireNode {
        let (text, edges) = match self.graph.get(&id) {
            Some(node) => (node.text.clone(), node.edges.clone()),
            None => (None, Vec::new()),
        };
        WireNode {
            id: Some(id),
            text,
            edges,
            incoming: self.incoming(id).to_vec(),
        }
    }

    /// Store `node`, replacing any previous entry and its index contributions
    fn put(&mut self, node: Node) {
        self.take(node.id);
        for edge in &node.edges {
            let entries = self.reverse.entry(edge.destination).or_default();
            let incoming = IncomingEdge::from_edge(node.id, edge);
            let position = entries.binary_search(&incoming).unwrap_or_else(|p| p);
            entries.insert(position, incoming);
        }
        self.next_id = self.next_id.max(node.id.saturating_add(1));
        self.graph.insert(node.id, node);
    }

    /// Remove the entry for `id` and its index contributions
    fn take(&mut self, id: NodeId) -> Option<Node> {
        let node = self.graph.remove(&id)?;
        for Edge { destination, .. } in &node.edges {
            if let Some(entries) = self.reverse.get_mut(destination) {
                entries.retain(|incoming| incoming.origin != id);
                if entries.is_empty() {
                    self.reverse.remove(destination);
                }
            }
        }
        Some(node)
    }
}

fn not_found(id: NodeId) -> (WireNode, OpStatus) {
    (WireNode::absent(Some(id)), Err(OpFailure::NodeNotFound))
}
