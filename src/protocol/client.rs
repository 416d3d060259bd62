//! Store backend that forwards reads and writes to a graph server
//!
//! The undo/redo log stays with the client's [`TextGraph`]; only raw node
//! reads and writes cross the transport.

use crate::core::error::{Error, OpFailure, OpStatus, Result, READ_ONLY};
use crate::core::types::{IncomingEdge, Node, NodeId};
use crate::core::config::ProtocolConfig;
use crate::protocol::transport::{ProcessTransport, Transport};
use crate::protocol::wire::{Operation, Request, Response, WireNode};
use crate::storage::{GraphSource, NodeBackend, TextGraph};
use crate::log_trace;
use std::cell::RefCell;

/// Graph whose nodes live in a server
pub type ClientGraph<T> = TextGraph<RemoteBackend<T>>;

/// [`NodeBackend`] speaking the graph protocol
pub struct RemoteBackend<T: Transport> {
    transport: RefCell<T>,
    read_only: bool,
}

impl<T: Transport> RemoteBackend<T> {
    /// Wrap a transport. `read_only` should match the served source.
    pub fn new(transport: T, read_only: bool) -> Self {
        Self {
            transport: RefCell::new(transport),
            read_only,
        }
    }

    fn send(&self, request: Request) -> Result<Response> {
        log_trace!("Sending {:?}", request);
        self.transport.borrow_mut().round_trip(&request)
    }

    /// Send one query and return its reply entry (`None` if the node is unknown)
    fn query(&self, id: NodeId) -> Result<Option<WireNode>> {
        let response = self.send(Request::single(Operation::Query(id)))?;
        let first = first_outcome(&response);
        match first {
            Some((node, Ok(()))) => Ok(Some(node)),
            Some((_, Err(OpFailure::NodeNotFound))) => Ok(None),
            Some((_, Err(failure))) => Err(failure.into_error(Some(id))),
            None => Err(Error::protocol("empty reply to a query")),
        }
    }
}

/// Owned copy of the first node and status of a reply
fn first_outcome(response: &Response) -> Option<(WireNode, OpStatus)> {
    response
        .outcomes()
        .next()
        .map(|(node, status)| (node.clone(), status.clone()))
}

impl<T: Transport> NodeBackend for RemoteBackend<T> {
    fn get(&self, id: NodeId) -> Result<Option<Node>> {
        Ok(self.query(id)?.and_then(|node| node.to_node()))
    }

    fn entries(&self) -> Result<Vec<Node>> {
        let response = self.send(Request::ListAll)?;
        let mut nodes: Vec<Node> = response.nodes.iter().filter_map(WireNode::to_node).collect();
        nodes.sort_by_key(|node| node.id);
        Ok(nodes)
    }

    fn live_ids(&self) -> Result<Vec<NodeId>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(Node::is_live)
            .map(|node| node.id)
            .collect())
    }

    fn incoming_edges(&self, id: NodeId) -> Result<Vec<IncomingEdge>> {
        Ok(self.query(id)?.map(|node| node.incoming).unwrap_or_default())
    }

    fn allocate(&mut self) -> Result<NodeId> {
        let response = self.send(Request::single(Operation::Allocate {
            text: None,
            edges: Vec::new(),
        }))?;
        let first = first_outcome(&response);
        match first {
            Some((WireNode { id: Some(id), .. }, Ok(()))) => Ok(id),
            Some((_, Err(failure))) => Err(failure.into_error(None)),
            _ => Err(Error::protocol("allocation reply carries no id")),
        }
    }

    fn commit(&mut self, nodes: &[Node]) -> Result<()> {
        if nodes.is_empty() {
            return Ok(());
        }
        if self.read_only {
            return Err(Error::permission(READ_ONLY));
        }
        let operations: Vec<Operation> = nodes.iter().map(Operation::from).collect();
        let response = self.send(Request::Batch(operations.clone()))?;
        if response.statuses.len() != operations.len() {
            return Err(Error::protocol(format!(
                "{} operations but {} statuses",
                operations.len(),
                response.statuses.len()
            )));
        }

        for (operation, status) in operations.iter().zip(response.statuses) {
            match (operation, status) {
                (_, Ok(())) => {}
                // Removing something already gone leaves the desired state
                (Operation::Delete(_), Err(OpFailure::NodeNotFound)) => {}
                (operation, Err(failure)) => return Err(failure.into_error(operation.id())),
            }
        }
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

impl<T: Transport> ClientGraph<T> {
    /// Store whose nodes live behind `transport`
    pub fn connect(transport: T, read_only: bool) -> Self {
        TextGraph::with_backend(RemoteBackend::new(transport, read_only))
    }
}

impl ClientGraph<ProcessTransport> {
    /// Spawn a server process for `source` and connect to it
    pub fn spawn(source: &GraphSource, config: &ProtocolConfig) -> Result<Self> {
        let transport = ProcessTransport::spawn(config, Some(&source.to_string()))?;
        Ok(Self::connect(transport, source.is_read_only()))
    }
}

