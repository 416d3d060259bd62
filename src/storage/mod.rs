//! Storage layer
//!
//! The transaction engine ([`TextGraph`]) is written once against the
//! [`NodeBackend`] trait. A backend only performs raw reads and writes: the
//! in-memory [`MemoryBackend`] owns the node table directly, while the protocol
//! client's backend forwards every read and write to a graph server.

use crate::core::error::Result;
use crate::core::types::{IncomingEdge, Node, NodeId};

/// Raw node storage under a [`TextGraph`]
pub trait NodeBackend {
    /// Stored entry for `id` (live or placeholder tombstone), `None` if absent
    fn get(&self, id: NodeId) -> Result<Option<Node>>;

    /// Every stored entry, sorted by id
    fn entries(&self) -> Result<Vec<Node>>;

    /// Ids of live nodes, ascending
    fn live_ids(&self) -> Result<Vec<NodeId>>;

    /// All edges whose destination is `id`
    fn incoming_edges(&self, id: NodeId) -> Result<Vec<IncomingEdge>>;

    /// Reserve a fresh id holding a placeholder tombstone
    fn allocate(&mut self) -> Result<NodeId>;

    /// Write node states in order: live nodes overwrite, tombstones remove
    fn commit(&mut self, nodes: &[Node]) -> Result<()>;

    /// Hold a placeholder at `id` again if nothing is stored there.
    ///
    /// Used when undo brings back an allocated id. Backends that can only
    /// hand out fresh ids leave `id` absent.
    fn reserve(&mut self, _id: NodeId) -> Result<()> {
        Ok(())
    }

    /// Whether writes are refused
    fn is_read_only(&self) -> bool;
}

/// Line-oriented persistence codec
pub mod codec;

/// Local files and remote URLs
pub mod source;

/// Undo/redo transaction log
pub mod transaction;

/// In-memory node table
pub mod mem_store;

/// Transactional graph store
pub mod store;

pub use codec::{GraphDocument, RecordFormat};
pub use mem_store::{IdPolicy, MemoryBackend};
pub use source::GraphSource;
pub use store::{LocalGraph, TextGraph};
pub use transaction::{Change, Transaction, TransactionLog};
