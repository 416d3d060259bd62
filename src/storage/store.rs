//! Transactional graph store
//!
//! Callers stage full desired node states and commit them with [`TextGraph::apply`].
//! Each apply that changes anything becomes one transaction on the undo
//! stack. The engine is generic over the backend so the same semantics hold
//! for a local node table and for a graph owned by a server process.

use crate::core::config::StorageConfig;
use crate::core::error::{Error, GraphError, Result, READ_ONLY};
use crate::core::types::{IncomingEdge, Node, NodeId, ROOT_ID};
use crate::storage::codec::{self, RecordFormat};
use crate::storage::mem_store::{IdPolicy, MemoryBackend};
use crate::storage::source::GraphSource;
use crate::storage::transaction::{Change, Transaction, TransactionLog};
use crate::storage::NodeBackend;
use crate::{log_debug, log_error, log_info, log_warn};
use std::collections::HashMap;
use std::path::Path;

/// Store backed by an in-memory node table
pub type LocalGraph = TextGraph<MemoryBackend>;

/// Default number of transactions between recovery snapshots
pub const DEFAULT_SNAPSHOT_INTERVAL: usize = 5;

/// File the graph was loaded from, with what is needed to write it back
#[derive(Debug, Clone)]
struct Persistence {
    source: GraphSource,
    header: String,
    format: RecordFormat,
}

/// Graph store with staged writes and undo/redo
pub struct TextGraph<B: NodeBackend> {
    backend: B,
    staged: Vec<Node>,
    log: TransactionLog,
    dirty: bool,
    on_change: Option<Box<dyn FnMut()>>,
    persistence: Option<Persistence>,
    snapshot_interval: usize,
    snapshot_error: Option<Error>,
}

impl LocalGraph {
    /// Graph with only an empty root and no backing file
    pub fn new_in_memory() -> Self {
        Self::with_backend(MemoryBackend::new(IdPolicy::Monotonic))
    }

    /// Load a graph from a file or URL.
    ///
    /// A local file that does not exist yet opens as a fresh graph in the
    /// configured default format. Remote sources open read only.
    pub fn open(source: GraphSource, config: &StorageConfig) -> Result<Self> {
        let document = match source.read()? {
            Some(text) => codec::decode(&source.name(), &text, config.default_format)?,
            None => codec::GraphDocument {
                format: config.default_format,
                ..Default::default()
            },
        };

        let policy = match document.format {
            RecordFormat::IdTagged => IdPolicy::Monotonic,
            RecordFormat::Positional => IdPolicy::Recycle,
        };
        let backend = MemoryBackend::from_nodes(document.nodes, policy, source.is_read_only());
        log_info!(
            "Opened {} ({} entries, {:?} records{})",
            source,
            backend.len(),
            document.format,
            if source.is_read_only() { ", read only" } else { "" }
        );

        let mut graph = Self::with_backend(backend);
        graph.snapshot_interval = config.snapshot_interval;
        graph.persistence = Some(Persistence {
            source,
            header: document.header,
            format: document.format,
        });
        Ok(graph)
    }
}

impl<B: NodeBackend> TextGraph<B> {
    /// Wrap a backend with an empty transaction log
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            staged: Vec::new(),
            log: TransactionLog::new(),
            dirty: false,
            on_change: None,
            persistence: None,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            snapshot_error: None,
        }
    }

    /// Set the recovery snapshot interval (0 disables snapshots)
    pub fn with_snapshot_interval(mut self, interval: usize) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// File or URL this graph was opened from
    pub fn source(&self) -> Option<&GraphSource> {
        self.persistence.as_ref().map(|p| &p.source)
    }

    /// Record format used when saving
    pub fn format(&self) -> RecordFormat {
        self.persistence.as_ref().map_or(RecordFormat::IdTagged, |p| p.format)
    }

    /// Register the callback fired after every apply that changed the graph
    pub fn set_change_handler(&mut self, handler: impl FnMut() + 'static) {
        self.on_change = Some(Box::new(handler));
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Stored state of `id`: live node, placeholder tombstone, or `None`
    pub fn node(&self, id: NodeId) -> Result<Option<Node>> {
        self.backend.get(id)
    }

    /// Like [`TextGraph::node`] but a missing entry is an error
    pub fn require_node(&self, id: NodeId) -> Result<Node> {
        self.backend
            .get(id)?
            .ok_or_else(|| GraphError::NodeNotFound { id }.into())
    }

    /// Ids of all live nodes, ascending
    pub fn live_ids(&self) -> Result<Vec<NodeId>> {
        self.backend.live_ids()
    }

    /// All live nodes, ascending by id
    pub fn live_nodes(&self) -> Result<Vec<Node>> {
        Ok(self
            .backend
            .entries()?
            .into_iter()
            .filter(Node::is_live)
            .collect())
    }

    /// Every edge in the graph whose destination is `id`
    pub fn incoming_edges(&self, id: NodeId) -> Result<Vec<IncomingEdge>> {
        self.backend.incoming_edges(id)
    }

    /// Whether the graph refuses writes
    pub fn is_read_only(&self) -> bool {
        self.backend.is_read_only()
    }

    /// Whether anything changed since the last save
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of transactions on the undo stack
    pub fn undo_depth(&self) -> usize {
        self.log.undo_depth()
    }

    /// Number of transactions on the redo stack
    pub fn redo_depth(&self) -> usize {
        self.log.redo_depth()
    }

    /// Number of staged, uncommitted node states
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    /// Reserve a fresh id holding a placeholder tombstone
    pub fn allocate(&mut self) -> Result<NodeId> {
        self.backend.allocate()
    }

    /// Queue a copy of a desired node state
    pub fn stage(&mut self, node: &Node) {
        self.staged.push(node.clone());
    }

    /// Commit every staged state as one transaction.
    ///
    /// Returns `Ok(false)` when no staged state differs from the graph; the
    /// buffer is cleared either way. Staging a tombstone for the root, or
    /// applying against a read-only graph, drops the buffer and fails without
    /// touching the graph.
    pub fn apply(&mut self) -> Result<bool> {
        let staged = std::mem::take(&mut self.staged);
        if staged.is_empty() {
            return Ok(false);
        }
        if self.backend.is_read_only() {
            log_warn!("Discarding {} staged changes: graph is read only", staged.len());
            return Err(Error::permission(READ_ONLY));
        }
        if staged.iter().any(|node| node.id == ROOT_ID && !node.is_live()) {
            return Err(GraphError::RootNodeProtected.into());
        }

        let mut pending: HashMap<NodeId, Node> = HashMap::new();
        let mut changes = Vec::with_capacity(staged.len());
        let mut writes = Vec::new();

        for after in staged {
            let current = match pending.get(&after.id) {
                Some(node) if node.is_live() => Some(node.clone()),
                Some(_) => None,
                None => self.backend.get(after.id)?,
            };
            let exists = current.is_some();
            let reserved = current.as_ref().is_some_and(|node| !node.is_live());
            let before = current.unwrap_or_else(|| Node::tombstone(after.id));

            let changed = if after.is_live() {
                !before.same_content(&after)
            } else {
                exists
            };
            if changed {
                pending.insert(after.id, after.clone());
                writes.push(after.clone());
            }
            changes.push(Change {
                before,
                after,
                reserved,
            });
        }

        if writes.is_empty() {
            log_debug!("Apply of {} staged states changed nothing", changes.len());
            return Ok(false);
        }

        self.backend.commit(&writes)?;
        log_debug!(
            "Committed transaction: {} staged, {} written",
            changes.len(),
            writes.len()
        );
        self.log.record(Transaction { changes });
        self.dirty = true;
        if let Some(handler) = self.on_change.as_mut() {
            handler();
        }
        if self.snapshot_interval > 0 && self.log.undo_depth() % self.snapshot_interval == 0 {
            self.write_snapshot();
        }
        Ok(true)
    }

    /// Revert the most recent transaction (no-op if there is none)
    pub fn undo(&mut self) -> Result<()> {
        let Some(transaction) = self.log.take_undo() else {
            return Ok(());
        };
        let result = self.backend.commit(&transaction.undo_states()).and_then(|()| {
            transaction
                .reserved_ids()
                .into_iter()
                .try_for_each(|id| self.backend.reserve(id))
        });
        if let Err(e) = result {
            self.log.push_done(transaction);
            return Err(e);
        }
        self.log.push_undone(transaction);
        self.dirty = true;
        Ok(())
    }

    /// Re-apply the most recently undone transaction (no-op if there is none)
    pub fn redo(&mut self) -> Result<()> {
        let Some(transaction) = self.log.take_redo() else {
            return Ok(());
        };
        if let Err(e) = self.backend.commit(&transaction.redo_states()) {
            self.log.push_undone(transaction);
            return Err(e);
        }
        self.log.push_done(transaction);
        self.dirty = true;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------

    /// Encode the whole graph with the loaded header and record format
    pub fn encode(&self) -> Result<String> {
        let (header, format) = match &self.persistence {
            Some(p) => (p.header.as_str(), p.format),
            None => ("", RecordFormat::IdTagged),
        };
        codec::encode(header, format, &self.backend.entries()?)
    }

    /// Write the graph back to the file it was opened from
    pub fn save(&mut self) -> Result<()> {
        let Some(persistence) = &self.persistence else {
            return Err(Error::config("Graph has no backing file"));
        };
        if persistence.source.is_read_only() {
            return Err(Error::permission(format!("{} is read only.", persistence.source)));
        }
        let contents = self.encode()?;
        persistence.source.write(&contents)?;
        log_info!("Saved {}", persistence.source);
        self.dirty = false;
        Ok(())
    }

    /// Write the graph to an arbitrary path; the dirty flag is left alone
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.encode()?)?;
        Ok(())
    }

    /// Clear the dirty flag after the caller persisted the graph elsewhere
    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Failure of the most recent recovery snapshot, if any
    pub fn take_snapshot_error(&mut self) -> Option<Error> {
        self.snapshot_error.take()
    }

    fn write_snapshot(&mut self) {
        let Some(path) = self
            .persistence
            .as_ref()
            .filter(|p| !p.source.is_read_only())
            .and_then(|p| p.source.draft_path())
        else {
            return;
        };
        let result = self
            .encode()
            .and_then(|contents| std::fs::write(&path, contents).map_err(Error::from));
        match result {
            Ok(()) => log_debug!("Wrote recovery snapshot {}", path.display()),
            Err(e) => {
                log_error!("Recovery snapshot {} failed: {}", path.display(), e);
                self.snapshot_error = Some(e);
            }
        }
    }
}
