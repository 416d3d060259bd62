//! Text Graph - a persistent graph of text nodes joined by labeled edges
//!
//! Nodes are edited through a transactional store with staged writes and
//! undo/redo. The same store interface runs against a local node table or
//! against a separate graph server process speaking a line-oriented JSON
//! protocol, so several editors can share one authoritative graph.
#![warn(missing_docs)]

// Core foundational modules
pub mod core;

// Main functional modules
pub mod storage;
pub mod graph;
pub mod protocol;

// Re-export commonly used items for convenience
pub use crate::core::{Config, Edge, Error, Node, NodeId, Result, ROOT_ID};
pub use crate::storage::{GraphSource, LocalGraph, TextGraph};
pub use crate::protocol::{ClientGraph, GraphServer};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize logging for a binary
pub fn init(config: &crate::core::config::LoggingConfig) {
    crate::core::logging::init_tracing(config);
    tracing::debug!("Initialized {} v{}", NAME, VERSION);
}
