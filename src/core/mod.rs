//! Core system types and foundations
//!
//! This module contains the fundamental building blocks shared by the store,
//! the algorithms, and the protocol: graph value types, error handling,
//! configuration, and logging.

pub mod types;
pub mod error;
pub mod config;
pub mod logging;

// Re-export commonly used items
pub use types::{Edge, IncomingEdge, Node, NodeId, ROOT_ID};
pub use error::{Error, GraphError, OpFailure, OpStatus, Result};
pub use config::Config;
