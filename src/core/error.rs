//! Error types and handling for the text graph store
//!
//! This module defines the crate-wide error type and the per-operation status
//! values the graph server reports for every operation in a request.

use crate::core::types::NodeId;
use std::fmt;
use thiserror::Error;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed graph file or malformed request line
    #[error("Cannot load {input}: error on line {line}: {message}")]
    Parse {
        /// File path, URL, or "request"
        input: String,
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },

    /// Malformed or mismatched reply from a graph server
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Write attempted against a read-only graph
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Graph operation errors
    #[error("Graph operation error: {0}")]
    Graph(#[from] GraphError),

    /// Server process or channel is gone
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Fetching a remote graph failed
    #[error("Remote source error: {0}")]
    Remote(#[from] reqwest::Error),
}

/// Graph operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The root node can not be deleted
    #[error("Node 0 is the root and can not be deleted")]
    RootNodeProtected,

    /// Every node id is taken
    #[error("No node ids left to allocate")]
    IdSpaceExhausted,

    /// Node not found
    #[error("Node not found: {id}")]
    NodeNotFound {
        /// ID of the missing node
        id: NodeId,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a parse error with its input name and 1-based line number
    pub fn parse(input: impl Into<String>, line: usize, message: impl fmt::Display) -> Self {
        Self::Parse {
            input: input.into(),
            line,
            message: message.to_string(),
        }
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a permission error
    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Check if this error is a permission denial
    pub fn is_permission(&self) -> bool {
        matches!(self, Error::Permission(_))
    }
}

/// Wire text for a rejected write against a read-only graph
pub const READ_ONLY: &str = "Read only";

/// Wire text for an operation on an unknown node
pub const NODE_DOES_NOT_EXIST: &str = "Square does not exist.";

/// Wire text for a delete naming the root
pub const ROOT_PROTECTED: &str = "The root square can not be deleted.";

/// Wire text for an allocation when no id is left
pub const IDS_EXHAUSTED: &str = "No free square ids.";

/// Why a single protocol operation did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpFailure {
    /// The graph is read only
    ReadOnly,
    /// The node does not exist
    NodeNotFound,
    /// Any other reason reported by a server
    Rejected(String),
}

/// Outcome of a single protocol operation
pub type OpStatus = std::result::Result<(), OpFailure>;

impl OpFailure {
    /// Decode the wire text of a failure
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            READ_ONLY => OpFailure::ReadOnly,
            NODE_DOES_NOT_EXIST => OpFailure::NodeNotFound,
            other => OpFailure::Rejected(other.to_string()),
        }
    }

    /// Wire text of this failure
    pub fn as_wire(&self) -> &str {
        match self {
            OpFailure::ReadOnly => READ_ONLY,
            OpFailure::NodeNotFound => NODE_DOES_NOT_EXIST,
            OpFailure::Rejected(reason) => reason,
        }
    }

    /// Convert into a crate error for the operation on `id`
    pub fn into_error(self, id: Option<NodeId>) -> Error {
        match (self, id) {
            (OpFailure::ReadOnly, _) => Error::permission(READ_ONLY),
            (OpFailure::NodeNotFound, Some(id)) => GraphError::NodeNotFound { id }.into(),
            (OpFailure::NodeNotFound, None) => Error::not_found(NODE_DOES_NOT_EXIST),
            (OpFailure::Rejected(reason), _) => Error::protocol(reason),
        }
    }
}

impl fmt::Display for OpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}
