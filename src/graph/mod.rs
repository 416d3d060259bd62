//! Graph operations built on the transactional store
//!
//! Algorithms are inherent methods on [`TextGraph`](crate::storage::TextGraph),
//! so they work unchanged for local graphs and for server-backed clients.

pub mod algorithms;
pub mod asm;
pub mod dot;

pub use dot::{export_dot, render, to_dot, NodeStyles};
