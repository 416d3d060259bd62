//! Graph protocol
//!
//! A [`GraphServer`] owns the authoritative graph and answers newline-delimited
//! JSON requests. A [`ClientGraph`] offers the ordinary store interface on top
//! of any [`Transport`] reaching such a server.

pub mod client;
pub mod server;
pub mod transport;
pub mod wire;

pub use client::{ClientGraph, RemoteBackend};
pub use server::{GraphServer, ServeMode};
pub use transport::{ChannelTransport, ProcessTransport, Transport};
pub use wire::{Operation, Request, Response, WireNode};

#[cfg(test)]
mod tests;
