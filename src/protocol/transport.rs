//! Request/reply transports between a client and a graph server
//!
//! A transport sends one [`Request`] and waits for exactly one [`Response`].
//! [`ProcessTransport`] talks to a spawned server over its standard streams;
//! [`ChannelTransport`] talks to a server running on a thread of this process.

use crate::core::config::ProtocolConfig;
use crate::core::error::{Error, Result};
use crate::protocol::server::GraphServer;
use crate::protocol::wire::{Request, Response};
use crate::{log_debug, log_warn};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

/// Message-passing boundary used by the protocol client
pub trait Transport {
    /// Send `request` and wait for its reply
    fn round_trip(&mut self, request: &Request) -> Result<Response>;
}

/// Server running as a child process speaking JSON lines
pub struct ProcessTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl ProcessTransport {
    /// Spawn the configured server program, passing `graph` as its file argument
    pub fn spawn(config: &ProtocolConfig, graph: Option<&str>) -> Result<Self> {
        let mut command = Command::new(&config.server_program);
        command.args(&config.server_args);
        if let Some(graph) = graph {
            command.arg(graph);
        }
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::transport("server stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::transport("server stdout unavailable"))?;
        log_debug!("Spawned {} (pid {})", config.server_program, child.id());

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
        })
    }

    fn read_reply_line(&mut self) -> Result<String> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(Error::transport("server closed its output"));
        }
        Ok(line)
    }
}

impl Transport for ProcessTransport {
    fn round_trip(&mut self, request: &Request) -> Result<Response> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::transport("server input already closed"))?;
        writeln!(stdin, "{}", request.to_line()?)?;
        stdin.flush()?;

        let nodes = self.read_reply_line()?;
        let statuses = self.read_reply_line()?;
        Response::from_lines(&nodes, &statuses)
    }
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        // Closing stdin ends the server's input so it can save and exit
        drop(self.stdin.take());
        if let Err(e) = self.child.wait() {
            log_warn!("Failed to reap graph server: {}", e);
        }
    }
}

type Envelope = (Request, flume::Sender<Response>);

/// Handle to a server thread. Clones share the same server.
#[derive(Clone)]
pub struct ChannelTransport {
    requests: flume::Sender<Envelope>,
}

impl ChannelTransport {
    /// Move `server` onto its own thread.
    ///
    /// The thread answers requests in arrival order and returns the server
    /// once every transport handle has been dropped.
    pub fn spawn(mut server: GraphServer) -> (Self, JoinHandle<GraphServer>) {
        let (requests, inbox) = flume::unbounded::<Envelope>();
        let handle = std::thread::spawn(move || {
            while let Ok((request, reply)) = inbox.recv() {
                let response = server.handle(request);
                if reply.send(response).is_err() {
                    log_debug!("Client went away before its reply");
                }
            }
            server
        });
        (Self { requests }, handle)
    }
}

impl Transport for ChannelTransport {
    fn round_trip(&mut self, request: &Request) -> Result<Response> {
        let (reply, response) = flume::bounded(1);
        self.requests
            .send((request.clone(), reply))
            .map_err(|_| Error::transport("server thread stopped"))?;
        response
            .recv()
            .map_err(|_| Error::transport("server thread dropped the request"))
    }
}
