//! Graph-description (DOT) export
//!
//! Produces `digraph graphname{ ... }` text for an external renderer. Vertex
//! declarations come first, then edge declarations, both in node order.

use crate::core::config::ExportConfig;
use crate::core::error::{Error, Result};
use crate::core::types::{Node, NodeId};
use crate::storage::{NodeBackend, TextGraph};
use crate::{log_debug, log_info};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::process::{Command, Stdio};

/// Extra vertex attributes keyed by node id, e.g. `color = red`
pub type NodeStyles = BTreeMap<NodeId, BTreeMap<String, String>>;

/// Render nodes as a DOT description.
///
/// Tombstones are skipped, and so is any edge whose destination is not a live
/// node in `nodes`.
pub fn to_dot(nodes: &[Node], styles: &NodeStyles) -> Result<String> {
    let live: HashSet<NodeId> = nodes
        .iter()
        .filter(|node| node.is_live())
        .map(|node| node.id)
        .collect();

    let mut labels = String::new();
    let mut edges = String::new();
    for node in nodes.iter().filter(|node| node.is_live()) {
        labels.push_str(&format!("{}[label={}", node.id, serde_json::to_string(node.title())?));
        if let Some(attributes) = styles.get(&node.id) {
            for (attribute, value) in attributes {
                labels.push_str(&format!(",{} = {}", attribute, value));
            }
        }
        labels.push_str("]\n");

        for edge in node.edges.iter().filter(|edge| live.contains(&edge.destination)) {
            edges.push_str(&format!(
                "{} -> {} [label={}]\n",
                node.id,
                edge.destination,
                serde_json::to_string(&edge.label)?
            ));
        }
    }

    Ok(format!("digraph graphname{{\n{}{}}}", labels, edges))
}

/// Describe the whole graph, or the neighborhood `(center, levels)` of one node
pub fn export_dot<B: NodeBackend>(
    graph: &TextGraph<B>,
    center: Option<(NodeId, usize)>,
    styles: &NodeStyles,
) -> Result<String> {
    let nodes = match center {
        Some((id, levels)) => graph.neighborhood(id, levels)?,
        None => graph.live_nodes()?,
    };
    to_dot(&nodes, styles)
}

/// Pipe a description into the configured renderer and wait for it to exit
pub fn render(description: &str, config: &ExportConfig) -> Result<()> {
    log_debug!("Rendering with {} {:?}", config.renderer, config.renderer_args);
    let mut child = Command::new(&config.renderer)
        .args(&config.renderer_args)
        .stdin(Stdio::piped())
        .spawn()?;

    // stdin is dropped before waiting so the renderer sees end of input
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(description.as_bytes()),
        None => Ok(()),
    };
    let status = child.wait()?;
    written?;
    if !status.success() {
        return Err(Error::Io(std::io::Error::other(format!(
            "{} exited with {}",
            config.renderer, status
        ))));
    }
    Ok(())
}

impl<B: NodeBackend> TextGraph<B> {
    /// Write the whole-graph description to `<file>.dot`
    pub fn save_dot(&self) -> Result<()> {
        let source = self
            .source()
            .ok_or_else(|| Error::config("Graph has no backing file"))?;
        if source.is_read_only() {
            return Err(Error::permission(format!("{} is read only.", source)));
        }
        let path = source
            .dot_path()
            .ok_or_else(|| Error::config(format!("{} has no local path", source)))?;
        std::fs::write(&path, export_dot(self, None, &NodeStyles::new())?)?;
        log_info!("Wrote {}", path.display());
        Ok(())
    }
}
