//! Text graph assembly translator
//!
//! A program is laid out as a graph: every edge of the root starts a section
//! named by the edge label, and each instruction node links to the next one
//! through an edge carrying that same label. Unlabeled edges are operands.
//! An operand node that has edges of its own is referenced by its label,
//! otherwise its text is inlined.

use crate::core::error::Result;
use crate::core::types::{Node, NodeId, ROOT_ID};
use crate::storage::{NodeBackend, TextGraph};
use crate::log_warn;
use std::collections::HashSet;

/// Section that receives the program entry point
const TEXT_SECTION: &str = ".text";

/// Assembler label of an instruction node
pub fn square_label(id: NodeId) -> String {
    format!("square{}", id)
}

/// Drop a trailing `;` comment. `;` inside single quotes is kept and `\`
/// escapes the next character within quotes.
pub fn strip_comment(text: &str) -> &str {
    let mut quoted = false;
    let mut escaped = false;
    for (index, ch) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if quoted {
            match ch {
                '\\' => escaped = true,
                '\'' => quoted = false,
                _ => {}
            }
        } else if ch == '\'' {
            quoted = true;
        } else if ch == ';' {
            return &text[..index];
        }
    }
    text
}

fn node_text(node: &Node) -> &str {
    node.text.as_deref().unwrap_or_default()
}

impl<B: NodeBackend> TextGraph<B> {
    /// Translate the graph into textual assembly
    pub fn to_asm(&self) -> Result<String> {
        let mut asm = String::new();
        for section in self.require_node(ROOT_ID)?.edges {
            asm.push_str(&format!("section {}\n", section.label));
            if section.label == TEXT_SECTION {
                asm.push_str("global      _start\n_start:\n");
            }

            let mut visited = HashSet::new();
            let mut current = Some(section.destination);
            while let Some(id) = current {
                if !visited.insert(id) {
                    log_warn!("Section {} loops back to node {}", section.label, id);
                    break;
                }
                let square = self.require_node(id)?;
                let mut operands = Vec::new();
                for edge in square.edges.iter().filter(|edge| edge.label.is_empty()) {
                    let operand = self.require_node(edge.destination)?;
                    if operand.edges.is_empty() {
                        operands.push(strip_comment(node_text(&operand)).to_string());
                    } else {
                        operands.push(square_label(operand.id));
                    }
                }
                asm.push_str(&format!(
                    "{}:\t{}\t{}\n",
                    square_label(id),
                    strip_comment(node_text(&square)),
                    operands.join(",")
                ));
                current = square
                    .edges
                    .iter()
                    .find(|edge| edge.label == section.label)
                    .map(|edge| edge.destination);
            }
        }
        Ok(asm)
    }
}
