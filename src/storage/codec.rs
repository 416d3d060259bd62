//! Line-oriented persistence codec
//!
//! A graph file is a header (the leading run of blank and `#` lines, kept
//! verbatim) followed by one JSON array per line. Two record shapes exist:
//!
//! - id-tagged: `[id, text-or-null, [[label, destination], ...]]`
//! - positional: `[text-or-null, [[label, destination], ...]]`, where the id is
//!   the record's ordinal position
//!
//! Records are written with `", "` separators between array items and with
//! non-ASCII characters escaped as `\uXXXX`, so files written by older tools
//! load and save byte for byte.
//!
//! Files from the first editor, a single JSON array of `[text, [destination, ...]]`
//! pairs, are also read. They load as positional graphs with unlabeled edges.

use crate::core::error::{Error, Result};
use crate::core::types::{Edge, Node, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use serde_json::Value;
use std::io;

/// Record shape used by a graph file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// `[id, text, edges]`, sparse and stable ids
    #[default]
    IdTagged,
    /// `[text, edges]`, id is the line ordinal
    Positional,
}

/// Decoded contents of a graph file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphDocument {
    /// Leading blank/comment lines, each terminated by `\n`
    pub header: String,
    /// Record shape of the body
    pub format: RecordFormat,
    /// Every record, tombstones included, in file order
    pub nodes: Vec<Node>,
}

/// JSON formatter writing `", "` between array items and ASCII-only strings
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (index, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..index].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units).iter() {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = index + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }
}

/// Serialize `value` as a single JSON line (no trailing newline)
pub fn to_json_line<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
}

fn is_header_line(line: &str) -> bool {
    line.is_empty() || line.starts_with('#')
}

/// Decode a graph file.
///
/// `input` names the file or URL in error messages. An empty body decodes with
/// `default_format`; otherwise the first record decides the shape and every
/// later record must match it.
pub fn decode(input: &str, text: &str, default_format: RecordFormat) -> Result<GraphDocument> {
    if let Some(document) = decode_single_array(text) {
        return Ok(document);
    }

    let mut header = String::new();
    let mut reading_header = true;
    let mut format: Option<RecordFormat> = None;
    let mut nodes = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut position: NodeId = 0;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        if is_header_line(line) {
            if reading_header {
                header.push_str(line);
                header.push('\n');
            }
            continue;
        }
        reading_header = false;

        let value: Value =
            serde_json::from_str(line).map_err(|e| Error::parse(input, line_no, e))?;
        let shape = record_shape(&value).ok_or_else(|| {
            Error::parse(
                input,
                line_no,
                "expected [id, text, edges] or [text, edges]",
            )
        })?;

        match format {
            None => format = Some(shape),
            Some(expected) if expected != shape => {
                return Err(Error::parse(input, line_no, "mixed record shapes"));
            }
            Some(_) => {}
        }

        let node = match shape {
            RecordFormat::IdTagged => {
                let (id, text, edges): (NodeId, Option<String>, Vec<Edge>) =
                    serde_json::from_value(value).map_err(|e| Error::parse(input, line_no, e))?;
                Node { id, text, edges }
            }
            RecordFormat::Positional => {
                let (text, edges): (Option<String>, Vec<Edge>) =
                    serde_json::from_value(value).map_err(|e| Error::parse(input, line_no, e))?;
                let node = Node {
                    id: position,
                    text,
                    edges,
                };
                position += 1;
                node
            }
        };

        if !seen.insert(node.id) {
            return Err(Error::parse(
                input,
                line_no,
                format!("duplicate node id {}", node.id),
            ));
        }
        nodes.push(node);
    }

    Ok(GraphDocument {
        header,
        format: format.unwrap_or(default_format),
        nodes,
    })
}

/// Whole-file `[[text, [destination, ...]], ...]` table; `None` for any other text
fn decode_single_array(text: &str) -> Option<GraphDocument> {
    if !text.trim_start().starts_with("[[") {
        return None;
    }
    let table: Vec<(Option<String>, Vec<NodeId>)> = serde_json::from_str(text).ok()?;
    let nodes = table
        .into_iter()
        .zip(0..)
        .map(|((text, links), id)| Node {
            id,
            text,
            edges: links.into_iter().map(|destination| Edge::new("", destination)).collect(),
        })
        .collect();
    Some(GraphDocument {
        header: String::new(),
        format: RecordFormat::Positional,
        nodes,
    })
}

fn record_shape(value: &Value) -> Option<RecordFormat> {
    let items = value.as_array()?;
    match items.len() {
        3 if items[0].is_u64() => Some(RecordFormat::IdTagged),
        2 if items[0].is_string() || items[0].is_null() => Some(RecordFormat::Positional),
        _ => None,
    }
}

/// Encode nodes (in any order) as a graph file.
///
/// Id-tagged output lists every record sorted by id. Positional output fills
/// gaps with tombstones and drops the trailing run of tombstones.
pub fn encode(header: &str, format: RecordFormat, nodes: &[Node]) -> Result<String> {
    let mut sorted: Vec<&Node> = nodes.iter().collect();
    sorted.sort_by_key(|node| node.id);

    let mut out = String::from(header);
    match format {
        RecordFormat::IdTagged => {
            for node in sorted {
                out.push_str(&to_json_line(&(node.id, &node.text, &node.edges))?);
                out.push('\n');
            }
        }
        RecordFormat::Positional => {
            let last_live = sorted.iter().rev().find(|node| node.is_live()).map(|node| node.id);
            if let Some(last_live) = last_live {
                let no_edges: Vec<Edge> = Vec::new();
                let mut records = sorted.into_iter().peekable();
                for id in 0..=last_live {
                    let record = match records.peek() {
                        Some(node) if node.id == id => records.next(),
                        _ => None,
                    };
                    let line = match record {
                        Some(node) => to_json_line(&(&node.text, &node.edges))?,
                        None => to_json_line(&(Option::<&str>::None, &no_edges))?,
                    };
                    out.push_str(&line);
                    out.push('\n');
                }
            }
        }
    }
    Ok(out)
}

/// Encode a decoded document
pub fn encode_document(document: &GraphDocument) -> Result<String> {
    encode(&document.header, document.format, &document.nodes)
}
