use super::*;
use crate::core::config::StorageConfig;
use crate::core::error::{Error, OpFailure};
use crate::core::types::{Edge, IncomingEdge, Node, NodeId};
use crate::storage::{GraphSource, NodeBackend};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::io::Cursor;

fn server_with(nodes: Vec<Node>, read_only: bool) -> GraphServer {
    GraphServer::from_nodes(nodes, read_only)
}

fn reply(server: &mut GraphServer, line: &str) -> (String, String) {
    server.handle_line(line).unwrap().unwrap()
}

fn sample_nodes() -> Vec<Node> {
    vec![
        Node::new(0, "root", vec![Edge::new("a", 1)]),
        Node::new(1, "one", vec![Edge::new("b", 2)]),
        Node::new(2, "two", vec![]),
    ]
}

/// Incoming edges computed by scanning every stored node
fn scan_incoming(server: &GraphServer) -> BTreeMap<NodeId, Vec<IncomingEdge>> {
    let mut index: BTreeMap<NodeId, Vec<IncomingEdge>> = BTreeMap::new();
    for node in server.nodes() {
        for edge in &node.edges {
            index
                .entry(edge.destination)
                .or_default()
                .push(IncomingEdge::from_edge(node.id, edge));
        }
    }
    for edges in index.values_mut() {
        edges.sort();
    }
    index
}

fn assert_index_matches_scan(server: &GraphServer) {
    let scanned = scan_incoming(server);
    let mut ids: Vec<NodeId> = scanned.keys().copied().collect();
    ids.extend(server.nodes().map(|node| node.id));
    for id in ids {
        let expected = scanned.get(&id).cloned().unwrap_or_default();
        assert_eq!(server.incoming(id), expected.as_slice(), "incoming edges of {}", id);
    }
}

#[test]
fn upsert_then_query_round_trips() {
    let mut server = server_with(sample_nodes(), false);
    let (nodes, statuses) = reply(&mut server, r#"[[1, "T", [["l", 2]]]]"#);
    assert_eq!(nodes, r#"[[1, "T", [["l", 2]], [[0, "a", 1]]]]"#);
    assert_eq!(statuses, "[null]");

    let (nodes, statuses) = reply(&mut server, "[[1]]");
    assert_eq!(nodes, r#"[[1, "T", [["l", 2]], [[0, "a", 1]]]]"#);
    assert_eq!(statuses, "[null]");
    assert_eq!(server.incoming(2), &[IncomingEdge::from_edge(1, &Edge::new("l", 2))]);
}

#[test]
fn read_only_rejects_writes_and_keeps_state() {
    let mut server = server_with(sample_nodes(), true);
    let (nodes, statuses) = reply(&mut server, r#"[[1, "T", [["l", 2]]], [2, null], [null], [1]]"#);
    assert_eq!(
        nodes,
        r#"[[1, "one", [["b", 2]], [[0, "a", 1]]], [2, "two", [], [[1, "b", 2]]], [null, null, [], []], [1, "one", [["b", 2]], [[0, "a", 1]]]]"#
    );
    assert_eq!(statuses, r#"["Read only", "Read only", "Read only", null]"#);
    assert_eq!(server.node(1), Some(&Node::new(1, "one", vec![Edge::new("b", 2)])));
    assert!(!server.is_dirty());
}

#[test]
fn unknown_ids_report_missing_square() {
    let mut server = server_with(sample_nodes(), false);
    let (nodes, statuses) = reply(&mut server, "[[7], [8, null]]");
    assert_eq!(nodes, "[[7, null, [], []], [8, null, [], []]]");
    assert_eq!(statuses, r#"["Square does not exist.", "Square does not exist."]"#);
}

#[test]
fn empty_request_lists_live_nodes() {
    let mut server = server_with(sample_nodes(), false);
    reply(&mut server, "[[null]]");
    let response = server.handle(Request::ListAll);
    let ids: Vec<Option<NodeId>> = response.nodes.iter().map(|node| node.id).collect();
    assert_eq!(ids, vec![Some(0), Some(1), Some(2)]);
    assert!(response.statuses.iter().all(Result::is_ok));
}

#[test]
fn allocation_reserves_fresh_queryable_ids() {
    let mut server = server_with(sample_nodes(), false);
    let (nodes, statuses) = reply(&mut server, "[null]");
    assert_eq!(nodes, "[[3, null, [], []]]");
    assert_eq!(statuses, "[null]");
    assert_eq!(reply(&mut server, "[[3]]").0, "[[3, null, [], []]]");

    let (nodes, _) = reply(&mut server, r#"[[null, "new", [["up", 0]]]]"#);
    assert_eq!(nodes, r#"[[4, "new", [["up", 0]], []]]"#);

    // explicit ids move the cursor past themselves
    reply(&mut server, r#"[[10, "far"]]"#);
    assert_eq!(reply(&mut server, "[[null]]").0, "[[11, null, [], []]]");
}

#[test]
fn upsert_without_edges_keeps_existing_edges() {
    let mut server = server_with(sample_nodes(), false);
    let (nodes, _) = reply(&mut server, r#"[[1, "renamed"]]"#);
    assert_eq!(nodes, r#"[[1, "renamed", [["b", 2]], [[0, "a", 1]]]]"#);
    let (nodes, _) = reply(&mut server, r#"[[5, "fresh"]]"#);
    assert_eq!(nodes, r#"[[5, "fresh", [], []]]"#);
}

#[test]
fn delete_drops_reverse_entries() {
    let mut server = server_with(sample_nodes(), false);
    let (nodes, statuses) = reply(&mut server, "[[1, null]]");
    assert_eq!(nodes, r#"[[1, null, [], [[0, "a", 1]]]]"#);
    assert_eq!(statuses, "[null]");
    assert!(server.incoming(2).is_empty());
    assert_index_matches_scan(&server);
}

#[test]
fn reverse_index_is_sorted() {
    let mut server = server_with(sample_nodes(), false);
    reply(&mut server, r#"[[5, "z", [["q", 2]]], [3, "y", [["p", 2], ["a", 2]]]]"#);
    let origins: Vec<(NodeId, &str)> = server
        .incoming(2)
        .iter()
        .map(|edge| (edge.origin, edge.label.as_str()))
        .collect();
    assert_eq!(origins, vec![(1, "b"), (3, "a"), (3, "p"), (5, "q")]);
}

#[test]
fn comments_and_blank_lines_get_no_reply() {
    let mut server = GraphServer::new();
    assert!(server.handle_line("").unwrap().is_none());
    assert!(server.handle_line("# note").unwrap().is_none());
}

#[test]
fn strict_serving_stops_at_malformed_line() {
    let mut server = GraphServer::new();
    let input = Cursor::new("[[0]]\n\n[[0, \n[[0]]\n");
    let mut output = Vec::new();
    let err = server.serve(input, &mut output, ServeMode::Strict).unwrap_err();
    match err {
        Error::Parse { input, line, .. } => {
            assert_eq!(input, "request");
            assert_eq!(line, 3);
        }
        other => panic!("unexpected error {:?}", other),
    }
    let written = String::from_utf8(output).unwrap();
    assert_eq!(written, "[[0, \"\", [], []]]\n[null]\n");
}

#[test]
fn repl_serving_reports_and_continues() {
    let mut server = GraphServer::new();
    let input = Cursor::new("nonsense\n[[0, \"hi\"]]\n");
    let mut output = Vec::new();
    server.serve(input, &mut output, ServeMode::Repl).unwrap();
    let written = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Cannot load request: error on line 1"));
    assert_eq!(lines[1], "[[0, \"hi\", [], []]]");
    assert_eq!(lines[2], "[null]");
}

#[test]
fn repl_serving_skips_invalid_utf8() {
    let mut server = GraphServer::new();
    let mut input = b"[[0, \"\xff\"]]\n".to_vec();
    input.extend_from_slice(b"[[0]]\n");
    let mut output = Vec::new();
    server.serve(Cursor::new(input), &mut output, ServeMode::Repl).unwrap();
    let written = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Cannot load request: error on line 1"));
    assert_eq!(lines[1], "[[0, \"\", [], []]]");
}

#[test]
fn strict_serving_stops_at_invalid_utf8() {
    let mut server = GraphServer::new();
    let input = Cursor::new(b"[[0]]\n\xfe\n[[0]]\n".to_vec());
    let mut output = Vec::new();
    let err = server.serve(input, &mut output, ServeMode::Strict).unwrap_err();
    assert!(matches!(err, Error::Parse { line: 2, .. }));
    assert_eq!(String::from_utf8(output).unwrap().lines().count(), 2);
}

#[test]
fn root_delete_is_refused() {
    let mut server = server_with(sample_nodes(), false);
    let (nodes, statuses) = reply(&mut server, "[[0, null], [2, null]]");
    assert_eq!(
        nodes,
        r#"[[0, "root", [["a", 1]], []], [2, null, [], [[1, "b", 2]]]]"#
    );
    assert_eq!(statuses, r#"["The root square can not be deleted.", null]"#);
    assert_eq!(server.node(0), Some(&Node::new(0, "root", vec![Edge::new("a", 1)])));
    assert_eq!(server.handle(Request::ListAll).nodes.len(), 2);
}

#[test]
fn largest_id_does_not_overflow_the_cursor() {
    let mut server = GraphServer::new();
    let (_, statuses) = reply(&mut server, "[[18446744073709551615, \"x\"]]");
    assert_eq!(statuses, "[null]");
    assert_eq!(server.node(NodeId::MAX).unwrap().text.as_deref(), Some("x"));

    let (nodes, statuses) = reply(&mut server, "[[null, \"y\"]]");
    assert_eq!(nodes, "[[null, null, [], []]]");
    assert_eq!(statuses, r#"["No free square ids."]"#);
    assert_eq!(server.node(NodeId::MAX).unwrap().text.as_deref(), Some("x"));
}

#[test]
fn open_and_save_preserve_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("served.tg");
    std::fs::write(&path, "# served\n[0, \"root\", [[\"a\", 1]]]\n[1, \"one\", []]\n").unwrap();

    let mut server = GraphServer::open(GraphSource::File(path.clone()), &StorageConfig::default()).unwrap();
    assert!(!server.is_read_only());
    assert_eq!(server.incoming(1).len(), 1);
    reply(&mut server, r#"[[1, "uno"]]"#);
    assert!(server.is_dirty());
    server.save().unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "# served\n[0, \"root\", [[\"a\", 1]]]\n[1, \"uno\", []]\n"
    );
}

#[test]
fn client_graph_keeps_local_undo_over_a_channel() {
    let (transport, handle) = ChannelTransport::spawn(server_with(sample_nodes(), false));
    let mut graph = ClientGraph::connect(transport, false);

    graph.stage(&Node::new(2, "two!", vec![Edge::new("home", 0)]));
    assert!(graph.apply().unwrap());
    assert_eq!(graph.require_node(2).unwrap().text.as_deref(), Some("two!"));
    assert_eq!(graph.incoming_edges(0).unwrap().len(), 1);

    graph.undo().unwrap();
    assert_eq!(graph.require_node(2).unwrap(), Node::new(2, "two", vec![]));
    graph.redo().unwrap();
    assert_eq!(graph.require_node(2).unwrap().text.as_deref(), Some("two!"));

    drop(graph);
    let server = handle.join().unwrap();
    assert_eq!(server.node(2).unwrap().text.as_deref(), Some("two!"));
    assert_index_matches_scan(&server);
}

#[test]
fn client_graph_runs_structural_deletes() {
    let nodes = vec![
        Node::new(0, "root", vec![Edge::new("a", 1)]),
        Node::new(1, "leaf", vec![]),
    ];
    let (transport, handle) = ChannelTransport::spawn(server_with(nodes, false));
    let mut graph = ClientGraph::connect(transport, false);

    graph.delete_subtree(1).unwrap();
    assert_eq!(graph.live_nodes().unwrap(), vec![Node::new(0, "root", vec![])]);
    assert!(graph.node(1).unwrap().is_none());

    let child = graph.new_linked_node(0, "child").unwrap();
    assert_eq!(child, 2);
    graph.delete_node(child).unwrap();
    assert_eq!(graph.live_ids().unwrap(), vec![0]);

    graph.undo().unwrap();
    assert_eq!(graph.live_ids().unwrap(), vec![0, 2]);

    drop(graph);
    assert_index_matches_scan(&handle.join().unwrap());
}

#[test]
fn clients_sharing_a_server_see_each_other() {
    let (transport, handle) = ChannelTransport::spawn(GraphServer::new());
    let mut first = ClientGraph::connect(transport.clone(), false);
    let second = ClientGraph::connect(transport, false);

    let id = first.allocate().unwrap();
    first.stage(&Node::new(id, "shared", vec![]));
    first.apply().unwrap();
    assert_eq!(second.require_node(id).unwrap().text.as_deref(), Some("shared"));

    drop(first);
    drop(second);
    handle.join().unwrap();
}

#[test]
fn read_only_client_refuses_writes() {
    let (transport, handle) = ChannelTransport::spawn(server_with(sample_nodes(), true));
    let mut graph = ClientGraph::connect(transport, true);
    graph.stage(&Node::new(1, "x", vec![]));
    assert!(graph.apply().unwrap_err().is_permission());
    assert!(graph.allocate().unwrap_err().is_permission());
    assert_eq!(graph.require_node(1).unwrap().text.as_deref(), Some("one"));
    drop(graph);
    handle.join().unwrap();
}

#[test]
fn backend_surfaces_server_read_only_status() {
    // client believes it may write, the server says otherwise
    let (transport, handle) = ChannelTransport::spawn(server_with(sample_nodes(), true));
    let mut backend = RemoteBackend::new(transport, false);
    let err = backend.commit(&[Node::new(1, "x", vec![])]).unwrap_err();
    assert!(err.is_permission());
    assert!(matches!(
        OpFailure::ReadOnly.into_error(Some(1)),
        Error::Permission(_)
    ));
    drop(backend);
    handle.join().unwrap();
}

#[derive(Debug, Clone)]
enum WriteOp {
    Upsert(NodeId, Option<Vec<(String, NodeId)>>),
    Delete(NodeId),
    Allocate(Vec<(String, NodeId)>),
}

fn edge_list() -> impl Strategy<Value = Vec<(String, NodeId)>> {
    prop::collection::vec(("[a-c]", 0..8u64), 0..4)
}

fn write_op() -> impl Strategy<Value = WriteOp> {
    prop_oneof![
        (0..8u64, prop::option::of(edge_list())).prop_map(|(id, edges)| WriteOp::Upsert(id, edges)),
        (0..8u64).prop_map(WriteOp::Delete),
        edge_list().prop_map(WriteOp::Allocate),
    ]
}

fn to_edges(edges: &[(String, NodeId)]) -> Vec<Edge> {
    edges.iter().map(|(label, dest)| Edge::new(label.clone(), *dest)).collect()
}

proptest! {
    #[test]
    fn reverse_index_equals_brute_force_scan(
        batches in prop::collection::vec(prop::collection::vec(write_op(), 1..4), 1..12)
    ) {
        let mut server = GraphServer::new();
        for batch in batches {
            let operations = batch
                .iter()
                .map(|op| match op {
                    WriteOp::Upsert(id, edges) => Operation::Upsert {
                        id: *id,
                        text: format!("n{}", id),
                        edges: edges.as_deref().map(to_edges),
                    },
                    WriteOp::Delete(id) => Operation::Delete(*id),
                    WriteOp::Allocate(edges) => Operation::Allocate {
                        text: Some("new".to_string()),
                        edges: to_edges(edges),
                    },
                })
                .collect();
            let response = server.handle(Request::Batch(operations));
            prop_assert_eq!(response.nodes.len(), response.statuses.len());

            let scanned = scan_incoming(&server);
            for id in 0..16u64 {
                let expected = scanned.get(&id).cloned().unwrap_or_default();
                prop_assert_eq!(server.incoming(id), expected.as_slice());
            }
        }
    }
}
