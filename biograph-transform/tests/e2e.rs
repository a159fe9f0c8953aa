//! End-to-end pipeline scenarios

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use biograph_core::{Error, Record};
use biograph_formats::{Format, SinkOptions, SourceOptions};
use biograph_transform::{
    FnInspector, GraphEntityType, InfoResRule, InputArgs, OutputArgs, Transformer,
};

fn init_logs() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

fn write_tabular_fixture(dir: &std::path::Path) -> (PathBuf, PathBuf) {
    let nodes = dir.join("graph_nodes.tsv");
    let edges = dir.join("graph_edges.tsv");
    std::fs::write(
        &nodes,
        "id\tcategory\tname\nHGNC:11603\tbiolink:Gene\tTBX4\nMONDO:0005002\tbiolink:Disease\tCOPD\n",
    )
    .unwrap();
    std::fs::write(
        &edges,
        "id\tsubject\tpredicate\tobject\ne1\tHGNC:11603\tbiolink:contributes_to\tMONDO:0005002\n",
    )
    .unwrap();
    (nodes, edges)
}

fn input_for(format: Format, files: Vec<PathBuf>) -> InputArgs {
    InputArgs {
        source: SourceOptions::for_files(format, files),
        ..Default::default()
    }
}

/// Tabular -> JSON -> tabular keeps every original field intact.
#[test]
fn tabular_json_round_trip() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    let (nodes, edges) = write_tabular_fixture(dir.path());
    let json_path = dir.path().join("graph.json");

    let mut to_json = Transformer::new();
    to_json
        .transform(
            input_for(Format::Tsv, vec![nodes, edges]),
            Some(OutputArgs::new(SinkOptions::new(Format::Json, &json_path))),
            None,
        )
        .unwrap();
    assert!(to_json.report().is_empty());

    let back = dir.path().join("back");
    std::fs::create_dir_all(&back).unwrap();
    let mut to_tsv = Transformer::new();
    to_tsv
        .transform(
            input_for(Format::Json, vec![json_path]),
            Some(OutputArgs::new(SinkOptions::new(
                Format::Tsv,
                back.join("graph"),
            ))),
            None,
        )
        .unwrap();

    let store = to_tsv.store().unwrap();
    assert_eq!(store.node_count(), 2);
    assert_eq!(store.edge_count(), 1);

    let nodes_out = std::fs::read_to_string(back.join("graph_nodes.tsv")).unwrap();
    let mut lines = nodes_out.lines();
    let header: Vec<&str> = lines.next().unwrap().split('\t').collect();
    let id_col = header.iter().position(|c| *c == "id").unwrap();
    let cat_col = header.iter().position(|c| *c == "category").unwrap();
    let name_col = header.iter().position(|c| *c == "name").unwrap();
    let rows: Vec<Vec<&str>> = lines.map(|l| l.split('\t').collect()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][id_col], "HGNC:11603");
    assert_eq!(rows[0][cat_col], "biolink:Gene");
    assert_eq!(rows[0][name_col], "TBX4");
    assert_eq!(rows[1][id_col], "MONDO:0005002");
    assert_eq!(rows[1][name_col], "COPD");

    let edges_out = std::fs::read_to_string(back.join("graph_edges.tsv")).unwrap();
    let mut lines = edges_out.lines();
    let header: Vec<&str> = lines.next().unwrap().split('\t').collect();
    let row: Vec<&str> = lines.next().unwrap().split('\t').collect();
    let get = |name: &str| row[header.iter().position(|c| *c == name).unwrap()];
    assert_eq!(get("id"), "e1");
    assert_eq!(get("subject"), "HGNC:11603");
    assert_eq!(get("predicate"), "biolink:contributes_to");
    assert_eq!(get("object"), "MONDO:0005002");
}

/// Streaming null-sink transform: the inspector sees every record, in
/// order, with nothing retained.
#[test]
fn streaming_null_sink_inspector_counts() {
    let dir = tempfile::tempdir().unwrap();
    let nodes_path = dir.path().join("big_nodes.jsonl");
    let edges_path = dir.path().join("big_edges.jsonl");

    let mut nodes = String::new();
    for i in 0..178 {
        nodes.push_str(&format!(
            "{{\"id\": \"HGNC:{}\", \"category\": [\"biolink:Gene\"]}}\n",
            i + 1
        ));
    }
    std::fs::write(&nodes_path, nodes).unwrap();

    let mut edges = String::new();
    for i in 0..503 {
        edges.push_str(&format!(
            "{{\"subject\": \"HGNC:{}\", \"predicate\": \"biolink:interacts_with\", \"object\": \"HGNC:{}\"}}\n",
            (i % 178) + 1,
            ((i + 7) % 178) + 1
        ));
    }
    std::fs::write(&edges_path, edges).unwrap();

    let mut node_count = 0usize;
    let mut edge_count = 0usize;
    let mut ordered = true;
    let mut seen_edge = false;
    let mut counter = FnInspector(|entity: GraphEntityType, _record: &Record| match entity {
        GraphEntityType::Node => {
            node_count += 1;
            if seen_edge {
                ordered = false;
            }
        }
        GraphEntityType::Edge => {
            edge_count += 1;
            seen_edge = true;
        }
    });

    let mut transformer = Transformer::streaming();
    transformer
        .transform(
            input_for(Format::Jsonl, vec![nodes_path, edges_path]),
            Some(OutputArgs::new(SinkOptions::new(
                Format::Null,
                dir.path().join("ignored"),
            ))),
            Some(&mut counter),
        )
        .unwrap();

    assert_eq!(node_count, 178);
    assert_eq!(edge_count, 503);
    assert!(ordered, "sink order must match source emission order");
    assert!(transformer.store().is_none());
}

/// InfoRes rewrite rule `(" database$", "", "infores")` mints
/// `infores:string` from `STRING database` and records the catalog entry.
#[test]
fn infores_rewrite_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let nodes = dir.path().join("g_nodes.tsv");
    let edges = dir.path().join("g_edges.tsv");
    std::fs::write(&nodes, "id\tcategory\nHGNC:1\tbiolink:Gene\nHGNC:2\tbiolink:Gene\n")
        .unwrap();
    std::fs::write(
        &edges,
        "id\tsubject\tpredicate\tobject\tprimary_knowledge_source\n\
         e1\tHGNC:1\tbiolink:interacts_with\tHGNC:2\tSTRING database\n",
    )
    .unwrap();

    let mut input = input_for(Format::Tsv, vec![nodes, edges]);
    input.infores_rewrite = Some(InfoResRule::Rewrite(vec![
        " database$".to_string(),
        String::new(),
        "infores".to_string(),
    ]));

    let mut transformer = Transformer::new();
    transformer.transform(input, None, None).unwrap();

    let store = transformer.store().unwrap();
    let (_, edge) = store.edges().next().unwrap();
    assert_eq!(
        edge.primary_knowledge_source.as_deref(),
        Some("infores:string")
    );
    assert_eq!(
        transformer.infores_catalog().get("STRING database"),
        Some(&"infores:string".to_string())
    );

    let catalog_path = dir.path().join("infores-catalog.json");
    transformer.write_infores_catalog(&catalog_path).unwrap();
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&catalog_path).unwrap()).unwrap();
    assert_eq!(written["STRING database"], "infores:string");
}

/// Empty input: empty output, no errors.
#[test]
fn empty_source_empty_sink() {
    let dir = tempfile::tempdir().unwrap();
    let nodes = dir.path().join("empty_nodes.tsv");
    let edges = dir.path().join("empty_edges.tsv");
    std::fs::write(&nodes, "id\tcategory\n").unwrap();
    std::fs::write(&edges, "id\tsubject\tpredicate\tobject\n").unwrap();

    let mut transformer = Transformer::new();
    transformer
        .transform(input_for(Format::Tsv, vec![nodes, edges]), None, None)
        .unwrap();
    let store = transformer.store().unwrap();
    assert_eq!(store.node_count(), 0);
    assert_eq!(store.edge_count(), 0);
    assert!(transformer.report().is_empty());
}

/// Edges with undeclared endpoints materialize placeholder nodes with
/// the root entity category.
#[test]
fn dangling_endpoints_materialize() {
    let dir = tempfile::tempdir().unwrap();
    let edges = dir.path().join("only_edges.tsv");
    std::fs::write(
        &edges,
        "id\tsubject\tpredicate\tobject\ne1\tHGNC:1\tbiolink:related_to\tMONDO:1\n",
    )
    .unwrap();

    let mut transformer = Transformer::new();
    transformer
        .transform(input_for(Format::Tsv, vec![edges]), None, None)
        .unwrap();
    let store = transformer.store().unwrap();
    assert_eq!(store.node_count(), 2);
    assert_eq!(
        store.node("HGNC:1").unwrap().category,
        vec!["biolink:NamedThing"]
    );
}

/// Filtering during the transform equals filtering the written output.
#[test]
fn filter_commutes_with_serialization() {
    let dir = tempfile::tempdir().unwrap();
    let nodes = dir.path().join("f_nodes.tsv");
    std::fs::write(
        &nodes,
        "id\tcategory\nHGNC:1\tbiolink:Gene\nMONDO:1\tbiolink:Disease\nHGNC:2\tbiolink:Gene\n",
    )
    .unwrap();

    // Unfiltered pass.
    let mut unfiltered = Transformer::new();
    unfiltered
        .transform(input_for(Format::Tsv, vec![nodes.clone()]), None, None)
        .unwrap();
    let all_ids: Vec<String> = unfiltered
        .store()
        .unwrap()
        .nodes()
        .filter(|n| n.category.contains(&"biolink:Gene".to_string()))
        .map(|n| n.id.clone())
        .collect();

    // Filtered pass.
    let mut input = input_for(Format::Tsv, vec![nodes]);
    input
        .source
        .node_filters
        .category
        .insert("biolink:Gene".to_string());
    let mut filtered = Transformer::new();
    filtered.transform(input, None, None).unwrap();
    let filtered_ids: Vec<String> = filtered
        .store()
        .unwrap()
        .nodes()
        .map(|n| n.id.clone())
        .collect();

    assert_eq!(filtered_ids, all_ids);
}

/// The cancel signal aborts cleanly with the dedicated error.
#[test]
fn cancel_between_records() {
    let dir = tempfile::tempdir().unwrap();
    let nodes = dir.path().join("c_nodes.tsv");
    std::fs::write(&nodes, "id\tcategory\nHGNC:1\tbiolink:Gene\n").unwrap();

    let cancel = Arc::new(AtomicBool::new(true));
    let mut transformer = Transformer::new();
    transformer.set_cancel(Arc::clone(&cancel));
    let result = transformer.transform(input_for(Format::Tsv, vec![nodes]), None, None);
    assert!(matches!(result, Err(Error::Cancelled)));

    // Clearing the signal lets the next transform proceed.
    cancel.store(false, Ordering::Relaxed);
}

/// Unknown-prefix identifiers are dropped and aggregated.
#[test]
fn unknown_prefix_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let nodes = dir.path().join("u_nodes.tsv");
    std::fs::write(
        &nodes,
        "id\tcategory\nHGNC:1\tbiolink:Gene\nWAT:1\tbiolink:Gene\n",
    )
    .unwrap();

    let mut transformer = Transformer::new();
    transformer
        .transform(input_for(Format::Tsv, vec![nodes]), None, None)
        .unwrap();
    assert_eq!(transformer.store().unwrap().node_count(), 1);
    let tree = transformer.report().to_json();
    assert_eq!(
        tree["ERROR"]["UNKNOWN_PREFIX"]["CURIE prefix not in prefix map"],
        serde_json::json!(["WAT:1"])
    );
}
