//! Multi-graph merge
//!
//! Folds two or more graph stores into one. The largest input (by edge
//! count) becomes the target so the bulk of the records never move.
//! Nodes merge by id, edges by the `(subject, predicate, object,
//! primary_knowledge_source)` key, both under the record field-union
//! rules; scalar mismatches keep the first value seen and log a
//! `SCALAR_CONFLICT` warning.

use tracing::info;

use biograph_core::{ErrorAggregator, ErrorKind, MemoryGraph, MessageLevel};

/// Merge all `graphs` into one store.
///
/// Returns the merged store; per-record merge warnings accumulate in
/// `report`.
pub fn merge_graphs(mut graphs: Vec<MemoryGraph>, report: &mut ErrorAggregator) -> MemoryGraph {
    if graphs.is_empty() {
        return MemoryGraph::new();
    }
    // Largest graph is the target, minimizing moved records.
    let largest_index = graphs
        .iter()
        .enumerate()
        .max_by_key(|(_, g)| g.edge_count())
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut target = graphs.swap_remove(largest_index);
    info!(
        nodes = target.node_count(),
        edges = target.edge_count(),
        sources = graphs.len() + 1,
        "merging graphs"
    );

    for graph in graphs {
        let (nodes, edges) = graph.into_records();
        for node in nodes {
            let id = node.id.clone();
            let outcome = target.add_node(node);
            if outcome.merged {
                report.log(
                    MessageLevel::Warning,
                    ErrorKind::DuplicateNode,
                    "Node id present in multiple graphs; merged",
                    &id,
                );
            }
            for field in outcome.conflicts {
                report.log(
                    MessageLevel::Warning,
                    ErrorKind::ScalarConflict,
                    format!("Conflicting values for '{}'; first wins", field),
                    &id,
                );
            }
        }
        for edge in edges {
            let id = edge.id.clone();
            let (_, outcome) = target.add_edge(edge);
            for field in outcome.conflicts {
                report.log(
                    MessageLevel::Warning,
                    ErrorKind::ScalarConflict,
                    format!("Conflicting values for '{}'; first wins", field),
                    &id,
                );
            }
        }
    }
    target
}
