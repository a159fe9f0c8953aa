//! Graph-store source and sink
//!
//! The in-memory endpoints of the pipeline: `GraphSource` replays a
//! populated [`MemoryGraph`] as a record stream (nodes first, then edges,
//! both in insertion order), and `GraphSink` accumulates a stream into a
//! store for graph-level operations.

use std::rc::Rc;

use tracing::debug;

use crate::sink::Sink;
use crate::source::{shared_errors, RecordStream, SharedErrors, Source};
use biograph_core::{Edge, ErrorKind, MemoryGraph, MessageLevel, Node, Record, Result};

/// Replays a populated graph store as a record stream.
pub struct GraphSource {
    graph: Option<MemoryGraph>,
    errors: SharedErrors,
}

impl GraphSource {
    pub fn new(graph: MemoryGraph) -> Self {
        Self {
            graph: Some(graph),
            errors: shared_errors(),
        }
    }
}

impl Source for GraphSource {
    fn parse(&mut self) -> Result<RecordStream<'_>> {
        let graph = match self.graph.take() {
            Some(g) => g,
            None => return Ok(Box::new(std::iter::empty())),
        };
        let (nodes, edges) = graph.into_records();
        debug!(nodes = nodes.len(), edges = edges.len(), "replaying graph store");
        Ok(Box::new(
            nodes
                .into_iter()
                .map(Record::Node)
                .chain(edges.into_iter().map(Record::Edge)),
        ))
    }

    fn errors(&self) -> SharedErrors {
        Rc::clone(&self.errors)
    }
}

/// Accumulates a record stream into a graph store.
///
/// Scalar conflicts produced by record merging surface as
/// `SCALAR_CONFLICT` warnings on the sink's aggregator, which the
/// transformer folds into the run report.
pub struct GraphSink {
    graph: MemoryGraph,
    errors: SharedErrors,
}

impl GraphSink {
    pub fn new() -> Self {
        Self {
            graph: MemoryGraph::new(),
            errors: shared_errors(),
        }
    }

    pub fn with_graph(graph: MemoryGraph) -> Self {
        Self {
            graph,
            errors: shared_errors(),
        }
    }

    /// Hand the populated store back, consuming the sink.
    pub fn into_graph(self) -> MemoryGraph {
        self.graph
    }

    pub fn graph(&self) -> &MemoryGraph {
        &self.graph
    }

    pub fn errors(&self) -> SharedErrors {
        Rc::clone(&self.errors)
    }
}

impl Default for GraphSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for GraphSink {
    fn write_node(&mut self, node: &Node) -> Result<()> {
        let id = node.id.clone();
        let outcome = self.graph.add_node(node.clone());
        if outcome.merged {
            self.errors.borrow_mut().log(
                MessageLevel::Warning,
                ErrorKind::DuplicateNode,
                "Node id collision merged",
                &id,
            );
        }
        for field in outcome.conflicts {
            self.errors.borrow_mut().log(
                MessageLevel::Warning,
                ErrorKind::ScalarConflict,
                format!("Conflicting values for '{}'; first wins", field),
                &id,
            );
        }
        Ok(())
    }

    fn write_edge(&mut self, edge: &Edge) -> Result<()> {
        let id = edge.id.clone();
        let (_, outcome) = self.graph.add_edge(edge.clone());
        for field in outcome.conflicts {
            self.errors.borrow_mut().log(
                MessageLevel::Warning,
                ErrorKind::ScalarConflict,
                format!("Conflicting values for '{}'; first wins", field),
                &id,
            );
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_then_source_preserves_order() {
        let mut sink = GraphSink::new();
        let mut a = Node::new("B:2");
        a.category.push("biolink:Gene".into());
        sink.write_node(&a).unwrap();
        let mut b = Node::new("A:1");
        b.category.push("biolink:Disease".into());
        sink.write_node(&b).unwrap();
        sink.write_edge(&Edge::new("B:2", "biolink:related_to", "A:1"))
            .unwrap();
        sink.finalize().unwrap();

        let mut source = GraphSource::new(sink.into_graph());
        let ids: Vec<String> = source
            .parse()
            .unwrap()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], "B:2");
        assert_eq!(ids[1], "A:1");
    }

    #[test]
    fn test_duplicate_node_warning() {
        let mut sink = GraphSink::new();
        sink.write_node(&Node::new("X:1")).unwrap();
        sink.write_node(&Node::new("X:1")).unwrap();
        let errors = sink.errors();
        assert_eq!(
            errors
                .borrow()
                .subjects(MessageLevel::Warning, ErrorKind::DuplicateNode),
            vec!["X:1"]
        );
    }
}
