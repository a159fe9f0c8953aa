//! Null sink

use crate::sink::Sink;
use biograph_core::{Edge, Node, Result};

/// Discards every record. Useful when only inspectors matter (counting,
/// validation, summarization) and no output artifact is wanted.
#[derive(Debug, Default)]
pub struct NullSink {
    nodes_seen: usize,
    edges_seen: usize,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes_seen(&self) -> usize {
        self.nodes_seen
    }

    pub fn edges_seen(&self) -> usize {
        self.edges_seen
    }
}

impl Sink for NullSink {
    fn write_node(&mut self, _node: &Node) -> Result<()> {
        self.nodes_seen += 1;
        Ok(())
    }

    fn write_edge(&mut self, _edge: &Edge) -> Result<()> {
        self.edges_seen += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}
