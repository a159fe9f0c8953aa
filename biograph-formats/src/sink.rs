//! The Sink contract

use biograph_core::{Edge, Node, Result};

/// A consumer of node and edge records producing format-specific output.
///
/// Sinks are write-only and single-use. `finalize` flushes buffers,
/// closes handles, and optionally combines multiple output files into a
/// single archive; it must be called even after upstream failure so
/// partial output lands on disk deterministically.
pub trait Sink {
    fn write_node(&mut self, node: &Node) -> Result<()>;

    fn write_edge(&mut self, edge: &Edge) -> Result<()>;

    /// Flush and close. Idempotent: a second call is a no-op.
    fn finalize(&mut self) -> Result<()>;
}
