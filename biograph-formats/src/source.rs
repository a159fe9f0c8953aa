//! The Source contract
//!
//! A Source is constructed from [`crate::SourceOptions`], then drained
//! exactly once through [`Source::parse`]. The returned stream yields
//! [`Record`]s lazily; per-record problems are logged to the source's
//! shared error aggregator and the offending record is skipped, never
//! aborting the stream.

use std::cell::RefCell;
use std::rc::Rc;

use biograph_core::{Edge, ErrorAggregator, Node, Record, Result};

/// Error aggregator shared between a source and its in-flight stream.
///
/// The pipeline is single-threaded, so `Rc<RefCell<…>>` suffices.
pub type SharedErrors = Rc<RefCell<ErrorAggregator>>;

/// A lazy, single-use stream of records.
pub type RecordStream<'a> = Box<dyn Iterator<Item = Record> + 'a>;

/// A producer of node and edge records from a format-specific input.
///
/// Sources are single-use, forward-only, and finite. I/O handles are held
/// until the stream is drained or dropped.
pub trait Source {
    /// Drain the input into a lazy record stream. Calling this a second
    /// time yields an empty stream.
    fn parse(&mut self) -> Result<RecordStream<'_>>;

    /// The aggregator collecting this source's per-record problems.
    fn errors(&self) -> SharedErrors;

    /// Take the accumulated per-record problems, leaving an empty
    /// aggregator behind. Call after the stream is drained.
    fn take_errors(&self) -> ErrorAggregator {
        self.errors().borrow_mut().clone_and_clear()
    }

    /// Node records only. Consumes the source like `parse`.
    fn read_nodes(&mut self) -> Result<Box<dyn Iterator<Item = Node> + '_>> {
        let stream = self.parse()?;
        Ok(Box::new(stream.filter_map(|r| match r {
            Record::Node(n) => Some(n),
            Record::Edge(_) => None,
        })))
    }

    /// Edge records only. Consumes the source like `parse`.
    fn read_edges(&mut self) -> Result<Box<dyn Iterator<Item = Edge> + '_>> {
        let stream = self.parse()?;
        Ok(Box::new(stream.filter_map(|r| match r {
            Record::Edge(e) => Some(e),
            Record::Node(_) => None,
        })))
    }
}

/// Extension used internally by `take_errors`.
pub(crate) trait CloneAndClear {
    fn clone_and_clear(&mut self) -> ErrorAggregator;
}

impl CloneAndClear for ErrorAggregator {
    fn clone_and_clear(&mut self) -> ErrorAggregator {
        let out = self.clone();
        self.clear();
        out
    }
}

/// Fresh shared aggregator for a new source.
pub fn shared_errors() -> SharedErrors {
    Rc::new(RefCell::new(ErrorAggregator::new()))
}
