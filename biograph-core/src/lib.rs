//! Core types for biograph
//!
//! This crate provides the foundation the rest of the ecosystem builds on:
//!
//! - [`error`] - the shared error type and `Result` alias
//! - [`value`] - the dynamic property value sum type
//! - [`record`] - Node and Edge records with merge semantics
//! - [`graph`] - the in-memory multi-edge property graph store
//! - [`prefix`] - bidirectional CURIE/IRI prefix manager
//! - [`report`] - per-record error aggregation for validation reports
//!
//! # Design
//!
//! Records carry typed core fields plus a `properties` map for everything
//! else, so unknown columns survive a round-trip through any format.
//! Per-record failures are values routed into the [`report::ErrorAggregator`];
//! only structural failures (bad configuration, I/O) surface as `Err`.

pub mod error;
pub mod graph;
pub mod prefix;
pub mod record;
pub mod report;
pub mod value;

pub use error::{Error, Result};
pub use graph::{EdgeKey, MemoryGraph};
pub use prefix::PrefixManager;
pub use record::{Edge, Node, Record};
pub use report::{ErrorAggregator, ErrorKind, MessageLevel};
pub use value::PropertyValue;
