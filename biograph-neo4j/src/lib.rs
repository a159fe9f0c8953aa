//! Property-graph database source and sink
//!
//! Talks to a Neo4j-compatible database through its transactional Cypher
//! HTTP endpoint. Reads page through nodes and relationships with
//! `SKIP`/`LIMIT`; writes batch through `UNWIND ... MERGE` keyed on `id`
//! for nodes and `(subject, predicate, object)` for relationships.
//! `finalize()` flushes remaining batches and installs a unique-on-id
//! constraint per node label.
//!
//! Credentials (URI, user, password) come from [`Neo4jConfig`]; requests
//! carry a per-operation timeout that surfaces as the transient
//! `DatabaseTimeout` error.

pub mod client;
pub mod sink;
pub mod source;

pub use client::{CypherClient, Neo4jConfig};
pub use sink::Neo4jSink;
pub use source::Neo4jSource;
