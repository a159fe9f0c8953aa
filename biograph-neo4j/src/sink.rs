//! Batched writes into the property-graph database

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde_json::{json, Value as JsonValue};
use tracing::{debug, info};

use crate::client::{quote_label, CypherClient, Neo4jConfig};
use biograph_formats::Sink;
use biograph_core::{Edge, Node, Result};
use biograph_vocab::biolink;

/// Buffers records and flushes them as `UNWIND ... MERGE` batches.
///
/// Nodes merge on `id` under their primary label; relationships merge on
/// `(subject, predicate, object)`. `finalize()` flushes the remainders
/// and creates a unique-on-id constraint for every label written.
pub struct Neo4jSink {
    client: CypherClient,
    batch_size: usize,
    /// Node rows buffered per primary label
    node_batches: BTreeMap<String, Vec<JsonValue>>,
    /// Edge rows buffered per relationship type
    edge_batches: BTreeMap<String, Vec<JsonValue>>,
    labels_written: BTreeSet<String>,
    finalized: bool,
}

impl Neo4jSink {
    /// Connect to the database; auth failures surface here.
    pub fn connect(config: Neo4jConfig) -> Result<Self> {
        let client = CypherClient::connect(&config)?;
        Ok(Self {
            client,
            batch_size: config.batch_size,
            node_batches: BTreeMap::new(),
            edge_batches: BTreeMap::new(),
            labels_written: BTreeSet::new(),
            finalized: false,
        })
    }

    fn flush_nodes(&mut self, label: &str) -> Result<()> {
        let rows = match self.node_batches.remove(label) {
            Some(rows) if !rows.is_empty() => rows,
            _ => return Ok(()),
        };
        debug!(label, count = rows.len(), "flushing node batch");
        let query = format!(
            "UNWIND $rows AS row MERGE (n:{} {{id: row.id}}) SET n += row",
            quote_label(label)
        );
        self.client.run(&query, json!({ "rows": rows }))?;
        Ok(())
    }

    fn flush_edges(&mut self, predicate: &str) -> Result<()> {
        let rows = match self.edge_batches.remove(predicate) {
            Some(rows) if !rows.is_empty() => rows,
            _ => return Ok(()),
        };
        debug!(predicate, count = rows.len(), "flushing edge batch");
        let query = format!(
            "UNWIND $rows AS row \
             MATCH (s {{id: row.subject}}) MATCH (o {{id: row.object}}) \
             MERGE (s)-[p:{}]->(o) SET p += row",
            quote_label(predicate)
        );
        self.client.run(&query, json!({ "rows": rows }))?;
        Ok(())
    }
}

impl Sink for Neo4jSink {
    fn write_node(&mut self, node: &Node) -> Result<()> {
        let label = node
            .category
            .first()
            .cloned()
            .unwrap_or_else(|| biolink::NAMED_THING.to_string());
        self.labels_written.insert(label.clone());
        let row = node.to_json();
        let batch = self.node_batches.entry(label.clone()).or_default();
        batch.push(row);
        if batch.len() >= self.batch_size {
            self.flush_nodes(&label)?;
        }
        Ok(())
    }

    fn write_edge(&mut self, edge: &Edge) -> Result<()> {
        let predicate = edge.predicate.clone();
        let row = edge.to_json();
        let batch = self.edge_batches.entry(predicate.clone()).or_default();
        batch.push(row);
        if batch.len() >= self.batch_size {
            self.flush_edges(&predicate)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        let labels: Vec<String> = self.node_batches.keys().cloned().collect();
        for label in labels {
            self.flush_nodes(&label)?;
        }
        let predicates: Vec<String> = self.edge_batches.keys().cloned().collect();
        for predicate in predicates {
            self.flush_edges(&predicate)?;
        }
        for label in &self.labels_written {
            let query = format!(
                "CREATE CONSTRAINT IF NOT EXISTS FOR (n:{}) REQUIRE n.id IS UNIQUE",
                quote_label(label)
            );
            self.client.run(&query, json!({}))?;
        }
        info!(labels = self.labels_written.len(), "database sink finalized");
        self.finalized = true;
        Ok(())
    }
}
