//! Paged reads from the property-graph database

use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::client::{quote_label, CypherClient, Neo4jConfig};
use biograph_formats::source::{shared_errors, RecordStream, SharedErrors, Source};
use biograph_formats::{EdgeFilter, NodeFilter};
use biograph_core::{Edge, ErrorKind, MessageLevel, Node, Record, Result};

/// Streams nodes then relationships out of the database in fixed pages.
///
/// Category/label and predicate filters are pushed into the Cypher
/// queries, so filtered records never cross the wire.
pub struct Neo4jSource {
    config: Neo4jConfig,
    node_filters: NodeFilter,
    edge_filters: EdgeFilter,
    provided_by: Option<String>,
    client: Option<CypherClient>,
    errors: SharedErrors,
}

impl Neo4jSource {
    /// Connect to the database; auth failures surface here.
    pub fn connect(
        config: Neo4jConfig,
        node_filters: NodeFilter,
        edge_filters: EdgeFilter,
        provided_by: Option<String>,
    ) -> Result<Self> {
        let client = CypherClient::connect(&config)?;
        Ok(Self {
            config,
            node_filters,
            edge_filters,
            provided_by,
            client: Some(client),
            errors: shared_errors(),
        })
    }

    fn node_query(&self) -> String {
        let label = self
            .node_filters
            .category
            .iter()
            .next()
            .map(|c| format!(":{}", quote_label(c)))
            .unwrap_or_default();
        format!(
            "MATCH (n{label}) RETURN properties(n), labels(n) ORDER BY n.id SKIP $skip LIMIT $limit"
        )
    }

    fn edge_query(&self) -> String {
        let predicate = self
            .edge_filters
            .predicate
            .iter()
            .next()
            .map(|p| format!(":{}", quote_label(p)))
            .unwrap_or_default();
        format!(
            "MATCH (s)-[p{predicate}]->(o) RETURN properties(p), type(p), s.id, o.id \
             ORDER BY s.id SKIP $skip LIMIT $limit"
        )
    }
}

impl Source for Neo4jSource {
    fn parse(&mut self) -> Result<RecordStream<'_>> {
        let client = match self.client.take() {
            Some(c) => c,
            None => return Ok(Box::new(std::iter::empty())),
        };
        Ok(Box::new(Neo4jStream {
            client,
            node_query: self.node_query(),
            edge_query: self.edge_query(),
            page_size: self.config.page_size,
            provided_by: self.provided_by.clone(),
            phase: Phase::Nodes,
            skip: 0,
            page: VecDeque::new(),
            errors: Rc::clone(&self.errors),
        }))
    }

    fn errors(&self) -> SharedErrors {
        Rc::clone(&self.errors)
    }
}

#[derive(PartialEq)]
enum Phase {
    Nodes,
    Edges,
    Done,
}

struct Neo4jStream {
    client: CypherClient,
    node_query: String,
    edge_query: String,
    page_size: usize,
    provided_by: Option<String>,
    phase: Phase,
    skip: usize,
    page: VecDeque<Record>,
    errors: SharedErrors,
}

impl Neo4jStream {
    fn fetch_page(&mut self) -> bool {
        let query = match self.phase {
            Phase::Nodes => &self.node_query,
            Phase::Edges => &self.edge_query,
            Phase::Done => return false,
        };
        let params = json!({"skip": self.skip, "limit": self.page_size});
        let rows = match self.client.run(query, params) {
            Ok(rows) => rows,
            Err(e) => {
                self.errors.borrow_mut().log(
                    MessageLevel::Error,
                    ErrorKind::MalformedRecord,
                    "Database page fetch failed",
                    e.to_string(),
                );
                self.phase = Phase::Done;
                return false;
            }
        };
        let fetched = rows.len();
        debug!(fetched, skip = self.skip, "fetched database page");
        for row in rows {
            match self.phase {
                Phase::Nodes => self.push_node(row),
                Phase::Edges => self.push_edge(row),
                Phase::Done => {}
            }
        }
        self.skip += fetched;
        if fetched < self.page_size {
            // Phase exhausted; roll over.
            self.phase = match self.phase {
                Phase::Nodes => Phase::Edges,
                _ => Phase::Done,
            };
            self.skip = 0;
        }
        true
    }

    fn push_node(&mut self, row: Vec<JsonValue>) {
        let mut iter = row.into_iter();
        let (Some(props), labels) = (iter.next(), iter.next()) else {
            return;
        };
        let Some(mut obj) = props.as_object().cloned() else {
            return;
        };
        if let Some(JsonValue::Array(labels)) = labels {
            if !obj.contains_key("category") && !labels.is_empty() {
                obj.insert("category".to_string(), JsonValue::Array(labels));
            }
        }
        match Node::from_json(&obj) {
            Some(mut node) => {
                if node.provided_by.is_empty() {
                    if let Some(pb) = &self.provided_by {
                        node.provided_by.push(pb.clone());
                    }
                }
                self.page.push_back(Record::Node(node));
            }
            None => {
                self.errors.borrow_mut().log(
                    MessageLevel::Error,
                    ErrorKind::MissingNodeProperty,
                    "Database node has no 'id' property",
                    JsonValue::Object(obj).to_string(),
                );
            }
        }
    }

    fn push_edge(&mut self, row: Vec<JsonValue>) {
        let mut iter = row.into_iter();
        let (Some(props), Some(rel_type), Some(subject), Some(object)) =
            (iter.next(), iter.next(), iter.next(), iter.next())
        else {
            return;
        };
        let Some(mut obj) = props.as_object().cloned() else {
            return;
        };
        if let (Some(s), Some(o)) = (subject.as_str(), object.as_str()) {
            obj.insert("subject".to_string(), JsonValue::String(s.to_string()));
            obj.insert("object".to_string(), JsonValue::String(o.to_string()));
        }
        if !obj.contains_key("predicate") {
            if let Some(t) = rel_type.as_str() {
                obj.insert("predicate".to_string(), JsonValue::String(t.to_string()));
            }
        }
        match Edge::from_json(&obj) {
            Some(mut edge) => {
                if edge.provided_by.is_empty() {
                    if let Some(pb) = &self.provided_by {
                        edge.provided_by.push(pb.clone());
                    }
                }
                self.page.push_back(Record::Edge(edge));
            }
            None => {
                self.errors.borrow_mut().log(
                    MessageLevel::Error,
                    ErrorKind::InvalidEdgeTriple,
                    "Database relationship lacks endpoint ids",
                    JsonValue::Object(obj).to_string(),
                );
            }
        }
    }
}

impl Iterator for Neo4jStream {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            if let Some(record) = self.page.pop_front() {
                return Some(record);
            }
            if self.phase == Phase::Done {
                return None;
            }
            if !self.fetch_page() && self.page.is_empty() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_shapes() {
        let source = Neo4jSource {
            config: Neo4jConfig::default(),
            node_filters: NodeFilter::default(),
            edge_filters: EdgeFilter::default(),
            provided_by: None,
            client: None,
            errors: shared_errors(),
        };
        assert!(source.node_query().starts_with("MATCH (n)"));
        assert!(source.node_query().contains("SKIP $skip LIMIT $limit"));

        let mut filtered = Neo4jSource {
            config: Neo4jConfig::default(),
            node_filters: NodeFilter::default(),
            edge_filters: EdgeFilter::default(),
            provided_by: None,
            client: None,
            errors: shared_errors(),
        };
        filtered.node_filters.category.insert("biolink:Gene".into());
        filtered
            .edge_filters
            .predicate
            .insert("biolink:related_to".into());
        assert!(filtered.node_query().contains("`biolink:Gene`"));
        assert!(filtered.edge_query().contains("`biolink:related_to`"));
    }
}
