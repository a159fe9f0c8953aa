//! Graph summarization
//!
//! A stream-compatible inspector that tallies node counts per category,
//! edge counts per `(subject category, predicate, object category)`
//! triple type, and optional facet counts over configurable properties.
//! Emits YAML or JSON. Anomalies (unrecognized prefixes, edges whose
//! endpoints never appeared) go through the error aggregator.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde_json::{json, Value as JsonValue};

use biograph_core::{
    Edge, Error, ErrorAggregator, ErrorKind, MessageLevel, Node, PrefixManager, Record, Result,
};
use biograph_vocab::biolink;

use crate::transformer::{GraphEntityType, Inspector};

/// Output flavour for a saved summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryFormat {
    Yaml,
    Json,
}

/// Accumulates graph statistics from a record stream.
pub struct Summarizer {
    name: String,
    /// Properties to facet on (e.g. `provided_by`)
    facet_properties: Vec<String>,
    total_nodes: usize,
    total_edges: usize,
    count_by_category: BTreeMap<String, usize>,
    count_by_predicate: BTreeMap<String, usize>,
    /// Keyed `subject_category-predicate-object_category`
    count_by_spo: BTreeMap<String, usize>,
    /// facet property -> value -> count
    node_facets: BTreeMap<String, BTreeMap<String, usize>>,
    edge_facets: BTreeMap<String, BTreeMap<String, usize>>,
    /// First category seen per node id, for triple-type attribution
    node_categories: FxHashMap<String, String>,
    prefixes: PrefixManager,
    errors: ErrorAggregator,
}

impl Summarizer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            facet_properties: vec!["provided_by".to_string()],
            total_nodes: 0,
            total_edges: 0,
            count_by_category: BTreeMap::new(),
            count_by_predicate: BTreeMap::new(),
            count_by_spo: BTreeMap::new(),
            node_facets: BTreeMap::new(),
            edge_facets: BTreeMap::new(),
            node_categories: FxHashMap::default(),
            prefixes: PrefixManager::new(),
            errors: ErrorAggregator::new(),
        }
    }

    /// Replace the default facet property set.
    pub fn with_facet_properties(mut self, properties: Vec<String>) -> Self {
        self.facet_properties = properties;
        self
    }

    pub fn add_node(&mut self, node: &Node) {
        self.total_nodes += 1;
        let category = node
            .category
            .first()
            .cloned()
            .unwrap_or_else(|| biolink::NAMED_THING.to_string());
        *self.count_by_category.entry(category.clone()).or_insert(0) += 1;
        self.node_categories.insert(node.id.clone(), category);

        if let Some(prefix) = PrefixManager::prefix_of(&node.id) {
            if self.prefixes.expand(&node.id).is_err() {
                self.errors.log(
                    MessageLevel::Warning,
                    ErrorKind::UnknownPrefix,
                    format!("Prefix '{}' is not recognized", prefix),
                    &node.id,
                );
            }
        }
        for facet in &self.facet_properties {
            for value in node.field_values(facet) {
                *self
                    .node_facets
                    .entry(facet.clone())
                    .or_default()
                    .entry(value)
                    .or_insert(0) += 1;
            }
        }
    }

    pub fn add_edge(&mut self, edge: &Edge) {
        self.total_edges += 1;
        *self
            .count_by_predicate
            .entry(edge.predicate.clone())
            .or_insert(0) += 1;

        let subject_category = self.category_of(&edge.subject);
        let object_category = self.category_of(&edge.object);
        let spo = format!("{}-{}-{}", subject_category, edge.predicate, object_category);
        *self.count_by_spo.entry(spo).or_insert(0) += 1;

        for endpoint in [&edge.subject, &edge.object] {
            if !self.node_categories.contains_key(endpoint) {
                self.errors.log(
                    MessageLevel::Warning,
                    ErrorKind::MissingNode,
                    "Edge references a node that never appeared in the stream",
                    endpoint,
                );
            }
        }
        for facet in &self.facet_properties {
            for value in edge.field_values(facet) {
                *self
                    .edge_facets
                    .entry(facet.clone())
                    .or_default()
                    .entry(value)
                    .or_insert(0) += 1;
            }
        }
    }

    fn category_of(&self, node_id: &str) -> String {
        self.node_categories
            .get(node_id)
            .cloned()
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Anomalies observed while summarizing.
    pub fn report(&self) -> &ErrorAggregator {
        &self.errors
    }

    /// The summary document.
    pub fn summary(&self) -> JsonValue {
        json!({
            "graph_name": self.name,
            "generated_on": chrono::Utc::now().to_rfc3339(),
            "node_stats": {
                "total_nodes": self.total_nodes,
                "node_categories": self.count_by_category.keys().collect::<Vec<_>>(),
                "count_by_category": self.count_by_category,
                "facets": self.node_facets,
            },
            "edge_stats": {
                "total_edges": self.total_edges,
                "predicates": self.count_by_predicate.keys().collect::<Vec<_>>(),
                "count_by_predicate": self.count_by_predicate,
                "count_by_spo": self.count_by_spo,
                "facets": self.edge_facets,
            },
        })
    }

    /// Render as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.summary())
            .map_err(|e| Error::other(format!("summary serialization failed: {e}")))
    }

    /// Write the summary to a file in the chosen flavour.
    pub fn save(&self, path: &Path, format: SummaryFormat) -> Result<()> {
        let mut out = std::fs::File::create(path)?;
        match format {
            SummaryFormat::Json => {
                serde_json::to_writer_pretty(&mut out, &self.summary())?;
                out.write_all(b"\n")?;
            }
            SummaryFormat::Yaml => {
                out.write_all(self.to_yaml()?.as_bytes())?;
            }
        }
        Ok(())
    }
}

impl Inspector for Summarizer {
    fn inspect(&mut self, entity: GraphEntityType, record: &Record) {
        match (entity, record) {
            (GraphEntityType::Node, Record::Node(node)) => self.add_node(node),
            (GraphEntityType::Edge, Record::Edge(edge)) => self.add_edge(edge),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Summarizer {
        let mut s = Summarizer::new("test-graph");
        let mut gene = Node::new("HGNC:11603");
        gene.category.push("biolink:Gene".into());
        gene.provided_by.push("infores:hgnc".into());
        s.add_node(&gene);
        let mut disease = Node::new("MONDO:0005002");
        disease.category.push("biolink:Disease".into());
        s.add_node(&disease);
        let edge = Edge::new("HGNC:11603", "biolink:contributes_to", "MONDO:0005002");
        s.add_edge(&edge);
        s
    }

    #[test]
    fn test_counts() {
        let s = sample();
        let summary = s.summary();
        assert_eq!(summary["node_stats"]["total_nodes"], 2);
        assert_eq!(
            summary["node_stats"]["count_by_category"]["biolink:Gene"],
            1
        );
        assert_eq!(summary["edge_stats"]["total_edges"], 1);
        assert_eq!(
            summary["edge_stats"]["count_by_spo"]
                ["biolink:Gene-biolink:contributes_to-biolink:Disease"],
            1
        );
    }

    #[test]
    fn test_facets() {
        let s = sample();
        let summary = s.summary();
        assert_eq!(
            summary["node_stats"]["facets"]["provided_by"]["infores:hgnc"],
            1
        );
    }

    #[test]
    fn test_missing_endpoint_flagged() {
        let mut s = Summarizer::new("g");
        s.add_edge(&Edge::new("X:1", "biolink:related_to", "Y:2"));
        assert!(!s
            .report()
            .subjects(MessageLevel::Warning, ErrorKind::MissingNode)
            .is_empty());
    }

    #[test]
    fn test_yaml_output() {
        let s = sample();
        let yaml = s.to_yaml().unwrap();
        assert!(yaml.contains("total_nodes: 2"));
        assert!(yaml.contains("biolink:Gene"));
    }
}
