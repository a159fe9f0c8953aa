//! Meta-knowledge-graph generation
//!
//! Produces the content-metadata document describing what a graph
//! contains rather than the graph itself: per-class node metadata
//! (`id_prefixes`, `count`, `count_by_source`) and one entry per
//! `(subject class, predicate, object class)` edge pattern with its
//! relations and counts. Stream-compatible: pass nodes first so edge
//! patterns attribute endpoint classes exactly.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde_json::{json, Value as JsonValue};

use biograph_core::{
    Edge, ErrorAggregator, ErrorKind, MessageLevel, Node, PrefixManager, Record, Result,
};
use biograph_vocab::biolink;

use crate::transformer::{GraphEntityType, Inspector};

#[derive(Debug, Default)]
struct NodeMeta {
    id_prefixes: BTreeSet<String>,
    count: usize,
    count_by_source: BTreeMap<String, usize>,
}

#[derive(Debug, Default)]
struct EdgeMeta {
    relations: BTreeSet<String>,
    count: usize,
    count_by_source: BTreeMap<String, usize>,
}

/// Accumulates content metadata from a record stream.
pub struct MetaKnowledgeGraph {
    nodes: BTreeMap<String, NodeMeta>,
    edges: BTreeMap<(String, String, String), EdgeMeta>,
    /// First category seen per node id
    node_categories: FxHashMap<String, String>,
    errors: ErrorAggregator,
}

impl MetaKnowledgeGraph {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            node_categories: FxHashMap::default(),
            errors: ErrorAggregator::new(),
        }
    }

    pub fn add_node(&mut self, node: &Node) {
        let category = match node.category.first() {
            Some(c) => c.clone(),
            None => {
                self.errors.log(
                    MessageLevel::Warning,
                    ErrorKind::NoCategory,
                    "Node lacks category",
                    &node.id,
                );
                biolink::NAMED_THING.to_string()
            }
        };
        self.node_categories
            .insert(node.id.clone(), category.clone());
        let meta = self.nodes.entry(category).or_default();
        meta.count += 1;
        if let Some(prefix) = PrefixManager::prefix_of(&node.id) {
            meta.id_prefixes.insert(prefix.to_string());
        }
        for source in &node.provided_by {
            *meta.count_by_source.entry(source.clone()).or_insert(0) += 1;
        }
    }

    pub fn add_edge(&mut self, edge: &Edge) {
        if edge.predicate.is_empty() {
            self.errors.log(
                MessageLevel::Warning,
                ErrorKind::NoEdgePredicate,
                "Edge has no predicate",
                &edge.id,
            );
            return;
        }
        let subject = self.category_of(&edge.subject);
        let object = self.category_of(&edge.object);
        let meta = self
            .edges
            .entry((subject, edge.predicate.clone(), object))
            .or_default();
        meta.count += 1;
        if let Some(relation) = edge
            .properties
            .get("relation")
            .and_then(|v| v.as_str())
        {
            meta.relations.insert(relation.to_string());
        }
        let sources: Vec<String> = match &edge.primary_knowledge_source {
            Some(primary) => vec![primary.clone()],
            None => edge.provided_by.clone(),
        };
        for source in sources {
            *meta.count_by_source.entry(source).or_insert(0) += 1;
        }
    }

    fn category_of(&self, node_id: &str) -> String {
        self.node_categories
            .get(node_id)
            .cloned()
            .unwrap_or_else(|| biolink::NAMED_THING.to_string())
    }

    /// Anomalies observed while accumulating.
    pub fn report(&self) -> &ErrorAggregator {
        &self.errors
    }

    /// The content-metadata document.
    pub fn to_json(&self) -> JsonValue {
        let nodes: BTreeMap<&String, JsonValue> = self
            .nodes
            .iter()
            .map(|(category, meta)| {
                (
                    category,
                    json!({
                        "id_prefixes": meta.id_prefixes,
                        "count": meta.count,
                        "count_by_source": meta.count_by_source,
                    }),
                )
            })
            .collect();
        let edges: Vec<JsonValue> = self
            .edges
            .iter()
            .map(|((subject, predicate, object), meta)| {
                json!({
                    "subject": subject,
                    "predicate": predicate,
                    "object": object,
                    "relations": meta.relations,
                    "count": meta.count,
                    "count_by_source": meta.count_by_source,
                })
            })
            .collect();
        json!({ "nodes": nodes, "edges": edges })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(&mut out, &self.to_json())?;
        out.write_all(b"\n")?;
        Ok(())
    }
}

impl Default for MetaKnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector for MetaKnowledgeGraph {
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

    /// Two nodes, one edge: one metadata entry per class and pattern.
    #[test]
    fn test_two_nodes_one_edge() {
        let mut mkg = MetaKnowledgeGraph::new();
        let mut gene = Node::new("HGNC:11603");
        gene.category.push("biolink:Gene".into());
        mkg.add_node(&gene);
        let mut disease = Node::new("MONDO:0005002");
        disease.category.push("biolink:Disease".into());
        mkg.add_node(&disease);
        mkg.add_edge(&Edge::new(
            "HGNC:11603",
            "biolink:contributes_to",
            "MONDO:0005002",
        ));

        let doc = mkg.to_json();
        assert_eq!(doc["nodes"]["biolink:Gene"]["count"], 1);
        assert_eq!(doc["nodes"]["biolink:Disease"]["count"], 1);
        assert_eq!(
            doc["nodes"]["biolink:Gene"]["id_prefixes"],
            serde_json::json!(["HGNC"])
        );
        let edges = doc["edges"].as_array().unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0]["subject"], "biolink:Gene");
        assert_eq!(edges[0]["predicate"], "biolink:contributes_to");
        assert_eq!(edges[0]["object"], "biolink:Disease");
        assert_eq!(edges[0]["count"], 1);
    }

    #[test]
    fn test_count_by_source_uses_primary() {
        let mut mkg = MetaKnowledgeGraph::new();
        let mut edge = Edge::new("A:1", "biolink:related_to", "B:2");
        edge.primary_knowledge_source = Some("infores:string".into());
        mkg.add_edge(&edge);
        let doc = mkg.to_json();
        assert_eq!(
            doc["edges"][0]["count_by_source"]["infores:string"],
            1
        );
    }

    #[test]
    fn test_missing_category_flagged() {
        let mut mkg = MetaKnowledgeGraph::new();
        mkg.add_node(&Node::new("X:1"));
        assert!(!mkg
            .report()
            .subjects(MessageLevel::Warning, ErrorKind::NoCategory)
            .is_empty());
    }
}
