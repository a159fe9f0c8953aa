//! TRAPI knowledge-graph source
//!
//! Consumes the Translator Reasoner API shape: `knowledge_graph.nodes`
//! is an object keyed by node id, `knowledge_graph.edges` an object keyed
//! by edge id. `categories` becomes `category`, `attributes` fold into
//! properties keyed by `attribute_type_id`, and each `sources[]` entry
//! lands in the knowledge-source slot named by its `resource_role`.

use std::rc::Rc;

use serde_json::Value as JsonValue;

use crate::io::open_reader;
use crate::json_scan::JsonContainerScanner;
use crate::options::SourceOptions;
use crate::source::{shared_errors, RecordStream, SharedErrors, Source};
use biograph_core::{
    Edge, Error, ErrorKind, MessageLevel, Node, PropertyValue, Record, Result,
};

/// Reads records from a TRAPI knowledge-graph document.
pub struct TrapiSource {
    options: Option<SourceOptions>,
    errors: SharedErrors,
}

impl TrapiSource {
    pub fn new(options: SourceOptions) -> Result<Self> {
        if options.filename.len() != 1 {
            return Err(Error::config("trapi-json source expects exactly one file"));
        }
        Ok(Self {
            options: Some(options),
            errors: shared_errors(),
        })
    }

    fn fold_attributes(obj: &JsonValue, properties: &mut impl FnMut(String, PropertyValue)) {
        let Some(attributes) = obj.get("attributes").and_then(|v| v.as_array()) else {
            return;
        };
        for attr in attributes {
            let (Some(type_id), Some(value)) = (
                attr.get("attribute_type_id").and_then(|v| v.as_str()),
                attr.get("value"),
            ) else {
                continue;
            };
            if let Some(v) = PropertyValue::from_json(value) {
                properties(type_id.to_string(), v);
            }
        }
    }

    fn read_node(key: &str, obj: &JsonValue) -> Node {
        let mut node = Node::new(key);
        if let Some(name) = obj.get("name").and_then(|v| v.as_str()) {
            node.name = Some(name.to_string());
        }
        if let Some(categories) = obj.get("categories").and_then(|v| v.as_array()) {
            for c in categories {
                if let Some(c) = c.as_str() {
                    if !node.category.contains(&c.to_string()) {
                        node.category.push(c.to_string());
                    }
                }
            }
        }
        Self::fold_attributes(obj, &mut |key, value| {
            node.properties.insert(key, value);
        });
        node.ensure_category();
        node
    }

    fn read_edge(key: &str, obj: &JsonValue) -> Option<Edge> {
        let subject = obj.get("subject")?.as_str()?;
        let predicate = obj.get("predicate")?.as_str()?;
        let object = obj.get("object")?.as_str()?;
        let mut edge = Edge::new(subject, predicate, object);
        edge.id = key.to_string();
        if let Some(sources) = obj.get("sources").and_then(|v| v.as_array()) {
            for source in sources {
                let (Some(resource_id), Some(role)) = (
                    source.get("resource_id").and_then(|v| v.as_str()),
                    source.get("resource_role").and_then(|v| v.as_str()),
                ) else {
                    continue;
                };
                match role {
                    "primary_knowledge_source" => {
                        edge.primary_knowledge_source = Some(resource_id.to_string())
                    }
                    "aggregator_knowledge_source" => {
                        if !edge
                            .aggregator_knowledge_source
                            .contains(&resource_id.to_string())
                        {
                            edge.aggregator_knowledge_source.push(resource_id.to_string());
                        }
                    }
                    "supporting_data_source" => {
                        if !edge
                            .supporting_data_source
                            .contains(&resource_id.to_string())
                        {
                            edge.supporting_data_source.push(resource_id.to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
        if let Some(qualifiers) = obj.get("qualifiers").and_then(|v| v.as_array()) {
            for q in qualifiers {
                let (Some(type_id), Some(value)) = (
                    q.get("qualifier_type_id").and_then(|v| v.as_str()),
                    q.get("qualifier_value").and_then(|v| v.as_str()),
                ) else {
                    continue;
                };
                edge.properties.insert(
                    type_id.to_string(),
                    PropertyValue::String(value.to_string()),
                );
            }
        }
        Self::fold_attributes(obj, &mut |key, value| {
            edge.properties.insert(key, value);
        });
        Some(edge)
    }
}

impl Source for TrapiSource {
    fn parse(&mut self) -> Result<RecordStream<'_>> {
        let options = match self.options.take() {
            Some(o) => o,
            None => return Ok(Box::new(std::iter::empty())),
        };
        let reader = open_reader(&options.filename[0], options.compression)?;
        let scanner = JsonContainerScanner::new(reader, &["nodes", "edges"]);
        let errors = Rc::clone(&self.errors);
        let provided_by = options.provided_by.clone();

        Ok(Box::new(scanner.filter_map(move |event| {
            let event = match event {
                Ok(e) => e,
                Err(e) => {
                    errors.borrow_mut().log(
                        MessageLevel::Error,
                        ErrorKind::MalformedRecord,
                        "I/O failure while scanning TRAPI JSON",
                        e.to_string(),
                    );
                    return None;
                }
            };
            let Some(key) = event.key else {
                errors.borrow_mut().log(
                    MessageLevel::Error,
                    ErrorKind::MalformedRecord,
                    "TRAPI containers must be keyed objects",
                    format!("target {}", event.target),
                );
                return None;
            };
            let value: JsonValue = match serde_json::from_slice(&event.bytes) {
                Ok(v) => v,
                Err(e) => {
                    errors.borrow_mut().log(
                        MessageLevel::Error,
                        ErrorKind::MalformedRecord,
                        "Unparseable TRAPI element",
                        e.to_string(),
                    );
                    return None;
                }
            };
            if event.target == 0 {
                let mut node = Self::read_node(&key, &value);
                if let Some(pb) = &provided_by {
                    node.provided_by.push(pb.clone());
                }
                Some(Record::Node(node))
            } else {
                match Self::read_edge(&key, &value) {
                    Some(mut edge) => {
                        if let Some(pb) = &provided_by {
                            edge.provided_by.push(pb.clone());
                        }
                        Some(Record::Edge(edge))
                    }
                    None => {
                        errors.borrow_mut().log(
                            MessageLevel::Error,
                            ErrorKind::MissingEdgeProperty,
                            "TRAPI edge is missing 'subject', 'predicate' or 'object'",
                            key,
                        );
                        None
                    }
                }
            }
        })))
    }

    fn errors(&self) -> SharedErrors {
        Rc::clone(&self.errors)
    }
}
