//! Node and Edge records
//!
//! The uniform record model every Source produces and every Sink consumes.
//! Core slots are typed fields; everything else lands in the `properties`
//! map so unknown columns survive any format round-trip.
//!
//! Multivalue discipline: set-valued fields (`category`, `xref`,
//! `provided_by`, the knowledge-source families) union on merge;
//! list-valued fields (`synonym`, `publications`) append unique; scalar
//! fields keep the first non-empty value and report a conflict when a
//! different non-empty value arrives later.

use std::collections::BTreeMap;

use serde_json::{Map as JsonMap, Value as JsonValue};
use uuid::Uuid;

use crate::value::{sanitize_import, split_list, PropertyValue, LIST_DELIMITER};
use biograph_vocab::biolink;

/// Node core slots, in canonical column order.
pub const NODE_CORE_COLUMNS: &[&str] = &[
    "id",
    "category",
    "name",
    "description",
    "xref",
    "provided_by",
    "synonym",
];

/// Edge core slots, in canonical column order.
pub const EDGE_CORE_COLUMNS: &[&str] = &[
    "id",
    "subject",
    "predicate",
    "object",
    "category",
    "knowledge_level",
    "agent_type",
    "primary_knowledge_source",
    "aggregator_knowledge_source",
    "supporting_data_source",
    "publications",
    "provided_by",
];

/// Properties with list typing even when a single value is supplied.
pub const LIST_PROPERTIES: &[&str] = &[
    "category",
    "xref",
    "synonym",
    "provided_by",
    "publications",
    "aggregator_knowledge_source",
    "supporting_data_source",
    "knowledge_source",
    "same_as",
    "qualifiers",
];

/// Namespace for deterministic edge-id minting (UUIDv5 over `s-p-o`).
const EDGE_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x8b, 0x1d, 0x6c, 0x4e, 0x2f, 0x9a, 0x4a, 0x0b, 0x9d, 0x3c, 0x5e, 0x7f, 0x1a, 0x2b, 0x3c,
    0x4d,
]);

/// Is `field` typed as a list?
pub fn is_list_property(field: &str) -> bool {
    LIST_PROPERTIES.contains(&field)
}

/// Outcome of merging one record into another.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MergeOutcome {
    /// True when an existing record was merged rather than inserted fresh
    pub merged: bool,
    /// Names of scalar fields whose incoming value conflicted and lost
    pub conflicts: Vec<String>,
}

// ============================================================================
// Node
// ============================================================================

/// A node record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    /// Canonical CURIE identifying the node
    pub id: String,
    /// Ordered unique category classes, most specific first
    pub category: Vec<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Cross-reference CURIEs (set discipline)
    pub xref: Vec<String>,
    /// Synonym strings (list discipline)
    pub synonym: Vec<String>,
    /// Source resources that contributed this node (set discipline)
    pub provided_by: Vec<String>,
    /// Everything else
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Node {
    /// New node with the given id and no category yet.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// New placeholder node for an edge endpoint that was never declared.
    pub fn placeholder(id: impl Into<String>) -> Self {
        let mut n = Self::new(id);
        n.category.push(biolink::NAMED_THING.to_string());
        n
    }

    /// Assign the root entity class when no category is present.
    pub fn ensure_category(&mut self) {
        if self.category.is_empty() {
            self.category.push(biolink::NAMED_THING.to_string());
        }
    }

    /// Build from a JSON object; `id` is required, every unknown key goes
    /// to `properties`.
    pub fn from_json(obj: &JsonMap<String, JsonValue>) -> Option<Self> {
        let id = non_empty_string(obj.get("id")?)?;
        let mut node = Node::new(id);
        for (key, value) in obj {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "id" => {}
                "category" => node.category = string_list(value),
                "name" => node.name = non_empty_string(value),
                "description" => node.description = non_empty_string(value),
                "xref" => node.xref = string_list(value),
                "synonym" => node.synonym = string_list(value),
                "provided_by" => node.provided_by = string_list(value),
                _ => {
                    if let Some(v) = coerce_property(key, value) {
                        node.properties.insert(key.clone(), v);
                    }
                }
            }
        }
        Some(node)
    }

    /// Serialize to a JSON object with core slots first.
    pub fn to_json(&self) -> JsonValue {
        let mut obj = JsonMap::new();
        obj.insert("id".into(), JsonValue::String(self.id.clone()));
        obj.insert("category".into(), string_array(&self.category));
        if let Some(name) = &self.name {
            obj.insert("name".into(), JsonValue::String(name.clone()));
        }
        if let Some(desc) = &self.description {
            obj.insert("description".into(), JsonValue::String(desc.clone()));
        }
        if !self.xref.is_empty() {
            obj.insert("xref".into(), string_array(&self.xref));
        }
        if !self.synonym.is_empty() {
            obj.insert("synonym".into(), string_array(&self.synonym));
        }
        if !self.provided_by.is_empty() {
            obj.insert("provided_by".into(), string_array(&self.provided_by));
        }
        for (key, value) in &self.properties {
            obj.insert(key.clone(), value.to_json());
        }
        JsonValue::Object(obj)
    }

    /// Merge `other` into `self` (field-union rules; first-wins scalars).
    pub fn merge_from(&mut self, other: Node) -> MergeOutcome {
        let mut outcome = MergeOutcome {
            merged: true,
            ..Default::default()
        };
        union_into(&mut self.category, other.category);
        union_into(&mut self.xref, other.xref);
        union_into(&mut self.synonym, other.synonym);
        union_into(&mut self.provided_by, other.provided_by);
        merge_scalar(&mut self.name, other.name, "name", &mut outcome);
        merge_scalar(
            &mut self.description,
            other.description,
            "description",
            &mut outcome,
        );
        merge_properties(&mut self.properties, other.properties, &mut outcome);
        outcome
    }

    /// The value of a core slot or property, viewed as a string list.
    ///
    /// Used by filters and facet counting, which treat all fields
    /// uniformly.
    pub fn field_values(&self, field: &str) -> Vec<String> {
        match field {
            "id" => vec![self.id.clone()],
            "category" => self.category.clone(),
            "name" => self.name.iter().cloned().collect(),
            "description" => self.description.iter().cloned().collect(),
            "xref" => self.xref.clone(),
            "synonym" => self.synonym.clone(),
            "provided_by" => self.provided_by.clone(),
            _ => self
                .properties
                .get(field)
                .map(|v| v.to_string_list())
                .unwrap_or_default(),
        }
    }
}

// ============================================================================
// Edge
// ============================================================================

/// An edge record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Edge {
    /// Unique edge id; minted deterministically when absent
    pub id: String,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    /// Association classes (set discipline)
    pub category: Vec<String>,
    pub knowledge_level: Option<String>,
    pub agent_type: Option<String>,
    /// Scalar: participates in the edge merge key
    pub primary_knowledge_source: Option<String>,
    pub aggregator_knowledge_source: Vec<String>,
    pub supporting_data_source: Vec<String>,
    /// Publication CURIEs (list discipline)
    pub publications: Vec<String>,
    pub provided_by: Vec<String>,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Edge {
    /// New edge with a freshly minted deterministic id.
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        let subject = subject.into();
        let predicate = predicate.into();
        let object = object.into();
        let id = Edge::mint_id(&subject, &predicate, &object);
        Self {
            id,
            subject,
            predicate,
            object,
            ..Default::default()
        }
    }

    /// Deterministic edge id: UUIDv5 over `subject-predicate-object`.
    pub fn mint_id(subject: &str, predicate: &str, object: &str) -> String {
        let name = format!("{}-{}-{}", subject, predicate, object);
        format!(
            "urn:uuid:{}",
            Uuid::new_v5(&EDGE_ID_NAMESPACE, name.as_bytes())
        )
    }

    /// The merge identity: edges agreeing on all four collapse.
    pub fn merge_key(&self) -> (&str, &str, &str, Option<&str>) {
        (
            &self.subject,
            &self.predicate,
            &self.object,
            self.primary_knowledge_source.as_deref(),
        )
    }

    /// Build from a JSON object; `subject`, `predicate`, `object` required.
    pub fn from_json(obj: &JsonMap<String, JsonValue>) -> Option<Self> {
        let subject = non_empty_string(obj.get("subject")?)?;
        let predicate = non_empty_string(obj.get("predicate")?)?;
        let object = non_empty_string(obj.get("object")?)?;
        let mut edge = Edge::new(subject, predicate, object);
        for (key, value) in obj {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "subject" | "predicate" | "object" => {}
                "id" => {
                    if let Some(id) = non_empty_string(value) {
                        edge.id = id;
                    }
                }
                "category" => edge.category = string_list(value),
                "knowledge_level" => edge.knowledge_level = non_empty_string(value),
                "agent_type" => edge.agent_type = non_empty_string(value),
                "primary_knowledge_source" => {
                    edge.primary_knowledge_source = non_empty_string(value)
                }
                "aggregator_knowledge_source" => {
                    edge.aggregator_knowledge_source = string_list(value)
                }
                "supporting_data_source" => edge.supporting_data_source = string_list(value),
                "publications" => edge.publications = string_list(value),
                "provided_by" => edge.provided_by = string_list(value),
                _ => {
                    if let Some(v) = coerce_property(key, value) {
                        edge.properties.insert(key.clone(), v);
                    }
                }
            }
        }
        Some(edge)
    }

    /// Serialize to a JSON object with core slots first.
    pub fn to_json(&self) -> JsonValue {
        let mut obj = JsonMap::new();
        obj.insert("id".into(), JsonValue::String(self.id.clone()));
        obj.insert("subject".into(), JsonValue::String(self.subject.clone()));
        obj.insert("predicate".into(), JsonValue::String(self.predicate.clone()));
        obj.insert("object".into(), JsonValue::String(self.object.clone()));
        if !self.category.is_empty() {
            obj.insert("category".into(), string_array(&self.category));
        }
        if let Some(v) = &self.knowledge_level {
            obj.insert("knowledge_level".into(), JsonValue::String(v.clone()));
        }
        if let Some(v) = &self.agent_type {
            obj.insert("agent_type".into(), JsonValue::String(v.clone()));
        }
        if let Some(v) = &self.primary_knowledge_source {
            obj.insert(
                "primary_knowledge_source".into(),
                JsonValue::String(v.clone()),
            );
        }
        if !self.aggregator_knowledge_source.is_empty() {
            obj.insert(
                "aggregator_knowledge_source".into(),
                string_array(&self.aggregator_knowledge_source),
            );
        }
        if !self.supporting_data_source.is_empty() {
            obj.insert(
                "supporting_data_source".into(),
                string_array(&self.supporting_data_source),
            );
        }
        if !self.publications.is_empty() {
            obj.insert("publications".into(), string_array(&self.publications));
        }
        if !self.provided_by.is_empty() {
            obj.insert("provided_by".into(), string_array(&self.provided_by));
        }
        for (key, value) in &self.properties {
            obj.insert(key.clone(), value.to_json());
        }
        JsonValue::Object(obj)
    }

    /// Merge `other` into `self` (field-union rules; first-wins scalars).
    pub fn merge_from(&mut self, other: Edge) -> MergeOutcome {
        let mut outcome = MergeOutcome {
            merged: true,
            ..Default::default()
        };
        union_into(&mut self.category, other.category);
        union_into(
            &mut self.aggregator_knowledge_source,
            other.aggregator_knowledge_source,
        );
        union_into(
            &mut self.supporting_data_source,
            other.supporting_data_source,
        );
        union_into(&mut self.publications, other.publications);
        union_into(&mut self.provided_by, other.provided_by);
        merge_scalar(
            &mut self.knowledge_level,
            other.knowledge_level,
            "knowledge_level",
            &mut outcome,
        );
        merge_scalar(
            &mut self.agent_type,
            other.agent_type,
            "agent_type",
            &mut outcome,
        );
        merge_scalar(
            &mut self.primary_knowledge_source,
            other.primary_knowledge_source,
            "primary_knowledge_source",
            &mut outcome,
        );
        merge_properties(&mut self.properties, other.properties, &mut outcome);
        outcome
    }

    /// The value of a core slot or property, viewed as a string list.
    pub fn field_values(&self, field: &str) -> Vec<String> {
        match field {
            "id" => vec![self.id.clone()],
            "subject" => vec![self.subject.clone()],
            "predicate" => vec![self.predicate.clone()],
            "object" => vec![self.object.clone()],
            "category" => self.category.clone(),
            "knowledge_level" => self.knowledge_level.iter().cloned().collect(),
            "agent_type" => self.agent_type.iter().cloned().collect(),
            "primary_knowledge_source" => {
                self.primary_knowledge_source.iter().cloned().collect()
            }
            "aggregator_knowledge_source" => self.aggregator_knowledge_source.clone(),
            "supporting_data_source" => self.supporting_data_source.clone(),
            "publications" => self.publications.clone(),
            "provided_by" => self.provided_by.clone(),
            _ => self
                .properties
                .get(field)
                .map(|v| v.to_string_list())
                .unwrap_or_default(),
        }
    }
}

/// A record flowing through the pipeline: either a node or an edge.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Node(Node),
    Edge(Edge),
}

impl Record {
    /// The record's own identifier.
    pub fn id(&self) -> &str {
        match self {
            Record::Node(n) => &n.id,
            Record::Edge(e) => &e.id,
        }
    }
}

// ============================================================================
// Field helpers
// ============================================================================

fn non_empty_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(sanitize_import(s)),
        JsonValue::String(_) | JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}

/// Coerce a JSON value into a list of strings, splitting `|`-joined
/// scalars the way tabular inputs arrive.
fn string_list(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::String(s) => split_list(&sanitize_import(s)),
        JsonValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    JsonValue::String(s) if !s.is_empty() => out.push(sanitize_import(s)),
                    JsonValue::String(_) | JsonValue::Null => {}
                    other => out.push(other.to_string()),
                }
            }
            dedup_preserving_order(out)
        }
        JsonValue::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

fn string_array(items: &[String]) -> JsonValue {
    JsonValue::Array(items.iter().cloned().map(JsonValue::String).collect())
}

/// Coerce an unknown property per its declared typing: known list fields
/// become lists even from a scalar; untyped strings containing `|` split.
fn coerce_property(key: &str, value: &JsonValue) -> Option<PropertyValue> {
    if is_list_property(key) {
        let items = string_list(value);
        if items.is_empty() {
            return None;
        }
        return Some(PropertyValue::List(items));
    }
    match value {
        JsonValue::String(s) if s.contains(LIST_DELIMITER) => {
            Some(PropertyValue::List(split_list(&sanitize_import(s))))
        }
        other => PropertyValue::from_json(other),
    }
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Append elements of `incoming` not already present.
fn union_into(target: &mut Vec<String>, incoming: Vec<String>) {
    for item in incoming {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

/// First-wins scalar merge; a differing non-empty newcomer is a conflict.
fn merge_scalar(
    target: &mut Option<String>,
    incoming: Option<String>,
    field: &str,
    outcome: &mut MergeOutcome,
) {
    match (target.as_ref(), incoming) {
        (None, Some(v)) => *target = Some(v),
        (Some(cur), Some(v)) if *cur != v => outcome.conflicts.push(field.to_string()),
        _ => {}
    }
}

fn merge_properties(
    target: &mut BTreeMap<String, PropertyValue>,
    incoming: BTreeMap<String, PropertyValue>,
    outcome: &mut MergeOutcome,
) {
    use std::collections::btree_map::Entry;
    for (key, value) in incoming {
        match target.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => {
                let key = slot.key().clone();
                let existing = slot.get_mut();
                if *existing == value {
                    continue;
                }
                match (existing, value) {
                    (PropertyValue::List(cur), v) => {
                        for item in v.to_string_list() {
                            if !cur.contains(&item) {
                                cur.push(item);
                            }
                        }
                    }
                    (cur @ PropertyValue::String(_), PropertyValue::List(incoming_list)) => {
                        let mut items = cur.to_string_list();
                        for item in incoming_list {
                            if !items.contains(&item) {
                                items.push(item);
                            }
                        }
                        *cur = PropertyValue::List(items);
                    }
                    _ => outcome.conflicts.push(key),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: JsonValue) -> JsonMap<String, JsonValue> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_node_from_json_unknown_fields() {
        let node = Node::from_json(&obj(json!({
            "id": "HGNC:11603",
            "category": ["biolink:Gene"],
            "name": "TBX4",
            "taxon": "NCBITaxon:9606"
        })))
        .unwrap();
        assert_eq!(node.id, "HGNC:11603");
        assert_eq!(node.category, vec!["biolink:Gene"]);
        assert_eq!(
            node.properties.get("taxon"),
            Some(&PropertyValue::String("NCBITaxon:9606".into()))
        );
    }

    #[test]
    fn test_node_missing_id_rejected() {
        assert!(Node::from_json(&obj(json!({"name": "x"}))).is_none());
    }

    #[test]
    fn test_category_accepts_pipe_joined_string() {
        let node = Node::from_json(&obj(json!({
            "id": "X:1",
            "category": "biolink:Gene|biolink:NamedThing"
        })))
        .unwrap();
        assert_eq!(node.category, vec!["biolink:Gene", "biolink:NamedThing"]);
    }

    #[test]
    fn test_edge_id_minting_is_deterministic() {
        let a = Edge::new("A:1", "biolink:related_to", "B:2");
        let b = Edge::new("A:1", "biolink:related_to", "B:2");
        assert_eq!(a.id, b.id);
        assert!(a.id.starts_with("urn:uuid:"));
        let c = Edge::new("A:1", "biolink:related_to", "B:3");
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_node_merge_union_and_first_wins() {
        let mut a = Node::from_json(&obj(json!({
            "id": "X:1", "category": ["biolink:Gene"], "name": "alpha",
            "xref": ["Y:1"]
        })))
        .unwrap();
        let b = Node::from_json(&obj(json!({
            "id": "X:1", "category": ["biolink:NamedThing"], "name": "beta",
            "xref": ["Y:2"], "synonym": ["s1"]
        })))
        .unwrap();
        let outcome = a.merge_from(b);
        assert_eq!(a.category, vec!["biolink:Gene", "biolink:NamedThing"]);
        assert_eq!(a.xref, vec!["Y:1", "Y:2"]);
        assert_eq!(a.synonym, vec!["s1"]);
        assert_eq!(a.name.as_deref(), Some("alpha"));
        assert_eq!(outcome.conflicts, vec!["name"]);
    }

    #[test]
    fn test_edge_merge_key_distinguishes_primary_source() {
        let mut a = Edge::new("A:1", "biolink:related_to", "B:2");
        a.primary_knowledge_source = Some("infores:a".into());
        let mut b = a.clone();
        b.primary_knowledge_source = Some("infores:b".into());
        assert_ne!(a.merge_key(), b.merge_key());
    }

    #[test]
    fn test_merge_is_associative_on_sets() {
        let mk = |xrefs: &[&str]| {
            let mut n = Node::new("X:1");
            n.xref = xrefs.iter().map(|s| s.to_string()).collect();
            n
        };
        let (a, b, c) = (mk(&["1"]), mk(&["2"]), mk(&["1", "3"]));

        let mut left = a.clone();
        left.merge_from(b.clone());
        left.merge_from(c.clone());

        let mut right_inner = b;
        right_inner.merge_from(c);
        let mut right = a;
        right.merge_from(right_inner);

        assert_eq!(left.xref, right.xref);
    }

    #[test]
    fn test_round_trip_json() {
        let original = obj(json!({
            "id": "e1",
            "subject": "HGNC:11603",
            "predicate": "biolink:contributes_to",
            "object": "MONDO:0005002",
            "publications": ["PMID:1"],
            "score": 0.9
        }));
        let edge = Edge::from_json(&original).unwrap();
        let back = edge.to_json();
        assert_eq!(back["subject"], "HGNC:11603");
        assert_eq!(back["publications"], json!(["PMID:1"]));
        assert_eq!(back["score"], json!(0.9));
    }
}
