//! OBOGraph JSON source
//!
//! Parses the ontology interchange shape
//! `{"graphs": [{"nodes": [...], "edges": [...]}]}` used by OBO
//! ontologies. Node `meta` blocks (definition, synonyms, xrefs, basic
//! property values) fold into node properties; OBO shorthand predicates
//! (`is_a`, `part_of`, ...) map through a built-in table extended by the
//! configured `predicate_mappings`. Nodes with no derivable category get
//! the root entity class.

use std::rc::Rc;

use serde_json::Value as JsonValue;

use crate::io::open_reader;
use crate::json_scan::JsonContainerScanner;
use crate::options::SourceOptions;
use crate::source::{shared_errors, RecordStream, SharedErrors, Source};
use biograph_core::{
    Edge, Error, ErrorKind, MessageLevel, Node, PrefixManager, PropertyValue, Record, Result,
};
use biograph_vocab::biolink;

/// Built-in OBO shorthand predicate translations.
const OBO_PREDICATES: &[(&str, &str)] = &[
    ("is_a", "biolink:subclass_of"),
    ("subPropertyOf", "biolink:subclass_of"),
    ("part_of", "biolink:part_of"),
    ("BFO:0000050", "biolink:part_of"),
    ("OBO:BFO_0000050", "biolink:part_of"),
    ("has_part", "biolink:has_part"),
    ("BFO:0000051", "biolink:has_part"),
    ("OBO:BFO_0000051", "biolink:has_part"),
    ("regulates", "biolink:regulates"),
    ("negatively_regulates", "biolink:regulates"),
    ("positively_regulates", "biolink:regulates"),
    ("occurs_in", "biolink:located_in"),
    ("located_in", "biolink:located_in"),
];

/// Reads ontology nodes and edges from OBOGraph JSON.
pub struct ObographSource {
    options: Option<SourceOptions>,
    errors: SharedErrors,
}

impl ObographSource {
    pub fn new(options: SourceOptions) -> Result<Self> {
        if options.filename.len() != 1 {
            return Err(Error::config("obojson source expects exactly one file"));
        }
        Ok(Self {
            options: Some(options),
            errors: shared_errors(),
        })
    }

    fn read_node(pm: &PrefixManager, obj: &JsonValue) -> Option<Node> {
        let id = obj.get("id")?.as_str()?;
        let id = pm.contract(id).unwrap_or_else(|_| id.to_string());
        let mut node = Node::new(id);
        if let Some(lbl) = obj.get("lbl").and_then(|v| v.as_str()) {
            node.name = Some(lbl.to_string());
        }
        if let Some(meta) = obj.get("meta") {
            if let Some(def) = meta
                .get("definition")
                .and_then(|d| d.get("val"))
                .and_then(|v| v.as_str())
            {
                node.description = Some(def.to_string());
            }
            if let Some(synonyms) = meta.get("synonyms").and_then(|v| v.as_array()) {
                for syn in synonyms {
                    if let Some(val) = syn.get("val").and_then(|v| v.as_str()) {
                        if !node.synonym.contains(&val.to_string()) {
                            node.synonym.push(val.to_string());
                        }
                    }
                }
            }
            if let Some(xrefs) = meta.get("xrefs").and_then(|v| v.as_array()) {
                for xref in xrefs {
                    if let Some(val) = xref.get("val").and_then(|v| v.as_str()) {
                        if !node.xref.contains(&val.to_string()) {
                            node.xref.push(val.to_string());
                        }
                    }
                }
            }
            if meta
                .get("deprecated")
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
            {
                node.properties
                    .insert("deprecated".to_string(), PropertyValue::Bool(true));
            }
            if let Some(bpvs) = meta.get("basicPropertyValues").and_then(|v| v.as_array()) {
                for bpv in bpvs {
                    let (Some(pred), Some(val)) = (
                        bpv.get("pred").and_then(|v| v.as_str()),
                        bpv.get("val").and_then(|v| v.as_str()),
                    ) else {
                        continue;
                    };
                    let pred = pm.contract(pred).unwrap_or_else(|_| pred.to_string());
                    let field = pred
                        .rsplit([':', '/', '#'])
                        .next()
                        .unwrap_or(&pred)
                        .to_string();
                    use std::collections::btree_map::Entry;
                    match node.properties.entry(field) {
                        Entry::Vacant(slot) => {
                            slot.insert(PropertyValue::String(val.to_string()));
                        }
                        Entry::Occupied(mut slot) => match slot.get_mut() {
                            PropertyValue::List(items) => {
                                if !items.contains(&val.to_string()) {
                                    items.push(val.to_string());
                                }
                            }
                            existing => {
                                let mut items = existing.to_string_list();
                                if !items.contains(&val.to_string()) {
                                    items.push(val.to_string());
                                }
                                *existing = PropertyValue::List(items);
                            }
                        },
                    }
                }
            }
        }
        node.ensure_category();
        Some(node)
    }

    fn map_predicate(options: &SourceOptions, pm: &PrefixManager, pred: &str) -> (String, bool) {
        if let Some(mapped) = options.predicate_mappings.get(pred) {
            return (mapped.clone(), true);
        }
        let contracted = pm.contract(pred).unwrap_or_else(|_| pred.to_string());
        if let Some(mapped) = options.predicate_mappings.get(&contracted) {
            return (mapped.clone(), true);
        }
        for (obo, mapped) in OBO_PREDICATES {
            if *obo == pred || *obo == contracted {
                return (mapped.to_string(), true);
            }
        }
        if contracted.contains(':') && !PrefixManager::is_iri(&contracted) {
            (contracted, true)
        } else {
            // Shorthand with no translation: fall back, keeping the raw
            // relation alongside.
            (biolink::RELATED_TO.to_string(), false)
        }
    }

    fn read_edge(options: &SourceOptions, pm: &PrefixManager, obj: &JsonValue) -> Option<Edge> {
        let sub = obj.get("sub")?.as_str()?;
        let pred = obj.get("pred")?.as_str()?;
        let obj_id = obj.get("obj")?.as_str()?;
        let subject = pm.contract(sub).unwrap_or_else(|_| sub.to_string());
        let object = pm.contract(obj_id).unwrap_or_else(|_| obj_id.to_string());
        let (predicate, translated) = Self::map_predicate(options, pm, pred);
        let mut edge = Edge::new(subject, predicate, object);
        if !translated {
            edge.properties
                .insert("relation".to_string(), PropertyValue::String(pred.to_string()));
        }
        Some(edge)
    }
}

impl Source for ObographSource {
    fn parse(&mut self) -> Result<RecordStream<'_>> {
        let options = match self.options.take() {
            Some(o) => o,
            None => return Ok(Box::new(std::iter::empty())),
        };
        let mut pm = PrefixManager::new();
        pm.update(
            options
                .prefix_map
                .iter()
                .map(|(p, i)| (p.clone(), i.clone())),
        );
        let reader = open_reader(&options.filename[0], options.compression)?;
        let scanner = JsonContainerScanner::new(reader, &["nodes", "edges"]);
        let errors = Rc::clone(&self.errors);

        Ok(Box::new(scanner.filter_map(move |event| {
            let event = match event {
                Ok(e) => e,
                Err(e) => {
                    errors.borrow_mut().log(
                        MessageLevel::Error,
                        ErrorKind::MalformedRecord,
                        "I/O failure while scanning OBOGraph JSON",
                        e.to_string(),
                    );
                    return None;
                }
            };
            let value: JsonValue = match serde_json::from_slice(&event.bytes) {
                Ok(v) => v,
                Err(e) => {
                    errors.borrow_mut().log(
                        MessageLevel::Error,
                        ErrorKind::MalformedRecord,
                        "Unparseable OBOGraph element",
                        e.to_string(),
                    );
                    return None;
                }
            };
            if event.target == 0 {
                match Self::read_node(&pm, &value) {
                    Some(mut node) => {
                        if let Some(pb) = &options.provided_by {
                            node.provided_by.push(pb.clone());
                        }
                        Some(Record::Node(node))
                    }
                    None => {
                        errors.borrow_mut().log(
                            MessageLevel::Error,
                            ErrorKind::MissingNodeProperty,
                            "Ontology node is missing 'id'",
                            value.to_string(),
                        );
                        None
                    }
                }
            } else {
                match Self::read_edge(&options, &pm, &value) {
                    Some(mut edge) => {
                        if let Some(pb) = &options.provided_by {
                            edge.provided_by.push(pb.clone());
                        }
                        Some(Record::Edge(edge))
                    }
                    None => {
                        errors.borrow_mut().log(
                            MessageLevel::Error,
                            ErrorKind::MissingEdgeProperty,
                            "Ontology edge is missing 'sub', 'pred' or 'obj'",
                            value.to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Format;

    fn parse_obo(content: &str) -> Vec<Record> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onto.json");
        std::fs::write(&path, content).unwrap();
        let mut source =
            ObographSource::new(SourceOptions::for_files(Format::Obojson, [path])).unwrap();
        source.parse().unwrap().collect()
    }

    #[test]
    fn test_node_meta_folds() {
        let records = parse_obo(
            r#"{"graphs": [{"nodes": [{
                "id": "http://purl.obolibrary.org/obo/GO_0008150",
                "lbl": "biological_process",
                "meta": {
                    "definition": {"val": "A process."},
                    "synonyms": [{"val": "physiological process"}],
                    "xrefs": [{"val": "Wikipedia:Biological_process"}]
                }
            }], "edges": []}]}"#,
        );
        assert_eq!(records.len(), 1);
        match &records[0] {
            Record::Node(n) => {
                assert_eq!(n.id, "GO:0008150");
                assert_eq!(n.name.as_deref(), Some("biological_process"));
                assert_eq!(n.description.as_deref(), Some("A process."));
                assert_eq!(n.synonym, vec!["physiological process"]);
                assert_eq!(n.xref, vec!["Wikipedia:Biological_process"]);
                assert_eq!(n.category, vec![biolink::NAMED_THING]);
            }
            _ => panic!("expected node"),
        }
    }

    #[test]
    fn test_is_a_maps_to_subclass_of() {
        let records = parse_obo(
            r#"{"graphs": [{"nodes": [], "edges": [
                {"sub": "http://purl.obolibrary.org/obo/GO_0008152",
                 "pred": "is_a",
                 "obj": "http://purl.obolibrary.org/obo/GO_0008150"}
            ]}]}"#,
        );
        assert_eq!(records.len(), 1);
        match &records[0] {
            Record::Edge(e) => {
                assert_eq!(e.subject, "GO:0008152");
                assert_eq!(e.predicate, "biolink:subclass_of");
                assert_eq!(e.object, "GO:0008150");
            }
            _ => panic!("expected edge"),
        }
    }

    #[test]
    fn test_unknown_shorthand_keeps_relation() {
        let records = parse_obo(
            r#"{"graphs": [{"nodes": [], "edges": [
                {"sub": "http://purl.obolibrary.org/obo/GO_1", "pred": "mystery_rel", "obj": "http://purl.obolibrary.org/obo/GO_2"}
            ]}]}"#,
        );
        match &records[0] {
            Record::Edge(e) => {
                assert_eq!(e.predicate, biolink::RELATED_TO);
                assert_eq!(
                    e.properties.get("relation"),
                    Some(&PropertyValue::String("mystery_rel".into()))
                );
            }
            _ => panic!("expected edge"),
        }
    }
}
