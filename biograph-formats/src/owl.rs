//! OWL-as-RDF source
//!
//! Runs the N-Triples pipeline over an OWL ontology serialized as RDF and
//! recovers the class-level structure the plain triple reading would
//! miss:
//!
//! - `owl:equivalentClass` / `owl:sameAs` triples become `biolink:same_as`
//!   edges annotated with the originating OWL construct;
//! - existential restrictions (`_:b owl:onProperty P ; owl:someValuesFrom
//!   C` reached via `rdfs:subClassOf _:b`) become `X P C` edges annotated
//!   with the restriction kind (the OWL-star vocabulary);
//! - the blank restriction nodes themselves are suppressed.
//!
//! Restriction blank nodes are buffered until the stream ends; ontologies
//! interleave them freely, so this buffer is bounded by the restriction
//! count rather than by one subject.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::ntriples::NtSource;
use crate::options::SourceOptions;
use crate::source::{RecordStream, SharedErrors, Source};
use biograph_core::{Edge, Node, PropertyValue, Record, Result};
use biograph_vocab::biolink;

/// The OWL-star annotation property stamped on recovered edges.
pub const OWL_TYPE_PROPERTY: &str = "owl_type";

const OWL_EQUIVALENT_CLASS: &str = "http://www.w3.org/2002/07/owl#equivalentClass";
const OWL_SAME_AS: &str = "http://www.w3.org/2002/07/owl#sameAs";
const OWL_ON_PROPERTY: &str = "http://www.w3.org/2002/07/owl#onProperty";
const OWL_SOME_VALUES_FROM: &str = "http://www.w3.org/2002/07/owl#someValuesFrom";
const OWL_ALL_VALUES_FROM: &str = "http://www.w3.org/2002/07/owl#allValuesFrom";
const OWL_HAS_VALUE: &str = "http://www.w3.org/2002/07/owl#hasValue";

/// Reads an OWL ontology (as N-Triples) into nodes and edges.
pub struct OwlSource {
    inner: NtSource,
}

impl OwlSource {
    pub fn new(mut options: SourceOptions) -> Result<Self> {
        // Restriction parts fold into blank-node properties so the
        // wrapper can reassemble them.
        for p in [
            OWL_ON_PROPERTY,
            OWL_SOME_VALUES_FROM,
            OWL_ALL_VALUES_FROM,
            OWL_HAS_VALUE,
        ] {
            options.node_property_predicates.insert(p.to_string());
        }
        let inner = NtSource::new(options)?.with_extra_edge_predicates(vec![
            (OWL_EQUIVALENT_CLASS.to_string(), "owl:equivalentClass".to_string()),
            (OWL_SAME_AS.to_string(), "owl:sameAs".to_string()),
        ]);
        Ok(Self { inner })
    }
}

impl Source for OwlSource {
    fn parse(&mut self) -> Result<RecordStream<'_>> {
        let stream = self.inner.parse()?;
        Ok(Box::new(OwlStream {
            inner: stream,
            restrictions: FxHashMap::default(),
            pending_links: Vec::new(),
            queue: VecDeque::new(),
            drained: false,
        }))
    }

    fn errors(&self) -> SharedErrors {
        self.inner.errors()
    }
}

/// A buffered `owl:Restriction` blank node.
struct Restriction {
    on_property: Option<String>,
    filler: Option<String>,
    kind: &'static str,
}

struct OwlStream<'a> {
    inner: RecordStream<'a>,
    /// blank label -> restriction parts
    restrictions: FxHashMap<String, Restriction>,
    /// `(subject, blank label)` links awaiting their restriction
    pending_links: Vec<(String, String)>,
    queue: VecDeque<Record>,
    drained: bool,
}

impl OwlStream<'_> {
    /// Pull restriction parts out of a blank node; true when the node was
    /// a restriction and should be suppressed.
    fn absorb_restriction(&mut self, node: &Node) -> bool {
        if !node.id.starts_with("_:") {
            return false;
        }
        let on_property = node
            .properties
            .get("onProperty")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let (kind, filler) = if let Some(v) = node.properties.get("someValuesFrom") {
            ("owl:someValuesFrom", v.as_str().map(|s| s.to_string()))
        } else if let Some(v) = node.properties.get("allValuesFrom") {
            ("owl:allValuesFrom", v.as_str().map(|s| s.to_string()))
        } else if let Some(v) = node.properties.get("hasValue") {
            ("owl:hasValue", v.as_str().map(|s| s.to_string()))
        } else if on_property.is_some() {
            ("owl:someValuesFrom", None)
        } else {
            // Blank node that is not a restriction: suppress it anyway;
            // OWL scaffolding has no place in the record stream.
            return true;
        };
        self.restrictions.insert(
            node.id.clone(),
            Restriction {
                on_property,
                filler,
                kind,
            },
        );
        true
    }

    /// Resolve buffered links into annotated edges once input ends.
    fn resolve_pending(&mut self) {
        let links = std::mem::take(&mut self.pending_links);
        for (subject, blank) in links {
            let restriction = match self.restrictions.get(&blank) {
                Some(r) => r,
                None => {
                    debug!(blank = %blank, "restriction link without restriction node");
                    continue;
                }
            };
            let (property, filler) = match (&restriction.on_property, &restriction.filler) {
                (Some(p), Some(f)) => (p.clone(), f.clone()),
                _ => continue,
            };
            let mut edge = Edge::new(subject, property, filler);
            edge.properties.insert(
                OWL_TYPE_PROPERTY.to_string(),
                PropertyValue::String(restriction.kind.to_string()),
            );
            self.queue.push_back(Record::Edge(edge));
        }
    }

    fn annotate_owl_edge(mut edge: Edge) -> Edge {
        if edge.predicate == "owl:equivalentClass" || edge.predicate == "owl:sameAs" {
            edge.properties.insert(
                OWL_TYPE_PROPERTY.to_string(),
                PropertyValue::String(edge.predicate.clone()),
            );
            edge.predicate = biolink::SAME_AS.to_string();
            edge.id = Edge::mint_id(&edge.subject, &edge.predicate, &edge.object);
        }
        edge
    }
}

impl Iterator for OwlStream<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            if let Some(record) = self.queue.pop_front() {
                return Some(record);
            }
            if self.drained {
                return None;
            }
            match self.inner.next() {
                None => {
                    self.drained = true;
                    self.resolve_pending();
                }
                Some(Record::Node(node)) => {
                    if !self.absorb_restriction(&node) {
                        return Some(Record::Node(node));
                    }
                }
                Some(Record::Edge(edge)) => {
                    if edge.object.starts_with("_:") {
                        // Link into a restriction; hold until resolvable.
                        self.pending_links.push((edge.subject, edge.object));
                        continue;
                    }
                    return Some(Record::Edge(Self::annotate_owl_edge(edge)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Format;

    fn parse_owl(content: &str) -> Vec<Record> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onto.nt");
        std::fs::write(&path, content).unwrap();
        let mut source = OwlSource::new(SourceOptions::for_files(Format::Owl, [path])).unwrap();
        let records: Vec<Record> = source.parse().unwrap().collect();
        records
    }

    #[test]
    fn test_equivalent_class_becomes_same_as() {
        let records = parse_owl(
            "<http://purl.obolibrary.org/obo/MONDO_0005002> <http://www.w3.org/2002/07/owl#equivalentClass> <http://purl.obolibrary.org/obo/DOID_3083> .\n",
        );
        let edges: Vec<&Edge> = records
            .iter()
            .filter_map(|r| match r {
                Record::Edge(e) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].predicate, biolink::SAME_AS);
        assert_eq!(
            edges[0].properties.get(OWL_TYPE_PROPERTY),
            Some(&PropertyValue::String("owl:equivalentClass".into()))
        );
    }

    #[test]
    fn test_existential_restriction_recovered() {
        let records = parse_owl(concat!(
            "<http://purl.obolibrary.org/obo/GO_0008150> <http://www.w3.org/2000/01/rdf-schema#subClassOf> _:b1 .\n",
            "_:b1 <http://www.w3.org/2002/07/owl#onProperty> <http://purl.obolibrary.org/obo/BFO_0000050> .\n",
            "_:b1 <http://www.w3.org/2002/07/owl#someValuesFrom> <http://purl.obolibrary.org/obo/GO_0009987> .\n",
        ));
        let edges: Vec<&Edge> = records
            .iter()
            .filter_map(|r| match r {
                Record::Edge(e) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].subject, "GO:0008150");
        assert_eq!(edges[0].object, "GO:0009987");
        assert_eq!(
            edges[0].properties.get(OWL_TYPE_PROPERTY),
            Some(&PropertyValue::String("owl:someValuesFrom".into()))
        );
        // Blank restriction node suppressed.
        assert!(records
            .iter()
            .all(|r| !matches!(r, Record::Node(n) if n.id.starts_with("_:"))));
    }

    #[test]
    fn test_plain_subclass_still_flows() {
        let records = parse_owl(
            "<http://purl.obolibrary.org/obo/MONDO_0005002> <http://www.w3.org/2000/01/rdf-schema#subClassOf> <http://purl.obolibrary.org/obo/MONDO_0000001> .\n",
        );
        let edges: Vec<&Edge> = records
            .iter()
            .filter_map(|r| match r {
                Record::Edge(e) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].predicate, biolink::SUBCLASS_OF);
    }
}
