//! SSSOM mapping-set source
//!
//! Reads a Simple Standard for Sharing Ontological Mappings TSV. The
//! `#`-prefixed YAML preamble is scanned for `curie_map` entries, which
//! overlay the source's prefix map. Each mapping row becomes an edge
//! whose predicate derives from the `predicate_id` column; subject and
//! object become nodes with default categories when labels are present.

use std::collections::VecDeque;
use std::io::BufRead;
use std::rc::Rc;

use crate::io::open_reader;
use crate::options::SourceOptions;
use crate::source::{shared_errors, RecordStream, SharedErrors, Source};
use biograph_core::{
    Edge, Error, ErrorKind, MessageLevel, Node, PrefixManager, PropertyValue, Record, Result,
};

/// Mapping predicates translated onto the biolink hierarchy.
const MAPPING_PREDICATES: &[(&str, &str)] = &[
    ("skos:exactMatch", "biolink:exact_match"),
    ("skos:closeMatch", "biolink:close_match"),
    ("owl:sameAs", "biolink:same_as"),
    ("owl:equivalentClass", "biolink:same_as"),
];

/// Reads mapping rows as edges plus endpoint nodes.
pub struct SssomSource {
    options: Option<SourceOptions>,
    errors: SharedErrors,
}

impl SssomSource {
    pub fn new(options: SourceOptions) -> Result<Self> {
        if options.filename.len() != 1 {
            return Err(Error::config("sssom source expects exactly one file"));
        }
        Ok(Self {
            options: Some(options),
            errors: shared_errors(),
        })
    }
}

impl Source for SssomSource {
    fn parse(&mut self) -> Result<RecordStream<'_>> {
        let options = match self.options.take() {
            Some(o) => o,
            None => return Ok(Box::new(std::iter::empty())),
        };
        let reader = open_reader(&options.filename[0], options.compression)?;
        let mut pm = PrefixManager::new();
        pm.update(
            options
                .prefix_map
                .iter()
                .map(|(p, i)| (p.clone(), i.clone())),
        );
        Ok(Box::new(SssomStream {
            lines: reader.lines(),
            header: None,
            in_curie_map: false,
            pm,
            provided_by: options.provided_by.clone(),
            queue: VecDeque::new(),
            errors: Rc::clone(&self.errors),
        }))
    }

    fn errors(&self) -> SharedErrors {
        Rc::clone(&self.errors)
    }
}

struct SssomStream {
    lines: std::io::Lines<Box<dyn BufRead>>,
    header: Option<Vec<String>>,
    /// Inside the preamble's `curie_map:` block
    in_curie_map: bool,
    pm: PrefixManager,
    provided_by: Option<String>,
    queue: VecDeque<Record>,
    errors: SharedErrors,
}

impl SssomStream {
    /// Handle one `#`-prefixed preamble line; only `curie_map` matters.
    fn preamble_line(&mut self, line: &str) {
        let content = line.trim_start_matches('#').trim_end();
        let trimmed = content.trim();
        if trimmed == "curie_map:" {
            self.in_curie_map = true;
            return;
        }
        if self.in_curie_map {
            // Indented `prefix: iri` entries belong to the map; anything
            // unindented ends the block.
            if content.starts_with(' ') || content.starts_with('\t') {
                if let Some((prefix, iri)) = trimmed.split_once(':') {
                    let iri = iri.trim().trim_matches('"');
                    if !iri.is_empty() {
                        self.pm
                            .update([(prefix.trim().to_string(), iri.to_string())]);
                    }
                }
            } else {
                self.in_curie_map = false;
            }
        }
    }

    fn map_predicate(&self, predicate_id: &str) -> String {
        for (from, to) in MAPPING_PREDICATES {
            if *from == predicate_id {
                return to.to_string();
            }
        }
        predicate_id.to_string()
    }

    fn row_to_records(&mut self, row: &str) {
        let header = match &self.header {
            Some(h) => h.clone(),
            None => return,
        };
        let cells: Vec<&str> = row.split('\t').collect();
        let get = |name: &str| -> Option<&str> {
            header
                .iter()
                .position(|h| h == name)
                .and_then(|i| cells.get(i))
                .copied()
                .filter(|v| !v.is_empty())
        };
        let (Some(subject_id), Some(predicate_id), Some(object_id)) = (
            get("subject_id"),
            get("predicate_id"),
            get("object_id"),
        ) else {
            self.errors.borrow_mut().log(
                MessageLevel::Error,
                ErrorKind::MissingEdgeProperty,
                "Mapping row is missing subject_id, predicate_id or object_id",
                row,
            );
            return;
        };
        // Mapping sets may carry full IRIs; the preamble's curie_map
        // makes them contractible.
        let subject_id = self
            .pm
            .contract(subject_id)
            .unwrap_or_else(|_| subject_id.to_string());
        let object_id = self
            .pm
            .contract(object_id)
            .unwrap_or_else(|_| object_id.to_string());

        let mut subject = Node::new(subject_id.clone());
        if let Some(label) = get("subject_label") {
            subject.name = Some(label.to_string());
        }
        if let Some(category) = get("subject_category") {
            subject.category.push(category.to_string());
        }
        subject.ensure_category();

        let mut object = Node::new(object_id.clone());
        if let Some(label) = get("object_label") {
            object.name = Some(label.to_string());
        }
        if let Some(category) = get("object_category") {
            object.category.push(category.to_string());
        }
        object.ensure_category();

        let mut edge = Edge::new(subject_id, self.map_predicate(predicate_id), object_id);
        for (column, cell) in header.iter().zip(&cells) {
            if cell.is_empty()
                || matches!(
                    column.as_str(),
                    "subject_id"
                        | "predicate_id"
                        | "object_id"
                        | "subject_label"
                        | "object_label"
                        | "subject_category"
                        | "object_category"
                )
            {
                continue;
            }
            edge.properties
                .insert(column.clone(), PropertyValue::String(cell.to_string()));
        }
        if let Some(pb) = &self.provided_by {
            subject.provided_by.push(pb.clone());
            object.provided_by.push(pb.clone());
            edge.provided_by.push(pb.clone());
        }

        self.queue.push_back(Record::Node(subject));
        self.queue.push_back(Record::Node(object));
        self.queue.push_back(Record::Edge(edge));
    }
}

impl Iterator for SssomStream {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            if let Some(record) = self.queue.pop_front() {
                return Some(record);
            }
            match self.lines.next()? {
                Err(e) => {
                    self.errors.borrow_mut().log(
                        MessageLevel::Error,
                        ErrorKind::MalformedRecord,
                        "I/O failure while reading mappings",
                        e.to_string(),
                    );
                    return None;
                }
                Ok(line) => {
                    let line = line.trim_end_matches(['\r', '\n']);
                    if line.is_empty() {
                        continue;
                    }
                    if line.starts_with('#') {
                        self.preamble_line(line);
                        continue;
                    }
                    if self.header.is_none() {
                        self.header =
                            Some(line.split('\t').map(|s| s.to_string()).collect());
                        continue;
                    }
                    self.row_to_records(line);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Format;
    use biograph_vocab::biolink;

    fn parse_sssom(content: &str) -> Vec<Record> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.sssom.tsv");
        std::fs::write(&path, content).unwrap();
        let mut source =
            SssomSource::new(SourceOptions::for_files(Format::Sssom, [path])).unwrap();
        source.parse().unwrap().collect()
    }

    #[test]
    fn test_mapping_rows_become_edges() {
        let records = parse_sssom(concat!(
            "#curie_map:\n",
            "#  MONDO: http://purl.obolibrary.org/obo/MONDO_\n",
            "subject_id\tpredicate_id\tobject_id\tsubject_label\tmapping_justification\n",
            "MONDO:0005002\tskos:exactMatch\tDOID:3083\tCOPD\tsemapv:ManualMappingCuration\n",
        ));
        assert_eq!(records.len(), 3);
        match &records[0] {
            Record::Node(n) => {
                assert_eq!(n.id, "MONDO:0005002");
                assert_eq!(n.name.as_deref(), Some("COPD"));
                assert_eq!(n.category, vec![biolink::NAMED_THING]);
            }
            _ => panic!("expected node"),
        }
        match &records[2] {
            Record::Edge(e) => {
                assert_eq!(e.predicate, "biolink:exact_match");
                assert_eq!(
                    e.properties.get("mapping_justification"),
                    Some(&PropertyValue::String("semapv:ManualMappingCuration".into()))
                );
            }
            _ => panic!("expected edge"),
        }
    }

    #[test]
    fn test_incomplete_row_logged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.sssom.tsv");
        std::fs::write(
            &path,
            "subject_id\tpredicate_id\tobject_id\nMONDO:1\tskos:exactMatch\t\n",
        )
        .unwrap();
        let mut source =
            SssomSource::new(SourceOptions::for_files(Format::Sssom, [path])).unwrap();
        let records: Vec<Record> = source.parse().unwrap().collect();
        assert!(records.is_empty());
        assert_eq!(source.take_errors().len(), 1);
    }
}
