//! N-Triples source and sink, with statement reification
//!
//! The source is a line-oriented triple parser feeding a per-subject
//! buffer. Inputs sorted by subject keep that buffer bounded at one
//! subject: when a new subject arrives, the previous subject's node
//! or reified edge is flushed downstream.
//!
//! Triple classification:
//! - reification predicates (`rdf:subject`/`predicate`/`object`, and the
//!   biolink spellings) accumulate a buffered edge keyed by the reified
//!   statement IRI;
//! - predicates in `node_property_predicates` (plus the built-in label /
//!   description / xref mappings) fold into node properties;
//! - any other triple with an IRI object becomes a plain edge.
//!
//! The sink inverts this: an edge carrying nothing beyond the core slots
//! is a plain triple; anything richer is reified so the annotations have
//! a subject to hang off.

use std::collections::VecDeque;
use std::io::BufRead;
use std::io::{BufWriter, Write};
use std::rc::Rc;

use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::debug;

use crate::io::open_reader;
use crate::options::{SinkOptions, SourceOptions};
use crate::sink::Sink;
use crate::source::{shared_errors, RecordStream, SharedErrors, Source};
use biograph_core::{
    Edge, Error, ErrorKind, MessageLevel, Node, PrefixManager, Record, Result,
};
use biograph_vocab::biolink;

/// RDF / OWL IRIs the parser and writer recognize.
pub mod vocab {
    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const RDF_SUBJECT: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#subject";
    pub const RDF_PREDICATE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#predicate";
    pub const RDF_OBJECT: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#object";
    pub const RDF_STATEMENT: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#Statement";
    pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
    pub const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
    pub const DCT_DESCRIPTION: &str = "http://purl.org/dc/terms/description";
    pub const HAS_DB_XREF: &str = "http://www.geneontology.org/formats/oboInOwl#hasDbXref";
    pub const HAS_EXACT_SYNONYM: &str =
        "http://www.geneontology.org/formats/oboInOwl#hasExactSynonym";
    pub const BIOLINK_BASE: &str = "https://w3id.org/biolink/vocab/";
    pub const BIOLINK_ASSOCIATION: &str = "https://w3id.org/biolink/vocab/Association";
    pub const OBAN_ASSOCIATION: &str = "http://purl.org/oban/association";
}

// ============================================================================
// Triple-line parsing
// ============================================================================

/// One RDF term as it appears in an N-Triples line.
#[derive(Debug, Clone, PartialEq)]
pub enum RdfTerm {
    Iri(String),
    Blank(String),
    Literal {
        value: String,
        datatype: Option<String>,
        language: Option<String>,
    },
}

impl RdfTerm {
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            RdfTerm::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// A stable key for the term: the IRI, `_:label`, or the literal text.
    pub fn key(&self) -> &str {
        match self {
            RdfTerm::Iri(iri) => iri,
            RdfTerm::Blank(label) => label,
            RdfTerm::Literal { value, .. } => value,
        }
    }
}

/// Parse one N-Triples line into `(subject, predicate-IRI, object)`.
///
/// Returns `Ok(None)` for blank lines and comments, `Err` with a message
/// for malformed input.
pub fn parse_triple_line(line: &str) -> std::result::Result<Option<(RdfTerm, String, RdfTerm)>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut rest = line;
    let subject = take_term(&mut rest)?;
    let predicate = match take_term(&mut rest)? {
        RdfTerm::Iri(iri) => iri,
        other => return Err(format!("predicate must be an IRI, got {:?}", other)),
    };
    let object = take_term(&mut rest)?;
    let rest = rest.trim_start();
    if !rest.starts_with('.') {
        return Err("missing statement terminator".to_string());
    }
    Ok(Some((subject, predicate, object)))
}

fn take_term(rest: &mut &str) -> std::result::Result<RdfTerm, String> {
    *rest = rest.trim_start();
    let bytes = rest.as_bytes();
    match bytes.first() {
        Some(b'<') => {
            let end = rest.find('>').ok_or("unterminated IRI")?;
            let iri = rest[1..end].to_string();
            *rest = &rest[end + 1..];
            Ok(RdfTerm::Iri(iri))
        }
        Some(b'_') => {
            if !rest.starts_with("_:") {
                return Err("malformed blank node".to_string());
            }
            let end = rest
                .find(|c: char| c.is_whitespace())
                .unwrap_or(rest.len());
            let label = rest[..end].to_string();
            *rest = &rest[end..];
            Ok(RdfTerm::Blank(label))
        }
        Some(b'"') => {
            let (value, consumed) = take_quoted(rest)?;
            *rest = &rest[consumed..];
            let mut datatype = None;
            let mut language = None;
            if let Some(stripped) = rest.strip_prefix("^^<") {
                let end = stripped.find('>').ok_or("unterminated datatype IRI")?;
                datatype = Some(stripped[..end].to_string());
                *rest = &stripped[end + 1..];
            } else if let Some(stripped) = rest.strip_prefix('@') {
                let end = stripped
                    .find(|c: char| c.is_whitespace())
                    .unwrap_or(stripped.len());
                language = Some(stripped[..end].to_string());
                *rest = &stripped[end..];
            }
            Ok(RdfTerm::Literal {
                value,
                datatype,
                language,
            })
        }
        _ => Err(format!("unexpected term start: {:?}", rest.chars().next())),
    }
}

/// Consume a quoted literal from the front of `rest`, returning the
/// unescaped value and bytes consumed (including both quotes).
fn take_quoted(rest: &str) -> std::result::Result<(String, usize), String> {
    let mut value = String::new();
    let mut chars = rest.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((value, i + 1)),
            '\\' => {
                let (_, esc) = chars.next().ok_or("dangling escape")?;
                match esc {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '"' => value.push('"'),
                    '\\' => value.push('\\'),
                    'u' => value.push(take_unicode(&mut chars, 4)?),
                    'U' => value.push(take_unicode(&mut chars, 8)?),
                    other => return Err(format!("unknown escape \\{}", other)),
                }
            }
            c => value.push(c),
        }
    }
    Err("unterminated literal".to_string())
}

fn take_unicode(
    chars: &mut std::iter::Peekable<impl Iterator<Item = (usize, char)>>,
    len: usize,
) -> std::result::Result<char, String> {
    let mut code = String::with_capacity(len);
    for _ in 0..len {
        let (_, c) = chars.next().ok_or("truncated unicode escape")?;
        code.push(c);
    }
    let cp = u32::from_str_radix(&code, 16).map_err(|_| "bad unicode escape")?;
    char::from_u32(cp).ok_or_else(|| "invalid code point".to_string())
}

/// Escape a literal value for N-Triples output.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

// ============================================================================
// Source
// ============================================================================

/// Reads nodes and edges from an N-Triples stream.
pub struct NtSource {
    options: Option<SourceOptions>,
    errors: SharedErrors,
    /// Extra predicate->edge mappings layered in by the OWL source
    extra_edge_predicates: Vec<(String, String)>,
}

impl NtSource {
    pub fn new(options: SourceOptions) -> Result<Self> {
        if options.filename.is_empty() {
            return Err(Error::config("nt source requires at least one file"));
        }
        Ok(Self {
            options: Some(options),
            errors: shared_errors(),
            extra_edge_predicates: Vec::new(),
        })
    }

    /// Used by the OWL source: map additional predicate IRIs onto biolink
    /// predicates before the default classification runs.
    pub(crate) fn with_extra_edge_predicates(
        mut self,
        mappings: Vec<(String, String)>,
    ) -> Self {
        self.extra_edge_predicates = mappings;
        self
    }

    fn build_prefix_manager(options: &SourceOptions) -> PrefixManager {
        let mut pm = PrefixManager::new();
        pm.update(
            options
                .prefix_map
                .iter()
                .map(|(p, i)| (p.clone(), i.clone())),
        );
        pm.update(
            options
                .reverse_prefix_map
                .iter()
                .map(|(iri, p)| (p.clone(), iri.clone())),
        );
        pm
    }
}

impl Source for NtSource {
    fn parse(&mut self) -> Result<RecordStream<'_>> {
        let options = match self.options.take() {
            Some(o) => o,
            None => return Ok(Box::new(std::iter::empty())),
        };
        let pm = Self::build_prefix_manager(&options);
        let mut readers = VecDeque::new();
        for path in &options.filename {
            readers.push_back(open_reader(path, options.compression)?);
        }
        Ok(Box::new(NtStream {
            readers,
            current: None,
            buffer: None,
            queue: VecDeque::new(),
            pm,
            options,
            extra_edge_predicates: self.extra_edge_predicates.clone(),
            errors: Rc::clone(&self.errors),
            finished: false,
        }))
    }

    fn errors(&self) -> SharedErrors {
        Rc::clone(&self.errors)
    }
}

/// What the per-subject buffer currently holds.
enum SubjectBuffer {
    Node(Node),
    /// A reified statement: `id` is the statement IRI's CURIE
    ReifiedEdge {
        id: String,
        fields: JsonMap<String, JsonValue>,
    },
}

struct NtStream {
    readers: VecDeque<Box<dyn BufRead>>,
    current: Option<std::io::Lines<Box<dyn BufRead>>>,
    /// The subject currently being accumulated, with its buffer
    buffer: Option<(String, SubjectBuffer)>,
    /// Records ready to yield
    queue: VecDeque<Record>,
    pm: PrefixManager,
    options: SourceOptions,
    extra_edge_predicates: Vec<(String, String)>,
    errors: SharedErrors,
    finished: bool,
}

impl NtStream {
    fn log(&self, level: MessageLevel, kind: ErrorKind, message: &str, subject: impl Into<String>) {
        self.errors.borrow_mut().log(level, kind, message, subject);
    }

    fn contract(&self, iri: &str) -> String {
        self.pm.contract(iri).unwrap_or_else(|_| iri.to_string())
    }

    /// Is this predicate one of the reification slots? Returns the
    /// record field it populates.
    fn reification_field(predicate: &str) -> Option<&'static str> {
        match predicate {
            vocab::RDF_SUBJECT => Some("subject"),
            vocab::RDF_PREDICATE => Some("predicate"),
            vocab::RDF_OBJECT => Some("object"),
            _ => {
                if let Some(local) = predicate.strip_prefix(vocab::BIOLINK_BASE) {
                    match local {
                        "subject" => Some("subject"),
                        "predicate" => Some("predicate"),
                        "object" => Some("object"),
                        _ => None,
                    }
                } else {
                    None
                }
            }
        }
    }

    fn is_reification_type(object: &str) -> bool {
        matches!(
            object,
            vocab::RDF_STATEMENT | vocab::BIOLINK_ASSOCIATION | vocab::OBAN_ASSOCIATION
        )
    }

    /// The node property a predicate folds into, if any.
    fn node_property_field(&self, predicate: &str) -> Option<String> {
        match predicate {
            vocab::RDFS_LABEL => return Some("name".to_string()),
            vocab::DCT_DESCRIPTION => return Some("description".to_string()),
            vocab::HAS_DB_XREF => return Some("xref".to_string()),
            vocab::HAS_EXACT_SYNONYM => return Some("synonym".to_string()),
            _ => {}
        }
        if let Some(local) = predicate.strip_prefix(vocab::BIOLINK_BASE) {
            // biolink vocab properties map onto the slot of the same name,
            // except the relation slots handled elsewhere.
            if !matches!(local, "subject" | "predicate" | "object") {
                return Some(local.to_string());
            }
        }
        let curie = self.contract(predicate);
        if self.options.node_property_predicates.contains(predicate)
            || self.options.node_property_predicates.contains(&curie)
        {
            let local = curie.rsplit([':', '/', '#']).next().unwrap_or(&curie);
            return Some(local.to_string());
        }
        None
    }

    /// Map a predicate IRI onto a biolink edge predicate.
    fn edge_predicate(&self, predicate: &str) -> String {
        for (iri, mapped) in &self.extra_edge_predicates {
            if iri == predicate {
                return mapped.clone();
            }
        }
        if predicate == vocab::RDFS_SUBCLASS_OF {
            return biolink::SUBCLASS_OF.to_string();
        }
        let curie = self.contract(predicate);
        if let Some(mapped) = self
            .options
            .predicate_mappings
            .get(predicate)
            .or_else(|| self.options.predicate_mappings.get(&curie))
        {
            return mapped.clone();
        }
        if curie.contains(':') && !PrefixManager::is_iri(&curie) {
            curie
        } else {
            // Unresolvable IRI: fall back to the catch-all predicate.
            biolink::RELATED_TO.to_string()
        }
    }

    /// Flush the per-subject buffer into the output queue.
    fn flush_buffer(&mut self) {
        let (subject, buffer) = match self.buffer.take() {
            Some(b) => b,
            None => return,
        };
        match buffer {
            SubjectBuffer::Node(mut node) => {
                node.ensure_category();
                if node.provided_by.is_empty() {
                    if let Some(pb) = &self.options.provided_by {
                        node.provided_by.push(pb.clone());
                    }
                }
                self.queue.push_back(Record::Node(node));
            }
            SubjectBuffer::ReifiedEdge { id, mut fields } => {
                fields.insert("id".to_string(), JsonValue::String(id));
                match Edge::from_json(&fields) {
                    Some(mut edge) => {
                        if edge.provided_by.is_empty() {
                            if let Some(pb) = &self.options.provided_by {
                                edge.provided_by.push(pb.clone());
                            }
                        }
                        self.queue.push_back(Record::Edge(edge));
                    }
                    None => {
                        self.log(
                            MessageLevel::Error,
                            ErrorKind::InvalidEdgeTriple,
                            "Reified statement is missing subject/predicate/object",
                            subject,
                        );
                    }
                }
            }
        }
    }

    /// Feed one parsed triple through the classification rules.
    fn handle_triple(&mut self, s: RdfTerm, p: String, o: RdfTerm) {
        let subject_key = self.contract(s.key());

        // A new subject closes out the previous buffer (sorted input
        // keeps exactly one subject in flight).
        if self
            .buffer
            .as_ref()
            .map(|(cur, _)| *cur != subject_key)
            .unwrap_or(false)
        {
            self.flush_buffer();
        }

        if let Some(field) = Self::reification_field(&p) {
            let value = match field {
                "predicate" => self.edge_predicate(o.key()),
                _ => self.contract(o.key()),
            };
            let entry = self.buffer.get_or_insert_with(|| {
                (
                    subject_key.clone(),
                    SubjectBuffer::ReifiedEdge {
                        id: subject_key.clone(),
                        fields: JsonMap::new(),
                    },
                )
            });
            match &mut entry.1 {
                SubjectBuffer::ReifiedEdge { fields, .. } => {
                    fields.insert(field.to_string(), JsonValue::String(value));
                }
                SubjectBuffer::Node(node) => {
                    // Late reification marker: convert the node buffer.
                    debug!(subject = %subject_key, "subject switched to reified statement");
                    let json = node.to_json();
                    let mut fields = JsonMap::new();
                    if let Some(obj) = json.as_object() {
                        for (k, v) in obj {
                            if k != "id" && k != "category" {
                                fields.insert(k.clone(), v.clone());
                            }
                        }
                    }
                    fields.insert(field.to_string(), JsonValue::String(value));
                    entry.1 = SubjectBuffer::ReifiedEdge {
                        id: subject_key.clone(),
                        fields,
                    };
                }
            }
            return;
        }

        if p == vocab::RDF_TYPE {
            if let Some(iri) = o.as_iri() {
                if Self::is_reification_type(iri) {
                    let category = self.contract(iri);
                    let entry = self.buffer.get_or_insert_with(|| {
                        (
                            subject_key.clone(),
                            SubjectBuffer::ReifiedEdge {
                                id: subject_key.clone(),
                                fields: JsonMap::new(),
                            },
                        )
                    });
                    if let SubjectBuffer::ReifiedEdge { fields, .. } = &mut entry.1 {
                        fields.insert("category".to_string(), JsonValue::String(category));
                    }
                    return;
                }
                let category = self.contract(iri);
                let entry = self.node_buffer(&subject_key);
                if !entry.category.contains(&category) {
                    entry.category.push(category);
                }
                return;
            }
        }

        match &o {
            RdfTerm::Literal { value, .. } => {
                let field = self
                    .node_property_field(&p)
                    .unwrap_or_else(|| {
                        let curie = self.contract(&p);
                        curie
                            .rsplit([':', '/', '#'])
                            .next()
                            .unwrap_or(&curie)
                            .to_string()
                    });
                let value = value.clone();
                // Annotation literal on a reified statement stays with
                // the edge; repeated fields accumulate as arrays.
                if let Some((cur, SubjectBuffer::ReifiedEdge { fields, .. })) = &mut self.buffer {
                    if *cur == subject_key {
                        match fields.entry(field) {
                            serde_json::map::Entry::Vacant(slot) => {
                                slot.insert(JsonValue::String(value));
                            }
                            serde_json::map::Entry::Occupied(mut slot) => {
                                match slot.get_mut() {
                                    JsonValue::Array(items) => {
                                        items.push(JsonValue::String(value))
                                    }
                                    other => {
                                        let prev = other.clone();
                                        *other = JsonValue::Array(vec![
                                            prev,
                                            JsonValue::String(value),
                                        ]);
                                    }
                                }
                            }
                        }
                        return;
                    }
                }
                let node = self.node_buffer(&subject_key);
                match field.as_str() {
                    "name" => node.name = Some(value),
                    "description" => node.description = Some(value),
                    "category" => {
                        if !node.category.contains(&value) {
                            node.category.push(value);
                        }
                    }
                    "xref" => {
                        if !node.xref.contains(&value) {
                            node.xref.push(value);
                        }
                    }
                    "synonym" => {
                        if !node.synonym.contains(&value) {
                            node.synonym.push(value);
                        }
                    }
                    "provided_by" => {
                        if !node.provided_by.contains(&value) {
                            node.provided_by.push(value);
                        }
                    }
                    _ => {
                        node.properties.insert(
                            field,
                            biograph_core::PropertyValue::String(value),
                        );
                    }
                }
            }
            RdfTerm::Iri(_) | RdfTerm::Blank(_) => {
                if let Some(field) = self.node_property_field(&p) {
                    let value = self.contract(o.key());
                    let node = self.node_buffer(&subject_key);
                    match field.as_str() {
                        "xref" => {
                            if !node.xref.contains(&value) {
                                node.xref.push(value);
                            }
                        }
                        "same_as" => {
                            let slot = node
                                .properties
                                .entry("same_as".to_string())
                                .or_insert_with(|| {
                                    biograph_core::PropertyValue::List(Vec::new())
                                });
                            if let biograph_core::PropertyValue::List(items) = slot {
                                if !items.contains(&value) {
                                    items.push(value);
                                }
                            }
                        }
                        _ => {
                            node.properties.insert(
                                field,
                                biograph_core::PropertyValue::String(value),
                            );
                        }
                    }
                    return;
                }
                // Plain relation triple: emit an edge immediately.
                let predicate = self.edge_predicate(&p);
                let object_key = self.contract(o.key());
                let mut edge = Edge::new(subject_key.clone(), predicate, object_key);
                if let Some(pb) = &self.options.provided_by {
                    edge.provided_by.push(pb.clone());
                }
                self.queue.push_back(Record::Edge(edge));
            }
        }
    }

    fn node_buffer(&mut self, subject_key: &str) -> &mut Node {
        let entry = self.buffer.get_or_insert_with(|| {
            (
                subject_key.to_string(),
                SubjectBuffer::Node(Node::new(subject_key.to_string())),
            )
        });
        if matches!(entry.1, SubjectBuffer::ReifiedEdge { .. }) {
            // Property triples on a reified statement are rare; keep
            // them on a throwaway node to avoid corrupting the edge.
            entry.1 = SubjectBuffer::Node(Node::new(subject_key.to_string()));
        }
        match &mut entry.1 {
            SubjectBuffer::Node(node) => node,
            SubjectBuffer::ReifiedEdge { .. } => unreachable!(),
        }
    }
}

impl Iterator for NtStream {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            if let Some(record) = self.queue.pop_front() {
                return Some(record);
            }
            if self.finished {
                return None;
            }
            if self.current.is_none() {
                match self.readers.pop_front() {
                    Some(reader) => self.current = Some(reader.lines()),
                    None => {
                        self.finished = true;
                        self.flush_buffer();
                        continue;
                    }
                }
            }
            match self.current.as_mut().expect("current reader").next() {
                None => {
                    self.current = None;
                }
                Some(Err(e)) => {
                    self.log(
                        MessageLevel::Error,
                        ErrorKind::MalformedRecord,
                        "I/O failure while reading triples",
                        e.to_string(),
                    );
                    self.current = None;
                }
                Some(Ok(line)) => match parse_triple_line(&line) {
                    Ok(None) => {}
                    Ok(Some((s, p, o))) => self.handle_triple(s, p, o),
                    Err(msg) => {
                        self.log(
                            MessageLevel::Error,
                            ErrorKind::MalformedRecord,
                            "Malformed N-Triples line",
                            format!("{}: {}", msg, line.trim()),
                        );
                    }
                },
            }
        }
    }
}

// ============================================================================
// Sink
// ============================================================================

/// Writes nodes and edges as N-Triples, reifying annotated edges.
pub struct NtSink {
    out: Option<BufWriter<std::fs::File>>,
    pm: PrefixManager,
}

impl NtSink {
    pub fn new(options: SinkOptions) -> Result<Self> {
        let mut pm = PrefixManager::new();
        pm.update(
            options
                .prefix_map
                .iter()
                .map(|(p, i)| (p.clone(), i.clone())),
        );
        let file = std::fs::File::create(&options.filename)?;
        Ok(Self {
            out: Some(BufWriter::new(file)),
            pm,
        })
    }

    fn expand(&self, curie: &str) -> String {
        self.pm
            .expand(curie)
            .unwrap_or_else(|_| format!("{}{}", vocab::BIOLINK_BASE, curie))
    }

    fn property_iri(&self, field: &str) -> String {
        match field {
            "name" => vocab::RDFS_LABEL.to_string(),
            "description" => vocab::DCT_DESCRIPTION.to_string(),
            "xref" => vocab::HAS_DB_XREF.to_string(),
            "synonym" => vocab::HAS_EXACT_SYNONYM.to_string(),
            other => format!("{}{}", vocab::BIOLINK_BASE, other),
        }
    }

    fn triple(&mut self, s: &str, p: &str, o: &str) -> Result<()> {
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| Error::other("sink already finalized"))?;
        writeln!(out, "<{}> <{}> <{}> .", s, p, o)?;
        Ok(())
    }

    fn literal_triple(&mut self, s: &str, p: &str, value: &str) -> Result<()> {
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| Error::other("sink already finalized"))?;
        writeln!(out, "<{}> <{}> \"{}\" .", s, p, escape_literal(value))?;
        Ok(())
    }

    /// Does this edge need reification to carry its annotations?
    fn needs_reification(edge: &Edge) -> bool {
        !edge.properties.is_empty()
            || !edge.publications.is_empty()
            || edge.primary_knowledge_source.is_some()
            || !edge.aggregator_knowledge_source.is_empty()
            || edge.knowledge_level.is_some()
            || edge.agent_type.is_some()
    }
}

impl Sink for NtSink {
    fn write_node(&mut self, node: &Node) -> Result<()> {
        let s = self.expand(&node.id);
        for category in &node.category {
            let c = self.expand(category);
            self.triple(&s, vocab::RDF_TYPE, &c)?;
        }
        if let Some(name) = &node.name {
            self.literal_triple(&s, vocab::RDFS_LABEL, name)?;
        }
        if let Some(desc) = &node.description {
            self.literal_triple(&s, vocab::DCT_DESCRIPTION, desc)?;
        }
        for xref in &node.xref {
            self.literal_triple(&s, vocab::HAS_DB_XREF, xref)?;
        }
        for synonym in &node.synonym {
            self.literal_triple(&s, vocab::HAS_EXACT_SYNONYM, synonym)?;
        }
        for pb in &node.provided_by {
            let p = self.property_iri("provided_by");
            self.literal_triple(&s, &p, pb)?;
        }
        for (field, value) in &node.properties {
            let p = self.property_iri(field);
            for v in value.to_string_list() {
                self.literal_triple(&s, &p, &v)?;
            }
        }
        Ok(())
    }

    fn write_edge(&mut self, edge: &Edge) -> Result<()> {
        let s = self.expand(&edge.subject);
        let p = self.expand(&edge.predicate);
        let o = self.expand(&edge.object);
        if !Self::needs_reification(edge) {
            return self.triple(&s, &p, &o);
        }
        // Reified statement keyed by the edge id.
        let stmt = if PrefixManager::is_iri(&edge.id) {
            edge.id.clone()
        } else {
            self.expand(&edge.id)
        };
        self.triple(&stmt, vocab::RDF_TYPE, vocab::BIOLINK_ASSOCIATION)?;
        self.triple(&stmt, vocab::RDF_SUBJECT, &s)?;
        let pred_iri = self.property_iri("predicate");
        self.literal_triple(&stmt, &pred_iri, &edge.predicate)?;
        self.triple(&stmt, vocab::RDF_PREDICATE, &p)?;
        self.triple(&stmt, vocab::RDF_OBJECT, &o)?;
        if let Some(v) = &edge.knowledge_level {
            let p = self.property_iri("knowledge_level");
            self.literal_triple(&stmt, &p, v)?;
        }
        if let Some(v) = &edge.agent_type {
            let p = self.property_iri("agent_type");
            self.literal_triple(&stmt, &p, v)?;
        }
        if let Some(v) = &edge.primary_knowledge_source {
            let p = self.property_iri("primary_knowledge_source");
            self.literal_triple(&stmt, &p, v)?;
        }
        for v in &edge.aggregator_knowledge_source {
            let p = self.property_iri("aggregator_knowledge_source");
            self.literal_triple(&stmt, &p, v)?;
        }
        for v in &edge.supporting_data_source {
            let p = self.property_iri("supporting_data_source");
            self.literal_triple(&stmt, &p, v)?;
        }
        for v in &edge.publications {
            let p = self.property_iri("publications");
            self.literal_triple(&stmt, &p, v)?;
        }
        for (field, value) in &edge.properties {
            let p = self.property_iri(field);
            for v in value.to_string_list() {
                self.literal_triple(&stmt, &p, &v)?;
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if let Some(mut out) = self.out.take() {
            out.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Format;

    #[test]
    fn test_parse_triple_line() {
        let (s, p, o) = parse_triple_line(
            "<http://identifiers.org/hgnc/11603> <http://www.w3.org/2000/01/rdf-schema#label> \"TBX4\" .",
        )
        .unwrap()
        .unwrap();
        assert_eq!(s.key(), "http://identifiers.org/hgnc/11603");
        assert_eq!(p, vocab::RDFS_LABEL);
        assert_eq!(
            o,
            RdfTerm::Literal {
                value: "TBX4".into(),
                datatype: None,
                language: None
            }
        );
    }

    #[test]
    fn test_parse_literal_escapes() {
        let (_, _, o) =
            parse_triple_line(r#"<http://x/a> <http://x/p> "line\nbreak \"q\"" ."#)
                .unwrap()
                .unwrap();
        match o {
            RdfTerm::Literal { value, .. } => assert_eq!(value, "line\nbreak \"q\""),
            _ => panic!("expected literal"),
        }
    }

    #[test]
    fn test_malformed_line_is_error() {
        assert!(parse_triple_line("<http://x/a> <http://x/p>").is_err());
        assert!(parse_triple_line("not a triple").is_err());
    }

    #[test]
    fn test_comments_and_blanks_skipped() {
        assert_eq!(parse_triple_line("# comment").unwrap(), None);
        assert_eq!(parse_triple_line("   ").unwrap(), None);
    }

    fn parse_nt(content: &str) -> (Vec<Record>, biograph_core::ErrorAggregator) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.nt");
        std::fs::write(&path, content).unwrap();
        let mut source = NtSource::new(SourceOptions::for_files(Format::Nt, [path])).unwrap();
        let records: Vec<Record> = source.parse().unwrap().collect();
        (records, source.take_errors())
    }

    #[test]
    fn test_node_properties_fold() {
        let (records, errors) = parse_nt(concat!(
            "<http://identifiers.org/hgnc/11603> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <https://w3id.org/biolink/vocab/Gene> .\n",
            "<http://identifiers.org/hgnc/11603> <http://www.w3.org/2000/01/rdf-schema#label> \"TBX4\" .\n",
        ));
        assert!(errors.is_empty());
        assert_eq!(records.len(), 1);
        match &records[0] {
            Record::Node(n) => {
                assert_eq!(n.id, "HGNC:11603");
                assert_eq!(n.category, vec!["biolink:Gene"]);
                assert_eq!(n.name.as_deref(), Some("TBX4"));
            }
            _ => panic!("expected node"),
        }
    }

    #[test]
    fn test_plain_triple_becomes_edge() {
        let (records, _) = parse_nt(
            "<http://identifiers.org/hgnc/11603> <https://w3id.org/biolink/vocab/contributes_to> <http://purl.obolibrary.org/obo/MONDO_0005002> .\n",
        );
        let edges: Vec<&Edge> = records
            .iter()
            .filter_map(|r| match r {
                Record::Edge(e) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].subject, "HGNC:11603");
        assert_eq!(edges[0].predicate, "biolink:contributes_to");
        assert_eq!(edges[0].object, "MONDO:0005002");
    }

    #[test]
    fn test_reified_statement_builds_edge() {
        let (records, errors) = parse_nt(concat!(
            "<urn:uuid:e1> <http://www.w3.org/1999/02/22-rdf-syntax-ns#subject> <http://identifiers.org/hgnc/11603> .\n",
            "<urn:uuid:e1> <http://www.w3.org/1999/02/22-rdf-syntax-ns#predicate> <https://w3id.org/biolink/vocab/contributes_to> .\n",
            "<urn:uuid:e1> <http://www.w3.org/1999/02/22-rdf-syntax-ns#object> <http://purl.obolibrary.org/obo/MONDO_0005002> .\n",
        ));
        assert!(errors.is_empty());
        assert_eq!(records.len(), 1);
        match &records[0] {
            Record::Edge(e) => {
                assert_eq!(e.id, "urn:uuid:e1");
                assert_eq!(e.subject, "HGNC:11603");
                assert_eq!(e.predicate, "biolink:contributes_to");
                assert_eq!(e.object, "MONDO:0005002");
            }
            _ => panic!("expected edge"),
        }
    }

    #[test]
    fn test_malformed_line_skipped_stream_continues() {
        let (records, errors) = parse_nt(concat!(
            "this is not a triple\n",
            "<http://identifiers.org/hgnc/1> <http://www.w3.org/2000/01/rdf-schema#label> \"ok\" .\n",
        ));
        assert_eq!(records.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(errors.to_json()["ERROR"]["MALFORMED_RECORD"].is_object());
    }

    #[test]
    fn test_sink_round_trip_plain_and_reified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.nt");
        let mut sink = NtSink::new(SinkOptions::new(Format::Nt, &path)).unwrap();

        let mut node = Node::new("HGNC:11603");
        node.category.push("biolink:Gene".into());
        node.name = Some("TBX4".into());
        sink.write_node(&node).unwrap();

        // Plain edge: no annotations.
        sink.write_edge(&Edge::new(
            "HGNC:11603",
            "biolink:contributes_to",
            "MONDO:0005002",
        ))
        .unwrap();

        // Annotated edge: must reify.
        let mut rich = Edge::new("HGNC:11603", "biolink:interacts_with", "HGNC:12345");
        rich.publications.push("PMID:123".into());
        sink.write_edge(&rich).unwrap();
        sink.finalize().unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("<http://www.w3.org/1999/02/22-rdf-syntax-ns#subject>"));

        let mut source = NtSource::new(SourceOptions::for_files(Format::Nt, [path])).unwrap();
        let records: Vec<Record> = source.parse().unwrap().collect();
        let edges: Vec<&Edge> = records
            .iter()
            .filter_map(|r| match r {
                Record::Edge(e) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(edges.len(), 2);
        let reified = edges
            .iter()
            .find(|e| e.predicate == "biolink:interacts_with")
            .unwrap();
        assert_eq!(reified.publications, vec!["PMID:123"]);
    }
}
