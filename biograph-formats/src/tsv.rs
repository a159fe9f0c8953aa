//! Tabular (TSV/CSV) source and sink
//!
//! Two files per graph: a node table and an edge table, classified by
//! `nodes` / `edges` in the file name. The first row is the header;
//! multivalued cells join on `|` with backquote escaping. Malformed rows
//! are reported to the error aggregator and skipped; they never abort the
//! stream.

use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;

use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::debug;

use crate::io::{
    archive_outputs, classify_input, node_edge_paths, open_reader, read_archive, RecordFileKind,
};
use crate::options::{Compression, SinkOptions, SourceOptions};
use crate::sink::Sink;
use crate::source::{shared_errors, RecordStream, SharedErrors, Source};
use biograph_core::record::{EDGE_CORE_COLUMNS, NODE_CORE_COLUMNS};
use biograph_core::value::join_list;
use biograph_core::{Edge, Error, ErrorKind, MessageLevel, Node, Record, Result};

/// Columns written when the caller declares none.
const DEFAULT_NODE_COLUMNS: &[&str] = &[
    "id",
    "category",
    "name",
    "description",
    "xref",
    "provided_by",
    "synonym",
];

const DEFAULT_EDGE_COLUMNS: &[&str] = &[
    "id",
    "subject",
    "predicate",
    "object",
    "category",
    "knowledge_level",
    "agent_type",
    "primary_knowledge_source",
    "provided_by",
];

// ============================================================================
// Source
// ============================================================================

/// Reads node and edge records from TSV/CSV files or tar archives.
pub struct TsvSource {
    options: Option<SourceOptions>,
    errors: SharedErrors,
}

impl TsvSource {
    pub fn new(options: SourceOptions) -> Result<Self> {
        if options.filename.is_empty() {
            return Err(Error::config("tabular source requires at least one file"));
        }
        Ok(Self {
            options: Some(options),
            errors: shared_errors(),
        })
    }
}

impl Source for TsvSource {
    fn parse(&mut self) -> Result<RecordStream<'_>> {
        let options = match self.options.take() {
            Some(o) => o,
            None => return Ok(Box::new(std::iter::empty())),
        };
        let delimiter = options.resolved_format()?.delimiter();
        let quoted = delimiter == ',';

        let mut inputs: Vec<(RecordFileKind, InputLines)> = Vec::new();
        for path in &options.filename {
            if options.compression.is_archive() {
                for member in read_archive(path, options.compression)? {
                    let kind = classify_input(&member.name).ok_or_else(|| {
                        Error::config(format!(
                            "archive contains an unrecognized file: {}",
                            member.name
                        ))
                    })?;
                    inputs.push((kind, InputLines::from_string(member.content)));
                }
            } else {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default();
                let kind = classify_input(name).ok_or_else(|| {
                    Error::config(format!("unrecognized tabular input: {}", path.display()))
                })?;
                inputs.push((kind, InputLines::from_reader(open_reader(path, options.compression)?)));
            }
        }
        // Nodes stream ahead of edges so downstream stores and two-phase
        // sinks see endpoints before the edges that reference them.
        inputs.sort_by_key(|(kind, _)| matches!(kind, RecordFileKind::Edges));

        Ok(Box::new(TsvStream {
            inputs: inputs.into(),
            current: None,
            delimiter,
            quoted,
            provided_by: options.provided_by.clone(),
            errors: Rc::clone(&self.errors),
        }))
    }

    fn errors(&self) -> SharedErrors {
        Rc::clone(&self.errors)
    }
}

/// Lines from an open reader or a buffered archive member.
enum InputLines {
    Io(std::io::Lines<Box<dyn BufRead>>),
    Mem(std::vec::IntoIter<String>),
}

impl InputLines {
    fn from_reader(reader: Box<dyn BufRead>) -> Self {
        InputLines::Io(reader.lines())
    }

    fn from_string(content: String) -> Self {
        InputLines::Mem(
            content
                .lines()
                .map(|l| l.to_string())
                .collect::<Vec<_>>()
                .into_iter(),
        )
    }

    fn next_line(&mut self) -> Option<std::io::Result<String>> {
        match self {
            InputLines::Io(lines) => lines.next(),
            InputLines::Mem(lines) => lines.next().map(Ok),
        }
    }
}

struct ActiveInput {
    kind: RecordFileKind,
    lines: InputLines,
    header: Option<Vec<String>>,
    row_number: usize,
}

struct TsvStream {
    inputs: VecDeque<(RecordFileKind, InputLines)>,
    current: Option<ActiveInput>,
    delimiter: char,
    quoted: bool,
    provided_by: Option<String>,
    errors: SharedErrors,
}

impl TsvStream {
    fn log(&self, kind: ErrorKind, message: &str, subject: String) {
        self.errors
            .borrow_mut()
            .log(MessageLevel::Error, kind, message, subject);
    }

    fn row_to_record(&self, input: &ActiveInput, line: &str) -> Option<Record> {
        let header = input.header.as_ref()?;
        let cells = split_row(line, self.delimiter, self.quoted);
        let mut obj = JsonMap::new();
        for (column, cell) in header.iter().zip(cells) {
            if !cell.is_empty() {
                obj.insert(column.clone(), JsonValue::String(cell));
            }
        }
        match input.kind {
            RecordFileKind::Nodes => match Node::from_json(&obj) {
                Some(mut node) => {
                    if node.provided_by.is_empty() {
                        if let Some(pb) = &self.provided_by {
                            node.provided_by.push(pb.clone());
                        }
                    }
                    Some(Record::Node(node))
                }
                None => {
                    self.log(
                        ErrorKind::MissingNodeProperty,
                        "Node row is missing 'id'",
                        format!("row {}", input.row_number),
                    );
                    None
                }
            },
            RecordFileKind::Edges => match Edge::from_json(&obj) {
                Some(mut edge) => {
                    if edge.provided_by.is_empty() {
                        if let Some(pb) = &self.provided_by {
                            edge.provided_by.push(pb.clone());
                        }
                    }
                    Some(Record::Edge(edge))
                }
                None => {
                    self.log(
                        ErrorKind::MissingEdgeProperty,
                        "Edge row is missing 'subject', 'predicate' or 'object'",
                        format!("row {}", input.row_number),
                    );
                    None
                }
            },
        }
    }
}

impl Iterator for TsvStream {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            if self.current.is_none() {
                let (kind, lines) = self.inputs.pop_front()?;
                self.current = Some(ActiveInput {
                    kind,
                    lines,
                    header: None,
                    row_number: 0,
                });
            }
            let input = self.current.as_mut().expect("current input");
            match input.lines.next_line() {
                None => {
                    self.current = None;
                    continue;
                }
                Some(Err(e)) => {
                    debug!(error = %e, "read failure mid-stream");
                    self.log(
                        ErrorKind::MalformedRecord,
                        "I/O failure while reading row",
                        e.to_string(),
                    );
                    self.current = None;
                    continue;
                }
                Some(Ok(line)) => {
                    input.row_number += 1;
                    let line = line.trim_end_matches('\r');
                    if line.is_empty() {
                        continue;
                    }
                    if input.header.is_none() {
                        input.header = Some(
                            split_row(line, self.delimiter, self.quoted)
                                .into_iter()
                                .collect(),
                        );
                        continue;
                    }
                    let input = self.current.as_ref().expect("current input");
                    if let Some(record) = self.row_to_record(input, line) {
                        return Some(record);
                    }
                }
            }
        }
    }
}

/// Split one row on the delimiter; CSV mode honors double quotes with
/// `""` escapes, TSV mode splits plainly (no quoting, like the original).
fn split_row(line: &str, delimiter: char, quoted: bool) -> Vec<String> {
    if !quoted {
        return line.split(delimiter).map(|s| s.to_string()).collect();
    }
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    cur.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            c if c == delimiter && !in_quotes => out.push(std::mem::take(&mut cur)),
            c => cur.push(c),
        }
    }
    out.push(cur);
    out
}

// ============================================================================
// Sink
// ============================================================================

/// Writes node and edge records to `<base>_nodes` / `<base>_edges` tables.
pub struct TsvSink {
    delimiter: char,
    quoted: bool,
    node_columns: Vec<String>,
    edge_columns: Vec<String>,
    nodes_path: PathBuf,
    edges_path: PathBuf,
    base: PathBuf,
    compression: Compression,
    nodes_out: Option<BufWriter<File>>,
    edges_out: Option<BufWriter<File>>,
    finalized: bool,
}

impl TsvSink {
    pub fn new(options: SinkOptions) -> Result<Self> {
        let delimiter = options.format.delimiter();
        let extension = options.format.as_str();
        let (nodes_path, edges_path) = node_edge_paths(&options.filename, extension);
        if let Some(parent) = options.filename.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let node_columns = order_columns(
            collect_columns(&options.node_properties, DEFAULT_NODE_COLUMNS),
            NODE_CORE_COLUMNS,
        );
        let edge_columns = order_columns(
            collect_columns(&options.edge_properties, DEFAULT_EDGE_COLUMNS),
            EDGE_CORE_COLUMNS,
        );

        let mut nodes_out = BufWriter::new(File::create(&nodes_path)?);
        let mut edges_out = BufWriter::new(File::create(&edges_path)?);
        write_row(&mut nodes_out, &node_columns, delimiter, delimiter == ',')?;
        write_row(&mut edges_out, &edge_columns, delimiter, delimiter == ',')?;

        Ok(Self {
            delimiter,
            quoted: delimiter == ',',
            node_columns,
            edge_columns,
            nodes_path,
            edges_path,
            base: options.filename,
            compression: options.compression,
            nodes_out: Some(nodes_out),
            edges_out: Some(edges_out),
            finalized: false,
        })
    }
}

impl Sink for TsvSink {
    fn write_node(&mut self, node: &Node) -> Result<()> {
        let out = self
            .nodes_out
            .as_mut()
            .ok_or_else(|| Error::other("sink already finalized"))?;
        let cells: Vec<String> = self
            .node_columns
            .iter()
            .map(|c| cell_for(&node.field_values(c)))
            .collect();
        write_row(out, &cells, self.delimiter, self.quoted)
    }

    fn write_edge(&mut self, edge: &Edge) -> Result<()> {
        let out = self
            .edges_out
            .as_mut()
            .ok_or_else(|| Error::other("sink already finalized"))?;
        let cells: Vec<String> = self
            .edge_columns
            .iter()
            .map(|c| cell_for(&edge.field_values(c)))
            .collect();
        write_row(out, &cells, self.delimiter, self.quoted)
    }

    fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        if let Some(mut out) = self.nodes_out.take() {
            out.flush()?;
        }
        if let Some(mut out) = self.edges_out.take() {
            out.flush()?;
        }
        if self.compression.is_archive() {
            archive_outputs(
                &self.base,
                &[self.nodes_path.clone(), self.edges_path.clone()],
                self.compression,
            )?;
        }
        self.finalized = true;
        Ok(())
    }
}

fn collect_columns(declared: &[String], defaults: &[&str]) -> BTreeSet<String> {
    if declared.is_empty() {
        defaults.iter().map(|s| s.to_string()).collect()
    } else {
        declared.iter().cloned().collect()
    }
}

/// Core columns first in their stable order, then the rest sorted, with
/// underscore-prefixed internals last.
fn order_columns(mut columns: BTreeSet<String>, core: &[&str]) -> Vec<String> {
    let mut ordered = Vec::with_capacity(columns.len());
    for c in core {
        if columns.remove(*c) {
            ordered.push(c.to_string());
        }
    }
    let (internal, remaining): (Vec<String>, Vec<String>) =
        columns.into_iter().partition(|c| c.starts_with('_'));
    ordered.extend(remaining);
    ordered.extend(internal);
    ordered
}

fn cell_for(values: &[String]) -> String {
    match values.len() {
        0 => String::new(),
        1 => values[0].clone(),
        _ => join_list(values),
    }
}

fn write_row<W: Write>(out: &mut W, cells: &[String], delimiter: char, quoted: bool) -> Result<()> {
    let mut first = true;
    let mut buf = String::new();
    for cell in cells {
        if !first {
            buf.push(delimiter);
        }
        first = false;
        if quoted && (cell.contains(delimiter) || cell.contains('"')) {
            buf.push('"');
            buf.push_str(&cell.replace('"', "\"\""));
            buf.push('"');
        } else {
            buf.push_str(cell);
        }
    }
    buf.push('\n');
    out.write_all(buf.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Format;

    fn write_fixture(dir: &std::path::Path) -> (PathBuf, PathBuf) {
        let nodes = dir.join("g_nodes.tsv");
        let edges = dir.join("g_edges.tsv");
        std::fs::write(
            &nodes,
            "id\tcategory\tname\nHGNC:11603\tbiolink:Gene\tTBX4\nMONDO:0005002\tbiolink:Disease\tCOPD\n",
        )
        .unwrap();
        std::fs::write(
            &edges,
            "id\tsubject\tpredicate\tobject\ne1\tHGNC:11603\tbiolink:contributes_to\tMONDO:0005002\n",
        )
        .unwrap();
        (nodes, edges)
    }

    #[test]
    fn test_parse_nodes_then_edges() {
        let dir = tempfile::tempdir().unwrap();
        let (nodes, edges) = write_fixture(dir.path());
        // Edge file listed first; the stream still leads with nodes.
        let mut source = TsvSource::new(SourceOptions::for_files(
            Format::Tsv,
            [edges, nodes],
        ))
        .unwrap();
        let records: Vec<Record> = source.parse().unwrap().collect();
        assert_eq!(records.len(), 3);
        assert!(matches!(records[0], Record::Node(_)));
        assert!(matches!(records[2], Record::Edge(_)));
        match &records[2] {
            Record::Edge(e) => {
                assert_eq!(e.id, "e1");
                assert_eq!(e.predicate, "biolink:contributes_to");
            }
            _ => unreachable!(),
        }
        assert!(source.take_errors().is_empty());
    }

    #[test]
    fn test_malformed_row_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = dir.path().join("g_nodes.tsv");
        std::fs::write(&nodes, "id\tname\n\tno-id-here\nX:1\tok\n").unwrap();
        let mut source =
            TsvSource::new(SourceOptions::for_files(Format::Tsv, [nodes])).unwrap();
        let records: Vec<Record> = source.parse().unwrap().collect();
        assert_eq!(records.len(), 1);
        let errors = source.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors.to_json()["ERROR"]["MISSING_NODE_PROPERTY"].is_object());
    }

    #[test]
    fn test_provided_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = dir.path().join("g_nodes.tsv");
        std::fs::write(&nodes, "id\nX:1\n").unwrap();
        let mut options = SourceOptions::for_files(Format::Tsv, [nodes]);
        options.provided_by = Some("test-source".to_string());
        let mut source = TsvSource::new(options).unwrap();
        let records: Vec<Record> = source.parse().unwrap().collect();
        match &records[0] {
            Record::Node(n) => assert_eq!(n.provided_by, vec!["test-source"]),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_sink_writes_core_columns_first() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("out");
        let mut options = SinkOptions::new(Format::Tsv, &base);
        options.node_properties = vec!["id".into(), "zeta".into(), "category".into(), "name".into()];
        options.edge_properties = vec![
            "id".into(),
            "subject".into(),
            "predicate".into(),
            "object".into(),
        ];
        let mut sink = TsvSink::new(options).unwrap();

        let mut node = Node::new("HGNC:11603");
        node.category.push("biolink:Gene".into());
        node.name = Some("TBX4".into());
        node.properties.insert(
            "zeta".into(),
            biograph_core::PropertyValue::String("z".into()),
        );
        sink.write_node(&node).unwrap();
        sink.finalize().unwrap();

        let written = std::fs::read_to_string(dir.path().join("out_nodes.tsv")).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next().unwrap(), "id\tcategory\tname\tzeta");
        assert_eq!(lines.next().unwrap(), "HGNC:11603\tbiolink:Gene\tTBX4\tz");
    }

    #[test]
    fn test_round_trip_multivalued() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("rt");
        let mut options = SinkOptions::new(Format::Tsv, &base);
        options.node_properties = vec!["id".into(), "category".into(), "synonym".into()];
        options.edge_properties =
            vec!["id".into(), "subject".into(), "predicate".into(), "object".into()];
        let mut sink = TsvSink::new(options).unwrap();
        let mut node = Node::new("X:1");
        node.category.push("biolink:Gene".into());
        node.synonym = vec!["a".into(), "b".into()];
        sink.write_node(&node).unwrap();
        sink.finalize().unwrap();

        let mut source = TsvSource::new(SourceOptions::for_files(
            Format::Tsv,
            [dir.path().join("rt_nodes.tsv")],
        ))
        .unwrap();
        let records: Vec<Record> = source.parse().unwrap().collect();
        match &records[0] {
            Record::Node(n) => assert_eq!(n.synonym, vec!["a", "b"]),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_archive_output_and_input() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("arch");
        let mut options = SinkOptions::new(Format::Tsv, &base);
        options.compression = Compression::TarGz;
        let mut sink = TsvSink::new(options).unwrap();
        let mut node = Node::new("X:1");
        node.category.push("biolink:Gene".into());
        sink.write_node(&node).unwrap();
        sink.write_edge(&Edge::new("X:1", "biolink:related_to", "X:1"))
            .unwrap();
        sink.finalize().unwrap();

        let archive = dir.path().join("arch.tar.gz");
        assert!(archive.exists());

        let mut in_options = SourceOptions::for_files(Format::Tsv, [archive]);
        in_options.compression = Compression::TarGz;
        let mut source = TsvSource::new(in_options).unwrap();
        let records: Vec<Record> = source.parse().unwrap().collect();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(
            split_row("a,\"b,c\",\"d\"\"e\"", ',', true),
            vec!["a", "b,c", "d\"e"]
        );
    }
}
