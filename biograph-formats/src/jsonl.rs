//! JSON Lines source and sink
//!
//! Two sibling files, `<base>_nodes.jsonl` and `<base>_edges.jsonl`, one
//! JSON object per line. Empty lines are tolerated. The line-per-record
//! shape makes this the cheapest streaming format on both sides.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::rc::Rc;

use flate2::write::GzEncoder;
use flate2::Compression as GzLevel;
use serde_json::Value as JsonValue;

use crate::io::{classify_input, node_edge_paths, open_reader, RecordFileKind};
use crate::options::{Compression, SinkOptions, SourceOptions};
use crate::sink::Sink;
use crate::source::{shared_errors, RecordStream, SharedErrors, Source};
use biograph_core::{Edge, Error, ErrorKind, MessageLevel, Node, Record, Result};

// ============================================================================
// Source
// ============================================================================

/// Reads records from node/edge JSON Lines files.
pub struct JsonlSource {
    options: Option<SourceOptions>,
    errors: SharedErrors,
}

impl JsonlSource {
    pub fn new(options: SourceOptions) -> Result<Self> {
        if options.filename.is_empty() {
            return Err(Error::config("jsonl source requires at least one file"));
        }
        Ok(Self {
            options: Some(options),
            errors: shared_errors(),
        })
    }
}

impl Source for JsonlSource {
    fn parse(&mut self) -> Result<RecordStream<'_>> {
        let options = match self.options.take() {
            Some(o) => o,
            None => return Ok(Box::new(std::iter::empty())),
        };
        let mut inputs = Vec::new();
        for path in &options.filename {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            let kind = classify_input(name).ok_or_else(|| {
                Error::config(format!("unrecognized jsonl input: {}", path.display()))
            })?;
            inputs.push((kind, open_reader(path, options.compression)?));
        }
        inputs.sort_by_key(|(kind, _)| matches!(kind, RecordFileKind::Edges));

        Ok(Box::new(JsonlStream {
            inputs: inputs.into(),
            current: None,
            provided_by: options.provided_by.clone(),
            errors: Rc::clone(&self.errors),
        }))
    }

    fn errors(&self) -> SharedErrors {
        Rc::clone(&self.errors)
    }
}

struct JsonlStream {
    inputs: VecDeque<(RecordFileKind, Box<dyn BufRead>)>,
    current: Option<(RecordFileKind, std::io::Lines<Box<dyn BufRead>>)>,
    provided_by: Option<String>,
    errors: SharedErrors,
}

impl JsonlStream {
    fn parse_line(&self, kind: RecordFileKind, line: &str) -> Option<Record> {
        let value: JsonValue = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                self.errors.borrow_mut().log(
                    MessageLevel::Error,
                    ErrorKind::MalformedRecord,
                    "Unparseable JSON line",
                    e.to_string(),
                );
                return None;
            }
        };
        let obj = value.as_object()?;
        match kind {
            RecordFileKind::Nodes => match Node::from_json(obj) {
                Some(mut node) => {
                    if node.provided_by.is_empty() {
                        if let Some(pb) = &self.provided_by {
                            node.provided_by.push(pb.clone());
                        }
                    }
                    Some(Record::Node(node))
                }
                None => {
                    self.errors.borrow_mut().log(
                        MessageLevel::Error,
                        ErrorKind::MissingNodeProperty,
                        "Node line is missing 'id'",
                        line,
                    );
                    None
                }
            },
            RecordFileKind::Edges => match Edge::from_json(obj) {
                Some(mut edge) => {
                    if edge.provided_by.is_empty() {
                        if let Some(pb) = &self.provided_by {
                            edge.provided_by.push(pb.clone());
                        }
                    }
                    Some(Record::Edge(edge))
                }
                None => {
                    self.errors.borrow_mut().log(
                        MessageLevel::Error,
                        ErrorKind::MissingEdgeProperty,
                        "Edge line is missing 'subject', 'predicate' or 'object'",
                        line,
                    );
                    None
                }
            },
        }
    }
}

impl Iterator for JsonlStream {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            if self.current.is_none() {
                let (kind, reader) = self.inputs.pop_front()?;
                self.current = Some((kind, reader.lines()));
            }
            let (kind, lines) = self.current.as_mut().expect("current input");
            let kind = *kind;
            match lines.next() {
                None => {
                    self.current = None;
                }
                Some(Err(e)) => {
                    self.errors.borrow_mut().log(
                        MessageLevel::Error,
                        ErrorKind::MalformedRecord,
                        "I/O failure while reading line",
                        e.to_string(),
                    );
                    self.current = None;
                }
                Some(Ok(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if let Some(record) = self.parse_line(kind, line) {
                        return Some(record);
                    }
                }
            }
        }
    }
}

// ============================================================================
// Sink
// ============================================================================

/// Writes records to `<base>_nodes.jsonl` / `<base>_edges.jsonl`.
pub struct JsonlSink {
    nodes_out: Option<Box<dyn Write>>,
    edges_out: Option<Box<dyn Write>>,
}

impl JsonlSink {
    pub fn new(options: SinkOptions) -> Result<Self> {
        if let Some(parent) = options.filename.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let (mut nodes_path, mut edges_path) = node_edge_paths(&options.filename, "jsonl");
        let gz = options.compression == Compression::Gz;
        if gz {
            nodes_path.set_extension("jsonl.gz");
            edges_path.set_extension("jsonl.gz");
        }
        let open = |path: &std::path::Path| -> Result<Box<dyn Write>> {
            let file = File::create(path)?;
            Ok(if gz {
                Box::new(BufWriter::new(GzEncoder::new(file, GzLevel::default())))
            } else {
                Box::new(BufWriter::new(file))
            })
        };
        Ok(Self {
            nodes_out: Some(open(&nodes_path)?),
            edges_out: Some(open(&edges_path)?),
        })
    }
}

impl Sink for JsonlSink {
    fn write_node(&mut self, node: &Node) -> Result<()> {
        let out = self
            .nodes_out
            .as_mut()
            .ok_or_else(|| Error::other("sink already finalized"))?;
        serde_json::to_writer(&mut *out, &node.to_json())?;
        out.write_all(b"\n")?;
        Ok(())
    }

    fn write_edge(&mut self, edge: &Edge) -> Result<()> {
        let out = self
            .edges_out
            .as_mut()
            .ok_or_else(|| Error::other("sink already finalized"))?;
        serde_json::to_writer(&mut *out, &edge.to_json())?;
        out.write_all(b"\n")?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if let Some(mut out) = self.nodes_out.take() {
            out.flush()?;
        }
        if let Some(mut out) = self.edges_out.take() {
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
    fn test_round_trip_with_empty_lines() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("g");
        let mut sink = JsonlSink::new(SinkOptions::new(Format::Jsonl, &base)).unwrap();
        let mut node = Node::new("X:1");
        node.category.push("biolink:Gene".into());
        sink.write_node(&node).unwrap();
        sink.write_edge(&Edge::new("X:1", "biolink:related_to", "Y:2"))
            .unwrap();
        sink.finalize().unwrap();

        // Inject blank lines; the reader must tolerate them.
        let nodes_path = dir.path().join("g_nodes.jsonl");
        let mut content = std::fs::read_to_string(&nodes_path).unwrap();
        content.push_str("\n\n");
        std::fs::write(&nodes_path, content).unwrap();

        let mut source = JsonlSource::new(SourceOptions::for_files(
            Format::Jsonl,
            [nodes_path, dir.path().join("g_edges.jsonl")],
        ))
        .unwrap();
        let records: Vec<Record> = source.parse().unwrap().collect();
        assert_eq!(records.len(), 2);
        assert!(source.take_errors().is_empty());
    }

    #[test]
    fn test_gz_output_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("g");
        let mut options = SinkOptions::new(Format::Jsonl, &base);
        options.compression = Compression::Gz;
        let mut sink = JsonlSink::new(options).unwrap();
        sink.write_node(&Node::new("X:1")).unwrap();
        sink.finalize().unwrap();

        let nodes_path = dir.path().join("g_nodes.jsonl.gz");
        assert!(nodes_path.exists());
        let mut in_options = SourceOptions::for_files(Format::Jsonl, [nodes_path]);
        in_options.compression = Compression::Gz;
        let mut source = JsonlSource::new(in_options).unwrap();
        assert_eq!(source.parse().unwrap().count(), 1);
    }
}
