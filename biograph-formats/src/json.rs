//! JSON source and sink
//!
//! The document shape is `{"nodes": [...], "edges": [...]}`. The source
//! streams array elements through the byte-level container scanner instead
//! of loading the document; the sink is a push writer that streams both
//! arrays out as records arrive, so neither side materializes the graph.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::rc::Rc;

use flate2::write::GzEncoder;
use flate2::Compression as GzLevel;
use serde_json::Value as JsonValue;

use crate::io::open_reader;
use crate::json_scan::JsonContainerScanner;
use crate::options::{Compression, SinkOptions, SourceOptions};
use crate::sink::Sink;
use crate::source::{shared_errors, RecordStream, SharedErrors, Source};
use biograph_core::{Edge, Error, ErrorKind, MessageLevel, Node, Record, Result};

// ============================================================================
// Source
// ============================================================================

/// Streams records out of a monolithic JSON document.
pub struct JsonSource {
    options: Option<SourceOptions>,
    errors: SharedErrors,
}

impl JsonSource {
    pub fn new(options: SourceOptions) -> Result<Self> {
        if options.filename.len() != 1 {
            return Err(Error::config("json source expects exactly one file"));
        }
        Ok(Self {
            options: Some(options),
            errors: shared_errors(),
        })
    }
}

impl Source for JsonSource {
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
                        "I/O failure while scanning JSON",
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
                        "Unparseable JSON element",
                        e.to_string(),
                    );
                    return None;
                }
            };
            let obj = value.as_object()?;
            if event.target == 0 {
                match Node::from_json(obj) {
                    Some(mut node) => {
                        if node.provided_by.is_empty() {
                            if let Some(pb) = &provided_by {
                                node.provided_by.push(pb.clone());
                            }
                        }
                        Some(Record::Node(node))
                    }
                    None => {
                        errors.borrow_mut().log(
                            MessageLevel::Error,
                            ErrorKind::MissingNodeProperty,
                            "Node element is missing 'id'",
                            value.to_string(),
                        );
                        None
                    }
                }
            } else {
                match Edge::from_json(obj) {
                    Some(mut edge) => {
                        if edge.provided_by.is_empty() {
                            if let Some(pb) = &provided_by {
                                edge.provided_by.push(pb.clone());
                            }
                        }
                        Some(Record::Edge(edge))
                    }
                    None => {
                        errors.borrow_mut().log(
                            MessageLevel::Error,
                            ErrorKind::MissingEdgeProperty,
                            "Edge element is missing 'subject', 'predicate' or 'object'",
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

// ============================================================================
// Sink
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum WriterState {
    Start,
    Nodes,
    Edges,
    Closed,
}

/// Push-writer JSON sink streaming `{"nodes": [...], "edges": [...]}`.
///
/// Records must arrive nodes-first: once the edges array opens the nodes
/// array is closed, and a late node is a caller error.
pub struct JsonSink {
    out: Option<Box<dyn Write>>,
    state: WriterState,
}

impl JsonSink {
    pub fn new(options: SinkOptions) -> Result<Self> {
        let file = File::create(&options.filename)?;
        let out: Box<dyn Write> = match options.compression {
            Compression::Gz => Box::new(BufWriter::new(GzEncoder::new(file, GzLevel::default()))),
            _ => Box::new(BufWriter::new(file)),
        };
        Ok(Self {
            out: Some(out),
            state: WriterState::Start,
        })
    }

    fn out(&mut self) -> Result<&mut Box<dyn Write>> {
        self.out
            .as_mut()
            .ok_or_else(|| Error::other("sink already finalized"))
    }
}

impl Sink for JsonSink {
    fn write_node(&mut self, node: &Node) -> Result<()> {
        let payload = serde_json::to_string(&node.to_json())?;
        let state = self.state;
        let out = self.out()?;
        match state {
            WriterState::Start => {
                write!(out, "{{\"nodes\": [\n{}", payload)?;
                self.state = WriterState::Nodes;
            }
            WriterState::Nodes => write!(out, ",\n{}", payload)?,
            WriterState::Edges | WriterState::Closed => {
                return Err(Error::other("node record after edges array opened"))
            }
        }
        Ok(())
    }

    fn write_edge(&mut self, edge: &Edge) -> Result<()> {
        let payload = serde_json::to_string(&edge.to_json())?;
        let state = self.state;
        let out = self.out()?;
        match state {
            WriterState::Start => {
                write!(out, "{{\"nodes\": [],\n\"edges\": [\n{}", payload)?;
                self.state = WriterState::Edges;
            }
            WriterState::Nodes => {
                write!(out, "\n],\n\"edges\": [\n{}", payload)?;
                self.state = WriterState::Edges;
            }
            WriterState::Edges => write!(out, ",\n{}", payload)?,
            WriterState::Closed => return Err(Error::other("sink already finalized")),
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if self.state == WriterState::Closed {
            return Ok(());
        }
        let state = self.state;
        if let Some(mut out) = self.out.take() {
            match state {
                WriterState::Start => write!(out, "{{\"nodes\": [],\n\"edges\": []}}")?,
                WriterState::Nodes => write!(out, "\n],\n\"edges\": []}}")?,
                WriterState::Edges => write!(out, "\n]}}")?,
                WriterState::Closed => {}
            }
            out.flush()?;
        }
        self.state = WriterState::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Format;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");

        let mut sink = JsonSink::new(SinkOptions::new(Format::Json, &path)).unwrap();
        let mut node = Node::new("HGNC:11603");
        node.category.push("biolink:Gene".into());
        node.name = Some("TBX4".into());
        sink.write_node(&node).unwrap();
        let mut edge = Edge::new("HGNC:11603", "biolink:contributes_to", "MONDO:0005002");
        edge.id = "e1".into();
        sink.write_edge(&edge).unwrap();
        sink.finalize().unwrap();

        let mut source =
            JsonSource::new(SourceOptions::for_files(Format::Json, [path])).unwrap();
        let records: Vec<Record> = source.parse().unwrap().collect();
        assert_eq!(records.len(), 2);
        match &records[1] {
            Record::Edge(e) => {
                assert_eq!(e.id, "e1");
                assert_eq!(e.object, "MONDO:0005002");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        let mut sink = JsonSink::new(SinkOptions::new(Format::Json, &path)).unwrap();
        sink.finalize().unwrap();

        let written: JsonValue =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["nodes"], serde_json::json!([]));
        assert_eq!(written["edges"], serde_json::json!([]));

        let mut source =
            JsonSource::new(SourceOptions::for_files(Format::Json, [path])).unwrap();
        assert_eq!(source.parse().unwrap().count(), 0);
        assert!(source.take_errors().is_empty());
    }

    #[test]
    fn test_malformed_element_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"nodes": [{"name": "no id"}, {"id": "X:1"}], "edges": []}"#,
        )
        .unwrap();
        let mut source =
            JsonSource::new(SourceOptions::for_files(Format::Json, [path])).unwrap();
        let records: Vec<Record> = source.parse().unwrap().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(source.take_errors().len(), 1);
    }
}
