//! Format-specific Sources and Sinks for biograph
//!
//! Every supported serialization gets a parser ([`Source`]) and, where the
//! format is writable, a writer ([`Sink`]):
//!
//! | format code | source | sink |
//! |---|---|---|
//! | `tsv` / `csv` | [`tsv::TsvSource`] | [`tsv::TsvSink`] |
//! | `json` | [`json::JsonSource`] | [`json::JsonSink`] |
//! | `jsonl` | [`jsonl::JsonlSource`] | [`jsonl::JsonlSink`] |
//! | `nt` | [`ntriples::NtSource`] | [`ntriples::NtSink`] |
//! | `owl` | [`owl::OwlSource`] | - |
//! | `obojson` | [`obograph::ObographSource`] | - |
//! | `sssom` | [`sssom::SssomSource`] | - |
//! | `trapi-json` | [`trapi::TrapiSource`] | - |
//! | `graph` | [`graph_io::GraphSource`] | [`graph_io::GraphSink`] |
//! | `null` | - | [`null::NullSink`] |
//!
//! Sources are single-use, forward-only, and finite: `parse()` consumes
//! the configuration and yields a lazy record stream; I/O handles are
//! released when the stream is dropped. Per-record problems go to the
//! source's error aggregator and never abort the stream.

pub mod graph_io;
pub mod io;
pub mod json;
pub mod json_scan;
pub mod jsonl;
pub mod ntriples;
pub mod null;
pub mod obograph;
pub mod options;
pub mod owl;
pub mod sink;
pub mod source;
pub mod sssom;
pub mod trapi;
pub mod tsv;

pub use options::{Compression, EdgeFilter, Format, NodeFilter, SinkOptions, SourceOptions};
pub use sink::Sink;
pub use source::{RecordStream, SharedErrors, Source};

use biograph_core::{Error, Result};

/// Construct the Source for a file-based format.
pub fn create_source(options: SourceOptions) -> Result<Box<dyn Source>> {
    let format = options
        .format
        .ok_or_else(|| Error::config("input format is required"))?;
    match format {
        Format::Tsv | Format::Csv => Ok(Box::new(tsv::TsvSource::new(options)?)),
        Format::Json => Ok(Box::new(json::JsonSource::new(options)?)),
        Format::Jsonl => Ok(Box::new(jsonl::JsonlSource::new(options)?)),
        Format::Nt => Ok(Box::new(ntriples::NtSource::new(options)?)),
        Format::Owl => Ok(Box::new(owl::OwlSource::new(options)?)),
        Format::Obojson => Ok(Box::new(obograph::ObographSource::new(options)?)),
        Format::Sssom => Ok(Box::new(sssom::SssomSource::new(options)?)),
        Format::TrapiJson => Ok(Box::new(trapi::TrapiSource::new(options)?)),
        Format::Graph | Format::Null | Format::Neo4j => Err(Error::unknown_format(format!(
            "{} is not a file-based source format",
            format.as_str()
        ))),
    }
}

/// Construct the Sink for a file-based format.
pub fn create_sink(options: SinkOptions) -> Result<Box<dyn Sink>> {
    match options.format {
        Format::Tsv | Format::Csv => Ok(Box::new(tsv::TsvSink::new(options)?)),
        Format::Json => Ok(Box::new(json::JsonSink::new(options)?)),
        Format::Jsonl => Ok(Box::new(jsonl::JsonlSink::new(options)?)),
        Format::Nt => Ok(Box::new(ntriples::NtSink::new(options)?)),
        Format::Null => Ok(Box::new(null::NullSink::new())),
        other => Err(Error::unknown_format(format!(
            "{} is not a file-based sink format",
            other.as_str()
        ))),
    }
}
