//! Source and Sink configuration
//!
//! The recognized configuration surface as strongly-typed options. Format codes
//! are a closed enum; unknown codes fail at setup time rather than being
//! carried as strings into the pipeline.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Deserialize;

use biograph_core::{Edge, Error, Node, Result};

/// Supported serialization formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Format {
    Tsv,
    Csv,
    Json,
    Jsonl,
    Nt,
    Owl,
    Obojson,
    Sssom,
    TrapiJson,
    Neo4j,
    Graph,
    Null,
}

impl Format {
    /// Parse a format code as it appears in configuration.
    pub fn parse(code: &str) -> Result<Self> {
        match code {
            "tsv" => Ok(Format::Tsv),
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            "jsonl" => Ok(Format::Jsonl),
            "nt" => Ok(Format::Nt),
            "owl" => Ok(Format::Owl),
            "obojson" | "obo-json" => Ok(Format::Obojson),
            "sssom" => Ok(Format::Sssom),
            "trapi-json" => Ok(Format::TrapiJson),
            "neo4j" => Ok(Format::Neo4j),
            "graph" => Ok(Format::Graph),
            "null" => Ok(Format::Null),
            other => Err(Error::unknown_format(other)),
        }
    }

    /// Infer a format from a file extension, when unambiguous.
    pub fn from_extension(path: &std::path::Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let name = name
            .strip_suffix(".gz")
            .or_else(|| name.strip_suffix(".tar"))
            .unwrap_or(name);
        let ext = name.rsplit('.').next()?;
        match ext {
            "tsv" => Some(Format::Tsv),
            "csv" => Some(Format::Csv),
            "json" => Some(Format::Json),
            "jsonl" => Some(Format::Jsonl),
            "nt" => Some(Format::Nt),
            "owl" => Some(Format::Owl),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Tsv => "tsv",
            Format::Csv => "csv",
            Format::Json => "json",
            Format::Jsonl => "jsonl",
            Format::Nt => "nt",
            Format::Owl => "owl",
            Format::Obojson => "obojson",
            Format::Sssom => "sssom",
            Format::TrapiJson => "trapi-json",
            Format::Neo4j => "neo4j",
            Format::Graph => "graph",
            Format::Null => "null",
        }
    }

    /// Column delimiter for tabular variants.
    pub fn delimiter(&self) -> char {
        match self {
            Format::Csv => ',',
            _ => '\t',
        }
    }
}

impl TryFrom<String> for Format {
    type Error = Error;
    fn try_from(value: String) -> Result<Self> {
        Format::parse(&value)
    }
}

/// Input/output compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Compression {
    #[default]
    None,
    Gz,
    Tar,
    TarGz,
}

impl Compression {
    pub fn parse(code: &str) -> Result<Self> {
        match code {
            "" | "none" => Ok(Compression::None),
            "gz" => Ok(Compression::Gz),
            "tar" => Ok(Compression::Tar),
            "tar.gz" => Ok(Compression::TarGz),
            other => Err(Error::config(format!("unknown compression: {other}"))),
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, Compression::Tar | Compression::TarGz)
    }
}

impl TryFrom<String> for Compression {
    type Error = Error;
    fn try_from(value: String) -> Result<Self> {
        Compression::parse(&value)
    }
}

/// Allow-list predicates applied to node records.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeFilter {
    /// Keep only nodes with at least one of these categories
    pub category: BTreeSet<String>,
    /// Keep only nodes carrying one of these `provided_by` sources
    pub provided_by: BTreeSet<String>,
}

impl NodeFilter {
    pub fn is_empty(&self) -> bool {
        self.category.is_empty() && self.provided_by.is_empty()
    }

    /// Does this node pass every configured filter?
    pub fn matches(&self, node: &Node) -> bool {
        if !self.category.is_empty() && !node.category.iter().any(|c| self.category.contains(c)) {
            return false;
        }
        if !self.provided_by.is_empty()
            && !node.provided_by.iter().any(|p| self.provided_by.contains(p))
        {
            return false;
        }
        true
    }
}

/// Allow-list predicates applied to edge records.
///
/// Category filters on endpoints consult the categories observed for the
/// endpoint earlier in the stream, supplied by the caller; an endpoint
/// never seen passes (the stream cannot know better without a store).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EdgeFilter {
    pub subject_category: BTreeSet<String>,
    pub object_category: BTreeSet<String>,
    pub predicate: BTreeSet<String>,
    pub provided_by: BTreeSet<String>,
}

impl EdgeFilter {
    pub fn is_empty(&self) -> bool {
        self.subject_category.is_empty()
            && self.object_category.is_empty()
            && self.predicate.is_empty()
            && self.provided_by.is_empty()
    }

    /// Does this edge pass, given the categories known for its endpoints?
    pub fn matches(
        &self,
        edge: &Edge,
        subject_categories: Option<&[String]>,
        object_categories: Option<&[String]>,
    ) -> bool {
        if !self.predicate.is_empty() && !self.predicate.contains(&edge.predicate) {
            return false;
        }
        if !self.provided_by.is_empty()
            && !edge.provided_by.iter().any(|p| self.provided_by.contains(p))
        {
            return false;
        }
        if !self.subject_category.is_empty() {
            if let Some(cats) = subject_categories {
                if !cats.iter().any(|c| self.subject_category.contains(c)) {
                    return false;
                }
            }
        }
        if !self.object_category.is_empty() {
            if let Some(cats) = object_categories {
                if !cats.iter().any(|c| self.object_category.contains(c)) {
                    return false;
                }
            }
        }
        true
    }
}

/// Default knowledge-source values injected into edges that lack them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KnowledgeSourceDefaults {
    pub primary_knowledge_source: Option<String>,
    pub aggregator_knowledge_source: Vec<String>,
    pub supporting_data_source: Vec<String>,
}

impl KnowledgeSourceDefaults {
    pub fn is_empty(&self) -> bool {
        self.primary_knowledge_source.is_none()
            && self.aggregator_knowledge_source.is_empty()
            && self.supporting_data_source.is_empty()
    }
}

/// Configuration for a Source; each source documents its subset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    /// One or more input paths
    pub filename: Vec<PathBuf>,
    /// Explicit format; overrides extension inference
    pub format: Option<Format>,
    pub compression: Compression,
    /// Default resource name stamped on emitted records
    pub provided_by: Option<String>,
    /// Per-source prefix overlay (prefix -> base IRI)
    pub prefix_map: BTreeMap<String, String>,
    /// Per-source reverse overlay (base IRI -> prefix)
    pub reverse_prefix_map: BTreeMap<String, String>,
    /// RDF predicate IRI/CURIE -> biolink predicate
    pub predicate_mappings: BTreeMap<String, String>,
    /// Predicates whose triples fold into node properties
    pub node_property_predicates: BTreeSet<String>,
    /// Declared value types for non-core properties (property -> type code)
    pub property_types: BTreeMap<String, String>,
    pub node_filters: NodeFilter,
    pub edge_filters: EdgeFilter,
    pub knowledge_source: KnowledgeSourceDefaults,
}

impl SourceOptions {
    /// Minimal options: paths plus a format.
    pub fn for_files(format: Format, files: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            filename: files.into_iter().collect(),
            format: Some(format),
            ..Default::default()
        }
    }

    /// Resolve the format from the explicit setting or the first path's
    /// extension; ambiguous inputs are a configuration error.
    pub fn resolved_format(&self) -> Result<Format> {
        if let Some(f) = self.format {
            return Ok(f);
        }
        self.filename
            .first()
            .and_then(|p| Format::from_extension(p))
            .ok_or_else(|| Error::config("format is required when the extension is ambiguous"))
    }
}

/// Configuration for a Sink.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkOptions {
    /// Output base path; tabular and jsonl sinks derive
    /// `<base>_nodes.<ext>` / `<base>_edges.<ext>` from it
    pub filename: PathBuf,
    pub format: Format,
    pub compression: Compression,
    /// Known node properties, pre-computing the tabular header
    pub node_properties: Vec<String>,
    /// Known edge properties, pre-computing the tabular header
    pub edge_properties: Vec<String>,
    /// Prefix overlay used by RDF output
    pub prefix_map: BTreeMap<String, String>,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            filename: PathBuf::new(),
            format: Format::Null,
            compression: Compression::None,
            node_properties: Vec::new(),
            edge_properties: Vec::new(),
            prefix_map: BTreeMap::new(),
        }
    }
}

impl SinkOptions {
    pub fn new(format: Format, filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            format,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_format_codes() {
        assert_eq!(Format::parse("tsv").unwrap(), Format::Tsv);
        assert_eq!(Format::parse("obo-json").unwrap(), Format::Obojson);
        assert!(Format::parse("xml").is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            Format::from_extension(Path::new("x_nodes.tsv")),
            Some(Format::Tsv)
        );
        assert_eq!(
            Format::from_extension(Path::new("graph.jsonl.gz")),
            Some(Format::Jsonl)
        );
        assert_eq!(Format::from_extension(Path::new("graph.xyz")), None);
    }

    #[test]
    fn test_node_filter() {
        let mut filter = NodeFilter::default();
        filter.category.insert("biolink:Gene".into());
        let mut node = Node::new("X:1");
        node.category.push("biolink:Disease".into());
        assert!(!filter.matches(&node));
        node.category.push("biolink:Gene".into());
        assert!(filter.matches(&node));
    }

    #[test]
    fn test_edge_filter_unknown_endpoint_passes() {
        let mut filter = EdgeFilter::default();
        filter.subject_category.insert("biolink:Gene".into());
        let edge = Edge::new("A:1", "biolink:related_to", "B:2");
        assert!(filter.matches(&edge, None, None));
        assert!(!filter.matches(&edge, Some(&["biolink:Disease".into()]), None));
    }
}
