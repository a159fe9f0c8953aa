//! The Source -> Sink pipeline orchestrator
//!
//! Two modes. Non-streaming: `transform` drains the source into an
//! owned graph store, graph operations run in between, and `save` drains
//! the store into a sink. Streaming: records pipe Source -> Sink in
//! lock-step with bounded memory; operations that need a populated store
//! are rejected with `StreamingUnsupportedOperation`.
//!
//! Each record passes through the normalization stages in order before
//! sink handoff: filter, CURIE normalization, category defaulting,
//! predicate normalization, provenance injection. Inspectors observe the
//! record just before it reaches the sink, in stream order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{info_span, warn};

use crate::infores::{InfoResContext, InfoResRule};
use biograph_core::{
    Edge, Error, ErrorAggregator, ErrorKind, MemoryGraph, MessageLevel, Node, PrefixManager,
    PropertyValue, Record, Result,
};
use biograph_formats::graph_io::{GraphSink, GraphSource};
use biograph_formats::{
    create_sink, create_source, Format, SinkOptions, Sink, Source, SourceOptions,
};
use biograph_neo4j::{Neo4jConfig, Neo4jSink, Neo4jSource};
use biograph_vocab::{biolink, format as vocab_format, Vocabulary};

/// How many unknown-prefix drops are escalated to WARNING before the
/// rest stay at the aggregated ERROR level only.
const UNKNOWN_PREFIX_WARNINGS: usize = 10;

/// Tags a record for inspectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphEntityType {
    Node,
    Edge,
}

/// Pluggable observer invoked per record before each sink write.
///
/// Inspectors must not mutate the record; they see records in source
/// emission order after filtering.
pub trait Inspector {
    fn inspect(&mut self, entity: GraphEntityType, record: &Record);
}

/// Adapter turning a closure into an [`Inspector`].
pub struct FnInspector<F>(pub F);

impl<F: FnMut(GraphEntityType, &Record)> Inspector for FnInspector<F> {
    fn inspect(&mut self, entity: GraphEntityType, record: &Record) {
        (self.0)(entity, record)
    }
}

/// Input-side configuration for one transform call.
#[derive(Debug, Clone, Default)]
pub struct InputArgs {
    pub source: SourceOptions,
    /// Connection settings when `source.format` is `neo4j`
    pub neo4j: Option<Neo4jConfig>,
    /// InfoRes rewrite rule applied during provenance injection
    pub infores_rewrite: Option<InfoResRule>,
    /// Fallback provenance when a record carries none at all
    pub default_provenance: Option<String>,
}

/// Output-side configuration for one transform or save call.
#[derive(Debug, Clone)]
pub struct OutputArgs {
    pub sink: SinkOptions,
    /// Connection settings when `sink.format` is `neo4j`
    pub neo4j: Option<Neo4jConfig>,
}

impl OutputArgs {
    pub fn new(sink: SinkOptions) -> Self {
        Self { sink, neo4j: None }
    }
}

/// Orchestrates Source -> (store) -> Sink flows.
pub struct Transformer {
    stream: bool,
    store: Option<MemoryGraph>,
    vocabulary: Vocabulary,
    prefix_manager: PrefixManager,
    infores: InfoResContext,
    errors: ErrorAggregator,
    cancel: Option<Arc<AtomicBool>>,
    /// Categories observed per node id, kept only while an edge filter
    /// or category-defaulting stage needs endpoint lookups
    seen_categories: FxHashMap<String, Vec<String>>,
    unknown_prefix_warnings: usize,
}

impl Transformer {
    /// Non-streaming transformer with an owned graph store.
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Streaming transformer; graph-only operations are rejected.
    pub fn streaming() -> Self {
        Self::build(true)
    }

    fn build(stream: bool) -> Self {
        Self {
            stream,
            store: if stream {
                None
            } else {
                Some(MemoryGraph::new())
            },
            vocabulary: Vocabulary::new(),
            prefix_manager: PrefixManager::new(),
            infores: InfoResContext::new(),
            errors: ErrorAggregator::new(),
            cancel: None,
            seen_categories: FxHashMap::default(),
            unknown_prefix_warnings: 0,
        }
    }

    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.stream
    }

    /// External cancel signal, checked between records.
    pub fn set_cancel(&mut self, cancel: Arc<AtomicBool>) {
        self.cancel = Some(cancel);
    }

    /// The InfoRes catalog accumulated across transforms.
    pub fn infores_catalog(&self) -> &std::collections::BTreeMap<String, String> {
        self.infores.catalog()
    }

    /// Persist the InfoRes catalog as a JSON `original -> minted` map.
    pub fn write_infores_catalog(&self, path: &std::path::Path) -> Result<()> {
        let mut out = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(&mut out, self.infores.catalog())?;
        use std::io::Write;
        out.write_all(b"\n")?;
        Ok(())
    }

    /// The aggregated per-record error report.
    pub fn report(&self) -> &ErrorAggregator {
        &self.errors
    }

    pub fn take_report(&mut self) -> ErrorAggregator {
        std::mem::take(&mut self.errors)
    }

    /// The populated store (non-streaming mode, after a transform).
    pub fn store(&self) -> Option<&MemoryGraph> {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> Option<&mut MemoryGraph> {
        self.store.as_mut()
    }

    /// Replace the store, e.g. after a graph merge produced a new one.
    pub fn set_store(&mut self, graph: MemoryGraph) -> Result<()> {
        if self.stream {
            return Err(Error::StreamingUnsupportedOperation(
                "set_store".to_string(),
            ));
        }
        self.store = Some(graph);
        Ok(())
    }

    /// Take the store out, leaving an empty one behind.
    pub fn take_store(&mut self) -> Result<MemoryGraph> {
        match self.store.take() {
            Some(g) => {
                self.store = Some(MemoryGraph::new());
                Ok(g)
            }
            None => Err(Error::StreamingUnsupportedOperation(
                "take_store".to_string(),
            )),
        }
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Transform an input. With no output the records land in the store
    /// (non-streaming only). With an output, streaming mode pipes
    /// Source -> Sink directly; non-streaming mode goes through the
    /// store and then saves it.
    pub fn transform(
        &mut self,
        input: InputArgs,
        output: Option<OutputArgs>,
        mut inspector: Option<&mut dyn Inspector>,
    ) -> Result<()> {
        let span = info_span!("transform", streaming = self.stream);
        let _guard = span.enter();

        self.infores = self.build_infores(&input)?;
        let mut source = self.build_source(&input)?;

        match (self.stream, output) {
            (true, Some(output)) => {
                let mut sink = self.build_sink(&output)?;
                let result = self.process(
                    source.as_mut(),
                    sink.as_mut(),
                    &input.source,
                    true,
                    match &mut inspector {
                        Some(i) => Some(&mut **i),
                        None => None,
                    },
                );
                // finalize() runs even after failure so partial output
                // lands deterministically even on I/O failure.
                let finalized = sink.finalize();
                self.merge_source_errors(source.as_ref());
                result.and(finalized)
            }
            (true, None) => Err(Error::StreamingUnsupportedOperation(
                "transform without an output sink".to_string(),
            )),
            (false, output) => {
                let store = self.store.take().unwrap_or_default();
                let mut sink = GraphSink::with_graph(store);
                let result = self.process(
                    source.as_mut(),
                    &mut sink,
                    &input.source,
                    true,
                    match &mut inspector {
                        Some(i) => Some(&mut **i),
                        None => None,
                    },
                );
                let sink_errors = sink.errors();
                self.errors.merge(sink_errors.borrow().clone());
                self.store = Some(sink.into_graph());
                self.merge_source_errors(source.as_ref());
                result?;
                match output {
                    Some(output) => self.save(output),
                    None => Ok(()),
                }
            }
        }
    }

    /// Drain the store into a sink (non-streaming mode only).
    pub fn save(&mut self, output: OutputArgs) -> Result<()> {
        if self.stream {
            return Err(Error::StreamingUnsupportedOperation("save".to_string()));
        }
        // Replay a clone so the store stays available for further
        // operations or saves.
        let store = self
            .store
            .clone()
            .ok_or_else(|| Error::other("transformer store is empty"))?;

        // Tabular sinks want the full column set up front; compute it
        // from the store when the caller declared none.
        let mut output = output;
        if matches!(output.sink.format, Format::Tsv | Format::Csv)
            && output.sink.node_properties.is_empty()
        {
            let (node_props, edge_props) = collect_properties(&store);
            output.sink.node_properties = node_props;
            output.sink.edge_properties = edge_props;
        }

        let mut source = GraphSource::new(store);
        let mut sink = self.build_sink(&output)?;
        let empty_options = SourceOptions::default();
        // Store records were normalized on the way in; stages are not
        // re-applied on the way out.
        let result = self.process(&mut source, sink.as_mut(), &empty_options, false, None);
        let finalized = sink.finalize();
        result.and(finalized)
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    fn process(
        &mut self,
        source: &mut dyn Source,
        sink: &mut dyn Sink,
        options: &SourceOptions,
        apply_stages: bool,
        mut inspector: Option<&mut dyn Inspector>,
    ) -> Result<()> {
        let track_categories = apply_stages
            && (!options.edge_filters.subject_category.is_empty()
                || !options.edge_filters.object_category.is_empty()
                || !self.stream);
        let stream = source.parse()?;
        for record in stream {
            if let Some(cancel) = &self.cancel {
                if cancel.load(Ordering::Relaxed) {
                    return Err(Error::Cancelled);
                }
            }
            match record {
                Record::Node(node) => {
                    let node = if apply_stages {
                        match self.run_node_stages(node, options) {
                            Some(n) => n,
                            None => continue,
                        }
                    } else {
                        node
                    };
                    if track_categories {
                        self.seen_categories
                            .insert(node.id.clone(), node.category.clone());
                    }
                    let record = Record::Node(node);
                    if let Some(inspector) = inspector.as_mut().map(|i| &mut **i) {
                        inspector.inspect(GraphEntityType::Node, &record);
                    }
                    if let Record::Node(node) = &record {
                        sink.write_node(node)?;
                    }
                }
                Record::Edge(edge) => {
                    let edge = if apply_stages {
                        match self.run_edge_stages(edge, options) {
                            Some(e) => e,
                            None => continue,
                        }
                    } else {
                        edge
                    };
                    let record = Record::Edge(edge);
                    if let Some(inspector) = inspector.as_mut().map(|i| &mut **i) {
                        inspector.inspect(GraphEntityType::Edge, &record);
                    }
                    if let Record::Edge(edge) = &record {
                        sink.write_edge(edge)?;
                    }
                }
            }
        }
        self.seen_categories.clear();
        Ok(())
    }

    /// Stages 1-5 for a node; `None` drops the record.
    fn run_node_stages(&mut self, mut node: Node, options: &SourceOptions) -> Option<Node> {
        // 1. Filter.
        if !options.node_filters.is_empty() && !options.node_filters.matches(&node) {
            return None;
        }
        // 2. CURIE normalization.
        node.id = self.normalize_required_curie(&node.id)?;
        node.xref = node
            .xref
            .iter()
            .map(|x| self.normalize_lenient(x))
            .collect();
        // 3. Category defaulting.
        if node.category.is_empty() {
            self.errors.log(
                MessageLevel::Warning,
                ErrorKind::NoCategory,
                "Node lacks category",
                &node.id,
            );
            node.category.push(biolink::NAMED_THING.to_string());
        }
        // 5. Provenance injection.
        self.infores.apply_node(&mut node);
        Some(node)
    }

    /// Stages 1-5 for an edge; `None` drops the record.
    fn run_edge_stages(&mut self, mut edge: Edge, options: &SourceOptions) -> Option<Edge> {
        // 1. Filter, with whatever endpoint categories the stream has
        // shown so far.
        if !options.edge_filters.is_empty() {
            let subject_cats = self.seen_categories.get(&edge.subject).cloned();
            let object_cats = self.seen_categories.get(&edge.object).cloned();
            if !options.edge_filters.matches(
                &edge,
                subject_cats.as_deref(),
                object_cats.as_deref(),
            ) {
                return None;
            }
        }
        // 2. CURIE normalization.
        edge.subject = self.normalize_required_curie(&edge.subject)?;
        edge.object = self.normalize_required_curie(&edge.object)?;
        edge.id = self.normalize_lenient(&edge.id);
        edge.publications = edge
            .publications
            .iter()
            .map(|p| self.normalize_lenient(p))
            .collect();
        // 3. Category defaulting: lowest-common association class for
        // the endpoint categories.
        if edge.category.is_empty() {
            let subject_cat = self.first_seen_category(&edge.subject);
            let object_cat = self.first_seen_category(&edge.object);
            edge.category.push(
                self.vocabulary
                    .association_for(&subject_cat, &object_cat)
                    .to_string(),
            );
        }
        // 4. Predicate normalization.
        edge.predicate = self.normalize_predicate(&edge.predicate, options, &edge.subject);
        if !self.vocabulary.is_predicate(&edge.predicate) {
            self.errors.log(
                MessageLevel::Error,
                ErrorKind::InvalidEdgePredicate,
                "Predicate not in relation hierarchy",
                &edge.predicate,
            );
            edge.properties
                .insert("_invalid_predicate".to_string(), PropertyValue::Bool(true));
        }
        // 5. Provenance injection.
        self.infores.apply_edge(&mut edge);
        Some(edge)
    }

    fn first_seen_category(&self, node_id: &str) -> String {
        self.seen_categories
            .get(node_id)
            .and_then(|cats| cats.first().cloned())
            .unwrap_or_else(|| biolink::NAMED_THING.to_string())
    }

    /// Canonicalize a slot that must hold a node CURIE; failures drop
    /// the record and aggregate.
    fn normalize_required_curie(&mut self, value: &str) -> Option<String> {
        if PrefixManager::is_iri(value) {
            let contracted = self.prefix_manager.contract(value).ok()?;
            if PrefixManager::is_iri(&contracted) {
                self.errors.log(
                    MessageLevel::Error,
                    ErrorKind::InvalidCurie,
                    "IRI has no CURIE form under the active prefix map",
                    value,
                );
                return None;
            }
            return Some(contracted);
        }
        if !PrefixManager::is_curie(value) {
            self.errors.log(
                MessageLevel::Error,
                ErrorKind::InvalidCurie,
                "Identifier is not a valid CURIE",
                value,
            );
            return None;
        }
        match self.prefix_manager.canonical(value) {
            Ok(canonical) => Some(canonical),
            Err(Error::UnknownPrefix(prefix)) => {
                self.errors.log(
                    MessageLevel::Error,
                    ErrorKind::UnknownPrefix,
                    "CURIE prefix not in prefix map",
                    value,
                );
                if self.unknown_prefix_warnings < UNKNOWN_PREFIX_WARNINGS {
                    self.unknown_prefix_warnings += 1;
                    self.errors.log(
                        MessageLevel::Warning,
                        ErrorKind::UnknownPrefix,
                        "CURIE prefix not in prefix map",
                        value,
                    );
                    warn!(prefix = %prefix, curie = %value, "unknown CURIE prefix; record dropped");
                }
                None
            }
            Err(_) => Some(value.to_string()),
        }
    }

    /// Canonicalize where possible, otherwise pass through unchanged.
    /// Used for edge ids, xrefs, and publications, which tolerate
    /// non-CURIE values.
    fn normalize_lenient(&self, value: &str) -> String {
        if PrefixManager::is_iri(value) && !value.starts_with("urn:") {
            return self
                .prefix_manager
                .contract(value)
                .unwrap_or_else(|_| value.to_string());
        }
        if PrefixManager::is_curie(value) {
            if let Ok(canonical) = self.prefix_manager.canonical(value) {
                return canonical;
            }
        }
        value.to_string()
    }

    /// Stage 4: default prefix, then configured mappings.
    fn normalize_predicate(
        &mut self,
        predicate: &str,
        options: &SourceOptions,
        _subject: &str,
    ) -> String {
        let with_prefix = vocab_format::with_default_prefix(predicate);
        if let Some(mapped) = options
            .predicate_mappings
            .get(predicate)
            .or_else(|| options.predicate_mappings.get(&with_prefix))
        {
            return mapped.clone();
        }
        with_prefix
    }

    // ========================================================================
    // Construction helpers
    // ========================================================================

    fn build_infores(&self, input: &InputArgs) -> Result<InfoResContext> {
        let mut infores = InfoResContext::new();
        // The catalog survives across transforms on one Transformer.
        for (original, minted) in self.infores.catalog() {
            infores
                .catalog_mut()
                .insert(original.clone(), minted.clone());
        }
        if let Some(rule) = &input.infores_rewrite {
            infores.set_rule(rule)?;
        }
        infores.default_primary = input
            .source
            .knowledge_source
            .primary_knowledge_source
            .clone();
        infores.default_aggregator = input
            .source
            .knowledge_source
            .aggregator_knowledge_source
            .clone();
        infores.default_supporting = input
            .source
            .knowledge_source
            .supporting_data_source
            .clone();
        infores.default_provided_by = input
            .source
            .provided_by
            .clone()
            .or_else(|| input.default_provenance.clone());
        Ok(infores)
    }

    fn build_source(&mut self, input: &InputArgs) -> Result<Box<dyn Source>> {
        let mut options = input.source.clone();
        if options.format.is_none() {
            options.format = Some(options.resolved_format()?);
        }
        // Per-source prefix overlays extend the pipeline's manager too.
        self.prefix_manager.update(
            options
                .prefix_map
                .iter()
                .map(|(p, i)| (p.clone(), i.clone())),
        );
        self.prefix_manager.update(
            options
                .reverse_prefix_map
                .iter()
                .map(|(iri, p)| (p.clone(), iri.clone())),
        );
        match options.format {
            Some(Format::Neo4j) => {
                let config = input
                    .neo4j
                    .clone()
                    .ok_or_else(|| Error::config("neo4j source requires connection settings"))?;
                Ok(Box::new(Neo4jSource::connect(
                    config,
                    options.node_filters.clone(),
                    options.edge_filters.clone(),
                    options.provided_by.clone(),
                )?))
            }
            _ => create_source(options),
        }
    }

    fn build_sink(&self, output: &OutputArgs) -> Result<Box<dyn Sink>> {
        match output.sink.format {
            Format::Neo4j => {
                let config = output
                    .neo4j
                    .clone()
                    .ok_or_else(|| Error::config("neo4j sink requires connection settings"))?;
                Ok(Box::new(Neo4jSink::connect(config)?))
            }
            _ => create_sink(output.sink.clone()),
        }
    }

    fn merge_source_errors(&mut self, source: &dyn Source) {
        let errors = source.errors();
        let taken = errors.borrow().clone();
        self.errors.merge(taken);
    }
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new()
    }
}

/// Union of populated fields across the store, for tabular headers:
/// core columns that appear anywhere plus every property key.
fn collect_properties(store: &MemoryGraph) -> (Vec<String>, Vec<String>) {
    use std::collections::BTreeSet;
    let mut node_props: BTreeSet<String> = BTreeSet::new();
    for node in store.nodes() {
        node_props.insert("id".to_string());
        if !node.category.is_empty() {
            node_props.insert("category".to_string());
        }
        if node.name.is_some() {
            node_props.insert("name".to_string());
        }
        if node.description.is_some() {
            node_props.insert("description".to_string());
        }
        if !node.xref.is_empty() {
            node_props.insert("xref".to_string());
        }
        if !node.synonym.is_empty() {
            node_props.insert("synonym".to_string());
        }
        if !node.provided_by.is_empty() {
            node_props.insert("provided_by".to_string());
        }
        node_props.extend(node.properties.keys().cloned());
    }
    let mut edge_props: BTreeSet<String> = BTreeSet::new();
    for (_, edge) in store.edges() {
        for field in ["id", "subject", "predicate", "object"] {
            edge_props.insert(field.to_string());
        }
        if !edge.category.is_empty() {
            edge_props.insert("category".to_string());
        }
        if edge.knowledge_level.is_some() {
            edge_props.insert("knowledge_level".to_string());
        }
        if edge.agent_type.is_some() {
            edge_props.insert("agent_type".to_string());
        }
        if edge.primary_knowledge_source.is_some() {
            edge_props.insert("primary_knowledge_source".to_string());
        }
        if !edge.aggregator_knowledge_source.is_empty() {
            edge_props.insert("aggregator_knowledge_source".to_string());
        }
        if !edge.supporting_data_source.is_empty() {
            edge_props.insert("supporting_data_source".to_string());
        }
        if !edge.publications.is_empty() {
            edge_props.insert("publications".to_string());
        }
        if !edge.provided_by.is_empty() {
            edge_props.insert("provided_by".to_string());
        }
        edge_props.extend(edge.properties.keys().cloned());
    }
    (
        node_props.into_iter().collect(),
        edge_props.into_iter().collect(),
    )
}
