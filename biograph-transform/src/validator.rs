//! Validation against the vocabulary
//!
//! Checks nodes and edges for model conformance and aggregates every
//! violation into the nested `level -> type -> message -> [subjects]`
//! report. Works over a populated graph store or as a streaming
//! inspector.
//!
//! The model version lives in a [`ValidationContext`] constructed once
//! and handed to each Validator instance; there is no process-wide
//! mutable version state to synchronize.

use std::sync::Arc;

use biograph_core::{
    Edge, ErrorAggregator, ErrorKind, MemoryGraph, MessageLevel, Node, PrefixManager,
    PropertyValue, Record, Result,
};
use biograph_vocab::{format as vocab_format, Vocabulary};

use crate::transformer::{GraphEntityType, Inspector};

/// Immutable validation configuration: the vocabulary handle plus the
/// prefix map used for CURIE well-formedness checks.
pub struct ValidationContext {
    vocabulary: Vocabulary,
    prefixes: PrefixManager,
}

impl ValidationContext {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self {
            vocabulary,
            prefixes: PrefixManager::new(),
        }
    }

    /// Context for a specific model version from the catalogue.
    pub fn with_version(version: &str) -> Result<Self> {
        Ok(Self::new(Vocabulary::with_version(version).map_err(
            |e| biograph_core::Error::config(e.to_string()),
        )?))
    }

    pub fn model_version(&self) -> &str {
        self.vocabulary.version()
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

/// Validates records and aggregates violations.
pub struct Validator {
    context: Arc<ValidationContext>,
    /// Escalate should-level findings (missing knowledge_level /
    /// agent_type) to errors
    strict: bool,
    errors: ErrorAggregator,
}

impl Validator {
    /// Validator over a shared context; the context's model version is
    /// captured for this instance's lifetime.
    pub fn new(context: Arc<ValidationContext>) -> Self {
        Self {
            context,
            strict: false,
            errors: ErrorAggregator::new(),
        }
    }

    /// Validator at the default model version.
    pub fn with_default_model() -> Self {
        Self::new(Arc::new(ValidationContext::new(Vocabulary::new())))
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn model_version(&self) -> &str {
        self.context.model_version()
    }

    /// The violations found so far.
    pub fn report(&self) -> &ErrorAggregator {
        &self.errors
    }

    pub fn take_report(&mut self) -> ErrorAggregator {
        std::mem::take(&mut self.errors)
    }

    pub fn write_report<W: std::io::Write>(&self, out: &mut W) -> Result<()> {
        self.errors.write_report(out)
    }

    /// Validate every node then every edge of a populated store.
    pub fn validate_graph(&mut self, graph: &MemoryGraph) -> &ErrorAggregator {
        for node in graph.nodes() {
            self.validate_node(node);
        }
        for (_, edge) in graph.edges() {
            self.validate_edge(edge);
        }
        &self.errors
    }

    // ========================================================================
    // Node checks
    // ========================================================================

    pub fn validate_node(&mut self, node: &Node) {
        self.check_node_required(node);
        self.check_node_id(node);
        self.check_categories(node);
        self.check_node_property_values(node);
    }

    fn check_node_required(&mut self, node: &Node) {
        if node.id.is_empty() {
            self.errors.log(
                MessageLevel::Error,
                ErrorKind::MissingNodeProperty,
                "Required property 'id' is missing",
                "<unidentified node>",
            );
        }
        if node.category.is_empty() {
            self.errors.log(
                MessageLevel::Warning,
                ErrorKind::NoCategory,
                "Node lacks category",
                &node.id,
            );
        }
    }

    fn check_node_id(&mut self, node: &Node) {
        if node.id.is_empty() {
            return;
        }
        if !PrefixManager::is_curie(&node.id) {
            self.errors.log(
                MessageLevel::Error,
                ErrorKind::InvalidCurie,
                "Node id is not a valid CURIE",
                &node.id,
            );
            return;
        }
        if let Some(prefix) = PrefixManager::prefix_of(&node.id) {
            if self.context.prefixes.expand(&node.id).is_err() {
                self.errors.log(
                    MessageLevel::Warning,
                    ErrorKind::MissingNodeCuriePrefix,
                    format!("Prefix '{}' is not in the prefix map", prefix),
                    &node.id,
                );
            }
        }
    }

    fn check_categories(&mut self, node: &Node) {
        for category in &node.category {
            let (_, local) = vocab_format::split_curie(category);
            if !vocab_format::is_camel_case(local) {
                self.errors.log(
                    MessageLevel::Error,
                    ErrorKind::InvalidCategory,
                    "Category is not in CamelCase form",
                    category,
                );
                continue;
            }
            if !self.context.vocabulary.is_class(category) {
                self.errors.log(
                    MessageLevel::Error,
                    ErrorKind::InvalidCategory,
                    "Category not in model",
                    category,
                );
            } else if self.context.vocabulary.is_mixin(category) {
                self.errors.log(
                    MessageLevel::Info,
                    ErrorKind::InvalidCategory,
                    "Category is a mixin and should not be assigned directly",
                    category,
                );
            }
        }
    }

    fn check_node_property_values(&mut self, node: &Node) {
        for xref in &node.xref {
            if !PrefixManager::is_curie(xref) && !PrefixManager::is_iri(xref) {
                self.errors.log(
                    MessageLevel::Warning,
                    ErrorKind::InvalidNodePropertyValue,
                    "xref entry is not a CURIE",
                    format!("{}: {}", node.id, xref),
                );
            }
        }
    }

    // ========================================================================
    // Edge checks
    // ========================================================================

    pub fn validate_edge(&mut self, edge: &Edge) {
        self.check_edge_required(edge);
        self.check_edge_endpoints(edge);
        self.check_edge_predicate(edge);
        self.check_edge_property_values(edge);
    }

    fn check_edge_required(&mut self, edge: &Edge) {
        for (value, field) in [
            (&edge.subject, "subject"),
            (&edge.predicate, "predicate"),
            (&edge.object, "object"),
        ] {
            if value.is_empty() {
                self.errors.log(
                    MessageLevel::Error,
                    ErrorKind::MissingEdgeProperty,
                    format!("Required property '{}' is missing", field),
                    &edge.id,
                );
            }
        }
        // knowledge_level / agent_type are required on write, but older
        // inputs lack them; absence stays a WARNING unless strict.
        let missing_level = if self.strict {
            MessageLevel::Error
        } else {
            MessageLevel::Warning
        };
        if edge.knowledge_level.is_none() {
            self.errors.log(
                missing_level,
                ErrorKind::MissingEdgeProperty,
                "Required property 'knowledge_level' is missing",
                &edge.id,
            );
        }
        if edge.agent_type.is_none() {
            self.errors.log(
                missing_level,
                ErrorKind::MissingEdgeProperty,
                "Required property 'agent_type' is missing",
                &edge.id,
            );
        }
    }

    fn check_edge_endpoints(&mut self, edge: &Edge) {
        for (value, field) in [(&edge.subject, "subject"), (&edge.object, "object")] {
            if value.is_empty() {
                continue;
            }
            if !PrefixManager::is_curie(value) {
                self.errors.log(
                    MessageLevel::Error,
                    ErrorKind::InvalidCurie,
                    format!("Edge {} is not a valid CURIE", field),
                    value,
                );
            }
        }
    }

    fn check_edge_predicate(&mut self, edge: &Edge) {
        if edge.predicate.is_empty() {
            self.errors.log(
                MessageLevel::Error,
                ErrorKind::NoEdgePredicate,
                "Edge has no predicate",
                &edge.id,
            );
            return;
        }
        let (_, local) = vocab_format::split_curie(&edge.predicate);
        if !vocab_format::is_snake_case(local) {
            self.errors.log(
                MessageLevel::Error,
                ErrorKind::InvalidEdgePredicate,
                "Predicate is not in snake_case form",
                &edge.predicate,
            );
            return;
        }
        if !self.context.vocabulary.is_predicate(&edge.predicate) {
            self.errors.log(
                MessageLevel::Error,
                ErrorKind::InvalidEdgePredicate,
                "Predicate not in relation hierarchy",
                &edge.predicate,
            );
        }
    }

    fn check_edge_property_values(&mut self, edge: &Edge) {
        if let Some(level) = &edge.knowledge_level {
            if !self.context.vocabulary.is_knowledge_level(level) {
                self.errors.log(
                    MessageLevel::Error,
                    ErrorKind::InvalidEdgePropertyValue,
                    "knowledge_level is not a permitted value",
                    format!("{}: {}", edge.id, level),
                );
            }
        }
        if let Some(agent) = &edge.agent_type {
            if !self.context.vocabulary.is_agent_type(agent) {
                self.errors.log(
                    MessageLevel::Error,
                    ErrorKind::InvalidEdgePropertyValue,
                    "agent_type is not a permitted value",
                    format!("{}: {}", edge.id, agent),
                );
            }
        }
        let provenance = edge
            .primary_knowledge_source
            .iter()
            .chain(edge.aggregator_knowledge_source.iter())
            .chain(edge.supporting_data_source.iter());
        for source in provenance {
            if !PrefixManager::is_curie(source) {
                self.errors.log(
                    MessageLevel::Warning,
                    ErrorKind::InvalidEdgePropertyValue,
                    "Knowledge-source value is not a CURIE",
                    format!("{}: {}", edge.id, source),
                );
            }
        }
        for publication in &edge.publications {
            if !PrefixManager::is_curie(publication) {
                self.errors.log(
                    MessageLevel::Warning,
                    ErrorKind::InvalidEdgePropertyValue,
                    "Publication entry is not a CURIE",
                    format!("{}: {}", edge.id, publication),
                );
            }
        }
        if let Some(PropertyValue::Bool(true)) = edge.properties.get("_invalid_predicate") {
            self.errors.log(
                MessageLevel::Error,
                ErrorKind::InvalidEdgePredicate,
                "Predicate not in relation hierarchy",
                &edge.predicate,
            );
        }
    }
}

impl Inspector for Validator {
    fn inspect(&mut self, entity: GraphEntityType, record: &Record) {
        match (entity, record) {
            (GraphEntityType::Node, Record::Node(node)) => self.validate_node(node),
            (GraphEntityType::Edge, Record::Edge(edge)) => self.validate_edge(edge),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biograph_core::MemoryGraph;

    /// Category warnings and predicate errors aggregate
    /// with subjects accumulated per message.
    #[test]
    fn test_error_aggregation_tree() {
        let mut graph = MemoryGraph::new();
        graph.add_node(Node::new("A:1"));
        graph.add_node(Node::new("A:2"));
        let mut edge = Edge::new("A:1", "bogus:rel", "A:2");
        edge.knowledge_level = Some("not_provided".into());
        edge.agent_type = Some("not_provided".into());
        graph.add_edge(edge);

        let mut validator = Validator::with_default_model();
        validator.validate_graph(&graph);
        let tree = validator.report().to_json();

        assert_eq!(
            tree["WARNING"]["NO_CATEGORY"]["Node lacks category"],
            serde_json::json!(["A:1", "A:2"])
        );
        assert_eq!(
            tree["ERROR"]["INVALID_EDGE_PREDICATE"]["Predicate not in relation hierarchy"],
            serde_json::json!(["bogus:rel"])
        );
    }

    #[test]
    fn test_clean_records_pass() {
        let mut node = Node::new("HGNC:11603");
        node.category.push("biolink:Gene".into());
        let mut edge = Edge::new("HGNC:11603", "biolink:contributes_to", "MONDO:0005002");
        edge.knowledge_level = Some("knowledge_assertion".into());
        edge.agent_type = Some("manual_agent".into());
        edge.primary_knowledge_source = Some("infores:string".into());

        let mut validator = Validator::with_default_model();
        validator.validate_node(&node);
        validator.validate_edge(&edge);
        assert!(validator.report().is_empty());
    }

    #[test]
    fn test_missing_provenance_is_warning_unless_strict() {
        let edge = Edge::new("HGNC:1", "biolink:related_to", "HGNC:2");

        let mut lenient = Validator::with_default_model();
        lenient.validate_edge(&edge);
        assert!(!lenient
            .report()
            .subjects(MessageLevel::Warning, ErrorKind::MissingEdgeProperty)
            .is_empty());
        assert!(lenient
            .report()
            .subjects(MessageLevel::Error, ErrorKind::MissingEdgeProperty)
            .is_empty());

        let mut strict = Validator::with_default_model().strict(true);
        strict.validate_edge(&edge);
        assert!(!strict
            .report()
            .subjects(MessageLevel::Error, ErrorKind::MissingEdgeProperty)
            .is_empty());
    }

    #[test]
    fn test_invalid_enum_values() {
        let mut edge = Edge::new("HGNC:1", "biolink:related_to", "HGNC:2");
        edge.knowledge_level = Some("vibes".into());
        edge.agent_type = Some("manual_agent".into());

        let mut validator = Validator::with_default_model();
        validator.validate_edge(&edge);
        assert!(!validator
            .report()
            .subjects(MessageLevel::Error, ErrorKind::InvalidEdgePropertyValue)
            .is_empty());
    }

    #[test]
    fn test_camel_case_category_check() {
        let mut node = Node::new("HGNC:1");
        node.category.push("biolink:gene".into());
        let mut validator = Validator::with_default_model();
        validator.validate_node(&node);
        assert_eq!(
            validator
                .report()
                .subjects(MessageLevel::Error, ErrorKind::InvalidCategory),
            vec!["biolink:gene"]
        );
    }

    #[test]
    fn test_context_version_capture() {
        let context = Arc::new(ValidationContext::with_version("3.1.2").unwrap());
        let validator = Validator::new(context);
        assert_eq!(validator.model_version(), "3.1.2");
    }
}
