//! Biolink Model vocabulary tables for biograph
//!
//! This crate provides a centralized location for Biolink Model class and
//! predicate hierarchies, controlled enum values, required-slot lists, and
//! identifier-prefix priorities used throughout the biograph ecosystem.
//!
//! # Organization
//!
//! - `biolink` - well-known Biolink CURIEs and prefixes
//! - `format` - case-convention helpers (CamelCase classes, snake_case predicates)
//! - `errors` - error types for vocabulary lookup
//! - [`Vocabulary`] - the query surface: is *X* a known class/predicate? what
//!   are its ancestors? which prefixes rank highest for its category?
//!
//! The vocabulary is an immutable service: once constructed it is safe for
//! concurrent reads. Versioned construction selects an entry from the model
//! version catalogue; unknown versions fail with
//! [`errors::VocabError::UnknownVersion`].

pub mod errors;

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use errors::VocabError;

/// Well-known Biolink CURIEs and prefix conventions
pub mod biolink {
    /// The CURIE prefix for all Biolink Model terms
    pub const PREFIX: &str = "biolink";

    /// The root entity class, assigned when a node has no category
    pub const NAMED_THING: &str = "biolink:NamedThing";

    /// The root association class for edges
    pub const ASSOCIATION: &str = "biolink:Association";

    /// The root of the relation hierarchy
    pub const RELATED_TO: &str = "biolink:related_to";

    /// Equivalence predicate driving clique construction
    pub const SAME_AS: &str = "biolink:same_as";

    /// Ontological subclass predicate
    pub const SUBCLASS_OF: &str = "biolink:subclass_of";

    /// Base IRI the `biolink` prefix expands to
    pub const BASE_IRI: &str = "https://w3id.org/biolink/vocab/";
}

/// Case-convention helpers for Biolink names
///
/// Classes are CamelCase (`biolink:Gene`), predicates are snake_case
/// (`biolink:related_to`). These helpers check and normalize both forms.
pub mod format {
    /// Check that the local part of a class CURIE is CamelCase.
    pub fn is_camel_case(local: &str) -> bool {
        let mut chars = local.chars();
        match chars.next() {
            Some(c) if c.is_ascii_uppercase() => {}
            _ => return false,
        }
        local.chars().all(|c| c.is_ascii_alphanumeric())
    }

    /// Check that the local part of a predicate CURIE is snake_case.
    pub fn is_snake_case(local: &str) -> bool {
        !local.is_empty()
            && local
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }

    /// Split a Biolink CURIE into `(prefix, local)`; bare names get an
    /// empty prefix.
    pub fn split_curie(name: &str) -> (&str, &str) {
        match name.split_once(':') {
            Some((p, l)) => (p, l),
            None => ("", name),
        }
    }

    /// Prepend the `biolink` prefix to a bare name; CURIEs pass through.
    pub fn with_default_prefix(name: &str) -> String {
        if name.contains(':') {
            name.to_string()
        } else {
            format!("{}:{}", super::biolink::PREFIX, name)
        }
    }

    /// Convert a snake_case local name to CamelCase.
    pub fn snake_to_camel(local: &str) -> String {
        local
            .split('_')
            .map(|w| {
                let mut cs = w.chars();
                match cs.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + cs.as_str(),
                    None => String::new(),
                }
            })
            .collect()
    }

    /// Convert a CamelCase local name to snake_case.
    pub fn camel_to_snake(local: &str) -> String {
        let mut out = String::with_capacity(local.len() + 4);
        for (i, c) in local.chars().enumerate() {
            if c.is_ascii_uppercase() {
                if i > 0 {
                    out.push('_');
                }
                out.push(c.to_ascii_lowercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

// ============================================================================
// Static model tables
// ============================================================================

/// `(class, parent, is_mixin)` triples for the entity class hierarchy.
///
/// Parent of the root is the empty string. Mixins participate in ancestor
/// chains but are never assigned as concrete categories.
const CLASS_TABLE: &[(&str, &str, bool)] = &[
    ("biolink:NamedThing", "", false),
    ("biolink:Attribute", "biolink:NamedThing", false),
    ("biolink:BiologicalEntity", "biolink:NamedThing", false),
    ("biolink:ChemicalEntity", "biolink:NamedThing", false),
    ("biolink:MolecularEntity", "biolink:ChemicalEntity", false),
    ("biolink:SmallMolecule", "biolink:MolecularEntity", false),
    ("biolink:Drug", "biolink:ChemicalEntity", false),
    ("biolink:GenomicEntity", "biolink:BiologicalEntity", false),
    ("biolink:Gene", "biolink:GenomicEntity", false),
    ("biolink:Transcript", "biolink:GenomicEntity", false),
    ("biolink:Exon", "biolink:GenomicEntity", false),
    ("biolink:Genome", "biolink:GenomicEntity", false),
    ("biolink:SequenceVariant", "biolink:GenomicEntity", false),
    ("biolink:Polypeptide", "biolink:BiologicalEntity", false),
    ("biolink:Protein", "biolink:Polypeptide", false),
    (
        "biolink:DiseaseOrPhenotypicFeature",
        "biolink:BiologicalEntity",
        false,
    ),
    ("biolink:Disease", "biolink:DiseaseOrPhenotypicFeature", false),
    (
        "biolink:PhenotypicFeature",
        "biolink:DiseaseOrPhenotypicFeature",
        false,
    ),
    (
        "biolink:BiologicalProcessOrActivity",
        "biolink:BiologicalEntity",
        false,
    ),
    (
        "biolink:BiologicalProcess",
        "biolink:BiologicalProcessOrActivity",
        false,
    ),
    ("biolink:Pathway", "biolink:BiologicalProcess", false),
    (
        "biolink:MolecularActivity",
        "biolink:BiologicalProcessOrActivity",
        false,
    ),
    ("biolink:OrganismalEntity", "biolink:BiologicalEntity", false),
    ("biolink:AnatomicalEntity", "biolink:OrganismalEntity", false),
    ("biolink:Cell", "biolink:AnatomicalEntity", false),
    ("biolink:CellularComponent", "biolink:AnatomicalEntity", false),
    ("biolink:GrossAnatomicalStructure", "biolink:AnatomicalEntity", false),
    ("biolink:OrganismTaxon", "biolink:NamedThing", false),
    (
        "biolink:InformationContentEntity",
        "biolink:NamedThing",
        false,
    ),
    ("biolink:Publication", "biolink:InformationContentEntity", false),
    ("biolink:Article", "biolink:Publication", false),
    ("biolink:GeneOrGeneProduct", "biolink:NamedThing", true),
    ("biolink:ChemicalOrDrugOrTreatment", "biolink:NamedThing", true),
    ("biolink:PhysicalEssence", "biolink:NamedThing", true),
    // Association classes hang off their own root.
    ("biolink:Association", "", false),
    (
        "biolink:GeneToDiseaseAssociation",
        "biolink:Association",
        false,
    ),
    (
        "biolink:GeneToPhenotypicFeatureAssociation",
        "biolink:Association",
        false,
    ),
    ("biolink:GeneToGeneAssociation", "biolink:Association", false),
    (
        "biolink:GeneToGeneHomologyAssociation",
        "biolink:GeneToGeneAssociation",
        false,
    ),
    (
        "biolink:PairwiseGeneToGeneInteraction",
        "biolink:GeneToGeneAssociation",
        false,
    ),
    (
        "biolink:ChemicalToGeneAssociation",
        "biolink:Association",
        false,
    ),
    (
        "biolink:ChemicalToDiseaseOrPhenotypicFeatureAssociation",
        "biolink:Association",
        false,
    ),
    (
        "biolink:DiseaseToPhenotypicFeatureAssociation",
        "biolink:Association",
        false,
    ),
];

/// `(predicate, parent)` pairs for the relation hierarchy.
const PREDICATE_TABLE: &[(&str, &str)] = &[
    ("biolink:related_to", ""),
    ("biolink:related_to_at_instance_level", "biolink:related_to"),
    ("biolink:related_to_at_concept_level", "biolink:related_to"),
    ("biolink:same_as", "biolink:related_to_at_concept_level"),
    ("biolink:subclass_of", "biolink:related_to_at_concept_level"),
    ("biolink:superclass_of", "biolink:related_to_at_concept_level"),
    ("biolink:close_match", "biolink:related_to_at_concept_level"),
    ("biolink:exact_match", "biolink:close_match"),
    ("biolink:part_of", "biolink:related_to_at_instance_level"),
    ("biolink:has_part", "biolink:related_to_at_instance_level"),
    ("biolink:located_in", "biolink:related_to_at_instance_level"),
    ("biolink:coexists_with", "biolink:related_to_at_instance_level"),
    ("biolink:affects", "biolink:related_to_at_instance_level"),
    ("biolink:regulates", "biolink:affects"),
    ("biolink:contributes_to", "biolink:related_to_at_instance_level"),
    ("biolink:causes", "biolink:contributes_to"),
    ("biolink:treats", "biolink:related_to_at_instance_level"),
    ("biolink:interacts_with", "biolink:related_to_at_instance_level"),
    (
        "biolink:physically_interacts_with",
        "biolink:interacts_with",
    ),
    (
        "biolink:genetically_interacts_with",
        "biolink:interacts_with",
    ),
    ("biolink:expressed_in", "biolink:located_in"),
    ("biolink:has_phenotype", "biolink:related_to_at_instance_level"),
    (
        "biolink:gene_associated_with_condition",
        "biolink:related_to_at_instance_level",
    ),
    ("biolink:biomarker_for", "biolink:related_to_at_instance_level"),
    ("biolink:orthologous_to", "biolink:related_to_at_concept_level"),
    ("biolink:participates_in", "biolink:related_to_at_instance_level"),
    (
        "biolink:actively_involved_in",
        "biolink:participates_in",
    ),
    ("biolink:has_participant", "biolink:related_to_at_instance_level"),
    ("biolink:associated_with", "biolink:related_to_at_instance_level"),
];

/// Identifier-prefix priorities per category, highest rank first.
///
/// Used by clique-merge leader election: within a clique, the node whose id
/// prefix ranks highest for the clique category becomes the leader.
const PREFIX_PRIORITY_TABLE: &[(&str, &[&str])] = &[
    (
        "biolink:Gene",
        &["HGNC", "NCBIGene", "ENSEMBL", "MGI", "ZFIN", "UniProtKB"],
    ),
    ("biolink:Protein", &["UniProtKB", "PR", "ENSEMBL"]),
    (
        "biolink:Disease",
        &["MONDO", "DOID", "OMIM", "ORPHANET", "MESH", "UMLS"],
    ),
    ("biolink:PhenotypicFeature", &["HP", "MP", "ZP"]),
    (
        "biolink:SmallMolecule",
        &["CHEBI", "CHEMBL.COMPOUND", "PUBCHEM.COMPOUND", "DRUGBANK"],
    ),
    (
        "biolink:ChemicalEntity",
        &["CHEBI", "CHEMBL.COMPOUND", "PUBCHEM.COMPOUND", "DRUGBANK", "MESH"],
    ),
    ("biolink:Drug", &["RXCUI", "NDC", "DRUGBANK", "CHEBI"]),
    ("biolink:Pathway", &["GO", "REACT", "KEGG"]),
    ("biolink:BiologicalProcess", &["GO"]),
    ("biolink:MolecularActivity", &["GO"]),
    ("biolink:Cell", &["CL"]),
    ("biolink:CellularComponent", &["GO"]),
    ("biolink:AnatomicalEntity", &["UBERON"]),
    ("biolink:OrganismTaxon", &["NCBITaxon", "MESH"]),
    ("biolink:Publication", &["PMID", "PMC", "doi"]),
];

/// Controlled values for the `knowledge_level` edge slot.
pub const KNOWLEDGE_LEVELS: &[&str] = &[
    "knowledge_assertion",
    "logical_entailment",
    "prediction",
    "statistical_association",
    "observation",
    "not_provided",
];

/// Controlled values for the `agent_type` edge slot.
pub const AGENT_TYPES: &[&str] = &[
    "manual_agent",
    "automated_agent",
    "data_analysis_pipeline",
    "computational_model",
    "text_mining_agent",
    "image_processing_agent",
    "manual_validation_of_automated_agent",
    "not_provided",
];

/// Node slots that must be present on every record.
pub const REQUIRED_NODE_PROPERTIES: &[&str] = &["id", "category"];

/// Edge slots that must be present on every record.
pub const REQUIRED_EDGE_PROPERTIES: &[&str] = &["id", "subject", "predicate", "object"];

/// Edge slots required at write time; absence is a warning during
/// validation unless strict mode is requested.
pub const REQUIRED_EDGE_PROVENANCE: &[&str] = &["knowledge_level", "agent_type"];

/// Model versions this vocabulary answers for.
pub const SUPPORTED_VERSIONS: &[&str] = &["3.1.2", "4.1.6", "4.2.2"];

/// Version used when none is requested.
pub const DEFAULT_VERSION: &str = "4.1.6";

// ============================================================================
// Vocabulary
// ============================================================================

struct ClassEntry {
    parent: &'static str,
    mixin: bool,
}

static CLASS_INDEX: Lazy<FxHashMap<&'static str, ClassEntry>> = Lazy::new(|| {
    CLASS_TABLE
        .iter()
        .map(|&(name, parent, mixin)| (name, ClassEntry { parent, mixin }))
        .collect()
});

static PREDICATE_INDEX: Lazy<FxHashMap<&'static str, &'static str>> =
    Lazy::new(|| PREDICATE_TABLE.iter().copied().collect());

static PREFIX_PRIORITY_INDEX: Lazy<FxHashMap<&'static str, &'static [&'static str]>> =
    Lazy::new(|| PREFIX_PRIORITY_TABLE.iter().copied().collect());

/// Read-only query surface over the Biolink Model tables.
///
/// Construction selects a model version; the instance then answers
/// class/predicate questions for that version. Safe for concurrent reads.
#[derive(Clone)]
pub struct Vocabulary {
    version: &'static str,
}

impl Vocabulary {
    /// Vocabulary at the default model version.
    pub fn new() -> Self {
        Self {
            version: DEFAULT_VERSION,
        }
    }

    /// Vocabulary at a specific model version from the catalogue.
    pub fn with_version(version: &str) -> Result<Self, VocabError> {
        match SUPPORTED_VERSIONS.iter().find(|v| **v == version) {
            Some(v) => Ok(Self { version: v }),
            None => Err(VocabError::UnknownVersion(version.to_string())),
        }
    }

    /// The model version this instance answers for.
    pub fn version(&self) -> &str {
        self.version
    }

    /// Is `name` a known entity or association class?
    ///
    /// Accepts both `biolink:Gene` and bare `Gene`.
    pub fn is_class(&self, name: &str) -> bool {
        CLASS_INDEX.contains_key(format::with_default_prefix(name).as_str())
    }

    /// Is `name` a mixin class?
    pub fn is_mixin(&self, name: &str) -> bool {
        CLASS_INDEX
            .get(format::with_default_prefix(name).as_str())
            .map(|e| e.mixin)
            .unwrap_or(false)
    }

    /// Is `name` a known predicate in the relation hierarchy?
    pub fn is_predicate(&self, name: &str) -> bool {
        PREDICATE_INDEX.contains_key(format::with_default_prefix(name).as_str())
    }

    /// Ancestors of a class, self first, root last. Empty if unknown.
    pub fn class_ancestors(&self, name: &str) -> Vec<&'static str> {
        let mut out = Vec::new();
        let start = format::with_default_prefix(name);
        let mut cur = match CLASS_INDEX.get_key_value(start.as_str()) {
            Some((k, _)) => *k,
            None => return out,
        };
        loop {
            out.push(cur);
            match CLASS_INDEX.get(cur) {
                Some(e) if !e.parent.is_empty() => cur = e.parent,
                _ => break,
            }
        }
        out
    }

    /// Ancestors of a predicate, self first, root last. Empty if unknown.
    pub fn predicate_ancestors(&self, name: &str) -> Vec<&'static str> {
        let mut out = Vec::new();
        let start = format::with_default_prefix(name);
        let mut cur = match PREDICATE_INDEX.get_key_value(start.as_str()) {
            Some((k, _)) => *k,
            None => return out,
        };
        loop {
            out.push(cur);
            match PREDICATE_INDEX.get(cur) {
                Some(&parent) if !parent.is_empty() => cur = parent,
                _ => break,
            }
        }
        out
    }

    /// The nearest class both `a` and `b` descend from, if any.
    pub fn common_class_ancestor(&self, a: &str, b: &str) -> Option<&'static str> {
        let anc_a = self.class_ancestors(a);
        let anc_b = self.class_ancestors(b);
        anc_a.into_iter().find(|c| anc_b.contains(c))
    }

    /// Do two categories share an ancestor below the root entity class?
    ///
    /// Clique-merge strict mode uses this to detect incompatible cliques.
    pub fn categories_compatible(&self, a: &str, b: &str) -> bool {
        match self.common_class_ancestor(a, b) {
            Some(c) => c != biolink::NAMED_THING,
            None => false,
        }
    }

    /// Identifier-prefix priority list for a category, highest rank first.
    ///
    /// Falls back through the category's ancestors so `biolink:Gene`
    /// priorities also answer for unlisted Gene subclasses.
    pub fn prefix_priority(&self, category: &str) -> Option<&'static [&'static str]> {
        for anc in self.class_ancestors(category) {
            if let Some(&priorities) = PREFIX_PRIORITY_INDEX.get(anc) {
                return Some(priorities);
            }
        }
        None
    }

    /// The association class for an edge between the given subject and
    /// object categories: the most specific table entry whose name embeds
    /// both endpoint classes, else the association root.
    pub fn association_for(&self, subject_category: &str, object_category: &str) -> &'static str {
        let subj = format::split_curie(subject_category).1;
        let obj = format::split_curie(object_category).1;
        let mut best: Option<&'static str> = None;
        for &(name, parent, _) in CLASS_TABLE {
            if parent.is_empty() && name != biolink::ASSOCIATION {
                continue;
            }
            if !self
                .class_ancestors(name)
                .contains(&biolink::ASSOCIATION)
                && name != biolink::ASSOCIATION
            {
                continue;
            }
            let local = format::split_curie(name).1;
            if local.contains(subj) && local.contains(obj) {
                // Longer names are more specific.
                if best.map(|b| name.len() > b.len()).unwrap_or(true) {
                    best = Some(name);
                }
            }
        }
        best.unwrap_or(biolink::ASSOCIATION)
    }

    /// Is `value` a valid `knowledge_level`?
    pub fn is_knowledge_level(&self, value: &str) -> bool {
        KNOWLEDGE_LEVELS.contains(&value)
    }

    /// Is `value` a valid `agent_type`?
    pub fn is_agent_type(&self, value: &str) -> bool {
        AGENT_TYPES.contains(&value)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_lookup() {
        let v = Vocabulary::new();
        assert!(v.is_class("biolink:Gene"));
        assert!(v.is_class("Gene"));
        assert!(!v.is_class("biolink:Gremlin"));
    }

    #[test]
    fn test_class_ancestors_reach_root() {
        let v = Vocabulary::new();
        let anc = v.class_ancestors("biolink:Gene");
        assert_eq!(anc.first(), Some(&"biolink:Gene"));
        assert_eq!(anc.last(), Some(&"biolink:NamedThing"));
        assert!(anc.contains(&"biolink:BiologicalEntity"));
    }

    #[test]
    fn test_predicate_ancestors() {
        let v = Vocabulary::new();
        let anc = v.predicate_ancestors("biolink:causes");
        assert!(anc.contains(&"biolink:contributes_to"));
        assert_eq!(anc.last(), Some(&"biolink:related_to"));
    }

    #[test]
    fn test_common_ancestor() {
        let v = Vocabulary::new();
        assert_eq!(
            v.common_class_ancestor("biolink:Disease", "biolink:PhenotypicFeature"),
            Some("biolink:DiseaseOrPhenotypicFeature")
        );
        assert!(v.categories_compatible("biolink:Disease", "biolink:PhenotypicFeature"));
        assert!(!v.categories_compatible("biolink:Disease", "biolink:Publication"));
    }

    #[test]
    fn test_prefix_priority_inherits() {
        let v = Vocabulary::new();
        let gene = v.prefix_priority("biolink:Gene").unwrap();
        assert_eq!(gene[0], "HGNC");
        // No explicit entry; falls through ancestors to ChemicalEntity.
        let mol = v.prefix_priority("biolink:MolecularEntity").unwrap();
        assert_eq!(mol[0], "CHEBI");
    }

    #[test]
    fn test_association_for() {
        let v = Vocabulary::new();
        assert_eq!(
            v.association_for("biolink:Gene", "biolink:Disease"),
            "biolink:GeneToDiseaseAssociation"
        );
        assert_eq!(
            v.association_for("biolink:Publication", "biolink:Cell"),
            "biolink:Association"
        );
    }

    #[test]
    fn test_versions() {
        assert!(Vocabulary::with_version("4.1.6").is_ok());
        assert!(matches!(
            Vocabulary::with_version("0.0.1"),
            Err(VocabError::UnknownVersion(_))
        ));
    }

    #[test]
    fn test_case_helpers() {
        assert!(format::is_camel_case("GeneToDiseaseAssociation"));
        assert!(!format::is_camel_case("gene"));
        assert!(format::is_snake_case("contributes_to"));
        assert!(!format::is_snake_case("ContributesTo"));
        assert_eq!(format::camel_to_snake("NamedThing"), "named_thing");
        assert_eq!(format::snake_to_camel("named_thing"), "NamedThing");
    }
}
