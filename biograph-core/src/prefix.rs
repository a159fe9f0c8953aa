//! Bidirectional CURIE/IRI prefix manager
//!
//! Maintains `prefix -> base IRI` bindings with a longest-match reverse
//! index for contraction. When several bases match an IRI at the same
//! length, the ordered `priority` list decides which prefix mints the
//! canonical CURIE; without a priority entry the alphabetically-first
//! prefix wins, keeping contraction deterministic.

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::error::{Error, Result};

/// Common prefix bindings shipped as the default map, drawn from the
/// Biolink Model context.
const DEFAULT_BINDINGS: &[(&str, &str)] = &[
    ("biolink", "https://w3id.org/biolink/vocab/"),
    ("infores", "https://w3id.org/biolink/infores/"),
    ("HGNC", "http://identifiers.org/hgnc/"),
    ("NCBIGene", "http://identifiers.org/ncbigene/"),
    ("ENSEMBL", "http://identifiers.org/ensembl/"),
    ("UniProtKB", "http://identifiers.org/uniprot/"),
    ("MONDO", "http://purl.obolibrary.org/obo/MONDO_"),
    ("DOID", "http://purl.obolibrary.org/obo/DOID_"),
    ("HP", "http://purl.obolibrary.org/obo/HP_"),
    ("MP", "http://purl.obolibrary.org/obo/MP_"),
    ("GO", "http://purl.obolibrary.org/obo/GO_"),
    ("CHEBI", "http://purl.obolibrary.org/obo/CHEBI_"),
    ("CL", "http://purl.obolibrary.org/obo/CL_"),
    ("UBERON", "http://purl.obolibrary.org/obo/UBERON_"),
    ("NCBITaxon", "http://purl.obolibrary.org/obo/NCBITaxon_"),
    ("OBO", "http://purl.obolibrary.org/obo/"),
    ("OMIM", "http://identifiers.org/omim/"),
    ("MESH", "http://identifiers.org/mesh/"),
    ("UMLS", "http://identifiers.org/umls/"),
    ("PMID", "http://www.ncbi.nlm.nih.gov/pubmed/"),
    ("doi", "https://doi.org/"),
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("skos", "http://www.w3.org/2004/02/skos/core#"),
    ("dct", "http://purl.org/dc/terms/"),
];

/// Bidirectional CURIE/IRI mapping with canonicalization.
#[derive(Debug, Clone)]
pub struct PrefixManager {
    /// prefix -> base IRI
    p2i: FxHashMap<String, String>,
    /// base IRI -> prefixes bound to it (contraction side)
    i2p: FxHashMap<String, Vec<String>>,
    /// Ordered prefixes used to break contraction ties
    priority: Vec<String>,
    /// Prefix assumed for tokens with no colon
    default_prefix: Option<String>,
    /// Fail contraction instead of passing unmatched IRIs through
    strict: bool,
}

impl PrefixManager {
    /// Manager pre-loaded with the default Biolink context bindings.
    pub fn new() -> Self {
        let mut pm = Self::empty();
        pm.update(
            DEFAULT_BINDINGS
                .iter()
                .map(|&(p, i)| (p.to_string(), i.to_string())),
        );
        pm
    }

    /// Manager with no bindings at all.
    pub fn empty() -> Self {
        Self {
            p2i: FxHashMap::default(),
            i2p: FxHashMap::default(),
            priority: Vec::new(),
            default_prefix: None,
            strict: false,
        }
    }

    /// Merge additional bindings; later bindings win. Redefining a prefix
    /// to a different base logs a warning.
    pub fn update(&mut self, bindings: impl IntoIterator<Item = (String, String)>) {
        for (prefix, base) in bindings {
            if let Some(old) = self.p2i.get(&prefix) {
                if *old != base {
                    warn!(prefix = %prefix, old = %old, new = %base, "prefix redefined");
                    if let Some(list) = self.i2p.get_mut(old) {
                        list.retain(|p| p != &prefix);
                    }
                }
            }
            self.i2p
                .entry(base.clone())
                .or_default()
                .push(prefix.clone());
            self.p2i.insert(prefix, base);
        }
    }

    /// Ordered prefix priority for canonical minting.
    pub fn set_priority(&mut self, priority: Vec<String>) {
        self.priority = priority;
    }

    /// Prefix to assume for bare tokens.
    pub fn set_default_prefix(&mut self, prefix: impl Into<String>) {
        self.default_prefix = Some(prefix.into());
    }

    /// Strict contraction: unmatched IRIs fail instead of passing through.
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Does `s` look like a full IRI rather than a CURIE?
    pub fn is_iri(s: &str) -> bool {
        s.starts_with("http://")
            || s.starts_with("https://")
            || s.starts_with("ftp://")
            || s.starts_with("urn:")
    }

    /// Syntactic CURIE check: `prefix:local` with a non-empty prefix of
    /// word characters and dots, and a non-empty local part.
    pub fn is_curie(s: &str) -> bool {
        if Self::is_iri(s) {
            return false;
        }
        match s.split_once(':') {
            Some((prefix, local)) => {
                !prefix.is_empty()
                    && !local.is_empty()
                    && prefix
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
            }
            None => false,
        }
    }

    /// The prefix of a CURIE, if it has one.
    pub fn prefix_of(curie: &str) -> Option<&str> {
        if Self::is_iri(curie) {
            return None;
        }
        curie.split_once(':').map(|(p, _)| p)
    }

    /// Expand a CURIE to its IRI. IRIs pass through unchanged; bare tokens
    /// use the default prefix when one is set.
    pub fn expand(&self, curie: &str) -> Result<String> {
        if Self::is_iri(curie) {
            return Ok(curie.to_string());
        }
        let (prefix, local) = match curie.split_once(':') {
            Some(parts) => parts,
            None => match &self.default_prefix {
                Some(p) => (p.as_str(), curie),
                None => return Err(Error::UnknownPrefix(curie.to_string())),
            },
        };
        match self.p2i.get(prefix) {
            Some(base) => Ok(format!("{}{}", base, local)),
            None => Err(Error::UnknownPrefix(prefix.to_string())),
        }
    }

    /// Contract an IRI to a CURIE using the longest matching base. Ties at
    /// equal length resolve through the priority list, then
    /// alphabetically. Unmatched IRIs pass through unless strict.
    pub fn contract(&self, iri: &str) -> Result<String> {
        let mut best: Option<(&str, &str)> = None; // (base, prefix)
        for (base, prefixes) in &self.i2p {
            if prefixes.is_empty() || !iri.starts_with(base.as_str()) {
                continue;
            }
            let candidate = self.pick_prefix(prefixes);
            match best {
                Some((cur_base, cur_prefix)) => {
                    let better = base.len() > cur_base.len()
                        || (base.len() == cur_base.len()
                            && self.ranks_before(candidate, cur_prefix));
                    if better {
                        best = Some((base, candidate));
                    }
                }
                None => best = Some((base, candidate)),
            }
        }
        match best {
            Some((base, prefix)) => Ok(format!("{}:{}", prefix, &iri[base.len()..])),
            None if self.strict => Err(Error::NoContraction(iri.to_string())),
            None => Ok(iri.to_string()),
        }
    }

    /// Expand then contract, producing the preferred form of a CURIE.
    pub fn canonical(&self, curie: &str) -> Result<String> {
        let iri = self.expand(curie)?;
        self.contract(&iri)
    }

    /// The highest-ranked prefix among those bound to one base.
    fn pick_prefix<'a>(&self, prefixes: &'a [String]) -> &'a str {
        let mut best: Option<&'a str> = None;
        for p in prefixes {
            match best {
                Some(cur) if !self.ranks_before(p, cur) => {}
                _ => best = Some(p),
            }
        }
        best.expect("non-empty prefix list")
    }

    /// Does prefix `a` outrank prefix `b`?
    fn ranks_before(&self, a: &str, b: &str) -> bool {
        let rank = |p: &str| self.priority.iter().position(|q| q == p);
        match (rank(a), rank(b)) {
            (Some(ra), Some(rb)) => ra < rb,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => a < b,
        }
    }
}

impl Default for PrefixManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_known_prefix() {
        let pm = PrefixManager::new();
        assert_eq!(
            pm.expand("HGNC:11603").unwrap(),
            "http://identifiers.org/hgnc/11603"
        );
    }

    #[test]
    fn test_expand_unknown_prefix_fails() {
        let pm = PrefixManager::new();
        assert!(matches!(
            pm.expand("NOPE:1"),
            Err(Error::UnknownPrefix(_))
        ));
    }

    #[test]
    fn test_expand_passes_iris_through() {
        let pm = PrefixManager::new();
        assert_eq!(
            pm.expand("http://example.org/x").unwrap(),
            "http://example.org/x"
        );
    }

    #[test]
    fn test_contract_longest_base_wins() {
        let mut pm = PrefixManager::empty();
        pm.update([
            ("obo".to_string(), "http://purl.obolibrary.org/obo/".to_string()),
            (
                "GO".to_string(),
                "http://purl.obolibrary.org/obo/GO_".to_string(),
            ),
        ]);
        assert_eq!(
            pm.contract("http://purl.obolibrary.org/obo/GO_0008150").unwrap(),
            "GO:0008150"
        );
    }

    #[test]
    fn test_contract_tie_uses_priority() {
        let mut pm = PrefixManager::empty();
        pm.update([
            ("b".to_string(), "http://example.org/ns/".to_string()),
            ("a".to_string(), "http://example.org/ns/".to_string()),
        ]);
        // Alphabetical without priority.
        assert_eq!(pm.contract("http://example.org/ns/x").unwrap(), "a:x");
        pm.set_priority(vec!["b".to_string()]);
        assert_eq!(pm.contract("http://example.org/ns/x").unwrap(), "b:x");
    }

    #[test]
    fn test_contract_unmatched() {
        let mut pm = PrefixManager::empty();
        assert_eq!(
            pm.contract("http://unknown.org/x").unwrap(),
            "http://unknown.org/x"
        );
        pm.set_strict(true);
        assert!(matches!(
            pm.contract("http://unknown.org/x"),
            Err(Error::NoContraction(_))
        ));
    }

    #[test]
    fn test_canonical_round_trip() {
        let pm = PrefixManager::new();
        assert_eq!(pm.canonical("GO:0008150").unwrap(), "GO:0008150");
    }

    #[test]
    fn test_default_prefix_for_bare_tokens() {
        let mut pm = PrefixManager::new();
        pm.set_default_prefix("biolink");
        assert_eq!(
            pm.expand("Gene").unwrap(),
            "https://w3id.org/biolink/vocab/Gene"
        );
    }

    #[test]
    fn test_is_curie() {
        assert!(PrefixManager::is_curie("HGNC:11603"));
        assert!(PrefixManager::is_curie("CHEMBL.COMPOUND:123"));
        assert!(!PrefixManager::is_curie("http://example.org/x"));
        assert!(!PrefixManager::is_curie("no-colon"));
        assert!(!PrefixManager::is_curie(":local"));
    }

    #[test]
    fn test_redefinition_wins_later() {
        let mut pm = PrefixManager::empty();
        pm.update([("x".to_string(), "http://a/".to_string())]);
        pm.update([("x".to_string(), "http://b/".to_string())]);
        assert_eq!(pm.expand("x:1").unwrap(), "http://b/1");
        assert_eq!(pm.contract("http://b/1").unwrap(), "x:1");
        // The stale base no longer contracts to x.
        assert_eq!(pm.contract("http://a/1").unwrap(), "http://a/1");
    }
}
