//! Information Resource (InfoRes) rewriting
//!
//! Knowledge-source fields carry free-text resource names in the wild;
//! this module coerces them into canonical `infores:` CURIEs. A single
//! rule parameter selects the behavior: the bare standard
//! transform, a regex deletion, a regex substitution, or a substitution
//! plus an explicit CURIE prefix. Every rewrite is recorded in a catalog
//! `original -> minted` retrievable after the transform.

use std::collections::BTreeMap;

use regex::Regex;
use serde::Deserialize;

use biograph_core::{Edge, Error, Node, Result};

/// Default CURIE prefix for minted identifiers.
const INFORES_PREFIX: &str = "infores";

/// The rewrite rule forms accepted by the `infores_rewrite` option.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InfoResRule {
    /// `true`: apply the standard name-to-slug transform
    Standard(bool),
    /// `(regex)` / `(regex, sub)` / `(regex, sub, prefix)`
    Rewrite(Vec<String>),
}

/// Compiled rewrite state plus the accumulated catalog.
#[derive(Debug, Default)]
pub struct InfoResContext {
    rewrite: Option<CompiledRule>,
    catalog: BTreeMap<String, String>,
    /// Defaults injected when a slot is empty
    pub default_primary: Option<String>,
    pub default_aggregator: Vec<String>,
    pub default_supporting: Vec<String>,
    pub default_provided_by: Option<String>,
}

#[derive(Debug)]
struct CompiledRule {
    pattern: Option<Regex>,
    substitution: String,
    prefix: String,
}

impl InfoResContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the rewrite rule. Bad regexes are configuration errors.
    pub fn set_rule(&mut self, rule: &InfoResRule) -> Result<()> {
        let compiled = match rule {
            InfoResRule::Standard(false) => None,
            InfoResRule::Standard(true) => Some(CompiledRule {
                pattern: None,
                substitution: String::new(),
                prefix: INFORES_PREFIX.to_string(),
            }),
            InfoResRule::Rewrite(parts) => {
                let pattern = match parts.first().filter(|p| !p.is_empty()) {
                    Some(p) => Some(
                        Regex::new(p)
                            .map_err(|e| Error::config(format!("bad infores regex: {e}")))?,
                    ),
                    None => None,
                };
                Some(CompiledRule {
                    pattern,
                    substitution: parts.get(1).cloned().unwrap_or_default(),
                    prefix: parts
                        .get(2)
                        .filter(|p| !p.is_empty())
                        .cloned()
                        .unwrap_or_else(|| INFORES_PREFIX.to_string()),
                })
            }
        };
        self.rewrite = compiled;
        Ok(())
    }

    pub fn has_rule(&self) -> bool {
        self.rewrite.is_some()
    }

    /// The accumulated `original -> minted` catalog.
    pub fn catalog(&self) -> &BTreeMap<String, String> {
        &self.catalog
    }

    /// Mutable catalog access, used to seed a fresh context with the
    /// mappings a previous transform already minted.
    pub fn catalog_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.catalog
    }

    /// Rewrite one source name into an InfoRes CURIE, consulting and
    /// extending the catalog. Names already in `infores:` form pass
    /// through untouched.
    pub fn mint(&mut self, name: &str) -> String {
        if name.starts_with("infores:") {
            return name.to_string();
        }
        if let Some(minted) = self.catalog.get(name) {
            return minted.clone();
        }
        let rule = match &self.rewrite {
            Some(rule) => rule,
            None => return name.to_string(),
        };
        let stripped = match &rule.pattern {
            Some(re) => re.replace_all(name, rule.substitution.as_str()).into_owned(),
            None => name.to_string(),
        };
        let minted = format!("{}:{}", rule.prefix, slugify(&stripped));
        self.catalog.insert(name.to_string(), minted.clone());
        minted
    }

    /// Stage-5 provenance handling for a node: fill the `provided_by`
    /// default, then rewrite when a rule is installed.
    pub fn apply_node(&mut self, node: &mut Node) {
        if node.provided_by.is_empty() {
            if let Some(default) = &self.default_provided_by {
                node.provided_by.push(default.clone());
            }
        }
        if self.has_rule() {
            node.provided_by = node
                .provided_by
                .iter()
                .map(|s| self.mint(s))
                .collect();
        }
    }

    /// Stage-5 provenance handling for an edge: fill knowledge-source
    /// defaults, then rewrite when a rule is installed.
    pub fn apply_edge(&mut self, edge: &mut Edge) {
        if edge.primary_knowledge_source.is_none() {
            edge.primary_knowledge_source = self.default_primary.clone();
        }
        if edge.aggregator_knowledge_source.is_empty() {
            edge.aggregator_knowledge_source = self.default_aggregator.clone();
        }
        if edge.supporting_data_source.is_empty() {
            edge.supporting_data_source = self.default_supporting.clone();
        }
        if self.has_rule() {
            if let Some(primary) = edge.primary_knowledge_source.take() {
                edge.primary_knowledge_source = Some(self.mint(&primary));
            }
            edge.aggregator_knowledge_source = edge
                .aggregator_knowledge_source
                .iter()
                .map(|s| self.mint(s))
                .collect();
            edge.supporting_data_source = edge
                .supporting_data_source
                .iter()
                .map(|s| self.mint(s))
                .collect();
            edge.provided_by = edge.provided_by.iter().map(|s| self.mint(s)).collect();
        }
    }
}

/// The standard transform: lowercase, collapse every non-alphanumeric
/// run into a single `-`, trim the ends.
fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minted(rule: InfoResRule, name: &str) -> (String, InfoResContext) {
        let mut ctx = InfoResContext::new();
        ctx.set_rule(&rule).unwrap();
        let m = ctx.mint(name);
        (m, ctx)
    }

    #[test]
    fn test_standard_rule() {
        let (m, _) = minted(InfoResRule::Standard(true), "STRING database");
        assert_eq!(m, "infores:string-database");
    }

    #[test]
    fn test_delete_rule() {
        let (m, _) = minted(
            InfoResRule::Rewrite(vec![" database$".to_string()]),
            "STRING database",
        );
        assert_eq!(m, "infores:string");
    }

    #[test]
    fn test_replace_with_prefix_rule() {
        // Delete-suffix rule with an explicit prefix element.
        let (m, ctx) = minted(
            InfoResRule::Rewrite(vec![
                " database$".to_string(),
                String::new(),
                "infores".to_string(),
            ]),
            "STRING database",
        );
        assert_eq!(m, "infores:string");
        assert_eq!(
            ctx.catalog().get("STRING database"),
            Some(&"infores:string".to_string())
        );
    }

    #[test]
    fn test_existing_infores_untouched() {
        let (m, ctx) = minted(InfoResRule::Standard(true), "infores:already-minted");
        assert_eq!(m, "infores:already-minted");
        assert!(ctx.catalog().is_empty());
    }

    #[test]
    fn test_catalog_reuse() {
        let mut ctx = InfoResContext::new();
        ctx.set_rule(&InfoResRule::Standard(true)).unwrap();
        let a = ctx.mint("Some Source");
        let b = ctx.mint("Some Source");
        assert_eq!(a, b);
        assert_eq!(ctx.catalog().len(), 1);
    }

    #[test]
    fn test_defaults_fill_missing_slots() {
        let mut ctx = InfoResContext::new();
        ctx.default_primary = Some("infores:default".to_string());
        let mut edge = Edge::new("A:1", "biolink:related_to", "B:2");
        ctx.apply_edge(&mut edge);
        assert_eq!(
            edge.primary_knowledge_source.as_deref(),
            Some("infores:default")
        );

        // An existing value is not overwritten by the default.
        let mut edge = Edge::new("A:1", "biolink:related_to", "B:2");
        edge.primary_knowledge_source = Some("infores:real".to_string());
        ctx.apply_edge(&mut edge);
        assert_eq!(
            edge.primary_knowledge_source.as_deref(),
            Some("infores:real")
        );
    }

    #[test]
    fn test_bad_regex_is_config_error() {
        let mut ctx = InfoResContext::new();
        assert!(ctx
            .set_rule(&InfoResRule::Rewrite(vec!["([".to_string()]))
            .is_err());
    }
}
