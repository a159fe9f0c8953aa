//! Clique merge: collapse equivalent-identifier sets to a leader
//!
//! Equivalence evidence comes from `biolink:same_as` edges and from the
//! `same_as` node property. The connected components of that undirected
//! evidence graph are the cliques; each elects a leader and every other
//! member merges into it, with incident edges rewritten to the leader id
//! and stamped with `_original_subject` / `_original_object`.
//!
//! Leader election priority: an explicit `clique_leader`
//! annotation, then the highest-ranked id prefix for the clique's
//! category, then the alphabetically-first prefix. Ties at each level
//! fall through to the next.

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use biograph_core::{
    EdgeKey, Error, MemoryGraph, Node, PropertyValue, Result,
};
use biograph_vocab::{biolink, Vocabulary};

/// Node annotation marking a preferred leader.
pub const LEADER_ANNOTATION: &str = "clique_leader";

/// Property stamped on a rewritten edge with the pre-merge subject.
pub const ORIGINAL_SUBJECT_PROPERTY: &str = "_original_subject";

/// Property stamped on a rewritten edge with the pre-merge object.
pub const ORIGINAL_OBJECT_PROPERTY: &str = "_original_object";

/// Settings for one clique-merge run.
#[derive(Debug, Clone)]
pub struct CliqueMergeOptions {
    /// Node property that marks an explicit leader
    pub leader_annotation: String,
    /// Per-category prefix priorities overriding the vocabulary's
    pub prefix_priorities: FxHashMap<String, Vec<String>>,
    /// Abort on cliques whose categories share no ancestor below the
    /// root entity class; relaxed mode unions the categories instead
    pub strict: bool,
    /// Keep self-loops produced by endpoint rewriting
    pub allow_self_loops: bool,
}

impl Default for CliqueMergeOptions {
    fn default() -> Self {
        Self {
            leader_annotation: LEADER_ANNOTATION.to_string(),
            prefix_priorities: FxHashMap::default(),
            strict: true,
            allow_self_loops: false,
        }
    }
}

/// What one clique-merge run did.
#[derive(Debug, Default)]
pub struct CliqueMergeReport {
    /// `(leader, merged members)` per processed clique
    pub cliques: Vec<(String, Vec<String>)>,
    /// Edges rewritten to a leader id
    pub edges_rewritten: usize,
    /// Self-loops dropped during rewriting
    pub self_loops_dropped: usize,
}

/// Collapse equivalence cliques in `graph`.
pub fn clique_merge(
    graph: &mut MemoryGraph,
    vocabulary: &Vocabulary,
    options: &CliqueMergeOptions,
) -> Result<CliqueMergeReport> {
    let cliques = find_cliques(graph);
    info!(cliques = cliques.len(), "clique graph built");

    // Strict mode validates every clique before any mutation, so a
    // conflict aborts with the store untouched.
    if options.strict {
        for members in &cliques {
            check_compatibility(graph, vocabulary, members)?;
        }
    }

    let mut report = CliqueMergeReport::default();
    for members in cliques {
        let leader = elect_leader(graph, vocabulary, options, &members);
        debug!(leader = %leader, size = members.len(), "processing clique");
        let merged: Vec<String> = members.iter().filter(|m| **m != leader).cloned().collect();
        consolidate(graph, options, &leader, &merged, &mut report);
        report.cliques.push((leader, merged));
    }
    Ok(report)
}

/// Connected components over the same-as evidence.
fn find_cliques(graph: &MemoryGraph) -> Vec<Vec<String>> {
    let mut clique_graph: UnGraph<String, ()> = UnGraph::new_undirected();
    let mut indexes: FxHashMap<String, NodeIndex> = FxHashMap::default();

    let mut index_of = |g: &mut UnGraph<String, ()>, id: &str| -> NodeIndex {
        *indexes
            .entry(id.to_string())
            .or_insert_with(|| g.add_node(id.to_string()))
    };

    let mut pairs: Vec<(String, String)> = Vec::new();
    for (_, edge) in graph.edges() {
        if edge.predicate == biolink::SAME_AS {
            pairs.push((edge.subject.clone(), edge.object.clone()));
        }
    }
    for node in graph.nodes() {
        if let Some(PropertyValue::List(equivalents)) = node.properties.get("same_as") {
            for eq in equivalents {
                pairs.push((node.id.clone(), eq.clone()));
            }
        }
    }
    for (a, b) in pairs {
        let ia = index_of(&mut clique_graph, &a);
        let ib = index_of(&mut clique_graph, &b);
        clique_graph.add_edge(ia, ib, ());
    }

    let mut union = UnionFind::new(clique_graph.node_count());
    for edge in clique_graph.edge_references() {
        union.union(edge.source().index(), edge.target().index());
    }
    let mut components: FxHashMap<usize, Vec<String>> = FxHashMap::default();
    for index in clique_graph.node_indices() {
        let root = union.find(index.index());
        components
            .entry(root)
            .or_default()
            .push(clique_graph[index].clone());
    }
    let mut cliques: Vec<Vec<String>> = components
        .into_values()
        .filter(|members| members.len() > 1)
        .collect();
    // Deterministic processing order.
    for members in &mut cliques {
        members.sort();
    }
    cliques.sort();
    cliques
}

/// Strict-mode check: every pair of member categories must share an
/// ancestor below the root entity class.
fn check_compatibility(
    graph: &MemoryGraph,
    vocabulary: &Vocabulary,
    members: &[String],
) -> Result<()> {
    let categories: Vec<(&str, &str)> = members
        .iter()
        .filter_map(|id| {
            graph
                .node(id)
                .and_then(|n| n.category.first())
                .filter(|c| *c != biolink::NAMED_THING)
                .map(|c| (id.as_str(), c.as_str()))
        })
        .collect();
    for (i, (id_a, cat_a)) in categories.iter().enumerate() {
        for (id_b, cat_b) in &categories[i + 1..] {
            if !vocabulary.categories_compatible(cat_a, cat_b) {
                return Err(Error::CliqueConflict(format!(
                    "{} ({}) vs {} ({})",
                    id_a, cat_a, id_b, cat_b
                )));
            }
        }
    }
    Ok(())
}

/// The category whose ancestor chain is deepest among members, used to
/// pick the prefix priority list.
fn clique_category(
    graph: &MemoryGraph,
    vocabulary: &Vocabulary,
    members: &[String],
) -> String {
    let mut best = (0usize, biolink::NAMED_THING.to_string());
    for id in members {
        if let Some(category) = graph.node(id).and_then(|n| n.category.first()) {
            let depth = vocabulary.class_ancestors(category).len();
            if depth > best.0 {
                best = (depth, category.clone());
            }
        }
    }
    best.1
}

fn elect_leader(
    graph: &MemoryGraph,
    vocabulary: &Vocabulary,
    options: &CliqueMergeOptions,
    members: &[String],
) -> String {
    let annotated: Vec<&String> = members
        .iter()
        .filter(|id| {
            graph
                .node(id)
                .and_then(|n| n.properties.get(&options.leader_annotation))
                .map(|v| matches!(v, PropertyValue::Bool(true)))
                .unwrap_or(false)
        })
        .collect();
    // Ties within the annotation tier fall through to prefix ranking.
    let candidates: Vec<&String> = if annotated.len() == 1 {
        return annotated[0].clone();
    } else if !annotated.is_empty() {
        annotated
    } else {
        members.iter().collect()
    };

    let category = clique_category(graph, vocabulary, members);
    let priorities: Option<Vec<String>> = options
        .prefix_priorities
        .get(&category)
        .cloned()
        .or_else(|| {
            vocabulary
                .prefix_priority(&category)
                .map(|p| p.iter().map(|s| s.to_string()).collect())
        });

    let rank = |id: &str| -> usize {
        let prefix = id.split(':').next().unwrap_or(id);
        priorities
            .as_ref()
            .and_then(|p| p.iter().position(|q| q == prefix))
            .unwrap_or(usize::MAX)
    };

    let best_rank = candidates.iter().map(|id| rank(id)).min().unwrap_or(usize::MAX);
    let mut ranked: Vec<&String> = candidates
        .into_iter()
        .filter(|id| rank(id) == best_rank)
        .collect();
    // Final tie-break: alphabetical by prefix (then whole id).
    ranked.sort_by(|a, b| {
        let pa = a.split(':').next().unwrap_or(a);
        let pb = b.split(':').next().unwrap_or(b);
        pa.cmp(pb).then_with(|| a.cmp(b))
    });
    ranked
        .first()
        .map(|s| (*s).clone())
        .unwrap_or_else(|| members[0].clone())
}

/// Merge members into the leader and rewrite their incident edges.
fn consolidate(
    graph: &mut MemoryGraph,
    options: &CliqueMergeOptions,
    leader: &str,
    merged: &[String],
    report: &mut CliqueMergeReport,
) {
    for member in merged {
        let incident: Vec<EdgeKey> = graph.incident_edges(member);
        for key in incident {
            let Some(edge) = graph.remove_edge(&key) else {
                continue;
            };
            if edge.predicate == biolink::SAME_AS {
                // Equivalence evidence is consumed by the merge itself.
                continue;
            }
            let mut rewritten = edge;
            if rewritten.subject == *member {
                rewritten.properties.insert(
                    ORIGINAL_SUBJECT_PROPERTY.to_string(),
                    PropertyValue::String(rewritten.subject.clone()),
                );
                rewritten.subject = leader.to_string();
            }
            if rewritten.object == *member {
                rewritten.properties.insert(
                    ORIGINAL_OBJECT_PROPERTY.to_string(),
                    PropertyValue::String(rewritten.object.clone()),
                );
                rewritten.object = leader.to_string();
            }
            if rewritten.subject == rewritten.object && !options.allow_self_loops {
                report.self_loops_dropped += 1;
                continue;
            }
            report.edges_rewritten += 1;
            graph.add_edge(rewritten);
        }

        if let Some(mut node) = graph.remove_node(member) {
            node.properties.remove("same_as");
            let member_id = node.id.clone();
            if let Some(leader_node) = graph.node_mut(leader) {
                leader_node.merge_from(node);
                if !leader_node.xref.contains(&member_id) {
                    leader_node.xref.push(member_id);
                }
            } else {
                // Leader referenced only through same_as properties;
                // materialize it.
                let mut leader_node = Node::placeholder(leader.to_string());
                leader_node.merge_from(node);
                leader_node.xref.push(member_id);
                graph.add_node(leader_node);
            }
        }
    }
    // Leader-to-leader same-as self-evidence, if any survived.
    for key in graph.incident_edges(leader) {
        let drop = graph
            .edge(&key)
            .map(|e| {
                e.predicate == biolink::SAME_AS
                    && (e.subject == leader || e.object == leader)
                    && e.subject == e.object
            })
            .unwrap_or(false);
        if drop {
            graph.remove_edge(&key);
        }
    }
    if let Some(leader_node) = graph.node_mut(leader) {
        leader_node.properties.remove("same_as");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biograph_core::Edge;

    fn gene(id: &str) -> Node {
        let mut n = Node::new(id);
        n.category.push("biolink:Gene".into());
        n
    }

    fn same_as(s: &str, o: &str) -> Edge {
        Edge::new(s, biolink::SAME_AS, o)
    }

    /// Leader by prefix priority, xrefs absorbed, same-as
    /// edges gone, incident edges rewritten with original endpoints.
    #[test]
    fn test_leader_by_prefix_priority() {
        let mut graph = MemoryGraph::new();
        graph.add_node(gene("HGNC:1"));
        graph.add_node(gene("NCBIGene:7"));
        graph.add_node(gene("ENSEMBL:e"));
        graph.add_edge(same_as("HGNC:1", "NCBIGene:7"));
        graph.add_edge(same_as("NCBIGene:7", "ENSEMBL:e"));
        // An ordinary edge that must be rewritten.
        let mut disease = Node::new("MONDO:1");
        disease.category.push("biolink:Disease".into());
        graph.add_node(disease);
        graph.add_edge(Edge::new("ENSEMBL:e", "biolink:contributes_to", "MONDO:1"));

        let vocabulary = Vocabulary::new();
        let report =
            clique_merge(&mut graph, &vocabulary, &CliqueMergeOptions::default()).unwrap();

        assert_eq!(report.cliques.len(), 1);
        assert_eq!(report.cliques[0].0, "HGNC:1");

        assert!(graph.node("HGNC:1").is_some());
        assert!(graph.node("NCBIGene:7").is_none());
        assert!(graph.node("ENSEMBL:e").is_none());
        let leader = graph.node("HGNC:1").unwrap();
        assert!(leader.xref.contains(&"NCBIGene:7".to_string()));
        assert!(leader.xref.contains(&"ENSEMBL:e".to_string()));

        // No same-as edges survive.
        assert!(graph.edges().all(|(_, e)| e.predicate != biolink::SAME_AS));
        // The ordinary edge points at the leader and remembers its
        // original subject.
        let (_, rewritten) = graph
            .edges()
            .find(|(_, e)| e.predicate == "biolink:contributes_to")
            .unwrap();
        assert_eq!(rewritten.subject, "HGNC:1");
        assert_eq!(
            rewritten.properties.get(ORIGINAL_SUBJECT_PROPERTY),
            Some(&PropertyValue::String("ENSEMBL:e".into()))
        );
    }

    #[test]
    fn test_same_as_property_builds_clique() {
        let mut graph = MemoryGraph::new();
        let mut a = gene("HGNC:2");
        a.properties.insert(
            "same_as".into(),
            PropertyValue::List(vec!["NCBIGene:9".into()]),
        );
        graph.add_node(a);
        graph.add_node(gene("NCBIGene:9"));

        let vocabulary = Vocabulary::new();
        let report =
            clique_merge(&mut graph, &vocabulary, &CliqueMergeOptions::default()).unwrap();
        assert_eq!(report.cliques.len(), 1);
        assert_eq!(report.cliques[0].0, "HGNC:2");
        assert_eq!(graph.node_count(), 1);
        assert!(graph.node("HGNC:2").unwrap().properties.get("same_as").is_none());
    }

    #[test]
    fn test_annotated_leader_wins() {
        let mut graph = MemoryGraph::new();
        graph.add_node(gene("HGNC:3"));
        let mut preferred = gene("ENSEMBL:x");
        preferred
            .properties
            .insert(LEADER_ANNOTATION.into(), PropertyValue::Bool(true));
        graph.add_node(preferred);
        graph.add_edge(same_as("HGNC:3", "ENSEMBL:x"));

        let vocabulary = Vocabulary::new();
        let report =
            clique_merge(&mut graph, &vocabulary, &CliqueMergeOptions::default()).unwrap();
        assert_eq!(report.cliques[0].0, "ENSEMBL:x");
    }

    #[test]
    fn test_strict_conflict_aborts_untouched() {
        let mut graph = MemoryGraph::new();
        graph.add_node(gene("HGNC:4"));
        let mut publication = Node::new("PMID:1");
        publication.category.push("biolink:Publication".into());
        graph.add_node(publication);
        graph.add_edge(same_as("HGNC:4", "PMID:1"));

        let vocabulary = Vocabulary::new();
        let result = clique_merge(&mut graph, &vocabulary, &CliqueMergeOptions::default());
        assert!(matches!(result, Err(Error::CliqueConflict(_))));
        // Store untouched on abort.
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_relaxed_mode_unions_categories() {
        let mut graph = MemoryGraph::new();
        graph.add_node(gene("HGNC:5"));
        let mut publication = Node::new("PMID:2");
        publication.category.push("biolink:Publication".into());
        graph.add_node(publication);
        graph.add_edge(same_as("HGNC:5", "PMID:2"));

        let vocabulary = Vocabulary::new();
        let options = CliqueMergeOptions {
            strict: false,
            ..Default::default()
        };
        clique_merge(&mut graph, &vocabulary, &options).unwrap();
        assert_eq!(graph.node_count(), 1);
        let leader = graph.nodes().next().unwrap();
        assert!(leader.category.contains(&"biolink:Gene".to_string()));
        assert!(leader.category.contains(&"biolink:Publication".to_string()));
    }

    /// A second run finds no cliques and changes nothing.
    #[test]
    fn test_idempotent() {
        let mut graph = MemoryGraph::new();
        graph.add_node(gene("HGNC:6"));
        graph.add_node(gene("NCBIGene:8"));
        graph.add_edge(same_as("HGNC:6", "NCBIGene:8"));

        let vocabulary = Vocabulary::new();
        clique_merge(&mut graph, &vocabulary, &CliqueMergeOptions::default()).unwrap();
        let nodes_after: Vec<String> = graph.nodes().map(|n| n.id.clone()).collect();
        let edges_after = graph.edge_count();

        let report =
            clique_merge(&mut graph, &vocabulary, &CliqueMergeOptions::default()).unwrap();
        assert!(report.cliques.is_empty());
        assert_eq!(
            graph.nodes().map(|n| n.id.clone()).collect::<Vec<_>>(),
            nodes_after
        );
        assert_eq!(graph.edge_count(), edges_after);
    }
}
