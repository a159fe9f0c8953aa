//! Transformation pipeline and graph operations for biograph
//!
//! The [`Transformer`] orchestrates Source -> Sink flows in two modes:
//! non-streaming (drain into an owned [`biograph_core::MemoryGraph`],
//! operate, then save) and streaming (lock-step pipe with bounded
//! memory). Records pass through the normalization stages in a fixed
//! order: filter, CURIE normalization, category defaulting, predicate
//! normalization, provenance injection, then sink and inspector handoff.
//!
//! Graph-level operations live alongside: clique merge ([`clique`]),
//! multi-graph merge ([`merge`]), validation ([`validator`]), and the
//! reporting inspectors ([`summarize`], [`meta_kg`]).

pub mod clique;
pub mod infores;
pub mod merge;
pub mod meta_kg;
pub mod summarize;
pub mod transformer;
pub mod validator;

pub use clique::{clique_merge, CliqueMergeOptions, CliqueMergeReport};
pub use infores::{InfoResContext, InfoResRule};
pub use merge::merge_graphs;
pub use meta_kg::MetaKnowledgeGraph;
pub use summarize::Summarizer;
pub use transformer::{
    FnInspector, GraphEntityType, InputArgs, Inspector, OutputArgs, Transformer,
};
pub use validator::{ValidationContext, Validator};
