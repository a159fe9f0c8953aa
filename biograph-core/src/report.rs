//! Per-record error aggregation
//!
//! Parser and validation problems never abort the pipeline; they become
//! `(level, kind, message, subject)` tuples collected here. Identical
//! `(level, kind, message)` tuples collapse, with subjects accumulated as
//! an ordered unique list, yielding the nested report
//! `level -> error_type -> message -> [subjects]`.

use std::collections::BTreeMap;
use std::io::Write;

use serde_json::{json, Value as JsonValue};

use crate::error::Result;

/// Severity of an aggregated message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageLevel {
    /// Conveys "must"
    Error,
    /// Conveys "should"
    Warning,
    /// Recommendation
    Info,
}

impl MessageLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageLevel::Error => "ERROR",
            MessageLevel::Warning => "WARNING",
            MessageLevel::Info => "INFO",
        }
    }
}

/// Classification of an aggregated problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    MissingNodeProperty,
    MissingEdgeProperty,
    InvalidNodePropertyValueType,
    InvalidNodePropertyValue,
    InvalidEdgePropertyValueType,
    InvalidEdgePropertyValue,
    NoCategory,
    InvalidCategory,
    NoEdgePredicate,
    InvalidEdgePredicate,
    InvalidCurie,
    UnknownPrefix,
    MissingNodeCuriePrefix,
    DuplicateNode,
    MissingNode,
    InvalidEdgeTriple,
    MalformedRecord,
    ScalarConflict,
    ValidationSystemError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingNodeProperty => "MISSING_NODE_PROPERTY",
            ErrorKind::MissingEdgeProperty => "MISSING_EDGE_PROPERTY",
            ErrorKind::InvalidNodePropertyValueType => "INVALID_NODE_PROPERTY_VALUE_TYPE",
            ErrorKind::InvalidNodePropertyValue => "INVALID_NODE_PROPERTY_VALUE",
            ErrorKind::InvalidEdgePropertyValueType => "INVALID_EDGE_PROPERTY_VALUE_TYPE",
            ErrorKind::InvalidEdgePropertyValue => "INVALID_EDGE_PROPERTY_VALUE",
            ErrorKind::NoCategory => "NO_CATEGORY",
            ErrorKind::InvalidCategory => "INVALID_CATEGORY",
            ErrorKind::NoEdgePredicate => "NO_EDGE_PREDICATE",
            ErrorKind::InvalidEdgePredicate => "INVALID_EDGE_PREDICATE",
            ErrorKind::InvalidCurie => "INVALID_CURIE",
            ErrorKind::UnknownPrefix => "UNKNOWN_PREFIX",
            ErrorKind::MissingNodeCuriePrefix => "MISSING_NODE_CURIE_PREFIX",
            ErrorKind::DuplicateNode => "DUPLICATE_NODE",
            ErrorKind::MissingNode => "MISSING_NODE",
            ErrorKind::InvalidEdgeTriple => "INVALID_EDGE_TRIPLE",
            ErrorKind::MalformedRecord => "MALFORMED_RECORD",
            ErrorKind::ScalarConflict => "SCALAR_CONFLICT",
            ErrorKind::ValidationSystemError => "VALIDATION_SYSTEM_ERROR",
        }
    }
}

/// Deduplicating collector for per-record problems.
#[derive(Debug, Default, Clone)]
pub struct ErrorAggregator {
    errors: BTreeMap<MessageLevel, BTreeMap<ErrorKind, BTreeMap<String, Vec<String>>>>,
    total: usize,
}

impl ErrorAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one problem against one subject. Duplicate subjects for the
    /// same `(level, kind, message)` are ignored.
    pub fn log(
        &mut self,
        level: MessageLevel,
        kind: ErrorKind,
        message: impl Into<String>,
        subject: impl Into<String>,
    ) {
        let subject = subject.into().trim().to_string();
        let subjects = self
            .errors
            .entry(level)
            .or_default()
            .entry(kind)
            .or_default()
            .entry(message.into())
            .or_default();
        if !subjects.contains(&subject) {
            subjects.push(subject);
            self.total += 1;
        }
    }

    /// Fold another aggregator into this one.
    pub fn merge(&mut self, other: ErrorAggregator) {
        for (level, kinds) in other.errors {
            for (kind, messages) in kinds {
                for (message, subjects) in messages {
                    for subject in subjects {
                        self.log(level, kind, message.clone(), subject);
                    }
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Distinct `(level, kind, message, subject)` tuples recorded.
    pub fn len(&self) -> usize {
        self.total
    }

    /// Subjects recorded for one `(level, kind)` pair, across messages.
    pub fn subjects(&self, level: MessageLevel, kind: ErrorKind) -> Vec<&str> {
        let mut out = Vec::new();
        if let Some(messages) = self.errors.get(&level).and_then(|m| m.get(&kind)) {
            for subjects in messages.values() {
                out.extend(subjects.iter().map(|s| s.as_str()));
            }
        }
        out
    }

    /// The nested `level -> error_type -> message -> [subjects]` tree.
    pub fn to_json(&self) -> JsonValue {
        let mut root = serde_json::Map::new();
        for (level, kinds) in &self.errors {
            let mut level_obj = serde_json::Map::new();
            for (kind, messages) in kinds {
                let mut kind_obj = serde_json::Map::new();
                for (message, subjects) in messages {
                    kind_obj.insert(message.clone(), json!(subjects));
                }
                level_obj.insert(kind.as_str().to_string(), JsonValue::Object(kind_obj));
            }
            root.insert(level.as_str().to_string(), JsonValue::Object(level_obj));
        }
        JsonValue::Object(root)
    }

    /// Write the JSON report to `out`.
    pub fn write_report<W: Write>(&self, out: &mut W) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, &self.to_json())?;
        out.write_all(b"\n")?;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.errors.clear();
        self.total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_and_accumulate() {
        let mut agg = ErrorAggregator::new();
        agg.log(
            MessageLevel::Warning,
            ErrorKind::NoCategory,
            "Node lacks category",
            "A:1",
        );
        agg.log(
            MessageLevel::Warning,
            ErrorKind::NoCategory,
            "Node lacks category",
            "A:2",
        );
        agg.log(
            MessageLevel::Warning,
            ErrorKind::NoCategory,
            "Node lacks category",
            "A:1",
        );
        assert_eq!(agg.len(), 2);
        let tree = agg.to_json();
        assert_eq!(
            tree["WARNING"]["NO_CATEGORY"]["Node lacks category"],
            serde_json::json!(["A:1", "A:2"])
        );
    }

    #[test]
    fn test_merge() {
        let mut a = ErrorAggregator::new();
        a.log(
            MessageLevel::Error,
            ErrorKind::InvalidCurie,
            "malformed id",
            "x",
        );
        let mut b = ErrorAggregator::new();
        b.log(
            MessageLevel::Error,
            ErrorKind::InvalidCurie,
            "malformed id",
            "y",
        );
        b.log(
            MessageLevel::Info,
            ErrorKind::DuplicateNode,
            "seen twice",
            "z",
        );
        a.merge(b);
        assert_eq!(a.len(), 3);
        assert_eq!(
            a.subjects(MessageLevel::Error, ErrorKind::InvalidCurie),
            vec!["x", "y"]
        );
    }
}
