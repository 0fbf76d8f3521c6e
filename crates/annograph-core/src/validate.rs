//! Structural rules and violation reporting.
//!
//! Each rule of the annotation graph has a stable [`Rule`] code. A broken
//! rule is reported as a [`Violation`] naming the annotations involved.
//! Whole-graph validation gathers every violation through a
//! [`ViolationCollector`] instead of stopping at the first one, because
//! transcripts imported from lossy formats are often imperfect and callers
//! want the full picture before deciding to repair, skip or abort.

use std::fmt;

use thiserror::Error;

use crate::identifier::AnnotationId;

/// Structural rules enforced on annotations.
///
/// Codes are grouped by what they constrain:
/// - `G1xx` - a single annotation
/// - `G2xx` - siblings on the same layer under the same parent
/// - `G3xx` - an annotation and its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    // =========================================================================
    // Single annotation (G1xx)
    // =========================================================================
    /// The end anchor's offset is before the start anchor's offset.
    EndBeforeStart,

    /// Anchors do not match the layer's alignment: tags carry anchors,
    /// instants have distinct anchors at different offsets, or intervals lack
    /// an anchor.
    Alignment,

    // =========================================================================
    // Siblings (G2xx)
    // =========================================================================
    /// More than one annotation under one parent on a layer without peers.
    Peers,

    /// Siblings overlap, or are out of order, on a layer whose peers may not
    /// overlap.
    PeersOverlap,

    /// Siblings on a saturated layer leave a gap or do not reach the
    /// parent's boundaries.
    Saturation,

    // =========================================================================
    // Parent (G3xx)
    // =========================================================================
    /// The annotation extends beyond its parent.
    ParentIncludes,
}

impl Rule {
    /// Returns the stable code of this rule.
    pub fn code(self) -> &'static str {
        match self {
            Self::EndBeforeStart => "G100",
            Self::Alignment => "G101",
            Self::Peers => "G200",
            Self::PeersOverlap => "G201",
            Self::Saturation => "G202",
            Self::ParentIncludes => "G300",
        }
    }

    /// Returns a short description of the rule.
    pub fn description(self) -> &'static str {
        match self {
            Self::EndBeforeStart => "end is before start",
            Self::Alignment => "anchors do not match layer alignment",
            Self::Peers => "layer does not allow peers",
            Self::PeersOverlap => "peers overlap",
            Self::Saturation => "layer is not saturated",
            Self::ParentIncludes => "parent does not include annotation",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A broken rule and the annotations that break it.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    rule: Rule,
    annotations: Vec<AnnotationId>,
    message: String,
}

impl Violation {
    pub fn new(rule: Rule, annotations: Vec<AnnotationId>, message: impl Into<String>) -> Self {
        Self {
            rule,
            annotations,
            message: message.into(),
        }
    }

    pub fn rule(&self) -> Rule {
        self.rule
    }

    /// Returns the offending annotations, most specific first.
    pub fn annotations(&self) -> &[AnnotationId] {
        &self.annotations
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule.code(), self.rule.description())?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if !self.annotations.is_empty() {
            f.write_str(" (")?;
            for (i, id) in self.annotations.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{id}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// Error returned by whole-graph validation.
///
/// Wraps every violation found. Displays the first one and how many more
/// there are.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", summarize(.violations))]
pub struct InvalidGraph {
    violations: Vec<Violation>,
}

impl InvalidGraph {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

fn summarize(violations: &[Violation]) -> String {
    match violations {
        [] => String::new(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (+{} more)", rest.len()),
    }
}

/// A collector for accumulating violations during validation.
#[derive(Debug, Default)]
pub struct ViolationCollector {
    violations: Vec<Violation>,
}

impl ViolationCollector {
    /// Create a new empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a violation to this collector.
    pub fn emit(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    /// Emit the violation of a check result, if any.
    pub fn check(&mut self, result: Result<(), Violation>) {
        if let Err(violation) = result {
            self.emit(violation);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Finish collection and return a result.
    ///
    /// - If there are violations, returns `Err(InvalidGraph)` with all of them.
    /// - If there are none, returns `Ok(())`.
    pub fn finish(self) -> Result<(), InvalidGraph> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(InvalidGraph::new(self.violations))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(rule: Rule, ids: &[&str]) -> Violation {
        Violation::new(
            rule,
            ids.iter().map(|id| AnnotationId::new(id)).collect(),
            "",
        )
    }

    #[test]
    fn test_violation_display() {
        let v = Violation::new(
            Rule::PeersOverlap,
            vec![AnnotationId::new("w1"), AnnotationId::new("w2")],
            "layer `word`",
        );
        assert_eq!(v.to_string(), "[G201] peers overlap: layer `word` (w1, w2)");
    }

    #[test]
    fn test_empty_collector_finishes_ok() {
        let collector = ViolationCollector::new();
        assert!(collector.finish().is_ok());
    }

    #[test]
    fn test_collector_keeps_all_violations() {
        let mut collector = ViolationCollector::new();
        collector.emit(violation(Rule::Peers, &["a"]));
        collector.check(Ok(()));
        collector.check(Err(violation(Rule::Saturation, &["b"])));
        collector.emit(violation(Rule::EndBeforeStart, &["c"]));

        let err = collector.finish().unwrap_err();
        assert_eq!(err.violations().len(), 3);
        assert_eq!(
            err.to_string(),
            "[G200] layer does not allow peers (a) (+2 more)"
        );
    }

    #[test]
    fn test_invalid_graph_is_an_error() {
        let single = InvalidGraph::new(vec![violation(Rule::Saturation, &["b"])]);
        assert_eq!(single.to_string(), single.violations()[0].to_string());

        let err: Box<dyn std::error::Error> = Box::new(single);
        assert!(err.source().is_none());
        assert!(err.to_string().starts_with("[G"));
    }
}
