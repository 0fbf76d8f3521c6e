//! Structural rule checks.
//!
//! Mutations check the annotations they touch, which keeps checks local:
//! shape, parent inclusion, inclusion of the annotation's own children, and
//! the relations to its immediate siblings. [`Graph::validate`] runs the
//! same checks over the whole graph and adds the saturation boundary checks
//! that cannot be decided while a parent is still being populated.

use log::debug;

use crate::{
    annotation::Annotation,
    identifier::{AnchorId, AnnotationId},
    layer::{Alignment, Layer},
    validate::{InvalidGraph, Rule, Violation, ViolationCollector},
};

use super::Graph;

type Check = Result<(), Violation>;

impl Graph {
    /// Checks every structural rule over the whole graph.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidGraph`] with every violation found.
    pub fn validate(&self) -> Result<(), InvalidGraph> {
        let mut collector = ViolationCollector::new();

        for annotation in self.annotations.values() {
            if annotation.is_deleted() || annotation.parent.is_none() {
                continue;
            }
            let Some(layer) = self.schema.layer(annotation.layer) else {
                continue;
            };
            collector.check(self.check_shape(annotation, layer));
            collector.check(self.check_parent_includes(annotation, layer));
        }

        for (parent, by_layer) in &self.children {
            for (layer_id, siblings) in by_layer {
                let Some(layer) = self.schema.layer(*layer_id) else {
                    continue;
                };
                collector.check(self.check_peers(siblings, layer));
                for pair in siblings.windows(2) {
                    collector.check(self.check_neighbours(pair[0], pair[1], layer));
                }
                collector.check(self.check_tiling(*parent, siblings, layer));
            }
        }

        let result = collector.finish();
        debug!(
            graph:% = self.id,
            violations = result.as_ref().map_or_else(|err| err.violations().len(), |_| 0);
            "Graph validated"
        );
        result
    }

    /// Checks the rules that involve annotation `id`.
    pub(crate) fn check_annotation(&self, id: AnnotationId) -> Check {
        let Some(annotation) = self.annotations.get(&id) else {
            return Ok(());
        };
        let Some(parent) = annotation.parent else {
            return Ok(());
        };
        if annotation.is_deleted() {
            return Ok(());
        }
        let Some(layer) = self.schema.layer(annotation.layer) else {
            return Ok(());
        };

        self.check_shape(annotation, layer)?;
        self.check_parent_includes(annotation, layer)?;
        self.check_children_included(id)?;

        let siblings = self.children_ids(parent, annotation.layer);
        self.check_peers(siblings, layer)?;
        if let Some(position) = siblings.iter().position(|sibling| *sibling == id) {
            if position > 0 {
                self.check_neighbours(siblings[position - 1], id, layer)?;
            }
            if let Some(next) = siblings.get(position + 1) {
                self.check_neighbours(id, *next, layer)?;
            }
        }
        Ok(())
    }

    fn check_shape(&self, annotation: &Annotation, layer: &Layer) -> Check {
        let id = annotation.id;
        match layer.alignment() {
            Alignment::None => {
                if annotation.start.is_some() || annotation.end.is_some() {
                    return Err(Violation::new(
                        Rule::Alignment,
                        vec![id],
                        format!("tag on layer `{}` has anchors", layer.id()),
                    ));
                }
            }
            Alignment::Instant => {
                let (Some(start), Some(end)) = (annotation.start, annotation.end) else {
                    return Err(Violation::new(
                        Rule::Alignment,
                        vec![id],
                        format!("instant on layer `{}` has no anchor", layer.id()),
                    ));
                };
                if start != end && !self.same_position(start, end) {
                    return Err(Violation::new(
                        Rule::Alignment,
                        vec![id],
                        format!("instant on layer `{}` spans time", layer.id()),
                    ));
                }
            }
            Alignment::Interval => {
                if annotation.start.is_none() || annotation.end.is_none() {
                    return Err(Violation::new(
                        Rule::Alignment,
                        vec![id],
                        format!("interval on layer `{}` lacks an anchor", layer.id()),
                    ));
                }
            }
        }

        let start = self.anchor_offset(annotation.start);
        let end = self.anchor_offset(annotation.end);
        if exceeds(start, end) {
            return Err(Violation::new(
                Rule::EndBeforeStart,
                vec![id],
                format!("{} < {}", end.unwrap_or_default(), start.unwrap_or_default()),
            ));
        }
        Ok(())
    }

    fn check_parent_includes(&self, annotation: &Annotation, layer: &Layer) -> Check {
        if !layer.parent_includes() || !annotation.has_anchors() {
            return Ok(());
        }
        let Some(parent) = annotation.parent.filter(|parent| *parent != self.root) else {
            return Ok(());
        };
        let (parent_start, parent_end) = self.offsets(parent);
        let start = self.anchor_offset(annotation.start);
        let end = self.anchor_offset(annotation.end);

        if exceeds(parent_start, start) {
            return Err(Violation::new(
                Rule::ParentIncludes,
                vec![annotation.id, parent],
                format!("starts before parent `{parent}`"),
            ));
        }
        if exceeds(end, parent_end) {
            return Err(Violation::new(
                Rule::ParentIncludes,
                vec![annotation.id, parent],
                format!("ends after parent `{parent}`"),
            ));
        }
        Ok(())
    }

    fn check_children_included(&self, id: AnnotationId) -> Check {
        let Some(by_layer) = self.children.get(&id) else {
            return Ok(());
        };
        for (layer_id, children) in by_layer {
            let Some(layer) = self.schema.layer(*layer_id) else {
                continue;
            };
            for child in children {
                if let Some(child) = self.annotations.get(child) {
                    self.check_parent_includes(child, layer)?;
                }
            }
        }
        Ok(())
    }

    fn check_peers(&self, siblings: &[AnnotationId], layer: &Layer) -> Check {
        if !layer.peers() && siblings.len() > 1 {
            return Err(Violation::new(
                Rule::Peers,
                siblings.to_vec(),
                format!("layer `{}`", layer.id()),
            ));
        }
        Ok(())
    }

    /// Checks two adjacent siblings, `prev` ordered before `next`.
    fn check_neighbours(&self, prev: AnnotationId, next: AnnotationId, layer: &Layer) -> Check {
        let (Some(prev_annotation), Some(next_annotation)) =
            (self.annotations.get(&prev), self.annotations.get(&next))
        else {
            return Ok(());
        };

        if !layer.peers_overlap() && layer.alignment().is_anchored() {
            let prev_start = self.anchor_offset(prev_annotation.start);
            let prev_end = self.anchor_offset(prev_annotation.end);
            let next_start = self.anchor_offset(next_annotation.start);

            if exceeds(prev_start, next_start) {
                return Err(Violation::new(
                    Rule::PeersOverlap,
                    vec![next, prev],
                    format!("out of order on layer `{}`", layer.id()),
                ));
            }
            if exceeds(prev_end, next_start) {
                return Err(Violation::new(
                    Rule::PeersOverlap,
                    vec![next, prev],
                    format!("overlap on layer `{}`", layer.id()),
                ));
            }
        }

        if layer.saturated()
            && layer.alignment().is_anchored()
            && !self.contiguous(prev_annotation.end, next_annotation.start)
        {
            return Err(Violation::new(
                Rule::Saturation,
                vec![next, prev],
                format!("gap between siblings on layer `{}`", layer.id()),
            ));
        }
        Ok(())
    }

    /// Checks that saturated children reach their parent's boundaries.
    fn check_tiling(&self, parent: AnnotationId, siblings: &[AnnotationId], layer: &Layer) -> Check {
        if !layer.saturated() || !layer.alignment().is_anchored() || parent == self.root {
            return Ok(());
        }
        let Some(parent_annotation) = self.annotations.get(&parent) else {
            return Ok(());
        };
        if !parent_annotation.has_anchors() {
            return Ok(());
        }
        let first = siblings.first().and_then(|id| self.annotations.get(id));
        let last = siblings.last().and_then(|id| self.annotations.get(id));
        if let Some(first) = first {
            if !self.contiguous(parent_annotation.start, first.start) {
                return Err(Violation::new(
                    Rule::Saturation,
                    vec![first.id, parent],
                    format!(
                        "first child on layer `{}` does not start with parent",
                        layer.id()
                    ),
                ));
            }
        }
        if let Some(last) = last {
            if !self.contiguous(last.end, parent_annotation.end) {
                return Err(Violation::new(
                    Rule::Saturation,
                    vec![last.id, parent],
                    format!("last child on layer `{}` does not end with parent", layer.id()),
                ));
            }
        }
        Ok(())
    }

    /// Two boundaries are contiguous when they are the same anchor or their
    /// offsets are equal. Unknown offsets cannot be shown to differ.
    fn contiguous(&self, a: Option<AnchorId>, b: Option<AnchorId>) -> bool {
        if a == b {
            return true;
        }
        match (self.anchor_offset(a), self.anchor_offset(b)) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    fn same_position(&self, a: AnchorId, b: AnchorId) -> bool {
        self.contiguous(Some(a), Some(b))
    }
}

/// Returns `true` when both offsets are known and `a` is after `b`.
fn exceeds(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a > b)
}

#[cfg(test)]
mod proptest_tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{
        annotation::NewAnnotation, confidence::Confidence, layer::Alignment, schema::Schema,
    };

    // ===================
    // Strategies
    // ===================

    fn extents_strategy() -> impl Strategy<Value = Vec<(u8, u8)>> {
        prop::collection::vec((0u8..20, 0u8..20), 1..24)
    }

    // ===================
    // Property Test Functions
    // ===================

    /// Whatever sequence of insertions is attempted, accepted ones never
    /// leave the graph invalid and rejected ones leave no trace.
    fn check_insertions_keep_graph_valid(extents: Vec<(u8, u8)>) -> Result<(), TestCaseError> {
        let mut schema = Schema::new();
        schema
            .add_layer(
                Layer::new("utterance")
                    .with_alignment(Alignment::Interval)
                    .with_peers(true),
            )
            .map_err(|err| TestCaseError::fail(err.to_string()))?;
        schema
            .add_layer(
                Layer::new("word")
                    .with_parent("utterance")
                    .with_alignment(Alignment::Interval)
                    .with_peers(true),
            )
            .map_err(|err| TestCaseError::fail(err.to_string()))?;
        let mut graph = Graph::new("prop", schema);
        let anchor = |graph: &mut Graph, offset: f64| {
            graph
                .get_or_create_anchor_at(offset, Confidence::Manual)
                .map_err(|err| TestCaseError::fail(err.to_string()))
        };
        let start = anchor(&mut graph, 0.0)?;
        let end = anchor(&mut graph, 20.0)?;
        let utterance = graph
            .add_annotation(NewAnnotation::new("utterance", "u").with_anchors(start, end))
            .map_err(|err| TestCaseError::fail(err.to_string()))?;

        for (from, to) in extents {
            let from = anchor(&mut graph, f64::from(from))?;
            let to = anchor(&mut graph, f64::from(to))?;
            let ledger = graph.changes().len();
            let words = graph.children(utterance, "word".into()).count();

            let result = graph.add_annotation(
                NewAnnotation::new("word", "w")
                    .with_parent(utterance)
                    .with_anchors(from, to),
            );
            match result {
                Ok(_) => {
                    prop_assert_eq!(graph.children(utterance, "word".into()).count(), words + 1);
                }
                Err(_) => {
                    prop_assert_eq!(graph.changes().len(), ledger);
                    prop_assert_eq!(graph.children(utterance, "word".into()).count(), words);
                }
            }
            prop_assert!(graph.validate().is_ok(), "{:?}", graph.validate());
        }
        Ok(())
    }

    // ===================
    // Proptest Wrappers
    // ===================

    proptest! {
        #[test]
        fn insertions_keep_graph_valid(extents in extents_strategy()) {
            check_insertions_keep_graph_valid(extents)?;
        }
    }
}
