//! Traversal and temporal queries.

use crate::{
    anchor::Anchor,
    annotation::Annotation,
    identifier::{AnchorId, AnnotationId, LayerId},
};

use super::Graph;

/// Overlap rate of two intervals: their common duration over the duration
/// of their union (Paulo & Oliveira, 2004).
///
/// Two identical instants overlap completely; disjoint intervals have a
/// rate of zero.
///
/// # Example
///
/// ```
/// # use annograph_core::overlap_rate;
/// assert_eq!(overlap_rate(0.0, 2.0, 1.0, 3.0), 1.0 / 3.0);
/// assert_eq!(overlap_rate(0.0, 1.0, 2.0, 3.0), 0.0);
/// ```
pub fn overlap_rate(start1: f64, end1: f64, start2: f64, end2: f64) -> f64 {
    let common = (end1.min(end2) - start1.max(start2)).max(0.0);
    let union = (end1 - start1) + (end2 - start2) - common;
    if union > 0.0 {
        common / union
    } else if start1 == start2 && end1 == end2 {
        1.0
    } else {
        0.0
    }
}

impl Graph {
    /// Returns the root annotation, which stands for the graph itself.
    pub fn root(&self) -> &Annotation {
        &self.annotations[&self.root]
    }

    pub fn root_id(&self) -> AnnotationId {
        self.root
    }

    /// Returns an annotation, including deleted ones not yet flushed.
    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(&id)
    }

    pub fn anchor(&self, id: AnchorId) -> Option<&Anchor> {
        self.anchors.get(&id)
    }

    /// Iterates over every anchor in insertion order.
    pub fn anchors(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.values()
    }

    /// Iterates over every annotation in insertion order, including the root
    /// and deleted annotations not yet flushed.
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.values()
    }

    /// Returns the anchor at exactly `offset`, if any.
    pub fn anchor_at(&self, offset: f64) -> Option<AnchorId> {
        self.offset_index
            .get(&Self::offset_key(offset))
            .and_then(|ids| ids.first())
            .copied()
    }

    /// Iterates over the children of `parent` on `layer`, in ordinal order.
    pub fn children(
        &self,
        parent: AnnotationId,
        layer: LayerId,
    ) -> impl Iterator<Item = &Annotation> + '_ {
        self.children_ids(parent, layer)
            .iter()
            .filter_map(|id| self.annotations.get(id))
    }

    /// Returns the annotations on `layer`, parents before children and
    /// siblings in ordinal order.
    ///
    /// Listing the root layer returns the root annotation.
    pub fn list(&self, layer: LayerId) -> Vec<&Annotation> {
        if layer == self.schema.root_id() {
            return vec![self.root()];
        }
        self.all(layer)
    }

    /// Returns the annotations on `layer` in the same order as
    /// [`Graph::list`], never including the root.
    pub fn all(&self, layer: LayerId) -> Vec<&Annotation> {
        if !self.schema.contains(layer) || layer == self.schema.root_id() {
            return Vec::new();
        }
        self.walk_down(self.root, &self.schema.path_from_root(layer)[1..])
    }

    /// Returns the first annotation listed on `layer`.
    pub fn first(&self, layer: LayerId) -> Option<&Annotation> {
        self.list(layer).into_iter().next()
    }

    /// Returns the labels on `layer`, in listing order.
    pub fn labels(&self, layer: LayerId) -> Vec<&str> {
        self.all(layer).into_iter().map(Annotation::label).collect()
    }

    /// Follows the child index from `from` down through `path`.
    fn walk_down(&self, from: AnnotationId, path: &[LayerId]) -> Vec<&Annotation> {
        let mut current = vec![from];
        for layer in path {
            current = current
                .iter()
                .flat_map(|parent| self.children_ids(*parent, *layer).iter().copied())
                .collect();
        }
        current
            .iter()
            .filter_map(|id| self.annotations.get(id))
            .collect()
    }

    /// Returns the annotations on `layer` that belong to `ancestor`.
    ///
    /// When `layer` is below the ancestor's layer the child index is
    /// followed. Otherwise the candidates are the annotations on `layer`
    /// under the nearest common ancestor, kept when `ancestor` t-includes
    /// them.
    pub fn descendants(&self, ancestor: AnnotationId, layer: LayerId) -> Vec<&Annotation> {
        let Ok(annotation) = self.live_annotation(ancestor) else {
            return Vec::new();
        };
        if annotation.layer == layer {
            return vec![annotation];
        }
        if self.schema.is_ancestor(annotation.layer, layer) {
            let path = self.schema.path_from_root(layer);
            let below = path
                .iter()
                .position(|step| *step == annotation.layer)
                .map_or(path.len(), |position| position + 1);
            return self.walk_down(ancestor, &path[below..]);
        }

        let Some(common) = self.schema.common_ancestor(annotation.layer, layer) else {
            return Vec::new();
        };
        let Some(scope) = self.ancestor_on(ancestor, common) else {
            return Vec::new();
        };
        self.descendants(scope, layer)
            .into_iter()
            .filter(|candidate| self.includes(ancestor, candidate.id))
            .collect()
    }

    /// Returns the annotation's ancestor on `layer`, or itself if it is on
    /// `layer`.
    pub fn ancestor_on(&self, id: AnnotationId, layer: LayerId) -> Option<AnnotationId> {
        let mut current = self.annotations.get(&id);
        while let Some(annotation) = current {
            if annotation.layer == layer {
                return Some(annotation.id);
            }
            current = annotation
                .parent
                .and_then(|parent| self.annotations.get(&parent));
        }
        None
    }

    /// Returns the resolved start and end offsets of an annotation.
    ///
    /// Tags without anchors take the extent of their nearest anchored
    /// ancestor. The root spans the whole graph.
    pub fn offsets(&self, id: AnnotationId) -> (Option<f64>, Option<f64>) {
        if id == self.root {
            return (self.start_offset(), self.end_offset());
        }
        let mut current = self.annotations.get(&id);
        while let Some(annotation) = current {
            if annotation.has_anchors() {
                return (
                    self.anchor_offset(annotation.start),
                    self.anchor_offset(annotation.end),
                );
            }
            current = annotation
                .parent
                .filter(|parent| *parent != self.root)
                .and_then(|parent| self.annotations.get(&parent));
        }
        (None, None)
    }

    /// Returns `true` if both ends of the annotation have known offsets.
    pub fn is_anchored(&self, id: AnnotationId) -> bool {
        matches!(self.offsets(id), (Some(_), Some(_)))
    }

    /// Returns `true` if `a` t-includes `b`.
    ///
    /// The relation is false whenever an offset on either side is unknown.
    pub fn includes(&self, a: AnnotationId, b: AnnotationId) -> bool {
        match (self.offsets(a), self.offsets(b)) {
            ((Some(a_start), Some(a_end)), (Some(b_start), Some(b_end))) => {
                a_start <= b_start && b_end <= a_end
            }
            _ => false,
        }
    }

    /// Returns `true` if `b` t-includes `a`.
    pub fn included_in(&self, a: AnnotationId, b: AnnotationId) -> bool {
        self.includes(b, a)
    }

    /// Returns the [`overlap_rate`] of two annotations, or zero when either
    /// is not fully anchored.
    pub fn overlap_rate(&self, a: AnnotationId, b: AnnotationId) -> f64 {
        match (self.offsets(a), self.offsets(b)) {
            ((Some(a_start), Some(a_end)), (Some(b_start), Some(b_end))) => {
                overlap_rate(a_start, a_end, b_start, b_end)
            }
            _ => 0.0,
        }
    }

    /// Earliest known offset in the graph.
    pub fn start_offset(&self) -> Option<f64> {
        self.anchors
            .values()
            .filter_map(Anchor::offset)
            .reduce(f64::min)
    }

    /// Latest known offset in the graph.
    pub fn end_offset(&self) -> Option<f64> {
        self.anchors
            .values()
            .filter_map(Anchor::offset)
            .reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::*;
    use crate::{
        annotation::NewAnnotation,
        confidence::Confidence,
        layer::{Alignment, Layer},
        schema::Schema,
    };

    /// Two turns, each with words; utterances split the first turn in two.
    fn graph() -> Graph {
        let mut schema = Schema::new();
        for layer in [
            Layer::new("turn")
                .with_alignment(Alignment::Interval)
                .with_peers(true),
            Layer::new("utterance")
                .with_parent("turn")
                .with_alignment(Alignment::Interval)
                .with_peers(true),
            Layer::new("word")
                .with_parent("turn")
                .with_alignment(Alignment::Interval)
                .with_peers(true),
            Layer::new("pos").with_parent("word"),
        ] {
            schema.add_layer(layer).unwrap();
        }
        let mut graph = Graph::new("query", schema);
        let at = |graph: &mut Graph, offset: f64| {
            graph
                .get_or_create_anchor_at(offset, Confidence::Manual)
                .unwrap()
        };
        let a: Vec<AnchorId> = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
            .into_iter()
            .map(|offset| at(&mut graph, offset))
            .collect();

        let t1 = graph
            .add_annotation(
                NewAnnotation::new("turn", "t1")
                    .with_id("t1")
                    .with_anchors(a[0], a[4]),
            )
            .unwrap();
        let t2 = graph
            .add_annotation(
                NewAnnotation::new("turn", "t2")
                    .with_id("t2")
                    .with_anchors(a[4], a[6]),
            )
            .unwrap();
        for (id, start, end) in [("u1", 0, 2), ("u2", 2, 4)] {
            graph
                .add_annotation(
                    NewAnnotation::new("utterance", id)
                        .with_id(id)
                        .with_parent(t1)
                        .with_anchors(a[start], a[end]),
                )
                .unwrap();
        }
        for (parent, id, start, end) in [
            (t1, "w1", 0, 1),
            (t1, "w2", 1, 2),
            (t1, "w3", 2, 4),
            (t2, "w4", 4, 5),
            (t2, "w5", 5, 6),
        ] {
            graph
                .add_annotation(
                    NewAnnotation::new("word", id)
                        .with_id(id)
                        .with_parent(parent)
                        .with_anchors(a[start], a[end]),
                )
                .unwrap();
        }
        graph.tag("w2".into(), "pos".into(), "VB").unwrap();
        graph
    }

    #[test]
    fn test_list_is_parent_first_depth_order() {
        let graph = graph();
        assert_eq!(
            graph.labels("word".into()),
            vec!["w1", "w2", "w3", "w4", "w5"]
        );
        assert_eq!(graph.first("word".into()).unwrap().label(), "w1");
    }

    #[test]
    fn test_list_root_layer_special_case() {
        let graph = graph();
        let root_layer = graph.schema().root_id();
        let listed = graph.list(root_layer);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id(), graph.root_id());
        assert!(graph.all(root_layer).is_empty());
    }

    #[test]
    fn test_descendants_structural_and_temporal() {
        let graph = graph();
        let structural: Vec<_> = graph
            .descendants("t2".into(), "word".into())
            .into_iter()
            .map(Annotation::label)
            .collect();
        assert_eq!(structural, vec!["w4", "w5"]);

        let temporal: Vec<_> = graph
            .descendants("u1".into(), "word".into())
            .into_iter()
            .map(Annotation::label)
            .collect();
        assert_eq!(temporal, vec!["w1", "w2"]);
    }

    #[test]
    fn test_tag_offsets_come_from_anchored_ancestor() {
        let graph = graph();
        let tag = graph.first("pos".into()).unwrap().id();
        assert_eq!(graph.offsets(tag), (Some(1.0), Some(2.0)));
        assert!(graph.includes("u1".into(), tag));
        assert!(graph.included_in(tag, "t1".into()));
    }

    #[test]
    fn test_includes_is_false_when_unresolved() {
        let mut graph = graph();
        let open = graph.create_anchor(None, Confidence::None).unwrap();
        let a5 = graph.anchor_at(5.0).unwrap();
        graph.set_anchors("w5".into(), Some(a5), Some(open)).unwrap();

        assert!(!graph.includes("t2".into(), "w5".into()));
        assert!(!graph.is_anchored("w5".into()));
        assert_eq!(graph.overlap_rate("t2".into(), "w5".into()), 0.0);
    }

    #[test]
    fn test_overlap_rate() {
        let graph = graph();
        assert!(approx_eq!(
            f64,
            graph.overlap_rate("u2".into(), "w3".into()),
            1.0,
            ulps = 2
        ));
        assert!(approx_eq!(
            f64,
            graph.overlap_rate("t1".into(), "w3".into()),
            0.5,
            ulps = 2
        ));
        assert_eq!(overlap_rate(1.0, 1.0, 1.0, 1.0), 1.0);
    }

    #[test]
    fn test_ancestor_on_and_extent() {
        let graph = graph();
        let tag = graph.first("pos".into()).unwrap().id();
        assert_eq!(graph.ancestor_on(tag, "turn".into()), Some("t1".into()));
        assert_eq!(graph.ancestor_on(tag, "utterance".into()), None);
        assert_eq!(graph.start_offset(), Some(0.0));
        assert_eq!(graph.end_offset(), Some(6.0));
    }
}
