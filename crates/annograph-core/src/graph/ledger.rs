//! Ledger access, flushing and rollback.

use log::debug;

use crate::{
    annotation::Annotation,
    change::{Change, ChangeStatus},
};

use super::Graph;

impl Graph {
    /// Returns the changes recorded since the last flush, oldest first.
    pub fn changes(&self) -> &[Change] {
        self.ledger.entries()
    }

    /// Flushes the ledger.
    ///
    /// Returns the recorded changes, drops deleted annotations for good and
    /// marks every remaining anchor and annotation unchanged.
    pub fn take_changes(&mut self) -> Vec<Change> {
        let changes = self.ledger.take();

        let deleted: Vec<_> = self
            .annotations
            .values()
            .filter(|annotation| annotation.is_deleted())
            .map(Annotation::id)
            .collect();
        for id in &deleted {
            self.annotations.shift_remove(id);
            self.children.remove(id);
        }
        for annotation in self.annotations.values_mut() {
            annotation.status = ChangeStatus::Unchanged;
        }
        for anchor in self.anchors.values_mut() {
            anchor.set_status(ChangeStatus::Unchanged);
        }

        debug!(
            graph:% = self.id,
            changes = changes.len(),
            purged = deleted.len();
            "Changes flushed"
        );
        changes
    }

    /// Reverts every change recorded since the last flush.
    ///
    /// Returns the number of changes reverted.
    pub fn rollback(&mut self) -> usize {
        let changes = self.ledger.take();
        let count = changes.len();
        self.revert(changes);
        debug!(graph:% = self.id, reverted = count; "Changes rolled back");
        count
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        annotation::NewAnnotation,
        change::{ChangeStatus, Operation},
        confidence::Confidence,
        graph::Graph,
        layer::{Alignment, Layer},
        schema::Schema,
    };

    fn graph() -> Graph {
        let mut schema = Schema::new();
        schema
            .add_layer(
                Layer::new("word")
                    .with_alignment(Alignment::Interval)
                    .with_peers(true),
            )
            .unwrap();
        Graph::new("ledger", schema)
    }

    #[test]
    fn test_take_changes_resets_status() {
        let mut graph = graph();
        let a = graph.get_or_create_anchor_at(0.0, Confidence::Manual).unwrap();
        let b = graph.get_or_create_anchor_at(1.0, Confidence::Manual).unwrap();
        let word = graph
            .add_annotation(NewAnnotation::new("word", "hi").with_anchors(a, b))
            .unwrap();

        let changes = graph.take_changes();
        let operations: Vec<_> = changes.iter().map(|change| change.operation()).collect();
        assert_eq!(
            operations,
            vec![Operation::Create, Operation::Create, Operation::Create]
        );
        assert!(graph.changes().is_empty());
        assert_eq!(graph.annotation(word).unwrap().status(), ChangeStatus::Unchanged);
        assert_eq!(graph.anchor(a).unwrap().status(), ChangeStatus::Unchanged);

        graph.set_label(word, "hello").unwrap();
        assert_eq!(graph.annotation(word).unwrap().status(), ChangeStatus::Updated);
    }

    #[test]
    fn test_rollback_restores_last_flush() {
        let mut graph = graph();
        let a = graph.get_or_create_anchor_at(0.0, Confidence::Manual).unwrap();
        let b = graph.get_or_create_anchor_at(1.0, Confidence::Manual).unwrap();
        let word = graph
            .add_annotation(NewAnnotation::new("word", "hi").with_anchors(a, b))
            .unwrap();
        graph.take_changes();

        graph.set_label(word, "hello").unwrap();
        graph.set_offset(b, Some(2.0), Confidence::Manual).unwrap();
        let c = graph.get_or_create_anchor_at(3.0, Confidence::Manual).unwrap();
        graph
            .add_annotation(NewAnnotation::new("word", "there").with_anchors(b, c))
            .unwrap();
        graph.destroy_annotation(word).unwrap();

        assert_eq!(graph.rollback(), 5);
        assert!(graph.changes().is_empty());
        assert_eq!(graph.labels("word".into()), vec!["hi"]);
        assert_eq!(graph.offsets(word), (Some(0.0), Some(1.0)));
        assert_eq!(graph.anchor(c), None);
        assert_eq!(graph.anchor_at(1.0), Some(b));
        assert_eq!(graph.annotation(word).unwrap().status(), ChangeStatus::Unchanged);
    }
}
