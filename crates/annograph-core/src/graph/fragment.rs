//! Fragments: self-contained extracts of a graph.
//!
//! A fragment holds one defining annotation, its ancestors and its
//! descendants on selected layers, so a job can work on a single utterance
//! without the rest of the transcript. Changes made to the fragment are
//! merged back with [`Graph::apply_fragment_changes`].

use std::collections::HashSet;

use log::debug;

use crate::{
    annotation::Annotation,
    change::{ChangeStatus, ChangeTarget, Operation, Record},
    error::{GraphError, Result},
    identifier::{AnchorId, AnnotationId, Id, LayerId},
};

use super::Graph;

fn offset_label(offset: Option<f64>) -> String {
    offset.map_or_else(|| "?".to_string(), |offset| offset.to_string())
}

impl Graph {
    /// Extracts a fragment around `defining`.
    ///
    /// The fragment contains the defining annotation, its ancestors, and its
    /// descendants on `layers` together with the layers between them. Layers
    /// that are not below the defining annotation's layer are skipped. The
    /// fragment's id is `{graph}__{start}-{end}` and it remembers this graph
    /// as its source.
    ///
    /// # Errors
    ///
    /// Fails if `defining` is unknown or deleted.
    pub fn fragment(&self, defining: AnnotationId, layers: &[LayerId]) -> Result<Graph> {
        let defining_layer = self.live_annotation(defining)?.layer;
        let (start, end) = self.offsets(defining);
        let id = format!("{}__{}-{}", self.id, offset_label(start), offset_label(end));

        let mut fragment = Graph::new(Id::new(&id), self.schema.clone());
        fragment.source = Some(self.id);
        fragment.id_prefix = format!("{id}_");

        let mut wanted: HashSet<LayerId> = HashSet::new();
        for layer in layers {
            if !self.schema.is_ancestor(defining_layer, *layer) {
                debug!(layer:% = layer, defining:% = defining; "Layer skipped in fragment");
                continue;
            }
            let path = self.schema.path_from_root(*layer);
            let below = path
                .iter()
                .position(|step| *step == defining_layer)
                .map_or(path.len(), |position| position + 1);
            wanted.extend(path[below..].iter().copied());
        }

        let mut ancestors = Vec::new();
        let mut current = self.annotations.get(&defining).and_then(|a| a.parent);
        while let Some(parent) = current.filter(|parent| *parent != self.root) {
            ancestors.push(parent);
            current = self.annotations.get(&parent).and_then(|a| a.parent);
        }
        for ancestor in ancestors.into_iter().rev() {
            self.copy_into(&mut fragment, ancestor);
        }

        let mut pending = vec![defining];
        while let Some(current) = pending.pop() {
            self.copy_into(&mut fragment, current);
            if let Some(by_layer) = self.children.get(&current) {
                for (layer, children) in by_layer {
                    if wanted.contains(layer) {
                        pending.extend(children.iter().rev());
                    }
                }
            }
        }

        debug!(
            graph:% = self.id,
            fragment:% = fragment.id,
            annotations = fragment.annotations.len() - 1;
            "Fragment extracted"
        );
        Ok(fragment)
    }

    /// Copies an annotation and its anchors into `fragment` without
    /// recording changes.
    fn copy_into(&self, fragment: &mut Graph, id: AnnotationId) {
        let Some(annotation) = self.annotations.get(&id) else {
            return;
        };
        for anchor in [annotation.start, annotation.end].into_iter().flatten() {
            if fragment.anchors.contains_key(&anchor) {
                continue;
            }
            if let Some(anchor) = self.anchors.get(&anchor) {
                let mut anchor = anchor.clone();
                anchor.set_status(ChangeStatus::Unchanged);
                fragment.index_anchor(&anchor);
                fragment.anchors.insert(anchor.id(), anchor);
            }
        }
        let mut copy = annotation.clone();
        copy.status = ChangeStatus::Unchanged;
        if copy.parent == Some(self.root) {
            copy.parent = Some(fragment.root);
        }
        fragment.annotations.insert(id, copy);
        fragment.link(id);
    }

    /// Replays the ledger of a fragment of this graph.
    ///
    /// The fragment's root stands for this graph's root. Every annotation
    /// touched by the replay, and every user of a touched anchor, is checked
    /// afterwards; if any check fails nothing is applied.
    ///
    /// Returns the number of changes applied.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::FragmentMismatch`] if `fragment` was not
    /// extracted from this graph, or the error of the first change or check
    /// that fails.
    pub fn apply_fragment_changes(&mut self, fragment: &Graph) -> Result<usize> {
        if fragment.source != Some(self.id) {
            return Err(GraphError::FragmentMismatch {
                expected: self.id,
                found: fragment
                    .source
                    .map_or_else(|| fragment.id.to_string(), |source| source.to_string()),
            });
        }
        let fragment_root = fragment.root;
        let root = self.root;
        let remap = move |mut annotation: Annotation| {
            if annotation.parent == Some(fragment_root) {
                annotation.parent = Some(root);
            }
            annotation
        };

        let applied = self.transact(|graph, changes| {
            let mut touched_annotations: Vec<AnnotationId> = Vec::new();
            let mut touched_anchors: Vec<AnchorId> = Vec::new();
            let mut applied = 0;

            for change in fragment.changes() {
                if change.target() == ChangeTarget::Annotation(fragment_root) {
                    continue;
                }
                match (change.operation(), change.after()) {
                    (Operation::Create, Some(Record::Anchor(anchor))) => {
                        if graph.anchors.contains_key(&anchor.id()) {
                            return Err(GraphError::DuplicateId(anchor.id().to_string()));
                        }
                        graph.record_insert_anchor(anchor.clone(), changes);
                        touched_anchors.push(anchor.id());
                    }
                    (Operation::Update, Some(Record::Anchor(anchor))) => {
                        graph.record_update_anchor(
                            anchor.id(),
                            anchor.offset(),
                            anchor.confidence(),
                            changes,
                        )?;
                        touched_anchors.push(anchor.id());
                    }
                    (Operation::Create, Some(Record::Annotation(annotation))) => {
                        if graph.annotations.contains_key(&annotation.id) {
                            return Err(GraphError::DuplicateId(annotation.id.to_string()));
                        }
                        let annotation = remap(annotation.clone());
                        touched_annotations.push(annotation.id);
                        graph.record_insert_annotation(annotation, changes);
                    }
                    (Operation::Update, Some(Record::Annotation(annotation))) => {
                        let after = remap(annotation.clone());
                        touched_annotations.push(after.id);
                        graph.record_update_annotation(after.id, changes, |current| {
                            current.label = after.label;
                            current.confidence = after.confidence;
                            current.ordinal = after.ordinal;
                            current.start = after.start;
                            current.end = after.end;
                            current.parent = after.parent;
                            current.attributes = after.attributes;
                        })?;
                    }
                    (Operation::Destroy, _) => {
                        let ChangeTarget::Annotation(id) = change.target() else {
                            continue;
                        };
                        if graph
                            .annotations
                            .get(&id)
                            .is_some_and(|annotation| !annotation.is_deleted())
                        {
                            graph.destroy_cascade(id, changes)?;
                        }
                    }
                    _ => continue,
                }
                applied += 1;
            }

            for anchor in touched_anchors {
                touched_annotations.extend_from_slice(graph.users_of(anchor));
            }
            for id in touched_annotations {
                graph.check_annotation(id)?;
            }
            Ok(applied)
        })?;

        debug!(graph:% = self.id, fragment:% = fragment.id, applied = applied; "Fragment changes applied");
        Ok(applied)
    }
}
