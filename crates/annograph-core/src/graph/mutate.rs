//! Graph population and mutation.

use indexmap::IndexSet;
use log::{debug, trace};

use crate::{
    anchor::Anchor,
    annotation::{Annotation, Attribute, AttributeKey, NewAnnotation},
    change::{Change, ChangeStatus},
    confidence::Confidence,
    error::{GraphError, Result},
    identifier::{AnchorId, AnnotationId, LayerId},
    layer::{Alignment, Layer},
};

use super::Graph;

fn check_offset(offset: Option<f64>) -> Result<()> {
    match offset {
        Some(offset) if !offset.is_finite() => Err(GraphError::InvalidOffset(offset)),
        _ => Ok(()),
    }
}

impl Graph {
    // =========================================================================
    // Anchors
    // =========================================================================

    /// Adds an anchor with a caller-supplied id.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateId`] if the id is taken and
    /// [`GraphError::InvalidOffset`] for a non-finite offset.
    pub fn add_anchor(&mut self, anchor: Anchor) -> Result<AnchorId> {
        if self.anchors.contains_key(&anchor.id()) {
            return Err(GraphError::DuplicateId(anchor.id().to_string()));
        }
        check_offset(anchor.offset())?;
        let id = anchor.id();
        self.transact(|graph, changes| {
            graph.record_insert_anchor(anchor, changes);
            Ok(id)
        })
    }

    /// Creates a new anchor with a generated id, even if another anchor has
    /// the same offset.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidOffset`] for a non-finite offset.
    pub fn create_anchor(&mut self, offset: Option<f64>, confidence: Confidence) -> Result<AnchorId> {
        check_offset(offset)?;
        let id = self.generate_anchor_id();
        let mut anchor = Anchor::new(id).with_confidence(confidence);
        if let Some(offset) = offset {
            anchor = anchor.with_offset(offset);
        }
        self.add_anchor(anchor)
    }

    /// Returns the anchor at exactly `offset`, creating it if there is none.
    ///
    /// Offsets are never merged fuzzily: 1.0 and 1.0000001 are different
    /// anchors.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidOffset`] for a non-finite offset.
    pub fn get_or_create_anchor_at(&mut self, offset: f64, confidence: Confidence) -> Result<AnchorId> {
        check_offset(Some(offset))?;
        match self.anchor_at(offset) {
            Some(id) => Ok(id),
            None => self.create_anchor(Some(offset), confidence),
        }
    }

    /// Sets the offset and confidence of an anchor.
    ///
    /// Every annotation bounded by the anchor is re-checked.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::StructuralViolation`] if an annotation using the
    /// anchor would break a rule; the anchor is left unchanged.
    pub fn set_offset(
        &mut self,
        anchor: AnchorId,
        offset: Option<f64>,
        confidence: Confidence,
    ) -> Result<()> {
        check_offset(offset)?;
        let current = self
            .anchors
            .get(&anchor)
            .ok_or(GraphError::UnknownAnchor(anchor))?;
        if current.offset() == offset && current.confidence() == confidence {
            return Ok(());
        }
        self.transact(|graph, changes| {
            graph.record_update_anchor(anchor, offset, confidence, changes)?;
            for user in graph.users_of(anchor).to_vec() {
                graph.check_annotation(user)?;
            }
            Ok(())
        })?;
        trace!(anchor:% = anchor, offset:? = offset, confidence:% = confidence; "Offset set");
        Ok(())
    }

    /// Sets the offsets of several anchors at once.
    ///
    /// The annotations bounded by the anchors are checked only after every
    /// offset is written, so a run of anchors can move past each other's old
    /// positions. Updates that change nothing are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::StructuralViolation`] if the final state breaks
    /// a rule; no anchor is changed.
    pub fn set_offsets(
        &mut self,
        updates: &[(AnchorId, Option<f64>)],
        confidence: Confidence,
    ) -> Result<()> {
        let mut pending = Vec::with_capacity(updates.len());
        for (anchor, offset) in updates {
            check_offset(*offset)?;
            let current = self
                .anchors
                .get(anchor)
                .ok_or(GraphError::UnknownAnchor(*anchor))?;
            if current.offset() != *offset || current.confidence() != confidence {
                pending.push((*anchor, *offset));
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        self.transact(|graph, changes| {
            let mut users = IndexSet::new();
            for (anchor, offset) in &pending {
                graph.record_update_anchor(*anchor, *offset, confidence, changes)?;
                users.extend(graph.users_of(*anchor).iter().copied());
            }
            for user in users {
                graph.check_annotation(user)?;
            }
            Ok(())
        })?;
        trace!(anchors = pending.len(), confidence:% = confidence; "Offsets set");
        Ok(())
    }

    // =========================================================================
    // Annotations
    // =========================================================================

    /// Adds an annotation.
    ///
    /// The parent defaults to the graph root for layers directly under the
    /// root. Without an ordinal the annotation is placed after the last
    /// sibling that does not start later than it; a supplied ordinal that is
    /// already taken shifts the later siblings up.
    ///
    /// # Errors
    ///
    /// Fails if the layer, parent or anchors are unknown, if the parent is on
    /// the wrong layer, or with [`GraphError::StructuralViolation`] if the
    /// annotation would break a layer rule.
    pub fn add_annotation(&mut self, new: NewAnnotation) -> Result<AnnotationId> {
        let layer = self
            .schema
            .layer(new.layer)
            .ok_or(GraphError::UnknownLayer(new.layer))?;
        let parent_layer = layer.parent().ok_or(GraphError::RootLayer(layer.id()))?;
        let parent = match new.parent {
            Some(parent) => parent,
            None if parent_layer == self.schema.root_id() => self.root,
            None => {
                return Err(GraphError::MissingParent {
                    layer: new.layer,
                    parent_layer,
                });
            }
        };
        let found = self.live_annotation(parent)?.layer;
        if found != parent_layer {
            return Err(GraphError::ParentLayerMismatch {
                layer: new.layer,
                expected: parent_layer,
                found,
            });
        }
        for anchor in [new.start, new.end].into_iter().flatten() {
            if !self.anchors.contains_key(&anchor) {
                return Err(GraphError::UnknownAnchor(anchor));
            }
        }
        let id = match new.id {
            Some(id) if self.annotations.contains_key(&id) => {
                return Err(GraphError::DuplicateId(id.to_string()));
            }
            Some(id) => id,
            None => self.generate_annotation_id(),
        };

        self.transact(|graph, changes| {
            let start_offset = graph.anchor_offset(new.start);
            let ordinal = graph.make_room(parent, new.layer, new.ordinal, start_offset, changes)?;
            let annotation = Annotation {
                id,
                label: new.label,
                layer: new.layer,
                confidence: new.confidence,
                ordinal,
                start: new.start,
                end: new.end,
                parent: Some(parent),
                attributes: new.attributes,
                status: ChangeStatus::Created,
            };
            graph.record_insert_annotation(annotation, changes);
            graph.check_annotation(id)?;
            Ok(id)
        })
    }

    /// Picks the ordinal of a new child and shifts later siblings if that
    /// ordinal is taken.
    fn make_room(
        &mut self,
        parent: AnnotationId,
        layer: LayerId,
        requested: Option<usize>,
        start_offset: Option<f64>,
        changes: &mut Vec<Change>,
    ) -> Result<usize> {
        let siblings: Vec<(AnnotationId, usize)> = self
            .children(parent, layer)
            .map(|sibling| (sibling.id, sibling.ordinal))
            .collect();
        let last = siblings.last().map_or(0, |(_, ordinal)| *ordinal);

        let ordinal = match requested {
            Some(ordinal) => ordinal.max(1),
            None => start_offset
                .and_then(|start| {
                    siblings.iter().find(|(sibling, _)| {
                        let sibling_start = self
                            .annotations
                            .get(sibling)
                            .and_then(|s| self.anchor_offset(s.start));
                        sibling_start.is_some_and(|sibling_start| sibling_start > start)
                    })
                })
                .map_or(last + 1, |(_, ordinal)| *ordinal),
        };

        if siblings.iter().any(|(_, taken)| *taken == ordinal) {
            for (sibling, taken) in siblings {
                if taken >= ordinal {
                    self.record_update_annotation(sibling, changes, |s| s.ordinal = taken + 1)?;
                }
            }
        }
        Ok(ordinal)
    }

    /// Destroys an annotation and all of its descendants.
    ///
    /// Destroyed annotations are unlinked from their parents but keep their
    /// identity, with status [`ChangeStatus::Deleted`], until the ledger is
    /// flushed. Removal cannot create overlaps; gaps it leaves in saturated
    /// layers are reported by [`Graph::validate`].
    ///
    /// # Errors
    ///
    /// Fails if the annotation is unknown, already deleted, or the root.
    pub fn destroy_annotation(&mut self, id: AnnotationId) -> Result<()> {
        self.live_annotation(id)?;
        if id == self.root {
            return Err(GraphError::RootLayer(self.schema.root_id()));
        }
        self.transact(|graph, changes| graph.destroy_cascade(id, changes))?;
        debug!(annotation:% = id; "Annotation destroyed");
        Ok(())
    }

    pub(super) fn destroy_cascade(&mut self, id: AnnotationId, changes: &mut Vec<Change>) -> Result<()> {
        let mut pending = vec![id];
        let mut order = Vec::new();
        while let Some(current) = pending.pop() {
            order.push(current);
            if let Some(by_layer) = self.children.get(&current) {
                for children in by_layer.values() {
                    pending.extend(children.iter().rev());
                }
            }
        }
        for current in order {
            self.record_destroy_annotation(current, changes)?;
        }
        Ok(())
    }

    pub fn set_label(&mut self, id: AnnotationId, label: impl Into<String>) -> Result<()> {
        let label = label.into();
        if self.live_annotation(id)?.label == label {
            return Ok(());
        }
        self.transact(|graph, changes| {
            graph.record_update_annotation(id, changes, |annotation| annotation.label = label)
        })
    }

    pub fn set_confidence(&mut self, id: AnnotationId, confidence: Confidence) -> Result<()> {
        if self.live_annotation(id)?.confidence == confidence {
            return Ok(());
        }
        self.transact(|graph, changes| {
            graph.record_update_annotation(id, changes, |annotation| {
                annotation.confidence = confidence
            })
        })
    }

    /// Moves an annotation onto different anchors.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::StructuralViolation`] if the new extent breaks a
    /// rule for the annotation, its siblings, its parent or its children.
    pub fn set_anchors(
        &mut self,
        id: AnnotationId,
        start: Option<AnchorId>,
        end: Option<AnchorId>,
    ) -> Result<()> {
        let annotation = self.live_annotation(id)?;
        if annotation.start == start && annotation.end == end {
            return Ok(());
        }
        for anchor in [start, end].into_iter().flatten() {
            if !self.anchors.contains_key(&anchor) {
                return Err(GraphError::UnknownAnchor(anchor));
            }
        }
        self.transact(|graph, changes| {
            graph.record_update_annotation(id, changes, |annotation| {
                annotation.start = start;
                annotation.end = end;
            })?;
            graph.check_annotation(id)
                .map_err(GraphError::from)
        })
    }

    /// Moves an annotation under a different parent, after its last child on
    /// the annotation's layer.
    ///
    /// # Errors
    ///
    /// Fails if the new parent is on the wrong layer or the move breaks a
    /// layer rule.
    pub fn set_parent(&mut self, id: AnnotationId, parent: AnnotationId) -> Result<()> {
        let annotation = self.live_annotation(id)?;
        if annotation.parent == Some(parent) {
            return Ok(());
        }
        let layer = annotation.layer;
        let expected = self
            .schema
            .layer(layer)
            .and_then(Layer::parent)
            .ok_or(GraphError::UnknownLayer(layer))?;
        let found = self.live_annotation(parent)?.layer;
        if found != expected {
            return Err(GraphError::ParentLayerMismatch {
                layer,
                expected,
                found,
            });
        }
        let ordinal = self
            .children(parent, layer)
            .last()
            .map_or(1, |last| last.ordinal + 1);
        self.transact(|graph, changes| {
            graph.record_update_annotation(id, changes, |annotation| {
                annotation.parent = Some(parent);
                annotation.ordinal = ordinal;
            })?;
            graph.check_annotation(id).map_err(GraphError::from)
        })
    }

    /// Stores an attribute, replacing any attribute with the same key.
    pub fn set_attribute(&mut self, id: AnnotationId, attribute: Attribute) -> Result<()> {
        if self.live_annotation(id)?.attributes.get(&attribute.key()) == Some(&attribute) {
            return Ok(());
        }
        self.transact(|graph, changes| {
            graph.record_update_annotation(id, changes, |annotation| {
                annotation.attributes.insert(attribute);
            })
        })
    }

    pub fn remove_attribute(&mut self, id: AnnotationId, key: &AttributeKey) -> Result<()> {
        if self.live_annotation(id)?.attributes.get(key).is_none() {
            return Ok(());
        }
        self.transact(|graph, changes| {
            graph.record_update_annotation(id, changes, |annotation| {
                annotation.attributes.remove(key);
            })
        })
    }

    // =========================================================================
    // Tags
    // =========================================================================

    /// Tags an annotation with an automatic-confidence label.
    ///
    /// See [`Graph::tag_with_confidence`].
    pub fn tag(
        &mut self,
        id: AnnotationId,
        layer: LayerId,
        label: impl Into<String>,
    ) -> Result<AnnotationId> {
        self.tag_with_confidence(id, layer, label, Confidence::Automatic)
    }

    /// Tags an annotation with a label on `layer`.
    ///
    /// The tag layer must be a child of the annotation's layer, or share its
    /// parent; in the latter case the tag takes the annotation's anchors.
    ///
    /// Re-tagging is idempotent: if the annotation already has a tag with the
    /// same label on the layer, that tag is returned and nothing changes. On
    /// a layer without peers, an existing tag with a different label is
    /// relabelled only when its confidence is lower than `confidence`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::TagConflict`] if a tag with a different label
    /// and equal or higher confidence is already present on a layer without
    /// peers.
    pub fn tag_with_confidence(
        &mut self,
        id: AnnotationId,
        layer: LayerId,
        label: impl Into<String>,
        confidence: Confidence,
    ) -> Result<AnnotationId> {
        let label = label.into();
        let token = self.live_annotation(id)?.clone();
        let tag_layer = self
            .schema
            .layer(layer)
            .ok_or(GraphError::UnknownLayer(layer))?
            .clone();
        let expected = tag_layer.parent().ok_or(GraphError::RootLayer(layer))?;
        let token_parent_layer = self.schema.layer(token.layer).and_then(Layer::parent);

        let (parent, shares_parent) = if expected == token.layer {
            (token.id, false)
        } else if Some(expected) == token_parent_layer {
            let parent = token.parent.ok_or(GraphError::RootLayer(token.layer))?;
            (parent, true)
        } else {
            return Err(GraphError::ParentLayerMismatch {
                layer,
                expected,
                found: token.layer,
            });
        };

        let existing: Vec<&Annotation> = self
            .children(parent, layer)
            .filter(|tag| !shares_parent || (tag.start == token.start && tag.end == token.end))
            .collect();
        if let Some(same) = existing.iter().find(|tag| tag.label == label) {
            return Ok(same.id);
        }
        if !tag_layer.peers() {
            if let Some(other) = existing.first() {
                let (other, other_label, other_confidence) =
                    (other.id, other.label.clone(), other.confidence);
                if other_confidence >= confidence {
                    return Err(GraphError::TagConflict {
                        existing: other,
                        layer,
                        label: other_label,
                        confidence: other_confidence,
                    });
                }
                self.transact(|graph, changes| {
                    graph.record_update_annotation(other, changes, |tag| {
                        tag.label = label;
                        tag.confidence = confidence;
                    })
                })?;
                debug!(tag:% = other, layer:% = layer; "Tag relabelled");
                return Ok(other);
            }
        }

        let mut new = NewAnnotation::new(layer, label)
            .with_parent(parent)
            .with_confidence(confidence);
        match (tag_layer.alignment(), token.start, token.end) {
            (Alignment::Interval, Some(start), Some(end)) => new = new.with_anchors(start, end),
            (Alignment::Instant, Some(start), _) => new = new.with_instant(start),
            _ => {}
        }
        self.add_annotation(new)
    }
}
