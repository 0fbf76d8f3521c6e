//! The annotation graph.
//!
//! [`Graph`] owns every [`Anchor`] and [`Annotation`] of one transcript in
//! id-keyed arenas, together with the [`Schema`] that constrains them and
//! the [`ChangeLedger`] of mutations since the last flush.
//!
//! # Architecture
//!
//! Relations are stored as ids, never as references:
//! - annotations name their parent and their start/end anchors by id
//! - a child index maps each parent to its children, per layer, in ordinal
//!   order
//! - a user index maps each anchor to the annotations bounded by it, so
//!   moving an anchor re-checks exactly the annotations it affects
//! - an offset index supports exact "anchor at offset" lookups
//!
//! Every mutation runs as a transaction: the change is applied, the affected
//! annotations are checked against the layer rules, and on failure the
//! recorded changes are reverted from their before snapshots. Successful
//! transactions are appended to the ledger.
//!
//! # Example
//!
//! ```
//! # use annograph_core::{Alignment, Confidence, Graph, Layer, NewAnnotation, Schema};
//! let mut schema = Schema::new();
//! schema.add_layer(
//!     Layer::new("word").with_alignment(Alignment::Interval).with_peers(true),
//! )?;
//! let mut graph = Graph::new("greeting", schema);
//!
//! let a0 = graph.get_or_create_anchor_at(0.0, Confidence::Manual)?;
//! let a1 = graph.get_or_create_anchor_at(0.4, Confidence::Manual)?;
//! let a2 = graph.get_or_create_anchor_at(0.9, Confidence::Manual)?;
//! graph.add_annotation(NewAnnotation::new("word", "hello").with_anchors(a0, a1))?;
//! graph.add_annotation(NewAnnotation::new("word", "world").with_anchors(a1, a2))?;
//!
//! assert_eq!(graph.labels("word".into()), vec!["hello", "world"]);
//! # Ok::<(), annograph_core::GraphError>(())
//! ```

mod check;
mod fragment;
mod ledger;
mod mutate;
mod query;

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::{
    anchor::Anchor,
    annotation::Annotation,
    change::{Change, ChangeLedger, ChangeStatus, ChangeTarget, Operation, Record},
    confidence::Confidence,
    error::{GraphError, Result},
    identifier::{AnchorId, AnnotationId, Id, LayerId, base36},
    schema::Schema,
};

pub use query::overlap_rate;

// =============================================================================
// Graph
// =============================================================================

/// An annotation graph for one transcript.
#[derive(Debug, Clone)]
pub struct Graph {
    id: Id,
    root: AnnotationId,
    schema: Schema,
    anchors: IndexMap<AnchorId, Anchor>,
    annotations: IndexMap<AnnotationId, Annotation>,
    children: HashMap<AnnotationId, IndexMap<LayerId, Vec<AnnotationId>>>,
    anchor_users: HashMap<AnchorId, Vec<AnnotationId>>,
    offset_index: HashMap<u64, Vec<AnchorId>>,
    ledger: ChangeLedger,
    source: Option<Id>,
    id_prefix: String,
    next_anchor: u64,
    next_annotation: u64,
}

impl Graph {
    /// Creates an empty graph.
    ///
    /// The graph's root annotation lives on the schema's root layer and has
    /// the same id as the graph.
    pub fn new(id: impl Into<Id>, schema: Schema) -> Self {
        let id = id.into();
        let root = AnnotationId::from(id);
        let mut annotations = IndexMap::new();
        annotations.insert(
            root,
            Annotation {
                id: root,
                label: id.to_string(),
                layer: schema.root_id(),
                confidence: Confidence::Manual,
                ordinal: 1,
                start: None,
                end: None,
                parent: None,
                attributes: Default::default(),
                status: ChangeStatus::Unchanged,
            },
        );
        Self {
            id,
            root,
            schema,
            anchors: IndexMap::new(),
            annotations,
            children: HashMap::new(),
            anchor_users: HashMap::new(),
            offset_index: HashMap::new(),
            ledger: ChangeLedger::new(),
            source: None,
            id_prefix: String::new(),
            next_anchor: 0,
            next_annotation: 0,
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the id of the graph this graph was extracted from, if it is
    /// a fragment.
    pub fn source(&self) -> Option<Id> {
        self.source
    }

    /// Adds a layer to the schema.
    ///
    /// Layers are never removed, so adding one cannot invalidate existing
    /// annotations.
    ///
    /// # Errors
    ///
    /// See [`Schema::add_layer`].
    pub fn add_layer(&mut self, layer: crate::layer::Layer) -> Result<()> {
        self.schema.add_layer(layer)
    }

    // =========================================================================
    // Lookup helpers
    // =========================================================================

    /// Returns an annotation that exists and has not been deleted.
    pub(crate) fn live_annotation(&self, id: AnnotationId) -> Result<&Annotation> {
        match self.annotations.get(&id) {
            None => Err(GraphError::UnknownAnnotation(id)),
            Some(annotation) if annotation.is_deleted() => Err(GraphError::Deleted(id)),
            Some(annotation) => Ok(annotation),
        }
    }

    pub(crate) fn anchor_offset(&self, id: Option<AnchorId>) -> Option<f64> {
        id.and_then(|id| self.anchors.get(&id))
            .and_then(Anchor::offset)
    }

    pub(crate) fn children_ids(&self, parent: AnnotationId, layer: LayerId) -> &[AnnotationId] {
        self.children
            .get(&parent)
            .and_then(|by_layer| by_layer.get(&layer))
            .map_or(&[], Vec::as_slice)
    }

    pub(crate) fn users_of(&self, anchor: AnchorId) -> &[AnnotationId] {
        self.anchor_users.get(&anchor).map_or(&[], Vec::as_slice)
    }

    fn generate_anchor_id(&mut self) -> AnchorId {
        loop {
            self.next_anchor += 1;
            let id = AnchorId::new(&format!("{}n_{}", self.id_prefix, base36(self.next_anchor)));
            if !self.anchors.contains_key(&id) {
                return id;
            }
        }
    }

    fn generate_annotation_id(&mut self) -> AnnotationId {
        loop {
            self.next_annotation += 1;
            let id = AnnotationId::new(&format!(
                "{}e_{}",
                self.id_prefix,
                base36(self.next_annotation)
            ));
            if !self.annotations.contains_key(&id) {
                return id;
            }
        }
    }

    // =========================================================================
    // Index maintenance
    // =========================================================================

    fn offset_key(offset: f64) -> u64 {
        // -0.0 and 0.0 are the same offset.
        if offset == 0.0 { 0 } else { offset.to_bits() }
    }

    fn index_anchor(&mut self, anchor: &Anchor) {
        if let Some(offset) = anchor.offset() {
            self.offset_index
                .entry(Self::offset_key(offset))
                .or_default()
                .push(anchor.id());
        }
    }

    fn unindex_anchor(&mut self, id: AnchorId, offset: Option<f64>) {
        let Some(offset) = offset else {
            return;
        };
        let key = Self::offset_key(offset);
        if let Some(ids) = self.offset_index.get_mut(&key) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.offset_index.remove(&key);
            }
        }
    }

    /// Adds a live annotation to its parent's child list and to the anchor
    /// user index.
    fn link(&mut self, id: AnnotationId) {
        let Some(annotation) = self.annotations.get(&id) else {
            return;
        };
        let (parent, layer, start, end) = (
            annotation.parent,
            annotation.layer,
            annotation.start,
            annotation.end,
        );
        for anchor in [start, end.filter(|end| Some(*end) != start)]
            .into_iter()
            .flatten()
        {
            self.anchor_users.entry(anchor).or_default().push(id);
        }
        if let Some(parent) = parent {
            self.children
                .entry(parent)
                .or_default()
                .entry(layer)
                .or_default()
                .push(id);
            self.sort_siblings(parent, layer);
        }
    }

    fn unlink(&mut self, id: AnnotationId) {
        let Some(annotation) = self.annotations.get(&id) else {
            return;
        };
        let (parent, layer, start, end) = (
            annotation.parent,
            annotation.layer,
            annotation.start,
            annotation.end,
        );
        for anchor in [start, end].into_iter().flatten() {
            if let Some(users) = self.anchor_users.get_mut(&anchor) {
                users.retain(|user| *user != id);
                if users.is_empty() {
                    self.anchor_users.remove(&anchor);
                }
            }
        }
        if let Some(siblings) = parent
            .and_then(|parent| self.children.get_mut(&parent))
            .and_then(|by_layer| by_layer.get_mut(&layer))
        {
            siblings.retain(|sibling| *sibling != id);
        }
    }

    fn sort_siblings(&mut self, parent: AnnotationId, layer: LayerId) {
        let annotations = &self.annotations;
        if let Some(siblings) = self
            .children
            .get_mut(&parent)
            .and_then(|by_layer| by_layer.get_mut(&layer))
        {
            siblings.sort_by_key(|id| annotations.get(id).map_or(usize::MAX, |a| a.ordinal));
        }
    }

    // =========================================================================
    // Recorded primitives
    // =========================================================================

    /// Runs `f` as a transaction.
    ///
    /// Changes recorded by `f` are appended to the ledger when it succeeds
    /// and reverted when it fails.
    fn transact<R>(&mut self, f: impl FnOnce(&mut Self, &mut Vec<Change>) -> Result<R>) -> Result<R> {
        let mut changes = Vec::new();
        match f(self, &mut changes) {
            Ok(value) => {
                self.ledger.extend(changes);
                Ok(value)
            }
            Err(err) => {
                self.revert(changes);
                Err(err)
            }
        }
    }

    fn record_insert_anchor(&mut self, mut anchor: Anchor, changes: &mut Vec<Change>) {
        anchor.set_status(ChangeStatus::Created);
        self.index_anchor(&anchor);
        changes.push(Change::new(
            Operation::Create,
            ChangeTarget::Anchor(anchor.id()),
            None,
            Some(Record::Anchor(anchor.clone())),
        ));
        self.anchors.insert(anchor.id(), anchor);
    }

    fn record_update_anchor(
        &mut self,
        id: AnchorId,
        offset: Option<f64>,
        confidence: Confidence,
        changes: &mut Vec<Change>,
    ) -> Result<()> {
        let before = self
            .anchors
            .get(&id)
            .cloned()
            .ok_or(GraphError::UnknownAnchor(id))?;
        self.unindex_anchor(id, before.offset());
        let mut after = before.clone();
        after.set_offset(offset, confidence);
        if after.status() != ChangeStatus::Created {
            after.set_status(ChangeStatus::Updated);
        }
        self.index_anchor(&after);
        self.anchors.insert(id, after.clone());
        changes.push(Change::new(
            Operation::Update,
            ChangeTarget::Anchor(id),
            Some(Record::Anchor(before)),
            Some(Record::Anchor(after)),
        ));
        Ok(())
    }

    fn record_insert_annotation(&mut self, mut annotation: Annotation, changes: &mut Vec<Change>) {
        let id = annotation.id;
        annotation.status = ChangeStatus::Created;
        changes.push(Change::new(
            Operation::Create,
            ChangeTarget::Annotation(id),
            None,
            Some(Record::Annotation(annotation.clone())),
        ));
        self.annotations.insert(id, annotation);
        self.link(id);
    }

    fn record_update_annotation(
        &mut self,
        id: AnnotationId,
        changes: &mut Vec<Change>,
        f: impl FnOnce(&mut Annotation),
    ) -> Result<()> {
        let before = self.live_annotation(id)?.clone();
        self.unlink(id);
        let mut after = before.clone();
        f(&mut after);
        if after.status != ChangeStatus::Created {
            after.status = ChangeStatus::Updated;
        }
        self.annotations.insert(id, after.clone());
        self.link(id);
        changes.push(Change::new(
            Operation::Update,
            ChangeTarget::Annotation(id),
            Some(Record::Annotation(before)),
            Some(Record::Annotation(after)),
        ));
        Ok(())
    }

    fn record_destroy_annotation(&mut self, id: AnnotationId, changes: &mut Vec<Change>) -> Result<()> {
        let before = self.live_annotation(id)?.clone();
        self.unlink(id);
        let mut after = before.clone();
        after.status = ChangeStatus::Deleted;
        self.annotations.insert(id, after.clone());
        changes.push(Change::new(
            Operation::Destroy,
            ChangeTarget::Annotation(id),
            Some(Record::Annotation(before)),
            Some(Record::Annotation(after)),
        ));
        Ok(())
    }

    /// Undoes `changes`, newest first.
    fn revert(&mut self, changes: Vec<Change>) {
        for change in changes.into_iter().rev() {
            let (target, before) = change.into_parts();
            match target {
                ChangeTarget::Anchor(id) => {
                    let before = match before {
                        Some(Record::Anchor(anchor)) => Some(anchor),
                        _ => None,
                    };
                    self.restore_anchor(id, before);
                }
                ChangeTarget::Annotation(id) => {
                    let before = match before {
                        Some(Record::Annotation(annotation)) => Some(annotation),
                        _ => None,
                    };
                    self.restore_annotation(id, before);
                }
            }
        }
    }

    fn restore_anchor(&mut self, id: AnchorId, before: Option<Anchor>) {
        if let Some(offset) = self.anchors.get(&id).map(Anchor::offset) {
            self.unindex_anchor(id, offset);
        }
        match before {
            Some(anchor) => {
                self.index_anchor(&anchor);
                self.anchors.insert(id, anchor);
            }
            None => {
                self.anchors.shift_remove(&id);
            }
        }
    }

    fn restore_annotation(&mut self, id: AnnotationId, before: Option<Annotation>) {
        if self
            .annotations
            .get(&id)
            .is_some_and(|current| !current.is_deleted())
        {
            self.unlink(id);
        }
        match before {
            Some(annotation) => {
                let deleted = annotation.is_deleted();
                self.annotations.insert(id, annotation);
                if !deleted {
                    self.link(id);
                }
            }
            None => {
                self.annotations.shift_remove(&id);
                self.children.remove(&id);
            }
        }
    }
}
