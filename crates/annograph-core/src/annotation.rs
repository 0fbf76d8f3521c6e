//! Annotations and their attributes.
//!
//! An [`Annotation`] is a labelled unit on one layer. Its relations (parent,
//! start and end anchors) are ids into the owning [`Graph`](crate::Graph)
//! arena rather than references, so shared anchors and parent/child back
//! links never form ownership cycles.
//!
//! Ancillary data attached to an annotation is held in [`Attributes`]: a
//! typed set of the well-known kinds plus an open-ended string escape hatch.

use crate::{
    change::ChangeStatus,
    confidence::Confidence,
    identifier::{AnchorId, AnnotationId, LayerId},
};

// =============================================================================
// Attributes
// =============================================================================

/// An ancillary value attached to an annotation.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// Source tokens an annotation was derived from.
    Sources(Vec<AnnotationId>),
    /// Target tokens an annotation was aligned with.
    Targets(Vec<AnnotationId>),
    /// Edit distance of the alignment that produced the annotation.
    Distance(u32),
    /// Any other attribute, stored as text.
    Extra { key: String, value: String },
}

impl Attribute {
    pub fn extra(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Extra {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Returns the key this attribute is stored under.
    pub fn key(&self) -> AttributeKey {
        match self {
            Self::Sources(_) => AttributeKey::Sources,
            Self::Targets(_) => AttributeKey::Targets,
            Self::Distance(_) => AttributeKey::Distance,
            Self::Extra { key, .. } => AttributeKey::Extra(key.clone()),
        }
    }
}

/// Key under which an [`Attribute`] is stored; an annotation holds at most
/// one attribute per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeKey {
    Sources,
    Targets,
    Distance,
    Extra(String),
}

/// The attributes of one annotation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<Attribute>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `attribute`, returning the attribute it replaced.
    pub fn insert(&mut self, attribute: Attribute) -> Option<Attribute> {
        let key = attribute.key();
        match self.entries.iter_mut().find(|entry| entry.key() == key) {
            Some(entry) => Some(std::mem::replace(entry, attribute)),
            None => {
                self.entries.push(attribute);
                None
            }
        }
    }

    pub fn remove(&mut self, key: &AttributeKey) -> Option<Attribute> {
        let index = self.entries.iter().position(|entry| entry.key() == *key)?;
        Some(self.entries.remove(index))
    }

    pub fn get(&self, key: &AttributeKey) -> Option<&Attribute> {
        self.entries.iter().find(|entry| entry.key() == *key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the [`Attribute::Sources`] ids, or an empty slice.
    pub fn sources(&self) -> &[AnnotationId] {
        match self.get(&AttributeKey::Sources) {
            Some(Attribute::Sources(ids)) => ids,
            _ => &[],
        }
    }

    /// Returns the [`Attribute::Targets`] ids, or an empty slice.
    pub fn targets(&self) -> &[AnnotationId] {
        match self.get(&AttributeKey::Targets) {
            Some(Attribute::Targets(ids)) => ids,
            _ => &[],
        }
    }

    pub fn distance(&self) -> Option<u32> {
        match self.get(&AttributeKey::Distance) {
            Some(Attribute::Distance(distance)) => Some(*distance),
            _ => None,
        }
    }

    /// Returns an [`Attribute::Extra`] value.
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.entries.iter().find_map(|entry| match entry {
            Attribute::Extra { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }
}

// =============================================================================
// Annotation
// =============================================================================

/// A labelled unit on one layer of a graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub(crate) id: AnnotationId,
    pub(crate) label: String,
    pub(crate) layer: LayerId,
    pub(crate) confidence: Confidence,
    pub(crate) ordinal: usize,
    pub(crate) start: Option<AnchorId>,
    pub(crate) end: Option<AnchorId>,
    pub(crate) parent: Option<AnnotationId>,
    pub(crate) attributes: Attributes,
    pub(crate) status: ChangeStatus,
}

impl Annotation {
    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// Position among siblings with the same parent and layer, from 1.
    ///
    /// Ordinals give the order of siblings; they may have gaps after
    /// deletions.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn start(&self) -> Option<AnchorId> {
        self.start
    }

    pub fn end(&self) -> Option<AnchorId> {
        self.end
    }

    /// Returns the parent annotation, or `None` for the graph root.
    pub fn parent(&self) -> Option<AnnotationId> {
        self.parent
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn status(&self) -> ChangeStatus {
        self.status
    }

    pub fn is_deleted(&self) -> bool {
        self.status == ChangeStatus::Deleted
    }

    /// Returns `true` if the annotation has its own anchors.
    pub fn has_anchors(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }
}

// =============================================================================
// NewAnnotation
// =============================================================================

/// Description of an annotation to add to a graph.
///
/// # Example
///
/// ```
/// # use annograph_core::{Confidence, NewAnnotation};
/// let word = NewAnnotation::new("word", "hello")
///     .with_id("w1")
///     .with_parent("t1")
///     .with_anchors("a0", "a1")
///     .with_confidence(Confidence::Manual);
/// assert_eq!(word.label(), "hello");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnnotation {
    pub(crate) id: Option<AnnotationId>,
    pub(crate) label: String,
    pub(crate) layer: LayerId,
    pub(crate) confidence: Confidence,
    pub(crate) ordinal: Option<usize>,
    pub(crate) start: Option<AnchorId>,
    pub(crate) end: Option<AnchorId>,
    pub(crate) parent: Option<AnnotationId>,
    pub(crate) attributes: Attributes,
}

impl NewAnnotation {
    pub fn new(layer: impl Into<LayerId>, label: impl Into<String>) -> Self {
        Self {
            id: None,
            label: label.into(),
            layer: layer.into(),
            confidence: Confidence::None,
            ordinal: None,
            start: None,
            end: None,
            parent: None,
            attributes: Attributes::new(),
        }
    }

    /// Uses the given id instead of a generated one.
    pub fn with_id(mut self, id: impl Into<AnnotationId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the parent; annotations on top-level layers default to the root.
    pub fn with_parent(mut self, parent: impl Into<AnnotationId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_anchors(mut self, start: impl Into<AnchorId>, end: impl Into<AnchorId>) -> Self {
        self.start = Some(start.into());
        self.end = Some(end.into());
        self
    }

    /// Anchors the annotation at a single point.
    pub fn with_instant(mut self, anchor: impl Into<AnchorId>) -> Self {
        let anchor = anchor.into();
        self.start = Some(anchor);
        self.end = Some(anchor);
        self
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    /// Places the annotation at a 1-based position among its siblings.
    pub fn with_ordinal(mut self, ordinal: usize) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.insert(attribute);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_replace_by_key() {
        let mut attributes = Attributes::new();
        assert!(attributes.insert(Attribute::Distance(3)).is_none());
        assert_eq!(
            attributes.insert(Attribute::Distance(1)),
            Some(Attribute::Distance(3))
        );
        attributes.insert(Attribute::extra("pos", "NN"));
        attributes.insert(Attribute::extra("lemma", "sing"));

        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes.distance(), Some(1));
        assert_eq!(attributes.extra("pos"), Some("NN"));
        assert!(attributes.sources().is_empty());
    }

    #[test]
    fn test_attributes_remove() {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::Sources(vec![AnnotationId::new("w1")]));
        attributes.insert(Attribute::extra("pos", "NN"));

        assert!(
            attributes
                .remove(&AttributeKey::Extra("pos".to_string()))
                .is_some()
        );
        assert!(attributes.remove(&AttributeKey::Targets).is_none());
        assert_eq!(attributes.sources(), &[AnnotationId::new("w1")]);
    }
}
