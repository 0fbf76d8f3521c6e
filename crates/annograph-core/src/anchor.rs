//! Points in the annotated continuum.
//!
//! An [`Anchor`] marks a position (seconds into a recording, a character
//! offset) that annotations use as their start or end. Anchors are shared:
//! adjacent words typically end and start on the same anchor, so moving that
//! anchor moves both boundaries at once.

use crate::{change::ChangeStatus, confidence::Confidence, identifier::AnchorId};

/// A point in the annotated continuum.
///
/// The offset is optional because importers frequently know the order of
/// boundaries before they know their timing.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    id: AnchorId,
    offset: Option<f64>,
    confidence: Confidence,
    status: ChangeStatus,
}

impl Anchor {
    /// Creates an anchor with no offset.
    pub fn new(id: impl Into<AnchorId>) -> Self {
        Self {
            id: id.into(),
            offset: None,
            confidence: Confidence::None,
            status: ChangeStatus::Unchanged,
        }
    }

    /// Sets the offset.
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sets the confidence rating of the offset.
    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn id(&self) -> AnchorId {
        self.id
    }

    pub fn offset(&self) -> Option<f64> {
        self.offset
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn status(&self) -> ChangeStatus {
        self.status
    }

    /// Returns the confidence to rank this anchor by.
    ///
    /// An anchor that has an offset but no rating is ranked as `unrated`;
    /// importers rarely rate the offsets they read.
    pub fn effective_confidence(&self, unrated: Confidence) -> Confidence {
        match (self.offset, self.confidence) {
            (Some(_), Confidence::None) => unrated,
            (_, confidence) => confidence,
        }
    }

    pub(crate) fn set_offset(&mut self, offset: Option<f64>, confidence: Confidence) {
        self.offset = offset;
        self.confidence = confidence;
    }

    pub(crate) fn set_status(&mut self, status: ChangeStatus) {
        self.status = status;
    }
}
