//! Change tracking.
//!
//! Every successful mutation of a [`Graph`](crate::Graph) appends [`Change`]
//! entries to its [`ChangeLedger`]. Each entry carries full before/after
//! snapshots, so a consumer can persist only deltas and the graph can roll
//! back everything since the last flush.
//!
//! The ledger has a single consumer: entries are read with
//! [`Graph::changes`](crate::Graph::changes) and flushed with
//! [`Graph::take_changes`](crate::Graph::take_changes) before further
//! mutation.

use std::fmt;

use crate::{
    anchor::Anchor,
    annotation::Annotation,
    identifier::{AnchorId, AnnotationId},
};

/// Mutation status of an anchor or annotation since the last flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ChangeStatus {
    #[default]
    Unchanged,
    Created,
    Updated,
    Deleted,
}

/// Kind of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Destroy,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Update => f.write_str("update"),
            Self::Destroy => f.write_str("destroy"),
        }
    }
}

/// What a ledger entry changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeTarget {
    Anchor(AnchorId),
    Annotation(AnnotationId),
}

/// Snapshot of an anchor or annotation.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Anchor(Anchor),
    Annotation(Annotation),
}

impl Record {
    pub fn target(&self) -> ChangeTarget {
        match self {
            Self::Anchor(anchor) => ChangeTarget::Anchor(anchor.id()),
            Self::Annotation(annotation) => ChangeTarget::Annotation(annotation.id()),
        }
    }

    pub fn as_annotation(&self) -> Option<&Annotation> {
        match self {
            Self::Annotation(annotation) => Some(annotation),
            Self::Anchor(_) => None,
        }
    }

    pub fn as_anchor(&self) -> Option<&Anchor> {
        match self {
            Self::Anchor(anchor) => Some(anchor),
            Self::Annotation(_) => None,
        }
    }
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    operation: Operation,
    target: ChangeTarget,
    before: Option<Record>,
    after: Option<Record>,
}

impl Change {
    pub(crate) fn new(
        operation: Operation,
        target: ChangeTarget,
        before: Option<Record>,
        after: Option<Record>,
    ) -> Self {
        Self {
            operation,
            target,
            before,
            after,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn target(&self) -> ChangeTarget {
        self.target
    }

    /// Snapshot before the change; `None` for creations.
    pub fn before(&self) -> Option<&Record> {
        self.before.as_ref()
    }

    /// Snapshot after the change.
    pub fn after(&self) -> Option<&Record> {
        self.after.as_ref()
    }

    /// Splits the entry into its target and before snapshot, for reverting.
    pub(crate) fn into_parts(self) -> (ChangeTarget, Option<Record>) {
        (self.target, self.before)
    }

    /// Returns the most recent annotation snapshot of this entry.
    pub fn annotation(&self) -> Option<&Annotation> {
        self.after
            .as_ref()
            .or(self.before.as_ref())
            .and_then(Record::as_annotation)
    }
}

/// Append-only log of changes since the last flush.
#[derive(Debug, Clone, Default)]
pub struct ChangeLedger {
    entries: Vec<Change>,
}

impl ChangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Change] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn extend(&mut self, changes: Vec<Change>) {
        self.entries.extend(changes);
    }

    pub(crate) fn take(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.entries)
    }
}
