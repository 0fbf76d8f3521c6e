//! Error types for annotation graph operations.
//!
//! Every mutation of a [`Graph`](crate::Graph) either succeeds completely or
//! fails with a [`GraphError`] and leaves the graph as it was.

use std::fmt;

use thiserror::Error;

use crate::{
    confidence::Confidence,
    identifier::{AnchorId, AnnotationId, Id, LayerId},
    validate::Violation,
};

/// A type alias for `Result<T, GraphError>`.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised by [`Graph`](crate::Graph) and [`Schema`](crate::Schema) operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The mutation would break a structural rule; nothing was changed.
    #[error("structural violation: {0}")]
    StructuralViolation(Violation),

    /// The operation needs a value that is not known yet.
    #[error("unresolved dependency: {0}")]
    UnresolvedDependency(Unresolved),

    #[error("unknown layer `{0}`")]
    UnknownLayer(LayerId),

    #[error("unknown anchor `{0}`")]
    UnknownAnchor(AnchorId),

    #[error("unknown annotation `{0}`")]
    UnknownAnnotation(AnnotationId),

    #[error("annotation `{0}` has been deleted")]
    Deleted(AnnotationId),

    #[error("duplicate id `{0}`")]
    DuplicateId(String),

    #[error("invalid offset {0}")]
    InvalidOffset(f64),

    #[error("annotations cannot be added to the root layer `{0}`")]
    RootLayer(LayerId),

    #[error("annotation on layer `{layer}` needs a parent on layer `{parent_layer}`")]
    MissingParent {
        layer: LayerId,
        parent_layer: LayerId,
    },

    #[error("layer `{layer}` expects a parent on `{expected}`, found `{found}`")]
    ParentLayerMismatch {
        layer: LayerId,
        expected: LayerId,
        found: LayerId,
    },

    /// A tag with a different label and at least the same confidence already
    /// exists on a layer that allows only one tag.
    #[error("tag `{existing}` on layer `{layer}` already has label `{label}` ({confidence})")]
    TagConflict {
        existing: AnnotationId,
        layer: LayerId,
        label: String,
        confidence: Confidence,
    },

    #[error("fragment belongs to graph `{found}`, not `{expected}`")]
    FragmentMismatch { expected: Id, found: String },
}

/// What an [`Unresolved`] dependency is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    StartOffset,
    EndOffset,
    Parent,
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartOffset => f.write_str("start offset"),
            Self::EndOffset => f.write_str("end offset"),
            Self::Parent => f.write_str("parent"),
        }
    }
}

/// An annotation whose processing had to wait for a missing value.
///
/// Partial transcripts are the normal case, so this is reported as a typed
/// result rather than treated as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unresolved {
    annotation: AnnotationId,
    missing: Missing,
}

impl Unresolved {
    pub fn new(annotation: AnnotationId, missing: Missing) -> Self {
        Self {
            annotation,
            missing,
        }
    }

    pub fn annotation(&self) -> AnnotationId {
        self.annotation
    }

    pub fn missing(&self) -> Missing {
        self.missing
    }
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` has no {}", self.annotation, self.missing)
    }
}

impl From<Violation> for GraphError {
    fn from(violation: Violation) -> Self {
        Self::StructuralViolation(violation)
    }
}

impl From<Unresolved> for GraphError {
    fn from(unresolved: Unresolved) -> Self {
        Self::UnresolvedDependency(unresolved)
    }
}
