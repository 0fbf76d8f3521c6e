//! Annograph Core Types and Definitions
//!
//! This crate provides the annotation graph data model. It includes:
//!
//! - **Identifiers**: String-interned identifiers ([`identifier::Id`]) and
//!   the typed [`LayerId`], [`AnchorId`] and [`AnnotationId`]
//! - **Schema**: The layer hierarchy and per-layer rules ([`Schema`],
//!   [`Layer`])
//! - **Graph**: Anchors, annotations and their relations ([`Graph`])
//! - **Changes**: The ledger of mutations since the last flush
//!   ([`ChangeLedger`])
//! - **Validation**: Structural rules and their violations ([`Rule`],
//!   [`Violation`])

pub mod anchor;
pub mod annotation;
pub mod change;
pub mod confidence;
pub mod error;
pub mod graph;
pub mod identifier;
pub mod layer;
pub mod schema;
pub mod validate;

pub use anchor::Anchor;
pub use annotation::{Annotation, Attribute, AttributeKey, Attributes, NewAnnotation};
pub use change::{Change, ChangeLedger, ChangeStatus, ChangeTarget, Operation, Record};
pub use confidence::Confidence;
pub use error::{GraphError, Missing, Result, Unresolved};
pub use graph::{Graph, overlap_rate};
pub use identifier::{AnchorId, AnnotationId, Id, LayerId};
pub use layer::{Alignment, Layer};
pub use schema::{DEFAULT_ROOT_LAYER, Schema};
pub use validate::{InvalidGraph, Rule, Violation, ViolationCollector};
