//! Annograph Sequence Alignment
//!
//! This crate aligns two sequences by minimum edit distance. It includes:
//!
//! - **Paths**: The minimum edit path and distance between two sequences
//!   ([`minimum_edit_path`], [`minimum_edit_distance`], [`collapse`])
//! - **Steps**: The steps of a path ([`EditStep`], [`StepOperation`])
//! - **Grouping**: Correspondences between blocks of the two sequences
//!   ([`group_correspondences`])
//! - **Comparators**: Equality and cost of elements ([`EditComparator`]),
//!   including weighted comparators for orthographic, DISC, ARPAbet and
//!   IPA labels selectable by name ([`ComparatorKind`])
//!
//! Alignment is total: any two sequences, including empty ones, have a path.

pub mod comparator;
pub mod error;
pub mod group;
pub mod kind;
pub mod path;
pub mod step;
pub mod weighted;

pub use comparator::{
    Comparison, DefaultComparator, EditComparator, FnComparator, LabelTranslator,
    NormalizedTranslator, TranslatingComparator,
};
pub use error::ComparatorError;
pub use group::{Correspondence, group_correspondences};
pub use kind::{ComparatorKind, LabelComparator};
pub use path::{collapse, minimum_edit_distance, minimum_edit_path};
pub use step::{EditStep, StepOperation};
pub use weighted::{
    ArpabetToDiscComparator, CharComparator, DiscComparator, DiscToArpabetComparator,
    IpaComparator, LabelSplit, OrthographyComparator, OrthographyToArpabetComparator,
    OrthographyToDiscComparator, PerChar, PerToken,
};
