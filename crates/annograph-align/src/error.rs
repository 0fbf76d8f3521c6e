//! Error types for alignment setup.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComparatorError {
    #[error("unknown comparator `{0}`")]
    Unknown(String),

    #[error("unknown label split `{0}`, expected `char` or `space`")]
    UnknownSplit(String),
}
