//! Error types for annograph processing.
//!
//! This module provides the main error type [`AnnographError`] which wraps
//! the errors of graph mutation, configuration and validation.

use thiserror::Error;

use annograph_core::{GraphError, InvalidGraph};

use crate::config::ConfigError;

/// The main error type for annograph processing.
#[derive(Debug, Error)]
pub enum AnnographError {
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid graph: {0}")]
    Invalid(#[from] InvalidGraph),
}
