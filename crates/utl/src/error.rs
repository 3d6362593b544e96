//! Error types for UTL operations.
//!
//! This module provides the main error type [`UtlError`] which wraps
//! the error conditions that can occur while analysing templates.

use std::{io, path::PathBuf};

use thiserror::Error;

use utl_core::NodeError;
use utl_parser::error::ParseError;

/// The main error type for UTL operations.
///
/// # Diagnostic Variants
///
/// The `Parse` variant keeps the source text next to the parser's
/// diagnostics so callers can render labelled spans.
#[derive(Debug, Error)]
pub enum UtlError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{err}")]
    Parse { err: ParseError, src: String },

    #[error("Tree error: {0}")]
    Node(#[from] NodeError),

    #[error("Include file not found: {}", .0.display())]
    IncludeNotFound(PathBuf),
}

impl UtlError {
    /// Create a new `Parse` error with the associated source code.
    pub fn new_parse_error(err: ParseError, src: impl Into<String>) -> Self {
        Self::Parse {
            err,
            src: src.into(),
        }
    }
}
