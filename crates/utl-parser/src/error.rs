//! Error and diagnostic system for the UTL parser.
//!
//! This module provides an error handling system with:
//! - Error codes for documentation and searchability
//! - Multiple labeled spans for rich error context
//! - Severity levels
//! - Diagnostic collector for accumulating syntax errors
//!
//! # Overview
//!
//! The error system is built around the [`Diagnostic`] type, which represents
//! a single error or warning message with optional error code, multiple source
//! locations, and help text. Multiple diagnostics are wrapped in [`ParseError`]
//! when lexing fails or a strict parse aborts.
//!
//! # Example
//!
//! ```
//! # use utl_parser::error::{Diagnostic, ErrorCode};
//! # use utl_parser::Span;
//!
//! let diag = Diagnostic::error("unexpected token `end`")
//!     .with_code(ErrorCode::E100)
//!     .with_label(Span::new(12..15), "unexpected token")
//!     .with_help("check for a missing `;` before this token");
//! assert_eq!(diag.to_string(), "error[E100]: unexpected token `end`");
//! ```

mod collector;
mod diagnostic;
mod error_code;
mod label;
mod parse_error;
mod severity;

pub(crate) use collector::DiagnosticCollector;

pub use diagnostic::Diagnostic;
pub use error_code::ErrorCode;
pub use label::Label;
pub use parse_error::ParseError;
pub use severity::Severity;
