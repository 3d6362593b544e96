//! Error codes for the UTL diagnostic system.
//!
//! Error codes are organized by phase:
//! - `E0xx` - Lexer errors
//! - `E1xx` - Parser errors

use std::fmt;

/// Error codes for categorizing diagnostic errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // =========================================================================
    // Lexer Errors (E0xx)
    // =========================================================================
    /// Illegal character.
    ///
    /// A character that starts no token was found inside a `[% ... %]` region.
    E001,

    /// Unmatched closing delimiter.
    ///
    /// A `%]` or `-%]` was found with no open code region.
    E002,

    /// Unterminated string literal.
    ///
    /// A string was opened with a quote but never closed.
    E003,

    /// Unterminated comment.
    ///
    /// A `/*` comment has no closing `*/`.
    E004,

    // =========================================================================
    // Parser Errors (E1xx)
    // =========================================================================
    /// Unexpected token.
    ///
    /// The parser encountered a token it did not expect at this position.
    E100,

    /// Unexpected end of document.
    ///
    /// The input ended before a complete construct was parsed.
    E101,

    /// Invalid tree construction.
    ///
    /// A handler built a node that breaks the tree invariants.
    E102,
}

impl ErrorCode {
    /// Returns the numeric code as a string (e.g., "E001").
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E001 => "E001",
            ErrorCode::E002 => "E002",
            ErrorCode::E003 => "E003",
            ErrorCode::E004 => "E004",
            ErrorCode::E100 => "E100",
            ErrorCode::E101 => "E101",
            ErrorCode::E102 => "E102",
        }
    }

    /// Returns a short description of what this error code means.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::E001 => "illegal character",
            ErrorCode::E002 => "unmatched closing delimiter",
            ErrorCode::E003 => "unterminated string literal",
            ErrorCode::E004 => "unterminated comment",
            ErrorCode::E100 => "unexpected token",
            ErrorCode::E101 => "unexpected end of document",
            ErrorCode::E102 => "invalid tree construction",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::E001.to_string(), "E001");
        assert_eq!(ErrorCode::E100.to_string(), "E100");
        assert_eq!(ErrorCode::E102.to_string(), "E102");
    }

    #[test]
    fn test_error_code_description() {
        assert_eq!(ErrorCode::E001.description(), "illegal character");
        assert_eq!(ErrorCode::E003.description(), "unterminated string literal");
        assert_eq!(ErrorCode::E101.description(), "unexpected end of document");
    }
}
