// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Parser error types and handling

use fv_common::Position;
use std::fmt;
use thiserror::Error;

/// Result type for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Main error type for parsing operations
#[derive(Error, Debug, Clone)]
pub struct ParseError {
    /// The kind of error
    pub kind: ParseErrorKind,
    /// Position where the error occurred
    pub position: Position,
    /// Human-readable error message
    pub message: String,
    /// Additional context or suggestions
    pub context: Option<String>,
    /// Related errors (for error chains)
    pub related: Vec<ParseError>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(kind: ParseErrorKind, position: Position, message: String) -> Self {
        Self {
            kind,
            position,
            message,
            context: None,
            related: Vec::new(),
        }
    }

    /// Create an error with context
    pub fn with_context(mut self, context: String) -> Self {
        self.context = Some(context);
        self
    }

    /// Add a related error
    pub fn with_related(mut self, related: ParseError) -> Self {
        self.related.push(related);
        self
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        format!("{}: {}", self.kind, self.message)
    }

    /// Get detailed error information for debugging
    pub fn debug_message(&self) -> String {
        let mut msg = format!("{} at {}:{}: {}", self.kind, self.position.line, self.position.column, self.message);

        if let Some(context) = &self.context {
            msg.push_str(&format!("\nContext: {}", context));
        }

        if !self.related.is_empty() {
            msg.push_str("\nRelated errors:");
            for (i, error) in self.related.iter().enumerate() {
                msg.push_str(&format!("\n  {}: {}", i + 1, error.user_message()));
            }
        }

        msg
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

/// Categories of parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Unexpected token
    #[error("unexpected token")]
    UnexpectedToken,

    /// Expected token not found
    #[error("expected token")]
    ExpectedToken,

    /// Unexpected end of file
    #[error("unexpected end of file")]
    UnexpectedEof,

    /// Invalid character
    #[error("invalid character")]
    InvalidCharacter,

    /// Invalid number format
    #[error("invalid number")]
    InvalidNumber,

    /// Invalid escape sequence
    #[error("invalid escape sequence")]
    InvalidEscapeSequence,

    /// Unterminated string or rune literal
    #[error("unterminated literal")]
    UnterminatedString,

    /// Unterminated comment
    #[error("unterminated comment")]
    UnterminatedComment,

    /// Recursion limit exceeded
    #[error("nesting too deep")]
    RecursionLimitExceeded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ParseError::new(ParseErrorKind::ExpectedToken, Position::new(10, 2, 5), "expected ')'".to_string()).with_context("in call arguments".to_string());

        assert_eq!(err.user_message(), "expected token: expected ')'");
        let debug = err.debug_message();
        assert!(debug.contains("2:5"));
        assert!(debug.contains("Context: in call arguments"));
    }
}
