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

//! Tool-level error taxonomy
//!
//! Analysis results are never errors: they are [`crate::Finding`]s. The
//! variants below describe failures of the tool itself.

use std::path::PathBuf;
use thiserror::Error;

/// Result type used across the verifier crates
pub type FvResult<T> = Result<T, FvError>;

/// Errors raised by the verifier
#[derive(Error, Debug)]
pub enum FvError {
    /// A source file or directory could not be read
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source file could not be parsed
    #[error("parse error in {path}:{line}:{column}: {message}")]
    Parse { path: String, line: usize, column: usize, message: String },

    /// A source file is ill-typed
    #[error("type error in {path}:{line}:{column}: {message}")]
    Type { path: String, line: usize, column: usize, message: String },

    /// Configuration rejected
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Report serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An analysis crashed on one function
    #[error("internal failure while analyzing {function}: {message}")]
    Internal { function: String, message: String },

    /// The run was cancelled
    #[error("analysis cancelled")]
    Cancelled,
}

impl FvError {
    /// Create an I/O error for a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FvError::Io { path: path.into(), source }
    }

    /// Create an internal error for a function
    pub fn internal(function: impl Into<String>, message: impl Into<String>) -> Self {
        FvError::Internal {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Check whether the error concerns user input rather than the tool
    pub fn is_input_error(&self) -> bool {
        matches!(self, FvError::Io { .. } | FvError::Parse { .. } | FvError::Type { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FvError::Parse {
            path: "main.go".to_string(),
            line: 3,
            column: 7,
            message: "expected '}'".to_string(),
        };
        assert_eq!(err.to_string(), "parse error in main.go:3:7: expected '}'");
        assert!(err.is_input_error());
    }

    #[test]
    fn test_internal_error() {
        let err = FvError::internal("main.worker", "index out of range");
        assert!(!err.is_input_error());
        assert!(err.to_string().contains("main.worker"));
    }

    #[test]
    fn test_io_error_source() {
        let err = FvError::io("missing.go", std::io::Error::new(std::io::ErrorKind::NotFound, "not found"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
