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

//! Source position tracking shared by every analysis layer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a source file inside a source map
pub type FileId = u32;

/// Represents a position in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Byte offset from the beginning of the file
    pub offset: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, in characters)
    pub column: usize,
}

impl Position {
    /// Create a new position
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self { offset, line, column }
    }

    /// Create a position at the beginning of a file
    pub fn start() -> Self {
        Self::new(0, 1, 1)
    }

    /// Create an invalid/unknown position
    pub fn unknown() -> Self {
        Self::new(0, 0, 0)
    }

    /// Check if this is a valid position
    pub fn is_valid(&self) -> bool {
        self.line > 0 && self.column > 0
    }

    /// Advance by a character (handles newlines)
    pub fn advance(&mut self, ch: char) {
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }

    /// Advance by multiple characters
    pub fn advance_by(&mut self, text: &str) {
        for ch in text.chars() {
            self.advance(ch);
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

/// Represents a span of source code between two positions of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    /// File the span belongs to
    pub file: FileId,
    /// Start position (inclusive)
    pub start: Position,
    /// End position (exclusive)
    pub end: Position,
}

impl Span {
    /// Create a new span
    pub fn new(file: FileId, start: Position, end: Position) -> Self {
        Self { file, start, end }
    }

    /// Create an unknown/invalid span
    pub fn unknown() -> Self {
        Self::new(0, Position::unknown(), Position::unknown())
    }

    /// Check if this span is valid
    pub fn is_valid(&self) -> bool {
        self.start.is_valid() && self.end.is_valid() && self.start <= self.end
    }

    /// Check if this span contains a position
    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position < self.end
    }

    /// Check if this span lies entirely inside another span of the same file
    pub fn within(&self, other: Span) -> bool {
        self.file == other.file && other.start <= self.start && self.end <= other.end
    }

    /// Merge this span with another span
    pub fn merge(&self, other: Span) -> Span {
        let start = if self.start <= other.start { self.start } else { other.start };
        let end = if self.end >= other.end { self.end } else { other.end };
        Span::new(self.file, start, end)
    }

    /// Get the length of this span in lines
    pub fn line_count(&self) -> usize {
        if self.end.line >= self.start.line { self.end.line - self.start.line + 1 } else { 0 }
    }

    /// Check if this span is on a single line
    pub fn is_single_line(&self) -> bool {
        self.start.line == self.end.line
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_line() {
            if self.end.column > self.start.column + 1 {
                write!(f, "{}:{}", self.start, self.end.column)
            } else {
                write!(f, "{}", self.start)
            }
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_advancement() {
        let mut pos = Position::start();

        pos.advance('a');
        assert_eq!(pos, Position::new(1, 1, 2));

        pos.advance('\n');
        assert_eq!(pos, Position::new(2, 2, 1));

        pos.advance('é');
        assert_eq!(pos.offset, 4);
        assert_eq!(pos.column, 2);
    }

    #[test]
    fn test_position_advance_by() {
        let mut pos = Position::start();
        pos.advance_by("hello\nworld");
        assert_eq!(pos, Position::new(11, 2, 6));
    }

    #[test]
    fn test_span_contains_and_merge() {
        let span1 = Span::new(0, Position::new(0, 1, 1), Position::new(4, 1, 5));
        let span2 = Span::new(0, Position::new(2, 1, 3), Position::new(6, 1, 7));

        assert!(span1.contains(Position::new(2, 1, 3)));
        assert!(!span1.contains(Position::new(4, 1, 5)));

        let merged = span1.merge(span2);
        assert_eq!(merged.start.column, 1);
        assert_eq!(merged.end.column, 7);
        assert!(span1.within(merged));
    }

    #[test]
    fn test_span_display() {
        let span = Span::new(0, Position::new(0, 1, 1), Position::new(4, 1, 5));
        assert_eq!(format!("{}", span), "1:1:5");

        let multiline = Span::new(0, Position::new(0, 1, 1), Position::new(30, 3, 5));
        assert_eq!(format!("{}", multiline), "1:1-3:5");
    }
}
