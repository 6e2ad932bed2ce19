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

//! Token definitions for the analyzed language

use fv_common::Span;
use std::fmt;

/// A token in the source code
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The type of token
    pub token_type: TokenType,
    /// The source text that produced this token
    pub lexeme: String,
    /// The source range of this token
    pub span: Span,
}

impl Token {
    /// Create a new token
    pub fn new(token_type: TokenType, lexeme: String, span: Span) -> Self {
        Self { token_type, lexeme, span }
    }

    /// Check if this token is of a specific type
    pub fn is(&self, token_type: TokenType) -> bool {
        self.token_type == token_type
    }

    /// Check if this token is a keyword
    pub fn is_keyword(&self) -> bool {
        matches!(self.token_type, TokenType::Keyword(_))
    }

    /// Check if this token is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self.token_type, TokenType::IntLiteral | TokenType::FloatLiteral | TokenType::ImagLiteral | TokenType::RuneLiteral | TokenType::StringLiteral)
    }

    /// Whether a newline after this token terminates the statement
    pub fn ends_statement(&self) -> bool {
        match self.token_type {
            TokenType::Identifier => true,
            _ if self.is_literal() => true,
            TokenType::Keyword(kw) => matches!(kw, Keyword::Break | Keyword::Continue | Keyword::Fallthrough | Keyword::Return),
            TokenType::Operator(op) => matches!(op, Operator::Increment | Operator::Decrement),
            TokenType::Delimiter(delim) => matches!(delim, Delimiter::RightParen | Delimiter::RightBracket | Delimiter::RightBrace),
            _ => false,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.token_type, self.lexeme)
    }
}

/// Types of tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // Literals, the lexeme carries the raw text
    IntLiteral,
    FloatLiteral,
    ImagLiteral,
    RuneLiteral,
    StringLiteral,

    // Identifiers
    Identifier,

    // Keywords
    Keyword(Keyword),

    // Operators
    Operator(Operator),

    // Delimiters
    Delimiter(Delimiter),

    // End of file
    Eof,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::IntLiteral => write!(f, "integer"),
            TokenType::FloatLiteral => write!(f, "float"),
            TokenType::ImagLiteral => write!(f, "imaginary"),
            TokenType::RuneLiteral => write!(f, "rune"),
            TokenType::StringLiteral => write!(f, "string"),
            TokenType::Identifier => write!(f, "identifier"),
            TokenType::Keyword(kw) => write!(f, "keyword '{}'", kw),
            TokenType::Operator(op) => write!(f, "operator '{}'", op),
            TokenType::Delimiter(delim) => write!(f, "delimiter '{}'", delim),
            TokenType::Eof => write!(f, "end of file"),
        }
    }
}

/// Reserved words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Break,
    Case,
    Chan,
    Const,
    Continue,
    Default,
    Defer,
    Else,
    Fallthrough,
    For,
    Func,
    Go,
    Goto,
    If,
    Import,
    Interface,
    Map,
    Package,
    Range,
    Return,
    Select,
    Struct,
    Switch,
    Type,
    Var,
}

impl Keyword {
    /// Look up a keyword by its spelling
    pub fn lookup(s: &str) -> Option<Self> {
        let kw = match s {
            "break" => Keyword::Break,
            "case" => Keyword::Case,
            "chan" => Keyword::Chan,
            "const" => Keyword::Const,
            "continue" => Keyword::Continue,
            "default" => Keyword::Default,
            "defer" => Keyword::Defer,
            "else" => Keyword::Else,
            "fallthrough" => Keyword::Fallthrough,
            "for" => Keyword::For,
            "func" => Keyword::Func,
            "go" => Keyword::Go,
            "goto" => Keyword::Goto,
            "if" => Keyword::If,
            "import" => Keyword::Import,
            "interface" => Keyword::Interface,
            "map" => Keyword::Map,
            "package" => Keyword::Package,
            "range" => Keyword::Range,
            "return" => Keyword::Return,
            "select" => Keyword::Select,
            "struct" => Keyword::Struct,
            "switch" => Keyword::Switch,
            "type" => Keyword::Type,
            "var" => Keyword::Var,
            _ => return None,
        };
        Some(kw)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Break => "break",
            Keyword::Case => "case",
            Keyword::Chan => "chan",
            Keyword::Const => "const",
            Keyword::Continue => "continue",
            Keyword::Default => "default",
            Keyword::Defer => "defer",
            Keyword::Else => "else",
            Keyword::Fallthrough => "fallthrough",
            Keyword::For => "for",
            Keyword::Func => "func",
            Keyword::Go => "go",
            Keyword::Goto => "goto",
            Keyword::If => "if",
            Keyword::Import => "import",
            Keyword::Interface => "interface",
            Keyword::Map => "map",
            Keyword::Package => "package",
            Keyword::Range => "range",
            Keyword::Return => "return",
            Keyword::Select => "select",
            Keyword::Struct => "struct",
            Keyword::Switch => "switch",
            Keyword::Type => "type",
            Keyword::Var => "var",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // Arithmetic
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    AndNot,
    LeftShift,
    RightShift,
    Tilde,

    // Assignment
    Assign,
    Define,
    PlusAssign,
    MinusAssign,
    MultiplyAssign,
    DivideAssign,
    ModuloAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    AndNotAssign,
    LeftShiftAssign,
    RightShiftAssign,

    // Comparison
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // Logical
    LogicalAnd,
    LogicalOr,
    LogicalNot,

    // Other
    Arrow,
    Increment,
    Decrement,
}

impl Operator {
    /// Binary precedence, zero for non-binary operators
    pub fn precedence(&self) -> u8 {
        match self {
            Operator::LogicalOr => 1,
            Operator::LogicalAnd => 2,
            Operator::Equal | Operator::NotEqual | Operator::Less | Operator::LessEqual | Operator::Greater | Operator::GreaterEqual => 3,
            Operator::Plus | Operator::Minus | Operator::BitOr | Operator::BitXor => 4,
            Operator::Multiply | Operator::Divide | Operator::Modulo | Operator::LeftShift | Operator::RightShift | Operator::BitAnd | Operator::AndNot => 5,
            _ => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Modulo => "%",
            Operator::BitAnd => "&",
            Operator::BitOr => "|",
            Operator::BitXor => "^",
            Operator::AndNot => "&^",
            Operator::LeftShift => "<<",
            Operator::RightShift => ">>",
            Operator::Tilde => "~",
            Operator::Assign => "=",
            Operator::Define => ":=",
            Operator::PlusAssign => "+=",
            Operator::MinusAssign => "-=",
            Operator::MultiplyAssign => "*=",
            Operator::DivideAssign => "/=",
            Operator::ModuloAssign => "%=",
            Operator::BitAndAssign => "&=",
            Operator::BitOrAssign => "|=",
            Operator::BitXorAssign => "^=",
            Operator::AndNotAssign => "&^=",
            Operator::LeftShiftAssign => "<<=",
            Operator::RightShiftAssign => ">>=",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
            Operator::LogicalAnd => "&&",
            Operator::LogicalOr => "||",
            Operator::LogicalNot => "!",
            Operator::Arrow => "<-",
            Operator::Increment => "++",
            Operator::Decrement => "--",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delimiters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Delimiter {
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Ellipsis,
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Delimiter::LeftParen => "(",
            Delimiter::RightParen => ")",
            Delimiter::LeftBracket => "[",
            Delimiter::RightBracket => "]",
            Delimiter::LeftBrace => "{",
            Delimiter::RightBrace => "}",
            Delimiter::Comma => ",",
            Delimiter::Semicolon => ";",
            Delimiter::Colon => ":",
            Delimiter::Dot => ".",
            Delimiter::Ellipsis => "...",
        };
        f.write_str(s)
    }
}
