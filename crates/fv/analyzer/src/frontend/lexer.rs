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

//! Lexical analyzer with automatic semicolon insertion

use super::error::{ParseError, ParseErrorKind, ParseResult};
use super::token::{Delimiter, Keyword, Operator, Token, TokenType};
use fv_common::{FileId, Position, Span};

/// Operator and delimiter spellings, longest first so that a prefix scan
/// always takes the maximal munch
const PUNCTUATION: &[(&str, TokenType)] = &[
    ("&^=", TokenType::Operator(Operator::AndNotAssign)),
    ("<<=", TokenType::Operator(Operator::LeftShiftAssign)),
    (">>=", TokenType::Operator(Operator::RightShiftAssign)),
    ("...", TokenType::Delimiter(Delimiter::Ellipsis)),
    ("&^", TokenType::Operator(Operator::AndNot)),
    ("&&", TokenType::Operator(Operator::LogicalAnd)),
    ("||", TokenType::Operator(Operator::LogicalOr)),
    ("<-", TokenType::Operator(Operator::Arrow)),
    ("++", TokenType::Operator(Operator::Increment)),
    ("--", TokenType::Operator(Operator::Decrement)),
    ("==", TokenType::Operator(Operator::Equal)),
    ("!=", TokenType::Operator(Operator::NotEqual)),
    ("<=", TokenType::Operator(Operator::LessEqual)),
    (">=", TokenType::Operator(Operator::GreaterEqual)),
    (":=", TokenType::Operator(Operator::Define)),
    ("+=", TokenType::Operator(Operator::PlusAssign)),
    ("-=", TokenType::Operator(Operator::MinusAssign)),
    ("*=", TokenType::Operator(Operator::MultiplyAssign)),
    ("/=", TokenType::Operator(Operator::DivideAssign)),
    ("%=", TokenType::Operator(Operator::ModuloAssign)),
    ("&=", TokenType::Operator(Operator::BitAndAssign)),
    ("|=", TokenType::Operator(Operator::BitOrAssign)),
    ("^=", TokenType::Operator(Operator::BitXorAssign)),
    ("<<", TokenType::Operator(Operator::LeftShift)),
    (">>", TokenType::Operator(Operator::RightShift)),
    ("+", TokenType::Operator(Operator::Plus)),
    ("-", TokenType::Operator(Operator::Minus)),
    ("*", TokenType::Operator(Operator::Multiply)),
    ("/", TokenType::Operator(Operator::Divide)),
    ("%", TokenType::Operator(Operator::Modulo)),
    ("&", TokenType::Operator(Operator::BitAnd)),
    ("|", TokenType::Operator(Operator::BitOr)),
    ("^", TokenType::Operator(Operator::BitXor)),
    ("~", TokenType::Operator(Operator::Tilde)),
    ("<", TokenType::Operator(Operator::Less)),
    (">", TokenType::Operator(Operator::Greater)),
    ("=", TokenType::Operator(Operator::Assign)),
    ("!", TokenType::Operator(Operator::LogicalNot)),
    ("(", TokenType::Delimiter(Delimiter::LeftParen)),
    (")", TokenType::Delimiter(Delimiter::RightParen)),
    ("[", TokenType::Delimiter(Delimiter::LeftBracket)),
    ("]", TokenType::Delimiter(Delimiter::RightBracket)),
    ("{", TokenType::Delimiter(Delimiter::LeftBrace)),
    ("}", TokenType::Delimiter(Delimiter::RightBrace)),
    (",", TokenType::Delimiter(Delimiter::Comma)),
    (";", TokenType::Delimiter(Delimiter::Semicolon)),
    (":", TokenType::Delimiter(Delimiter::Colon)),
    (".", TokenType::Delimiter(Delimiter::Dot)),
];

/// A `//go:` directive comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Line of the comment
    pub line: usize,
    /// Text after `//go:`
    pub text: String,
}

/// Result of tokenizing one file
#[derive(Debug, Clone)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub directives: Vec<Directive>,
}

/// Tracks the current position while walking a source text
pub struct PositionTracker<'src> {
    source: &'src str,
    position: Position,
}

impl<'src> PositionTracker<'src> {
    pub fn new(source: &'src str) -> Self {
        Self { source, position: Position::start() }
    }

    /// Get the current position
    pub fn position(&self) -> Position {
        self.position
    }

    /// Check if we're at the end of the source
    pub fn is_at_end(&self) -> bool {
        self.position.offset >= self.source.len()
    }

    /// Peek at the current character without advancing
    pub fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    /// Peek at the character after the current one
    pub fn peek_second(&self) -> Option<char> {
        self.remaining().chars().nth(1)
    }

    /// Advance by one character and return it
    pub fn next_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.position.advance(ch);
        Some(ch)
    }

    /// Skip a byte order mark at the start of the source
    pub fn skip_bom(&mut self) {
        if self.position.offset == 0 && self.source.starts_with('\u{feff}') {
            self.position.offset = '\u{feff}'.len_utf8();
        }
    }

    /// Advance over a known prefix
    pub fn advance_str(&mut self, text: &str) {
        self.position.advance_by(text);
    }

    /// Get the remaining source text
    pub fn remaining(&self) -> &'src str {
        &self.source[self.position.offset..]
    }

    /// Get a slice of the source text
    pub fn slice(&self, start_offset: usize, end_offset: usize) -> &'src str {
        &self.source[start_offset..end_offset]
    }
}

/// Lexical analyzer for one source file
pub struct Lexer<'src> {
    tracker: PositionTracker<'src>,
    file: FileId,
    tokens: Vec<Token>,
    directives: Vec<Directive>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str, file: FileId) -> Self {
        Self {
            tracker: PositionTracker::new(source),
            file,
            tokens: Vec::new(),
            directives: Vec::new(),
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(mut self) -> ParseResult<LexOutput> {
        self.tracker.skip_bom();
        loop {
            self.skip_blanks();
            let start = self.tracker.position();

            let Some(ch) = self.tracker.peek_char() else {
                self.insert_semicolon(start);
                self.tokens.push(Token::new(TokenType::Eof, String::new(), Span::new(self.file, start, start)));
                break;
            };

            match ch {
                '\n' => {
                    self.insert_semicolon(start);
                    self.tracker.next_char();
                }
                '/' if self.tracker.peek_second() == Some('/') => self.scan_line_comment(),
                '/' if self.tracker.peek_second() == Some('*') => self.scan_block_comment()?,
                '"' => self.scan_string(start)?,
                '`' => self.scan_raw_string(start)?,
                '\'' => self.scan_rune(start)?,
                c if c.is_ascii_digit() => self.scan_number(start)?,
                '.' if self.tracker.peek_second().is_some_and(|c| c.is_ascii_digit()) => self.scan_number(start)?,
                c if is_identifier_start(c) => self.scan_identifier(start),
                _ => self.scan_punctuation(start)?,
            }
        }

        Ok(LexOutput {
            tokens: self.tokens,
            directives: self.directives,
        })
    }

    fn skip_blanks(&mut self) {
        while let Some(ch) = self.tracker.peek_char() {
            if ch == ' ' || ch == '\t' || ch == '\r' {
                self.tracker.next_char();
            } else {
                break;
            }
        }
    }

    /// Insert a semicolon if the previous token may end a statement
    fn insert_semicolon(&mut self, at: Position) {
        if self.tokens.last().is_some_and(|token| token.ends_statement()) {
            self.tokens.push(Token::new(TokenType::Delimiter(Delimiter::Semicolon), "\n".to_string(), Span::new(self.file, at, at)));
        }
    }

    fn push(&mut self, token_type: TokenType, start: Position) {
        let end = self.tracker.position();
        let lexeme = self.tracker.slice(start.offset, end.offset).to_string();
        self.tokens.push(Token::new(token_type, lexeme, Span::new(self.file, start, end)));
    }

    fn scan_line_comment(&mut self) {
        let start = self.tracker.position();
        while let Some(ch) = self.tracker.peek_char() {
            if ch == '\n' {
                break;
            }
            self.tracker.next_char();
        }
        let text = self.tracker.slice(start.offset, self.tracker.position().offset);
        if let Some(directive) = text.strip_prefix("//go:") {
            self.directives.push(Directive {
                line: start.line,
                text: directive.trim_end().to_string(),
            });
        }
    }

    fn scan_block_comment(&mut self) -> ParseResult<()> {
        let start = self.tracker.position();
        self.tracker.advance_str("/*");
        let mut saw_newline = false;
        loop {
            if self.tracker.remaining().starts_with("*/") {
                self.tracker.advance_str("*/");
                break;
            }
            match self.tracker.next_char() {
                Some('\n') => saw_newline = true,
                Some(_) => {}
                None => return Err(ParseError::new(ParseErrorKind::UnterminatedComment, start, "comment not terminated".to_string())),
            }
        }
        // A multi-line comment acts like a newline
        if saw_newline {
            self.insert_semicolon(start);
        }
        Ok(())
    }

    fn scan_identifier(&mut self, start: Position) {
        while let Some(ch) = self.tracker.peek_char() {
            if is_identifier_continue(ch) {
                self.tracker.next_char();
            } else {
                break;
            }
        }
        let text = self.tracker.slice(start.offset, self.tracker.position().offset);
        let token_type = match Keyword::lookup(text) {
            Some(kw) => TokenType::Keyword(kw),
            None => TokenType::Identifier,
        };
        self.push(token_type, start);
    }

    fn scan_number(&mut self, start: Position) -> ParseResult<()> {
        let mut token_type = TokenType::IntLiteral;
        let rest = self.tracker.remaining();
        let radix_prefix = rest.len() >= 2 && rest.starts_with('0') && matches!(rest.as_bytes()[1], b'x' | b'X' | b'o' | b'O' | b'b' | b'B');

        if radix_prefix {
            self.tracker.next_char();
            let radix = match self.tracker.next_char() {
                Some('x') | Some('X') => 16,
                Some('o') | Some('O') => 8,
                _ => 2,
            };
            let digits_start = self.tracker.position().offset;
            while let Some(ch) = self.tracker.peek_char() {
                if ch == '_' || ch.is_digit(radix) {
                    self.tracker.next_char();
                } else {
                    break;
                }
            }
            if self.tracker.position().offset == digits_start {
                return Err(ParseError::new(ParseErrorKind::InvalidNumber, start, "literal has no digits".to_string()));
            }
        } else {
            self.eat_decimal_digits();
            if self.tracker.peek_char() == Some('.') && self.tracker.peek_second() != Some('.') {
                token_type = TokenType::FloatLiteral;
                self.tracker.next_char();
                self.eat_decimal_digits();
            }
            if matches!(self.tracker.peek_char(), Some('e') | Some('E')) {
                token_type = TokenType::FloatLiteral;
                self.tracker.next_char();
                if matches!(self.tracker.peek_char(), Some('+') | Some('-')) {
                    self.tracker.next_char();
                }
                if !self.tracker.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    return Err(ParseError::new(ParseErrorKind::InvalidNumber, start, "exponent has no digits".to_string()));
                }
                self.eat_decimal_digits();
            }
        }

        if self.tracker.peek_char() == Some('i') {
            self.tracker.next_char();
            token_type = TokenType::ImagLiteral;
        }
        if self.tracker.peek_char().is_some_and(is_identifier_continue) {
            return Err(ParseError::new(ParseErrorKind::InvalidNumber, start, "invalid character in numeric literal".to_string()));
        }

        self.push(token_type, start);
        Ok(())
    }

    fn eat_decimal_digits(&mut self) {
        while let Some(ch) = self.tracker.peek_char() {
            if ch.is_ascii_digit() || ch == '_' {
                self.tracker.next_char();
            } else {
                break;
            }
        }
    }

    fn scan_string(&mut self, start: Position) -> ParseResult<()> {
        self.tracker.next_char();
        loop {
            match self.tracker.next_char() {
                Some('"') => break,
                Some('\\') => self.scan_escape('"')?,
                Some('\n') | None => return Err(ParseError::new(ParseErrorKind::UnterminatedString, start, "string literal not terminated".to_string())),
                Some(_) => {}
            }
        }
        self.push(TokenType::StringLiteral, start);
        Ok(())
    }

    fn scan_raw_string(&mut self, start: Position) -> ParseResult<()> {
        self.tracker.next_char();
        loop {
            match self.tracker.next_char() {
                Some('`') => break,
                Some(_) => {}
                None => return Err(ParseError::new(ParseErrorKind::UnterminatedString, start, "raw string literal not terminated".to_string())),
            }
        }
        self.push(TokenType::StringLiteral, start);
        Ok(())
    }

    fn scan_rune(&mut self, start: Position) -> ParseResult<()> {
        self.tracker.next_char();
        let mut count = 0;
        loop {
            match self.tracker.next_char() {
                Some('\'') => break,
                Some('\\') => {
                    self.scan_escape('\'')?;
                    count += 1;
                }
                Some('\n') | None => return Err(ParseError::new(ParseErrorKind::UnterminatedString, start, "rune literal not terminated".to_string())),
                Some(_) => count += 1,
            }
        }
        if count != 1 {
            return Err(ParseError::new(ParseErrorKind::InvalidCharacter, start, "rune literal must contain exactly one character".to_string()));
        }
        self.push(TokenType::RuneLiteral, start);
        Ok(())
    }

    /// Validate the escape sequence following a backslash
    fn scan_escape(&mut self, quote: char) -> ParseResult<()> {
        let position = self.tracker.position();
        let (digits, radix) = match self.tracker.next_char() {
            Some(c) if c == quote => return Ok(()),
            Some('a' | 'b' | 'f' | 'n' | 'r' | 't' | 'v' | '\\') => return Ok(()),
            Some('x') => (2, 16),
            Some('u') => (4, 16),
            Some('U') => (8, 16),
            Some('0'..='7') => (2, 8),
            _ => return Err(ParseError::new(ParseErrorKind::InvalidEscapeSequence, position, "unknown escape sequence".to_string())),
        };
        for _ in 0..digits {
            match self.tracker.peek_char() {
                Some(c) if c.is_digit(radix) => {
                    self.tracker.next_char();
                }
                _ => return Err(ParseError::new(ParseErrorKind::InvalidEscapeSequence, position, "malformed escape sequence".to_string())),
            }
        }
        Ok(())
    }

    fn scan_punctuation(&mut self, start: Position) -> ParseResult<()> {
        let rest = self.tracker.remaining();
        for (text, token_type) in PUNCTUATION {
            if rest.starts_with(text) {
                self.tracker.advance_str(text);
                self.push(*token_type, start);
                return Ok(());
            }
        }
        let ch = rest.chars().next().unwrap_or('\0');
        Err(ParseError::new(ParseErrorKind::InvalidCharacter, start, format!("unexpected character '{}'", ch)))
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch == '_' || ch.is_alphabetic()
}

fn is_identifier_continue(ch: char) -> bool {
    ch == '_' || ch.is_alphanumeric()
}

/// Decode the value of an interpreted or raw string literal
pub fn unquote_string(lexeme: &str) -> String {
    if let Some(raw) = lexeme.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
        return raw.replace('\r', "");
    }
    let inner = lexeme.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(lexeme);
    decode_escapes(inner)
}

/// Decode the value of a rune literal
pub fn unquote_rune(lexeme: &str) -> Option<char> {
    let inner = lexeme.strip_prefix('\'')?.strip_suffix('\'')?;
    decode_escapes(inner).chars().next()
}

fn decode_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let Some(esc) = chars.next() else { break };
        let (digits, radix) = match esc {
            'a' => {
                out.push('\u{07}');
                continue;
            }
            'b' => {
                out.push('\u{08}');
                continue;
            }
            'f' => {
                out.push('\u{0c}');
                continue;
            }
            'n' => {
                out.push('\n');
                continue;
            }
            'r' => {
                out.push('\r');
                continue;
            }
            't' => {
                out.push('\t');
                continue;
            }
            'v' => {
                out.push('\u{0b}');
                continue;
            }
            'x' => (2, 16),
            'u' => (4, 16),
            'U' => (8, 16),
            '0'..='7' => {
                let mut value = esc.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    if let Some(d) = chars.next().and_then(|c| c.to_digit(8)) {
                        value = value * 8 + d;
                    }
                }
                out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
                continue;
            }
            other => {
                out.push(other);
                continue;
            }
        };
        let mut value = 0u32;
        for _ in 0..digits {
            if let Some(d) = chars.next().and_then(|c| c.to_digit(radix)) {
                value = value * radix + d;
            }
        }
        out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(source: &str) -> Vec<TokenType> {
        Lexer::new(source, 0).tokenize().unwrap().tokens.into_iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn test_semicolon_insertion() {
        let tokens = types("x := 1\nreturn\n}");
        assert_eq!(
            tokens,
            vec![
                TokenType::Identifier,
                TokenType::Operator(Operator::Define),
                TokenType::IntLiteral,
                TokenType::Delimiter(Delimiter::Semicolon),
                TokenType::Keyword(Keyword::Return),
                TokenType::Delimiter(Delimiter::Semicolon),
                TokenType::Delimiter(Delimiter::RightBrace),
                TokenType::Delimiter(Delimiter::Semicolon),
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_leading_byte_order_mark_is_skipped() {
        let output = Lexer::new("\u{feff}package main\n", 0).tokenize().unwrap();
        assert_eq!(output.tokens[0].token_type, TokenType::Keyword(Keyword::Package));
        assert_eq!(output.tokens[0].span.start.column, 1);
        assert_eq!(output.tokens[0].span.start.offset, 3);
        assert!(Lexer::new("package\u{feff} main\n", 0).tokenize().is_err());
    }

    #[test]
    fn test_no_semicolon_after_operator() {
        let tokens = types("a +\nb");
        assert_eq!(tokens, vec![TokenType::Identifier, TokenType::Operator(Operator::Plus), TokenType::Identifier, TokenType::Delimiter(Delimiter::Semicolon), TokenType::Eof]);
    }

    #[test]
    fn test_maximal_munch() {
        let tokens = types("a &^= b <- c ...");
        assert_eq!(tokens[1], TokenType::Operator(Operator::AndNotAssign));
        assert_eq!(tokens[3], TokenType::Operator(Operator::Arrow));
        assert_eq!(tokens[5], TokenType::Delimiter(Delimiter::Ellipsis));
    }

    #[test]
    fn test_numbers() {
        let output = Lexer::new("0x1F 1_000 3.14 1e9 .5 0b101 2i", 0).tokenize().unwrap();
        let kinds: Vec<_> = output.tokens.iter().take(7).map(|t| t.token_type).collect();
        assert_eq!(
            kinds,
            vec![
                TokenType::IntLiteral,
                TokenType::IntLiteral,
                TokenType::FloatLiteral,
                TokenType::FloatLiteral,
                TokenType::FloatLiteral,
                TokenType::IntLiteral,
                TokenType::ImagLiteral
            ]
        );
        assert_eq!(output.tokens[1].lexeme, "1_000");
    }

    #[test]
    fn test_directives_are_collected() {
        let output = Lexer::new("//go:build linux && !race\n\npackage p\n//go:noinline\nfunc f() {}\n", 0).tokenize().unwrap();
        assert_eq!(output.directives.len(), 2);
        assert_eq!(output.directives[0].text, "build linux && !race");
        assert_eq!(output.directives[1].text, "noinline");
        assert_eq!(output.directives[1].line, 4);
    }

    #[test]
    fn test_strings_and_runes() {
        let output = Lexer::new(r#""a\n\"b" `raw
text` '\x41'"#, 0)
        .tokenize()
        .unwrap();
        assert_eq!(unquote_string(&output.tokens[0].lexeme), "a\n\"b");
        assert_eq!(unquote_string(&output.tokens[1].lexeme), "raw\ntext");
        assert_eq!(unquote_rune(&output.tokens[2].lexeme), Some('A'));
    }

    #[test]
    fn test_errors() {
        assert!(Lexer::new("\"open", 0).tokenize().is_err());
        assert!(Lexer::new("/* never closed", 0).tokenize().is_err());
        assert!(Lexer::new("a $ b", 0).tokenize().is_err());
        assert!(Lexer::new("'ab'", 0).tokenize().is_err());
    }

    #[test]
    fn test_positions() {
        let output = Lexer::new("a\n  bb", 0).tokenize().unwrap();
        let bb = &output.tokens[2];
        assert_eq!(bb.span.start, Position::new(4, 2, 3));
        assert_eq!(bb.span.end, Position::new(6, 2, 5));
    }
}
