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

//! Recursive-descent parser
//!
//! Composite literals with a bare type name (`T{}`) are ambiguous with
//! blocks in control clause headers. `expr_level` is negative while parsing
//! such a header, and only literal types that are not bare names may open a
//! composite literal there.

use super::ast::*;
use super::error::{ParseError, ParseErrorKind, ParseResult};
use super::lexer::{Directive, LexOutput, Lexer};
use super::token::{Delimiter, Keyword, Operator, Token, TokenType};
use fv_common::{FileId, Position, Span};

const MAX_DEPTH: usize = 512;

/// Parse one source file. `first_id` is the first free node id; the next
/// free id is returned with the file.
pub fn parse_file(source: &str, file_id: FileId, path: &str, first_id: NodeId) -> ParseResult<(File, NodeId)> {
    let lexed = Lexer::new(source, file_id).tokenize()?;
    let parser = Parser::new(lexed, file_id, path, first_id);
    parser.parse()
}

/// Result of a simple statement in a `for` header
enum Simple {
    Stmt(Stmt),
    Range { key: Option<Expr>, value: Option<Expr>, define: bool, expr: Expr, start: Position },
}

pub struct Parser {
    tokens: Vec<Token>,
    directives: Vec<Directive>,
    pos: usize,
    file: FileId,
    path: String,
    next_id: NodeId,
    expr_level: i32,
    depth: usize,
    prev_end: Position,
    last_decl_line: usize,
}

impl Parser {
    pub fn new(lexed: LexOutput, file: FileId, path: &str, first_id: NodeId) -> Self {
        Self {
            tokens: lexed.tokens,
            directives: lexed.directives,
            pos: 0,
            file,
            path: path.to_string(),
            next_id: first_id,
            expr_level: 0,
            depth: 0,
            prev_end: Position::start(),
            last_decl_line: 0,
        }
    }

    pub fn parse(mut self) -> ParseResult<(File, NodeId)> {
        let start = self.peek().span.start;
        self.expect_keyword(Keyword::Package)?;
        let package = self.expect_ident()?;
        self.expect_semi()?;

        let build_constraint = self
            .directives
            .iter()
            .filter(|d| d.line < package.span.start.line)
            .find_map(|d| d.text.strip_prefix("build ").map(|expr| expr.trim().to_string()));

        let mut imports = Vec::new();
        while self.check_keyword(Keyword::Import) {
            self.advance();
            if self.eat_delim(Delimiter::LeftParen) {
                while !self.check_delim(Delimiter::RightParen) {
                    imports.push(self.parse_import_spec()?);
                    self.expect_semi_or(Delimiter::RightParen)?;
                }
                self.expect_delim(Delimiter::RightParen)?;
            } else {
                imports.push(self.parse_import_spec()?);
            }
            self.expect_semi()?;
        }
        self.last_decl_line = self.prev_end.line;

        let mut decls = Vec::new();
        while !self.at_end() {
            decls.push(self.parse_top_level_decl()?);
            self.last_decl_line = self.prev_end.line;
            if !self.at_end() {
                self.expect_semi()?;
            }
        }

        let file = File {
            file_id: self.file,
            path: self.path.clone(),
            package,
            imports,
            decls,
            build_constraint,
            span: Span::new(self.file, start, self.prev_end),
        };
        Ok((file, self.next_id))
    }

    // Token helpers

    fn peek(&self) -> &Token {
        let idx = self.pos.min(self.tokens.len().saturating_sub(1));
        &self.tokens[idx]
    }

    fn peek_at(&self, n: usize) -> TokenType {
        let idx = (self.pos + n).min(self.tokens.len().saturating_sub(1));
        self.tokens[idx].token_type
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        self.prev_end = token.span.end;
        token
    }

    fn at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn check_keyword(&self, kw: Keyword) -> bool {
        self.peek().token_type == TokenType::Keyword(kw)
    }

    fn check_op(&self, op: Operator) -> bool {
        self.peek().token_type == TokenType::Operator(op)
    }

    fn check_delim(&self, delim: Delimiter) -> bool {
        self.peek().token_type == TokenType::Delimiter(delim)
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.check_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_op(&mut self, op: Operator) -> bool {
        if self.check_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_delim(&mut self, delim: Delimiter) -> bool {
        if self.check_delim(delim) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_here(&self, message: String) -> ParseError {
        let token = self.peek();
        let kind = if token.token_type == TokenType::Eof { ParseErrorKind::UnexpectedEof } else { ParseErrorKind::UnexpectedToken };
        ParseError::new(kind, token.span.start, message)
    }

    fn expected(&self, what: &str) -> ParseError {
        let token = self.peek();
        let found = if token.token_type == TokenType::Eof { "end of file".to_string() } else { format!("'{}'", token.lexeme.replace('\n', "newline")) };
        let mut error = self.error_here(format!("expected {}, found {}", what, found));
        if error.kind == ParseErrorKind::UnexpectedToken {
            error.kind = ParseErrorKind::ExpectedToken;
        }
        error
    }

    fn expect_keyword(&mut self, kw: Keyword) -> ParseResult<Token> {
        if self.check_keyword(kw) { Ok(self.advance()) } else { Err(self.expected(&format!("'{}'", kw))) }
    }

    fn expect_delim(&mut self, delim: Delimiter) -> ParseResult<Token> {
        if self.check_delim(delim) { Ok(self.advance()) } else { Err(self.expected(&format!("'{}'", delim))) }
    }

    fn expect_semi(&mut self) -> ParseResult<()> {
        if self.eat_delim(Delimiter::Semicolon) || self.at_end() { Ok(()) } else { Err(self.expected("';' or newline")) }
    }

    /// A semicolon may be omitted before a closing token
    fn expect_semi_or(&mut self, closing: Delimiter) -> ParseResult<()> {
        if self.check_delim(closing) {
            return Ok(());
        }
        self.expect_semi()
    }

    fn expect_ident(&mut self) -> ParseResult<Ident> {
        if self.peek().token_type != TokenType::Identifier {
            return Err(self.expected("identifier"));
        }
        let token = self.advance();
        Ok(Ident {
            id: self.new_id(),
            name: token.lexeme,
            span: token.span,
        })
    }

    fn new_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn span_from(&self, start: Position) -> Span {
        Span::new(self.file, start, self.prev_end)
    }

    fn start(&self) -> Position {
        self.peek().span.start
    }

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::new(ParseErrorKind::RecursionLimitExceeded, self.start(), "maximum nesting depth exceeded".to_string()));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn mk_expr(&mut self, kind: ExprKind, start: Position) -> Expr {
        Expr {
            id: self.new_id(),
            kind,
            span: self.span_from(start),
        }
    }

    fn mk_stmt(&mut self, kind: StmtKind, start: Position) -> Stmt {
        Stmt {
            id: self.new_id(),
            kind,
            span: self.span_from(start),
        }
    }

    // Declarations

    fn parse_import_spec(&mut self) -> ParseResult<Import> {
        let start = self.start();
        let alias = match self.peek().token_type {
            TokenType::Identifier => Some(self.expect_ident()?),
            TokenType::Delimiter(Delimiter::Dot) => {
                let token = self.advance();
                Some(Ident {
                    id: self.new_id(),
                    name: ".".to_string(),
                    span: token.span,
                })
            }
            _ => None,
        };
        if self.peek().token_type != TokenType::StringLiteral {
            return Err(self.expected("import path"));
        }
        let path = super::lexer::unquote_string(&self.advance().lexeme);
        Ok(Import {
            alias,
            path,
            span: self.span_from(start),
        })
    }

    fn parse_top_level_decl(&mut self) -> ParseResult<Decl> {
        match self.peek().token_type {
            TokenType::Keyword(Keyword::Func) => Ok(Decl::Func(self.parse_func_decl()?)),
            TokenType::Keyword(Keyword::Var) => {
                self.advance();
                Ok(Decl::Var(self.parse_group(Self::parse_var_spec)?))
            }
            TokenType::Keyword(Keyword::Const) => {
                self.advance();
                Ok(Decl::Const(self.parse_const_group()?))
            }
            TokenType::Keyword(Keyword::Type) => {
                self.advance();
                Ok(Decl::Type(self.parse_group(Self::parse_type_spec)?))
            }
            _ => Err(self.expected("declaration")),
        }
    }

    /// Parse `spec` or `( spec; spec; ... )`
    fn parse_group<T>(&mut self, mut parse_spec: impl FnMut(&mut Self) -> ParseResult<T>) -> ParseResult<Vec<T>> {
        let mut specs = Vec::new();
        if self.eat_delim(Delimiter::LeftParen) {
            while !self.check_delim(Delimiter::RightParen) {
                specs.push(parse_spec(self)?);
                self.expect_semi_or(Delimiter::RightParen)?;
            }
            self.expect_delim(Delimiter::RightParen)?;
        } else {
            specs.push(parse_spec(self)?);
        }
        Ok(specs)
    }

    fn parse_const_group(&mut self) -> ParseResult<Vec<ConstSpec>> {
        let mut specs = Vec::new();
        if self.eat_delim(Delimiter::LeftParen) {
            let mut iota = 0;
            while !self.check_delim(Delimiter::RightParen) {
                specs.push(self.parse_const_spec(iota)?);
                iota += 1;
                self.expect_semi_or(Delimiter::RightParen)?;
            }
            self.expect_delim(Delimiter::RightParen)?;
        } else {
            specs.push(self.parse_const_spec(0)?);
        }
        Ok(specs)
    }

    fn parse_ident_list(&mut self) -> ParseResult<Vec<Ident>> {
        let mut names = vec![self.expect_ident()?];
        while self.eat_delim(Delimiter::Comma) {
            names.push(self.expect_ident()?);
        }
        Ok(names)
    }

    fn parse_var_spec(&mut self) -> ParseResult<VarSpec> {
        let start = self.start();
        let names = self.parse_ident_list()?;
        let ty = if !self.check_op(Operator::Assign) && !self.check_delim(Delimiter::Semicolon) && !self.check_delim(Delimiter::RightParen) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let values = if self.eat_op(Operator::Assign) { self.parse_expr_list()? } else { Vec::new() };
        if ty.is_none() && values.is_empty() {
            return Err(self.expected("type or initializer"));
        }
        Ok(VarSpec {
            names,
            ty,
            values,
            span: self.span_from(start),
        })
    }

    fn parse_const_spec(&mut self, iota: i64) -> ParseResult<ConstSpec> {
        let start = self.start();
        let names = self.parse_ident_list()?;
        let ty = if !self.check_op(Operator::Assign) && !self.check_delim(Delimiter::Semicolon) && !self.check_delim(Delimiter::RightParen) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let values = if self.eat_op(Operator::Assign) { self.parse_expr_list()? } else { Vec::new() };
        Ok(ConstSpec {
            names,
            ty,
            values,
            iota,
            span: self.span_from(start),
        })
    }

    fn parse_type_spec(&mut self) -> ParseResult<TypeSpec> {
        let start = self.start();
        let name = self.expect_ident()?;
        let type_params = if self.check_delim(Delimiter::LeftBracket) && self.looks_like_type_params() { self.parse_type_params()? } else { Vec::new() };
        let alias = self.eat_op(Operator::Assign);
        let ty = self.parse_type()?;
        Ok(TypeSpec {
            name,
            type_params,
            alias,
            ty,
            span: self.span_from(start),
        })
    }

    /// Distinguish `type T[P any] ...` from the array type `type T [N]int`
    fn looks_like_type_params(&self) -> bool {
        if self.peek_at(1) != TokenType::Identifier {
            return false;
        }
        matches!(
            self.peek_at(2),
            TokenType::Identifier
                | TokenType::Delimiter(Delimiter::Comma)
                | TokenType::Delimiter(Delimiter::LeftBracket)
                | TokenType::Operator(Operator::Tilde)
                | TokenType::Keyword(Keyword::Interface)
                | TokenType::Keyword(Keyword::Func)
                | TokenType::Keyword(Keyword::Chan)
                | TokenType::Keyword(Keyword::Map)
                | TokenType::Keyword(Keyword::Struct)
        )
    }

    fn parse_type_params(&mut self) -> ParseResult<Vec<TypeParamDecl>> {
        self.expect_delim(Delimiter::LeftBracket)?;
        let mut groups = Vec::new();
        let mut pending = Vec::new();
        while !self.check_delim(Delimiter::RightBracket) {
            let name = self.expect_ident()?;
            pending.push(name);
            if self.eat_delim(Delimiter::Comma) {
                continue;
            }
            if self.check_delim(Delimiter::RightBracket) {
                return Err(self.expected("type constraint"));
            }
            let constraint = self.parse_constraint()?;
            groups.push(TypeParamDecl {
                names: std::mem::take(&mut pending),
                constraint,
            });
            if !self.eat_delim(Delimiter::Comma) {
                break;
            }
        }
        self.expect_delim(Delimiter::RightBracket)?;
        Ok(groups)
    }

    /// A constraint is a type or a union of `~T` terms
    fn parse_constraint(&mut self) -> ParseResult<TypeExpr> {
        let start = self.start();
        let mut terms = self.parse_union_terms()?;
        if terms.len() == 1 && !terms[0].tilde {
            if let Some(term) = terms.pop() {
                return Ok(term.ty);
            }
        }
        Ok(TypeExpr {
            id: self.new_id(),
            kind: TypeExprKind::Interface(vec![InterfaceElem::Union(terms)]),
            span: self.span_from(start),
        })
    }

    fn parse_union_terms(&mut self) -> ParseResult<Vec<UnionTerm>> {
        let mut terms = Vec::new();
        loop {
            let tilde = self.eat_op(Operator::Tilde);
            let ty = self.parse_type()?;
            terms.push(UnionTerm { tilde, ty });
            if !self.eat_op(Operator::BitOr) {
                break;
            }
        }
        Ok(terms)
    }

    fn parse_func_decl(&mut self) -> ParseResult<FuncDecl> {
        let start = self.start();
        let func_line = start.line;
        let pragmas = self
            .directives
            .iter()
            .filter(|d| d.line > self.last_decl_line && d.line < func_line && !d.text.starts_with("build "))
            .map(|d| d.text.split_whitespace().next().unwrap_or_default().to_string())
            .collect();

        self.expect_keyword(Keyword::Func)?;
        let recv = if self.check_delim(Delimiter::LeftParen) {
            let mut fields = self.parse_parameters()?;
            if fields.len() != 1 {
                return Err(ParseError::new(ParseErrorKind::UnexpectedToken, start, "method has multiple receivers".to_string()));
            }
            fields.pop()
        } else {
            None
        };
        let name = self.expect_ident()?;
        let type_params = if self.check_delim(Delimiter::LeftBracket) { self.parse_type_params()? } else { Vec::new() };
        let sig = self.parse_signature()?;
        let body = if self.check_delim(Delimiter::LeftBrace) { Some(self.parse_body()?) } else { None };

        Ok(FuncDecl {
            id: self.new_id(),
            name,
            recv,
            type_params,
            sig,
            body,
            pragmas,
            span: self.span_from(start),
        })
    }

    fn parse_signature(&mut self) -> ParseResult<FuncTypeExpr> {
        let params = self.parse_parameters()?;
        let variadic = params.last().is_some_and(|field| matches!(field.ty.kind, TypeExprKind::Ellipsis(_)));
        let results = if self.check_delim(Delimiter::LeftParen) {
            self.parse_parameters()?
        } else if self.begins_type() {
            let start = self.start();
            let ty = self.parse_type()?;
            vec![Field {
                names: Vec::new(),
                ty,
                span: self.span_from(start),
            }]
        } else {
            Vec::new()
        };
        Ok(FuncTypeExpr { params, results, variadic })
    }

    fn begins_type(&self) -> bool {
        matches!(
            self.peek().token_type,
            TokenType::Identifier
                | TokenType::Operator(Operator::Multiply)
                | TokenType::Operator(Operator::Arrow)
                | TokenType::Delimiter(Delimiter::LeftBracket)
                | TokenType::Keyword(Keyword::Map)
                | TokenType::Keyword(Keyword::Chan)
                | TokenType::Keyword(Keyword::Func)
                | TokenType::Keyword(Keyword::Struct)
                | TokenType::Keyword(Keyword::Interface)
        )
    }

    /// Parse a parenthesized parameter list, resolving the named and
    /// anonymous forms once the whole list is known
    fn parse_parameters(&mut self) -> ParseResult<Vec<Field>> {
        self.expect_delim(Delimiter::LeftParen)?;
        let mut entries: Vec<(Option<Ident>, Option<TypeExpr>, Position)> = Vec::new();
        while !self.check_delim(Delimiter::RightParen) {
            let start = self.start();
            if self.peek().token_type == TokenType::Identifier && self.peek_at(1) != TokenType::Delimiter(Delimiter::Dot) {
                let ident = self.expect_ident()?;
                if self.begins_type() || self.check_delim(Delimiter::Ellipsis) || self.check_delim(Delimiter::LeftParen) {
                    let ty = self.parse_type()?;
                    entries.push((Some(ident), Some(ty), start));
                } else {
                    entries.push((Some(ident), None, start));
                }
            } else {
                let ty = self.parse_type()?;
                entries.push((None, Some(ty), start));
            }
            if !self.eat_delim(Delimiter::Comma) {
                break;
            }
        }
        self.expect_delim(Delimiter::RightParen)?;

        let named = entries.iter().any(|(name, ty, _)| name.is_some() && ty.is_some());
        let mut fields = Vec::new();
        if named {
            let mut pending = Vec::new();
            for (name, ty, start) in entries {
                match (name, ty) {
                    (Some(name), None) => pending.push(name),
                    (Some(name), Some(ty)) => {
                        pending.push(name);
                        fields.push(Field {
                            names: std::mem::take(&mut pending),
                            ty,
                            span: Span::new(self.file, start, self.prev_end),
                        });
                    }
                    (None, Some(_)) => return Err(ParseError::new(ParseErrorKind::UnexpectedToken, start, "mixed named and unnamed parameters".to_string())),
                    (None, None) => {}
                }
            }
            if let Some(last) = pending.first() {
                return Err(ParseError::new(ParseErrorKind::ExpectedToken, last.span.start, "missing parameter type".to_string()));
            }
        } else {
            for (name, ty, _) in entries {
                let ty = match (name, ty) {
                    (Some(ident), None) => {
                        let span = ident.span;
                        TypeExpr {
                            id: self.new_id(),
                            kind: TypeExprKind::Name { pkg: None, name: ident, args: Vec::new() },
                            span,
                        }
                    }
                    (_, Some(ty)) => ty,
                    (None, None) => continue,
                };
                let span = ty.span;
                fields.push(Field { names: Vec::new(), ty, span });
            }
        }
        Ok(fields)
    }

    // Types

    pub fn parse_type(&mut self) -> ParseResult<TypeExpr> {
        self.enter()?;
        let result = self.parse_type_inner();
        self.leave();
        result
    }

    fn parse_type_inner(&mut self) -> ParseResult<TypeExpr> {
        let start = self.start();
        let kind = match self.peek().token_type {
            TokenType::Identifier => {
                let first = self.expect_ident()?;
                let (pkg, name) = if self.eat_delim(Delimiter::Dot) { (Some(first), self.expect_ident()?) } else { (None, first) };
                let args = if self.check_delim(Delimiter::LeftBracket) { self.parse_type_args()? } else { Vec::new() };
                TypeExprKind::Name { pkg, name, args }
            }
            TokenType::Operator(Operator::Multiply) => {
                self.advance();
                TypeExprKind::Pointer(Box::new(self.parse_type()?))
            }
            TokenType::Delimiter(Delimiter::LeftBracket) => {
                self.advance();
                if self.eat_delim(Delimiter::RightBracket) {
                    TypeExprKind::Slice(Box::new(self.parse_type()?))
                } else if self.eat_delim(Delimiter::Ellipsis) {
                    self.expect_delim(Delimiter::RightBracket)?;
                    TypeExprKind::Array {
                        len: None,
                        elem: Box::new(self.parse_type()?),
                    }
                } else {
                    let saved = self.expr_level;
                    self.expr_level = 1;
                    let len = self.parse_expr()?;
                    self.expr_level = saved;
                    self.expect_delim(Delimiter::RightBracket)?;
                    TypeExprKind::Array {
                        len: Some(Box::new(len)),
                        elem: Box::new(self.parse_type()?),
                    }
                }
            }
            TokenType::Keyword(Keyword::Map) => {
                self.advance();
                self.expect_delim(Delimiter::LeftBracket)?;
                let key = self.parse_type()?;
                self.expect_delim(Delimiter::RightBracket)?;
                let value = self.parse_type()?;
                TypeExprKind::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                }
            }
            TokenType::Keyword(Keyword::Chan) => {
                self.advance();
                let dir = if self.eat_op(Operator::Arrow) { ChanDir::Send } else { ChanDir::Both };
                TypeExprKind::Chan {
                    dir,
                    elem: Box::new(self.parse_type()?),
                }
            }
            TokenType::Operator(Operator::Arrow) => {
                self.advance();
                self.expect_keyword(Keyword::Chan)?;
                TypeExprKind::Chan {
                    dir: ChanDir::Recv,
                    elem: Box::new(self.parse_type()?),
                }
            }
            TokenType::Keyword(Keyword::Func) => {
                self.advance();
                TypeExprKind::Func(self.parse_signature()?)
            }
            TokenType::Keyword(Keyword::Struct) => self.parse_struct_type()?,
            TokenType::Keyword(Keyword::Interface) => self.parse_interface_type()?,
            TokenType::Delimiter(Delimiter::LeftParen) => {
                self.advance();
                let inner = self.parse_type()?;
                self.expect_delim(Delimiter::RightParen)?;
                return Ok(inner);
            }
            TokenType::Delimiter(Delimiter::Ellipsis) => {
                self.advance();
                TypeExprKind::Ellipsis(Box::new(self.parse_type()?))
            }
            _ => return Err(self.expected("type")),
        };
        Ok(TypeExpr {
            id: self.new_id(),
            kind,
            span: self.span_from(start),
        })
    }

    fn parse_type_args(&mut self) -> ParseResult<Vec<TypeExpr>> {
        self.expect_delim(Delimiter::LeftBracket)?;
        let mut args = Vec::new();
        while !self.check_delim(Delimiter::RightBracket) {
            args.push(self.parse_type()?);
            if !self.eat_delim(Delimiter::Comma) {
                break;
            }
        }
        self.expect_delim(Delimiter::RightBracket)?;
        Ok(args)
    }

    fn parse_struct_type(&mut self) -> ParseResult<TypeExprKind> {
        self.expect_keyword(Keyword::Struct)?;
        self.expect_delim(Delimiter::LeftBrace)?;
        let mut fields = Vec::new();
        while !self.check_delim(Delimiter::RightBrace) {
            let start = self.start();
            let embedded = match self.peek().token_type {
                TokenType::Operator(Operator::Multiply) => true,
                TokenType::Identifier => matches!(
                    self.peek_at(1),
                    TokenType::Delimiter(Delimiter::Dot) | TokenType::Delimiter(Delimiter::Semicolon) | TokenType::Delimiter(Delimiter::RightBrace) | TokenType::StringLiteral
                ),
                _ => return Err(self.expected("field name or embedded type")),
            };
            let (names, ty) = if embedded { (Vec::new(), self.parse_type()?) } else { (self.parse_ident_list()?, self.parse_type()?) };
            if self.peek().token_type == TokenType::StringLiteral {
                self.advance();
            }
            fields.push(Field {
                names,
                ty,
                span: self.span_from(start),
            });
            self.expect_semi_or(Delimiter::RightBrace)?;
        }
        self.expect_delim(Delimiter::RightBrace)?;
        Ok(TypeExprKind::Struct(fields))
    }

    fn parse_interface_type(&mut self) -> ParseResult<TypeExprKind> {
        self.expect_keyword(Keyword::Interface)?;
        self.expect_delim(Delimiter::LeftBrace)?;
        let mut elems = Vec::new();
        while !self.check_delim(Delimiter::RightBrace) {
            if self.peek().token_type == TokenType::Identifier && self.peek_at(1) == TokenType::Delimiter(Delimiter::LeftParen) {
                let name = self.expect_ident()?;
                let sig = self.parse_signature()?;
                elems.push(InterfaceElem::Method { name, sig });
            } else {
                elems.push(InterfaceElem::Union(self.parse_union_terms()?));
            }
            self.expect_semi_or(Delimiter::RightBrace)?;
        }
        self.expect_delim(Delimiter::RightBrace)?;
        Ok(TypeExprKind::Interface(elems))
    }

    // Statements

    fn parse_body(&mut self) -> ParseResult<Block> {
        let saved = self.expr_level;
        self.expr_level = 0;
        let block = self.parse_block();
        self.expr_level = saved;
        block
    }

    fn parse_block(&mut self) -> ParseResult<Block> {
        let start = self.start();
        self.expect_delim(Delimiter::LeftBrace)?;
        let stmts = self.parse_stmt_list()?;
        self.expect_delim(Delimiter::RightBrace)?;
        Ok(Block {
            stmts,
            span: self.span_from(start),
        })
    }

    fn at_clause_end(&self) -> bool {
        self.check_delim(Delimiter::RightBrace) || self.check_keyword(Keyword::Case) || self.check_keyword(Keyword::Default) || self.at_end()
    }

    fn parse_stmt_list(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.at_clause_end() {
            let stmt = self.parse_stmt()?;
            if !matches!(stmt.kind, StmtKind::Empty) {
                stmts.push(stmt);
            }
            if self.at_clause_end() {
                break;
            }
            if !self.eat_delim(Delimiter::Semicolon) {
                return Err(self.expected("';' or newline"));
            }
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        self.enter()?;
        let result = self.parse_stmt_inner();
        self.leave();
        result
    }

    fn parse_stmt_inner(&mut self) -> ParseResult<Stmt> {
        let start = self.start();
        match self.peek().token_type {
            TokenType::Keyword(Keyword::Var) => {
                self.advance();
                let specs = self.parse_group(Self::parse_var_spec)?;
                Ok(self.mk_stmt(StmtKind::Var(specs), start))
            }
            TokenType::Keyword(Keyword::Const) => {
                self.advance();
                let specs = self.parse_const_group()?;
                Ok(self.mk_stmt(StmtKind::Const(specs), start))
            }
            TokenType::Keyword(Keyword::Type) => {
                self.advance();
                let specs = self.parse_group(Self::parse_type_spec)?;
                Ok(self.mk_stmt(StmtKind::Type(specs), start))
            }
            TokenType::Keyword(Keyword::Go) => {
                self.advance();
                let call = self.parse_expr()?;
                if call.as_call().is_none() {
                    return Err(ParseError::new(ParseErrorKind::ExpectedToken, call.span.start, "expression in go must be a function call".to_string()));
                }
                Ok(self.mk_stmt(StmtKind::Go(call), start))
            }
            TokenType::Keyword(Keyword::Defer) => {
                self.advance();
                let call = self.parse_expr()?;
                if call.as_call().is_none() {
                    return Err(ParseError::new(ParseErrorKind::ExpectedToken, call.span.start, "expression in defer must be a function call".to_string()));
                }
                Ok(self.mk_stmt(StmtKind::Defer(call), start))
            }
            TokenType::Keyword(Keyword::Return) => {
                self.advance();
                let results = if self.check_delim(Delimiter::Semicolon) || self.at_clause_end() { Vec::new() } else { self.parse_expr_list()? };
                Ok(self.mk_stmt(StmtKind::Return(results), start))
            }
            TokenType::Keyword(Keyword::Break) | TokenType::Keyword(Keyword::Continue) => {
                let is_break = self.check_keyword(Keyword::Break);
                self.advance();
                let label = if self.peek().token_type == TokenType::Identifier { Some(self.expect_ident()?) } else { None };
                let kind = if is_break { StmtKind::Break(label) } else { StmtKind::Continue(label) };
                Ok(self.mk_stmt(kind, start))
            }
            TokenType::Keyword(Keyword::Goto) => {
                self.advance();
                let label = self.expect_ident()?;
                Ok(self.mk_stmt(StmtKind::Goto(label), start))
            }
            TokenType::Keyword(Keyword::Fallthrough) => {
                self.advance();
                Ok(self.mk_stmt(StmtKind::Fallthrough, start))
            }
            TokenType::Keyword(Keyword::If) => self.parse_if(),
            TokenType::Keyword(Keyword::For) => self.parse_for(),
            TokenType::Keyword(Keyword::Switch) => self.parse_switch(),
            TokenType::Keyword(Keyword::Select) => self.parse_select(),
            TokenType::Delimiter(Delimiter::LeftBrace) => {
                let block = self.parse_block()?;
                Ok(self.mk_stmt(StmtKind::Block(block), start))
            }
            TokenType::Delimiter(Delimiter::Semicolon) | TokenType::Delimiter(Delimiter::RightBrace) => Ok(self.mk_stmt(StmtKind::Empty, start)),
            TokenType::Identifier if self.peek_at(1) == TokenType::Delimiter(Delimiter::Colon) => {
                let label = self.expect_ident()?;
                self.advance();
                let stmt = if self.at_clause_end() { self.mk_stmt(StmtKind::Empty, start) } else { self.parse_stmt()? };
                Ok(self.mk_stmt(StmtKind::Labeled { label, stmt: Box::new(stmt) }, start))
            }
            _ => match self.parse_simple_stmt(false)? {
                Simple::Stmt(stmt) => Ok(stmt),
                Simple::Range { start, .. } => Err(ParseError::new(ParseErrorKind::UnexpectedToken, start, "range clause outside for statement".to_string())),
            },
        }
    }

    fn parse_simple_stmt(&mut self, range_ok: bool) -> ParseResult<Simple> {
        let start = self.start();
        if range_ok && self.eat_keyword(Keyword::Range) {
            let expr = self.parse_expr()?;
            return Ok(Simple::Range {
                key: None,
                value: None,
                define: false,
                expr,
                start,
            });
        }

        let mut lhs = self.parse_expr_list()?;
        let token_type = self.peek().token_type;
        let kind = match token_type {
            TokenType::Operator(op @ (Operator::Define | Operator::Assign)) => {
                self.advance();
                let define = op == Operator::Define;
                if range_ok && self.eat_keyword(Keyword::Range) {
                    let expr = self.parse_expr()?;
                    if lhs.len() > 2 {
                        return Err(ParseError::new(ParseErrorKind::UnexpectedToken, start, "range clause permits at most two iteration variables".to_string()));
                    }
                    let mut iter = lhs.into_iter();
                    return Ok(Simple::Range {
                        key: iter.next(),
                        value: iter.next(),
                        define,
                        expr,
                        start,
                    });
                }
                let rhs = self.parse_expr_list()?;
                let op = if define { AssignOp::Define } else { AssignOp::Assign };
                StmtKind::Assign { lhs, op, rhs }
            }
            TokenType::Operator(op) if compound_op(op).is_some() => {
                self.advance();
                let rhs = vec![self.parse_expr()?];
                let op = AssignOp::Compound(compound_op(op).unwrap_or(BinaryOp::Add));
                StmtKind::Assign { lhs, op, rhs }
            }
            TokenType::Operator(Operator::Arrow) => {
                self.advance();
                let value = self.parse_expr()?;
                let chan = lhs.remove(0);
                StmtKind::Send { chan, value }
            }
            TokenType::Operator(Operator::Increment) | TokenType::Operator(Operator::Decrement) => {
                self.advance();
                StmtKind::IncDec {
                    target: lhs.remove(0),
                    inc: token_type == TokenType::Operator(Operator::Increment),
                }
            }
            _ => {
                if lhs.len() > 1 {
                    return Err(self.expected("':=' or '='"));
                }
                StmtKind::Expr(lhs.remove(0))
            }
        };
        Ok(Simple::Stmt(self.mk_stmt(kind, start)))
    }

    fn expect_simple_stmt(&mut self) -> ParseResult<Stmt> {
        match self.parse_simple_stmt(false)? {
            Simple::Stmt(stmt) => Ok(stmt),
            Simple::Range { start, .. } => Err(ParseError::new(ParseErrorKind::UnexpectedToken, start, "unexpected range clause".to_string())),
        }
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let start = self.start();
        self.expect_keyword(Keyword::If)?;
        let saved = self.expr_level;
        self.expr_level = -1;

        let mut init = None;
        if !self.check_delim(Delimiter::Semicolon) {
            let first = self.expect_simple_stmt()?;
            init = Some(first);
        }
        let cond = if self.eat_delim(Delimiter::Semicolon) {
            self.parse_expr()?
        } else {
            match init.take() {
                Some(Stmt { kind: StmtKind::Expr(expr), .. }) => expr,
                _ => return Err(self.expected("condition")),
            }
        };
        self.expr_level = saved;

        let then = self.parse_block()?;
        let els = if self.eat_keyword(Keyword::Else) {
            if self.check_keyword(Keyword::If) {
                Some(Box::new(self.parse_if()?))
            } else {
                let else_start = self.start();
                let block = self.parse_block()?;
                Some(Box::new(self.mk_stmt(StmtKind::Block(block), else_start)))
            }
        } else {
            None
        };
        Ok(self.mk_stmt(
            StmtKind::If {
                init: init.map(Box::new),
                cond,
                then,
                els,
            },
            start,
        ))
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let start = self.start();
        self.expect_keyword(Keyword::For)?;
        let saved = self.expr_level;
        self.expr_level = -1;

        let mut init = None;
        let mut cond = None;
        let mut post = None;
        let mut range = None;

        if !self.check_delim(Delimiter::LeftBrace) {
            let first = if self.check_delim(Delimiter::Semicolon) { None } else { Some(self.parse_simple_stmt(true)?) };
            match first {
                Some(Simple::Range { key, value, define, expr, .. }) => range = Some((key, value, define, expr)),
                first => {
                    let first = first.and_then(|s| match s {
                        Simple::Stmt(stmt) => Some(stmt),
                        Simple::Range { .. } => None,
                    });
                    if self.eat_delim(Delimiter::Semicolon) {
                        init = first;
                        if !self.check_delim(Delimiter::Semicolon) {
                            cond = Some(self.parse_expr()?);
                        }
                        self.expect_delim(Delimiter::Semicolon)?;
                        if !self.check_delim(Delimiter::LeftBrace) {
                            post = Some(self.expect_simple_stmt()?);
                        }
                    } else {
                        match first {
                            Some(Stmt { kind: StmtKind::Expr(expr), .. }) => cond = Some(expr),
                            Some(_) => return Err(self.expected("for loop condition")),
                            None => {}
                        }
                    }
                }
            }
        }
        self.expr_level = saved;
        let body = self.parse_block()?;

        let kind = match range {
            Some((key, value, define, expr)) => StmtKind::Range { key, value, define, expr, body },
            None => StmtKind::For {
                init: init.map(Box::new),
                cond,
                post: post.map(Box::new),
                body,
            },
        };
        Ok(self.mk_stmt(kind, start))
    }

    fn parse_switch(&mut self) -> ParseResult<Stmt> {
        let start = self.start();
        self.expect_keyword(Keyword::Switch)?;
        let saved = self.expr_level;
        self.expr_level = -1;

        let mut init = None;
        let mut tag_stmt = None;
        if !self.check_delim(Delimiter::LeftBrace) {
            if !self.check_delim(Delimiter::Semicolon) {
                tag_stmt = Some(self.expect_simple_stmt()?);
            }
            if self.eat_delim(Delimiter::Semicolon) {
                init = tag_stmt.take();
                if !self.check_delim(Delimiter::LeftBrace) {
                    tag_stmt = Some(self.expect_simple_stmt()?);
                }
            }
        }
        self.expr_level = saved;

        // Detect `x := y.(type)` and `y.(type)`
        let type_switch = match tag_stmt {
            Some(Stmt {
                kind: StmtKind::Assign { mut lhs, op: AssignOp::Define, mut rhs },
                ..
            }) if lhs.len() == 1 && rhs.len() == 1 && is_type_switch_guard(&rhs[0]) => {
                let binding = lhs.remove(0);
                let subject = rhs.remove(0);
                let binding = match binding.kind {
                    ExprKind::Ident(name) => Ident {
                        id: binding.id,
                        name,
                        span: binding.span,
                    },
                    _ => return Err(ParseError::new(ParseErrorKind::UnexpectedToken, binding.span.start, "invalid type switch binding".to_string())),
                };
                Some((Some(binding), subject))
            }
            Some(Stmt { kind: StmtKind::Expr(expr), .. }) if is_type_switch_guard(&expr) => Some((None, expr)),
            Some(Stmt { kind: StmtKind::Expr(expr), .. }) => return self.finish_expr_switch(start, init, Some(expr)),
            Some(other) => return Err(ParseError::new(ParseErrorKind::UnexpectedToken, other.span.start, "switch expression must be an expression".to_string())),
            None => None,
        };

        match type_switch {
            Some((binding, guard)) => {
                let subject = match guard.kind {
                    ExprKind::TypeAssert { base, ty: None } => *base,
                    _ => guard,
                };
                self.expect_delim(Delimiter::LeftBrace)?;
                let mut cases = Vec::new();
                while !self.check_delim(Delimiter::RightBrace) {
                    cases.push(self.parse_type_case_clause()?);
                }
                self.expect_delim(Delimiter::RightBrace)?;
                Ok(self.mk_stmt(
                    StmtKind::TypeSwitch {
                        init: init.map(Box::new),
                        binding,
                        subject,
                        cases,
                    },
                    start,
                ))
            }
            None => self.finish_expr_switch(start, init, None),
        }
    }

    fn finish_expr_switch(&mut self, start: Position, init: Option<Stmt>, tag: Option<Expr>) -> ParseResult<Stmt> {
        self.expect_delim(Delimiter::LeftBrace)?;
        let mut cases = Vec::new();
        while !self.check_delim(Delimiter::RightBrace) {
            let clause_start = self.start();
            let (exprs, is_default) = if self.eat_keyword(Keyword::Default) {
                (Vec::new(), true)
            } else {
                self.expect_keyword(Keyword::Case)?;
                (self.parse_expr_list()?, false)
            };
            self.expect_delim(Delimiter::Colon)?;
            let body = self.parse_stmt_list()?;
            cases.push(CaseClause {
                id: self.new_id(),
                exprs,
                is_default,
                body,
                span: self.span_from(clause_start),
            });
        }
        self.expect_delim(Delimiter::RightBrace)?;
        Ok(self.mk_stmt(StmtKind::Switch { init: init.map(Box::new), tag, cases }, start))
    }

    fn parse_type_case_clause(&mut self) -> ParseResult<TypeCaseClause> {
        let start = self.start();
        let (types, is_default) = if self.eat_keyword(Keyword::Default) {
            (Vec::new(), true)
        } else {
            self.expect_keyword(Keyword::Case)?;
            let mut types = vec![self.parse_type()?];
            while self.eat_delim(Delimiter::Comma) {
                types.push(self.parse_type()?);
            }
            (types, false)
        };
        self.expect_delim(Delimiter::Colon)?;
        let body = self.parse_stmt_list()?;
        Ok(TypeCaseClause {
            id: self.new_id(),
            types,
            is_default,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_select(&mut self) -> ParseResult<Stmt> {
        let start = self.start();
        self.expect_keyword(Keyword::Select)?;
        self.expect_delim(Delimiter::LeftBrace)?;
        let mut cases = Vec::new();
        while !self.check_delim(Delimiter::RightBrace) {
            let clause_start = self.start();
            let comm = if self.eat_keyword(Keyword::Default) {
                None
            } else {
                self.expect_keyword(Keyword::Case)?;
                let stmt = self.expect_simple_stmt()?;
                if !is_comm_stmt(&stmt) {
                    return Err(ParseError::new(ParseErrorKind::UnexpectedToken, stmt.span.start, "select case must be a send or receive".to_string()));
                }
                Some(Box::new(stmt))
            };
            self.expect_delim(Delimiter::Colon)?;
            let body = self.parse_stmt_list()?;
            cases.push(CommClause {
                id: self.new_id(),
                comm,
                body,
                span: self.span_from(clause_start),
            });
        }
        self.expect_delim(Delimiter::RightBrace)?;
        Ok(self.mk_stmt(StmtKind::Select { cases }, start))
    }

    // Expressions

    fn parse_expr_list(&mut self) -> ParseResult<Vec<Expr>> {
        let mut exprs = vec![self.parse_expr()?];
        while self.eat_delim(Delimiter::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    pub fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.enter()?;
        let result = self.parse_binary(1);
        self.leave();
        result
    }

    fn parse_binary(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let start = self.start();
        let mut lhs = self.parse_unary()?;
        loop {
            let TokenType::Operator(op) = self.peek().token_type else { break };
            let prec = op.precedence();
            if prec == 0 || prec < min_prec {
                break;
            }
            let Some(binary) = binary_op(op) else { break };
            self.advance();
            let rhs = self.parse_binary(prec + 1)?;
            lhs = self.mk_expr(
                ExprKind::Binary {
                    op: binary,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                start,
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let op = match self.peek().token_type {
            TokenType::Operator(Operator::Plus) => Some(UnaryOp::Plus),
            TokenType::Operator(Operator::Minus) => Some(UnaryOp::Neg),
            TokenType::Operator(Operator::LogicalNot) => Some(UnaryOp::Not),
            TokenType::Operator(Operator::BitXor) => Some(UnaryOp::BitNot),
            TokenType::Operator(Operator::Multiply) => Some(UnaryOp::Deref),
            TokenType::Operator(Operator::BitAnd) => Some(UnaryOp::AddrOf),
            TokenType::Operator(Operator::Arrow) if self.peek_at(1) != TokenType::Keyword(Keyword::Chan) => Some(UnaryOp::Recv),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                self.enter()?;
                let operand = self.parse_unary();
                self.leave();
                let operand = operand?;
                Ok(self.mk_expr(ExprKind::Unary { op, operand: Box::new(operand) }, start))
            }
            None => self.parse_primary(),
        }
    }

    fn parse_operand(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let token_type = self.peek().token_type;
        match token_type {
            TokenType::IntLiteral | TokenType::FloatLiteral | TokenType::ImagLiteral | TokenType::RuneLiteral | TokenType::StringLiteral => {
                let token = self.advance();
                let kind = match token_type {
                    TokenType::IntLiteral => LitKind::Int,
                    TokenType::FloatLiteral => LitKind::Float,
                    TokenType::ImagLiteral => LitKind::Imag,
                    TokenType::RuneLiteral => LitKind::Rune,
                    _ => LitKind::String,
                };
                Ok(self.mk_expr(ExprKind::BasicLit { kind, raw: token.lexeme }, start))
            }
            TokenType::Identifier => {
                let token = self.advance();
                Ok(self.mk_expr(ExprKind::Ident(token.lexeme), start))
            }
            TokenType::Delimiter(Delimiter::LeftParen) => {
                self.advance();
                let saved = self.expr_level;
                self.expr_level = saved.max(0) + 1;
                let inner = self.parse_expr();
                self.expr_level = saved;
                let inner = inner?;
                self.expect_delim(Delimiter::RightParen)?;
                Ok(self.mk_expr(ExprKind::Paren(Box::new(inner)), start))
            }
            TokenType::Keyword(Keyword::Func) => {
                self.advance();
                let sig = self.parse_signature()?;
                if self.check_delim(Delimiter::LeftBrace) {
                    let body = self.parse_body()?;
                    Ok(self.mk_expr(ExprKind::FuncLit { sig, body }, start))
                } else {
                    let ty = TypeExpr {
                        id: self.new_id(),
                        kind: TypeExprKind::Func(sig),
                        span: self.span_from(start),
                    };
                    Ok(self.mk_expr(ExprKind::Type(Box::new(ty)), start))
                }
            }
            TokenType::Delimiter(Delimiter::LeftBracket)
            | TokenType::Keyword(Keyword::Map)
            | TokenType::Keyword(Keyword::Chan)
            | TokenType::Keyword(Keyword::Struct)
            | TokenType::Keyword(Keyword::Interface)
            | TokenType::Operator(Operator::Arrow) => {
                let ty = self.parse_type()?;
                Ok(self.mk_expr(ExprKind::Type(Box::new(ty)), start))
            }
            _ => Err(self.expected("expression")),
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let mut expr = self.parse_operand()?;
        loop {
            match self.peek().token_type {
                TokenType::Delimiter(Delimiter::Dot) => {
                    self.advance();
                    if self.eat_delim(Delimiter::LeftParen) {
                        let ty = if self.eat_keyword(Keyword::Type) { None } else { Some(Box::new(self.parse_type()?)) };
                        self.expect_delim(Delimiter::RightParen)?;
                        expr = self.mk_expr(ExprKind::TypeAssert { base: Box::new(expr), ty }, start);
                    } else {
                        let field = self.expect_ident()?;
                        expr = self.mk_expr(ExprKind::Selector { base: Box::new(expr), field }, start);
                    }
                }
                TokenType::Delimiter(Delimiter::LeftBracket) => expr = self.parse_index_or_slice(expr, start)?,
                TokenType::Delimiter(Delimiter::LeftParen) => expr = self.parse_call(expr, start)?,
                TokenType::Delimiter(Delimiter::LeftBrace) => {
                    let allowed = is_literal_type(&expr) && (self.expr_level >= 0 || !is_bare_type_name(&expr));
                    if !allowed {
                        break;
                    }
                    let ty = expr_to_type(expr);
                    expr = self.parse_composite_lit(Some(Box::new(ty)), start)?;
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_index_or_slice(&mut self, base: Expr, start: Position) -> ParseResult<Expr> {
        self.expect_delim(Delimiter::LeftBracket)?;
        let saved = self.expr_level;
        self.expr_level = saved.max(0) + 1;

        let result: ParseResult<ExprKind> = (|| {
            let low = if self.check_delim(Delimiter::Colon) { None } else { Some(self.parse_expr()?) };
            if self.eat_delim(Delimiter::Colon) {
                let high = if self.check_delim(Delimiter::Colon) || self.check_delim(Delimiter::RightBracket) { None } else { Some(Box::new(self.parse_expr()?)) };
                let max = if self.eat_delim(Delimiter::Colon) { Some(Box::new(self.parse_expr()?)) } else { None };
                self.expect_delim(Delimiter::RightBracket)?;
                return Ok(ExprKind::Slice {
                    base: Box::new(base),
                    low: low.map(Box::new),
                    high,
                    max,
                });
            }
            let mut indices = Vec::new();
            if let Some(low) = low {
                indices.push(low);
            }
            while self.eat_delim(Delimiter::Comma) {
                if self.check_delim(Delimiter::RightBracket) {
                    break;
                }
                indices.push(self.parse_expr()?);
            }
            self.expect_delim(Delimiter::RightBracket)?;
            Ok(ExprKind::Index { base: Box::new(base), indices })
        })();

        self.expr_level = saved;
        let kind = result?;
        Ok(self.mk_expr(kind, start))
    }

    fn parse_call(&mut self, func: Expr, start: Position) -> ParseResult<Expr> {
        self.expect_delim(Delimiter::LeftParen)?;
        let saved = self.expr_level;
        self.expr_level = saved.max(0) + 1;
        let mut args = Vec::new();
        let mut ellipsis = false;
        let result: ParseResult<()> = (|| {
            while !self.check_delim(Delimiter::RightParen) {
                args.push(self.parse_expr()?);
                if self.eat_delim(Delimiter::Ellipsis) {
                    ellipsis = true;
                }
                if !self.eat_delim(Delimiter::Comma) {
                    break;
                }
            }
            self.expect_delim(Delimiter::RightParen)?;
            Ok(())
        })();
        self.expr_level = saved;
        result?;
        Ok(self.mk_expr(ExprKind::Call { func: Box::new(func), args, ellipsis }, start))
    }

    fn parse_composite_lit(&mut self, ty: Option<Box<TypeExpr>>, start: Position) -> ParseResult<Expr> {
        self.expect_delim(Delimiter::LeftBrace)?;
        let saved = self.expr_level;
        self.expr_level = saved.max(0) + 1;
        let mut elems = Vec::new();
        let result: ParseResult<()> = (|| {
            while !self.check_delim(Delimiter::RightBrace) {
                let first = self.parse_element()?;
                let elem = if self.eat_delim(Delimiter::Colon) {
                    KeyedElement {
                        key: Some(first),
                        value: self.parse_element()?,
                    }
                } else {
                    KeyedElement { key: None, value: first }
                };
                elems.push(elem);
                if !self.eat_delim(Delimiter::Comma) {
                    break;
                }
            }
            self.expect_delim(Delimiter::RightBrace)?;
            Ok(())
        })();
        self.expr_level = saved;
        result?;
        Ok(self.mk_expr(ExprKind::CompositeLit { ty, elems }, start))
    }

    /// An element value, possibly an elided composite literal
    fn parse_element(&mut self) -> ParseResult<Expr> {
        if self.check_delim(Delimiter::LeftBrace) {
            let start = self.start();
            return self.parse_composite_lit(None, start);
        }
        self.parse_expr()
    }
}

fn compound_op(op: Operator) -> Option<BinaryOp> {
    let binary = match op {
        Operator::PlusAssign => BinaryOp::Add,
        Operator::MinusAssign => BinaryOp::Sub,
        Operator::MultiplyAssign => BinaryOp::Mul,
        Operator::DivideAssign => BinaryOp::Div,
        Operator::ModuloAssign => BinaryOp::Rem,
        Operator::BitAndAssign => BinaryOp::And,
        Operator::BitOrAssign => BinaryOp::Or,
        Operator::BitXorAssign => BinaryOp::Xor,
        Operator::AndNotAssign => BinaryOp::AndNot,
        Operator::LeftShiftAssign => BinaryOp::Shl,
        Operator::RightShiftAssign => BinaryOp::Shr,
        _ => return None,
    };
    Some(binary)
}

fn binary_op(op: Operator) -> Option<BinaryOp> {
    let binary = match op {
        Operator::Plus => BinaryOp::Add,
        Operator::Minus => BinaryOp::Sub,
        Operator::Multiply => BinaryOp::Mul,
        Operator::Divide => BinaryOp::Div,
        Operator::Modulo => BinaryOp::Rem,
        Operator::BitAnd => BinaryOp::And,
        Operator::BitOr => BinaryOp::Or,
        Operator::BitXor => BinaryOp::Xor,
        Operator::AndNot => BinaryOp::AndNot,
        Operator::LeftShift => BinaryOp::Shl,
        Operator::RightShift => BinaryOp::Shr,
        Operator::LogicalAnd => BinaryOp::LogAnd,
        Operator::LogicalOr => BinaryOp::LogOr,
        Operator::Equal => BinaryOp::Eq,
        Operator::NotEqual => BinaryOp::Ne,
        Operator::Less => BinaryOp::Lt,
        Operator::LessEqual => BinaryOp::Le,
        Operator::Greater => BinaryOp::Gt,
        Operator::GreaterEqual => BinaryOp::Ge,
        _ => return None,
    };
    Some(binary)
}

fn is_type_switch_guard(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::TypeAssert { ty: None, .. })
}

fn is_comm_stmt(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Send { .. } => true,
        StmtKind::Expr(expr) => matches!(expr.unparen().kind, ExprKind::Unary { op: UnaryOp::Recv, .. }),
        StmtKind::Assign { rhs, op, .. } => {
            matches!(op, AssignOp::Assign | AssignOp::Define) && rhs.len() == 1 && matches!(rhs[0].unparen().kind, ExprKind::Unary { op: UnaryOp::Recv, .. })
        }
        _ => false,
    }
}

/// Whether an expression can denote the type of a composite literal
fn is_literal_type(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Ident(_) => true,
        ExprKind::Selector { base, .. } => matches!(base.kind, ExprKind::Ident(_)),
        ExprKind::Index { base, .. } => is_literal_type(base),
        ExprKind::Type(ty) => matches!(ty.kind, TypeExprKind::Slice(_) | TypeExprKind::Array { .. } | TypeExprKind::Map { .. } | TypeExprKind::Struct(_) | TypeExprKind::Name { .. }),
        _ => false,
    }
}

fn is_bare_type_name(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Ident(_) | ExprKind::Selector { .. } | ExprKind::Index { .. })
}

/// Reinterpret an expression that denotes a type
pub(crate) fn expr_to_type(expr: Expr) -> TypeExpr {
    let Expr { id, kind, span } = expr;
    let kind = match kind {
        ExprKind::Ident(name) => TypeExprKind::Name {
            pkg: None,
            name: Ident { id, name, span },
            args: Vec::new(),
        },
        ExprKind::Selector { base, field } => {
            let base = *base;
            let pkg_name = match base.kind {
                ExprKind::Ident(name) => name,
                _ => String::new(),
            };
            TypeExprKind::Name {
                pkg: Some(Ident {
                    id: base.id,
                    name: pkg_name,
                    span: base.span,
                }),
                name: field,
                args: Vec::new(),
            }
        }
        ExprKind::Index { base, indices } => {
            let base = expr_to_type(*base);
            let args = indices.into_iter().map(expr_to_type).collect();
            match base.kind {
                TypeExprKind::Name { pkg, name, .. } => TypeExprKind::Name { pkg, name, args },
                other => other,
            }
        }
        ExprKind::Unary { op: UnaryOp::Deref, operand } => TypeExprKind::Pointer(Box::new(expr_to_type(*operand))),
        ExprKind::Paren(inner) => return expr_to_type(*inner),
        ExprKind::Type(ty) => return *ty,
        _ => TypeExprKind::Name {
            pkg: None,
            name: Ident {
                id,
                name: "_".to_string(),
                span,
            },
            args: Vec::new(),
        },
    };
    TypeExpr { id, kind, span }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> File {
        parse_file(source, 0, "test.go", 0).unwrap().0
    }

    fn body_of(file: &File, index: usize) -> &Block {
        match &file.decls[index] {
            Decl::Func(func) => func.body.as_ref().unwrap(),
            _ => panic!("not a function"),
        }
    }

    #[test]
    fn test_package_and_imports() {
        let file = parse("package main\n\nimport (\n\t\"fmt\"\n\tctx \"context\"\n)\nimport \"sync\"\n");
        assert_eq!(file.package.name, "main");
        assert_eq!(file.imports.len(), 3);
        assert_eq!(file.imports[1].local_name(), "ctx");
        assert_eq!(file.imports[2].local_name(), "sync");
    }

    #[test]
    fn test_function_with_named_params() {
        let file = parse("package p\nfunc add(a, b int) int { return a + b }\n");
        let Decl::Func(func) = &file.decls[0] else { panic!() };
        assert_eq!(func.name.name, "add");
        assert_eq!(func.sig.params.len(), 1);
        assert_eq!(func.sig.params[0].names.len(), 2);
        assert_eq!(func.sig.results.len(), 1);
    }

    #[test]
    fn test_anonymous_params_and_variadic() {
        let file = parse("package p\nfunc f(int, string) (int, error)\nfunc g(format string, args ...any) {}\n");
        let Decl::Func(f) = &file.decls[0] else { panic!() };
        assert_eq!(f.sig.params.len(), 2);
        assert!(f.sig.params[0].names.is_empty());
        assert!(f.body.is_none());
        let Decl::Func(g) = &file.decls[1] else { panic!() };
        assert!(g.sig.variadic);
    }

    #[test]
    fn test_composite_literal_in_if_header() {
        let file = parse("package p\ntype T struct{ x int }\nfunc f(t T) bool {\n\tif t == (T{}) {\n\t\treturn true\n\t}\n\tfor _, v := range []int{1, 2} {\n\t\t_ = v\n\t}\n\treturn false\n}\n");
        let body = body_of(&file, 1);
        assert!(matches!(body.stmts[0].kind, StmtKind::If { .. }));
        assert!(matches!(body.stmts[1].kind, StmtKind::Range { define: true, .. }));
    }

    #[test]
    fn test_for_forms() {
        let file = parse("package p\nfunc f(ch chan int) {\n\tfor {}\n\tfor i := 0; i < 10; i++ {}\n\tfor x := range ch { _ = x }\n\tfor range ch {}\n\tfor ok := true; ok; {}\n}\n");
        let body = body_of(&file, 0);
        assert!(matches!(&body.stmts[0].kind, StmtKind::For { init: None, cond: None, post: None, .. }));
        assert!(matches!(&body.stmts[1].kind, StmtKind::For { init: Some(_), cond: Some(_), post: Some(_), .. }));
        assert!(matches!(&body.stmts[2].kind, StmtKind::Range { key: Some(_), value: None, .. }));
        assert!(matches!(&body.stmts[3].kind, StmtKind::Range { key: None, .. }));
        assert!(matches!(&body.stmts[4].kind, StmtKind::For { post: None, cond: Some(_), .. }));
    }

    #[test]
    fn test_switch_forms() {
        let file = parse(
            "package p\nfunc f(x any, n int) {\n\tswitch v := x.(type) {\n\tcase int, string:\n\t\t_ = v\n\tcase nil:\n\tdefault:\n\t}\n\tswitch {\n\tcase n > 1:\n\t\tfallthrough\n\tcase n > 0:\n\t}\n\tswitch y := n; y {\n\tcase 1:\n\t}\n}\n",
        );
        let body = body_of(&file, 0);
        match &body.stmts[0].kind {
            StmtKind::TypeSwitch { binding, cases, .. } => {
                assert_eq!(binding.as_ref().unwrap().name, "v");
                assert_eq!(cases.len(), 3);
                assert_eq!(cases[0].types.len(), 2);
                assert!(cases[2].is_default);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(&body.stmts[1].kind, StmtKind::Switch { tag: None, .. }));
        assert!(matches!(&body.stmts[2].kind, StmtKind::Switch { init: Some(_), tag: Some(_), .. }));
    }

    #[test]
    fn test_select_and_channels() {
        let file = parse("package p\nfunc f(a, b chan int, done <-chan struct{}) {\n\tselect {\n\tcase v := <-a:\n\t\tb <- v\n\tcase <-done:\n\t\treturn\n\tdefault:\n\t}\n}\n");
        let body = body_of(&file, 0);
        let StmtKind::Select { cases } = &body.stmts[0].kind else { panic!() };
        assert_eq!(cases.len(), 3);
        assert!(cases[2].is_default());
        assert!(matches!(cases[0].body[0].kind, StmtKind::Send { .. }));
    }

    #[test]
    fn test_generics() {
        let file = parse("package p\ntype Number interface { ~int | ~float64 }\nfunc Max[T Number](a, b T) T { if a > b { return a }; return b }\ntype List[T any] struct { items []T }\nvar x = Max[int](1, 2)\ntype A [4]int\n");
        let Decl::Func(max) = &file.decls[1] else { panic!() };
        assert_eq!(max.type_params.len(), 1);
        let Decl::Type(list) = &file.decls[2] else { panic!() };
        assert_eq!(list[0].type_params.len(), 1);
        let Decl::Type(array) = &file.decls[4] else { panic!() };
        assert!(array[0].type_params.is_empty());
        assert!(matches!(array[0].ty.kind, TypeExprKind::Array { .. }));
    }

    #[test]
    fn test_goroutines_defer_labels() {
        let file = parse("package p\nfunc f() {\n\tdefer func() { recover() }()\n\tgo work(1)\nouter:\n\tfor {\n\t\tbreak outer\n\t}\n\tgoto end\nend:\n}\n");
        let body = body_of(&file, 0);
        assert!(matches!(body.stmts[0].kind, StmtKind::Defer(_)));
        assert!(matches!(body.stmts[1].kind, StmtKind::Go(_)));
        assert!(matches!(body.stmts[2].kind, StmtKind::Labeled { .. }));
        assert!(matches!(body.stmts[3].kind, StmtKind::Goto(_)));
        assert!(matches!(body.stmts[4].kind, StmtKind::Labeled { .. }));
    }

    #[test]
    fn test_pragmas_and_build_constraint() {
        let file = parse("//go:build linux\n\npackage p\n\n//go:noinline\nfunc f() {}\n\nfunc g() {}\n");
        assert_eq!(file.build_constraint.as_deref(), Some("linux"));
        let Decl::Func(f) = &file.decls[0] else { panic!() };
        assert!(f.has_pragma("noinline"));
        let Decl::Func(g) = &file.decls[1] else { panic!() };
        assert!(!g.has_pragma("noinline"));
    }

    #[test]
    fn test_node_ids_are_unique() {
        let (file, next) = parse_file("package p\nfunc f(a []int) int { return a[0] + a[1] }\n", 0, "t.go", 100).unwrap();
        assert!(next > 100);
        let Decl::Func(f) = &file.decls[0] else { panic!() };
        assert!(f.id >= 100 && f.id < next);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse_file("package p\nfunc f() {\n", 0, "t.go", 0).is_err());
        assert!(parse_file("package p\nfunc f() { x := }\n", 0, "t.go", 0).is_err());
        assert!(parse_file("func f() {}\n", 0, "t.go", 0).is_err());
    }

    #[test]
    fn test_struct_and_interface_types() {
        let file = parse("package p\ntype S struct {\n\tsync.Mutex\n\t*Base\n\ta, b int `json:\"a\"`\n}\ntype I interface {\n\tfmt.Stringer\n\tRead(p []byte) (n int, err error)\n}\n");
        let Decl::Type(s) = &file.decls[0] else { panic!() };
        let TypeExprKind::Struct(fields) = &s[0].ty.kind else { panic!() };
        assert_eq!(fields.len(), 3);
        assert!(fields[0].names.is_empty());
        assert!(fields[1].names.is_empty());
        assert_eq!(fields[2].names.len(), 2);
        let Decl::Type(i) = &file.decls[1] else { panic!() };
        let TypeExprKind::Interface(elems) = &i[0].ty.kind else { panic!() };
        assert_eq!(elems.len(), 2);
    }
}
