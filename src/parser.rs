//! # Parser Module
//!
//! The parser transforms the lexer's token stream into an Abstract Syntax
//! Tree. It is a deterministic recursive-descent parser with one token of
//! lookahead and no backtracking: every block is introduced by a colon
//! followed by `Indent` and closed by `Dedent`, so the shape of the tree is
//! fully decided by the tokens already seen.
//!
//! ## Grammar sketch
//!
//! ```text
//! program   := (page | model | component | route | auth | roles)*
//! page      := "page" NAME ":" INDENT statement* DEDENT
//! statement := state | derived | fn | check | validate | prop | effect
//!            | api | layout | style | seo | type | component
//! layout    := element | "for" NAME "in" expr ":" block | "if" expr ":" block
//! ```
//!
//! Expressions use precedence climbing: ternary lowest, then logical,
//! equality, relational, additive, multiplicative, unary, postfix.
//!
//! ## Example
//!
//! ```rust
//! use lumen_lang::{lexer::tokenize, parser::parse};
//!
//! let tokens = tokenize("page Counter:\n  state count: int = 0\n").unwrap();
//! let program = parse(&tokens).unwrap();
//! ```

use crate::ast::*;
use crate::lexer::{tokenize, Span, StrPart, Token, TokenKind, LAYOUT_KEYWORDS};

/// Parse errors. The `expected` text names the acceptable token set at the
/// failure position.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Unexpected token `{found}`: expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        span: Span,
    },

    #[error("Unexpected end of input: expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("Invalid interpolated expression `{{{slot}}}`: {detail}")]
    InvalidInterpolation {
        slot: String,
        detail: String,
        span: Span,
    },
}

impl ParseError {
    /// Source span of the failure, when known.
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::InvalidInterpolation { span, .. } => Some(*span),
            ParseError::UnexpectedEof { .. } => None,
        }
    }
}

type PResult<T> = Result<T, ParseError>;

/// Parses a token stream into a [`Program`].
pub fn parse(tokens: &[Token]) -> PResult<Program> {
    if tokens.is_empty() {
        return Ok(Program { decls: Vec::new() });
    }
    Parser::new(tokens).parse_program()
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

const STATEMENT_SET: &str = "`state`, `derived`, `fn`, `check`, `validate`, `prop`, `on`, \
     `watch`, `api`, `layout`, `style`, `seo`, `type`, or `component`";

const TOPLEVEL_SET: &str = "`page`, `model`, `component`, `route`, `auth`, or `roles`";

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|t| t.span)
            .unwrap_or_default()
    }

    fn advance(&mut self) -> &'t Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn unexpected<T>(&self, expected: &str) -> PResult<T> {
        if matches!(self.peek(), TokenKind::Eof) {
            return Err(ParseError::UnexpectedEof {
                expected: expected.to_string(),
            });
        }
        Err(ParseError::UnexpectedToken {
            found: self.peek().to_string(),
            expected: expected.to_string(),
            span: self.span(),
        })
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            return true;
        }
        false
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> PResult<()> {
        if self.eat(&kind) {
            Ok(())
        } else {
            self.unexpected(expected)
        }
    }

    /// True if the next token is the word `w`.
    fn at_word(&self, w: &str) -> bool {
        matches!(self.peek(), TokenKind::Word(s) if s == w)
    }

    fn eat_word(&mut self, w: &str) -> bool {
        if self.at_word(w) {
            self.advance();
            return true;
        }
        false
    }

    fn expect_word(&mut self, expected: &str) -> PResult<String> {
        match self.peek() {
            TokenKind::Word(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => self.unexpected(expected),
        }
    }

    fn expect_newline(&mut self) -> PResult<()> {
        self.expect(TokenKind::Newline, "end of line")
    }

    /// Consumes `: <newline> <indent>` opening an indented block.
    fn open_block(&mut self) -> PResult<()> {
        self.expect(TokenKind::Colon, "`:`")?;
        self.expect_newline()?;
        self.expect(TokenKind::Indent, "an indented block")
    }

    fn at_block_end(&self) -> bool {
        matches!(self.peek(), TokenKind::Dedent | TokenKind::Eof)
    }

    fn close_block(&mut self) -> PResult<()> {
        self.expect(TokenKind::Dedent, "end of block")
    }

    // ---- top level ---------------------------------------------------

    fn parse_program(&mut self) -> PResult<Program> {
        let mut decls = Vec::new();
        loop {
            while self.eat(&TokenKind::Newline) {}
            if matches!(self.peek(), TokenKind::Eof) {
                break;
            }
            let span = self.span();
            let word = match self.peek() {
                TokenKind::Word(w) => w.clone(),
                _ => return self.unexpected(TOPLEVEL_SET),
            };
            match word.as_str() {
                "page" => {
                    self.advance();
                    decls.push(Decl::Page(self.parse_page(span)?));
                }
                "component" => {
                    self.advance();
                    decls.push(Decl::Component(self.parse_page(span)?));
                }
                "model" => {
                    self.advance();
                    decls.push(Decl::Model(self.parse_model(span)?));
                }
                "route" => {
                    self.advance();
                    decls.push(Decl::Route(self.parse_route(span)?));
                }
                "auth" => {
                    self.advance();
                    decls.push(Decl::Auth(self.parse_auth(span)?));
                }
                "roles" => {
                    self.advance();
                    decls.push(Decl::Roles(self.parse_roles(span)?));
                }
                _ => return self.unexpected(TOPLEVEL_SET),
            }
        }
        Ok(Program { decls })
    }

    // ---- pages and components ----------------------------------------

    fn parse_page(&mut self, span: Span) -> PResult<PageDecl> {
        let name = self.expect_word("a page name")?;
        let mut page = PageDecl::empty(name, span);
        self.open_block()?;
        while !self.at_block_end() {
            if self.eat(&TokenKind::Newline) {
                continue;
            }
            self.parse_page_statement(&mut page)?;
        }
        self.close_block()?;
        Ok(page)
    }

    fn parse_page_statement(&mut self, page: &mut PageDecl) -> PResult<()> {
        let span = self.span();
        let word = match self.peek() {
            TokenKind::Word(w) => w.clone(),
            _ => return self.unexpected(STATEMENT_SET),
        };
        match word.as_str() {
            "state" => {
                self.advance();
                let name = self.expect_word("a state variable name")?;
                self.expect(TokenKind::Colon, "`:` before the state type")?;
                let ty = self.parse_type()?;
                self.expect(TokenKind::Eq, "`=` before the initializer")?;
                let init = self.parse_expr()?;
                self.expect_newline()?;
                page.states.push(StateDecl { name, ty, init, span });
            }
            "derived" => {
                self.advance();
                let name = self.expect_word("a derived value name")?;
                self.expect(TokenKind::Eq, "`=` before the derived expression")?;
                let expr = self.parse_expr()?;
                self.expect_newline()?;
                page.derived.push(DerivedDecl { name, expr, span });
            }
            "fn" => {
                self.advance();
                let name = self.expect_word("a function name")?;
                self.expect(TokenKind::LParen, "`(`")?;
                let mut params = Vec::new();
                if !matches!(self.peek(), TokenKind::RParen) {
                    loop {
                        params.push(self.expect_word("a parameter name")?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen, "`)`")?;
                let body = self.parse_stmt_block()?;
                page.functions.push(FnDecl { name, params, body, span });
            }
            "check" | "validate" => {
                self.advance();
                let check = self.parse_check(word == "check", span)?;
                page.checks.push(check);
            }
            "prop" => {
                self.advance();
                let name = self.expect_word("a prop name")?;
                self.expect(TokenKind::Colon, "`:` before the prop type")?;
                let ty = self.parse_type()?;
                self.expect_newline()?;
                page.props.push(PropDecl { name, ty, span });
            }
            "on" => {
                self.advance();
                if !self.eat_word("mount") {
                    return self.unexpected("`mount`");
                }
                let body = self.parse_stmt_block()?;
                page.effects.push(EffectDecl::Mount { body, span });
            }
            "watch" => {
                self.advance();
                let target = self.expect_word("a state variable name")?;
                let body = self.parse_stmt_block()?;
                page.effects.push(EffectDecl::Watch { target, body, span });
            }
            "api" => {
                self.advance();
                let name = self.expect_word("an api name")?;
                let url = self.parse_expr()?;
                let awaited = self.eat_word("await");
                self.expect_newline()?;
                page.apis.push(ApiDecl { name, url, awaited, span });
            }
            "layout" => {
                self.advance();
                self.open_block()?;
                let mut children = Vec::new();
                while !self.at_block_end() {
                    if self.eat(&TokenKind::Newline) {
                        continue;
                    }
                    children.push(self.parse_layout_child()?);
                }
                self.close_block()?;
                page.layout = Some(children);
            }
            "style" | "seo" => {
                self.advance();
                let attrs = self.parse_attr_list()?;
                self.expect_newline()?;
                if word == "style" {
                    page.styles.extend(attrs);
                } else {
                    page.seo.extend(attrs);
                }
            }
            "type" => {
                self.advance();
                let name = self.expect_word("a type name")?;
                self.open_block()?;
                let mut fields = Vec::new();
                while !self.at_block_end() {
                    if self.eat(&TokenKind::Newline) {
                        continue;
                    }
                    fields.push(self.parse_field()?);
                }
                self.close_block()?;
                page.types.push(TypeDecl { name, fields, span });
            }
            "component" => {
                self.advance();
                page.components.push(self.parse_page(span)?);
            }
            _ => return self.unexpected(STATEMENT_SET),
        }
        Ok(())
    }

    fn parse_check(&mut self, is_check: bool, span: Span) -> PResult<CheckDecl> {
        let expr = self.parse_expr()?;
        let message = match self.peek() {
            TokenKind::Str(parts) => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        StrPart::Text(t) => text.push_str(t),
                        StrPart::Expr(_) => {
                            return self.unexpected("a plain string message (no interpolation)")
                        }
                    }
                }
                self.advance();
                text
            }
            _ => return self.unexpected("a string message after the condition"),
        };
        self.expect_newline()?;
        Ok(CheckDecl {
            kind: if is_check { CheckKind::Check } else { CheckKind::Validate },
            expr,
            message,
            span,
        })
    }

    // ---- models ------------------------------------------------------

    fn parse_model(&mut self, span: Span) -> PResult<ModelDecl> {
        let name = self.expect_word("a model name")?;
        let mut model = ModelDecl {
            name,
            fields: Vec::new(),
            validates: Vec::new(),
            permissions: Vec::new(),
            searchable: Vec::new(),
            sortable: Vec::new(),
            filterable: Vec::new(),
            span,
        };
        self.open_block()?;
        while !self.at_block_end() {
            if self.eat(&TokenKind::Newline) {
                continue;
            }
            let clause_span = self.span();
            match self.peek() {
                TokenKind::Word(w) if w == "validate" => {
                    self.advance();
                    let check = self.parse_check(false, clause_span)?;
                    model.validates.push(check);
                }
                TokenKind::Word(w) if w == "permission" => {
                    self.advance();
                    let action = match self.expect_word("`read`, `write`, or `delete`")?.as_str() {
                        "read" => PermAction::Read,
                        "write" => PermAction::Write,
                        "delete" => PermAction::Delete,
                        _ => return self.unexpected("`read`, `write`, or `delete`"),
                    };
                    let scope = self.expect_word("a permission scope")?;
                    self.expect_newline()?;
                    model.permissions.push(PermissionDecl { action, scope, span: clause_span });
                }
                TokenKind::Word(w) if matches!(w.as_str(), "search" | "sort" | "filter") => {
                    let clause = w.clone();
                    self.advance();
                    let mut fields = vec![self.expect_word("a field name")?];
                    while self.eat(&TokenKind::Comma) || matches!(self.peek(), TokenKind::Word(_)) {
                        fields.push(self.expect_word("a field name")?);
                    }
                    self.expect_newline()?;
                    match clause.as_str() {
                        "search" => model.searchable.extend(fields),
                        "sort" => model.sortable.extend(fields),
                        _ => model.filterable.extend(fields),
                    }
                }
                TokenKind::Word(_) => {
                    model.fields.push(self.parse_field()?);
                }
                _ => {
                    return self.unexpected(
                        "a field declaration, `validate`, `permission`, `search`, `sort`, or `filter`",
                    )
                }
            }
        }
        self.close_block()?;
        Ok(model)
    }

    /// `name: type [= default] [required] [unique]`
    fn parse_field(&mut self) -> PResult<FieldDecl> {
        let span = self.span();
        let name = self.expect_word("a field name")?;
        self.expect(TokenKind::Colon, "`:` before the field type")?;
        let ty = self.parse_type()?;
        let default = if self.eat(&TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let mut required = false;
        let mut unique = false;
        loop {
            if self.eat_word("required") {
                required = true;
            } else if self.eat_word("unique") {
                unique = true;
            } else {
                break;
            }
        }
        self.expect_newline()?;
        Ok(FieldDecl { name, ty, default, required, unique, span })
    }

    // ---- routes, auth, roles -----------------------------------------

    fn parse_route(&mut self, span: Span) -> PResult<RouteDecl> {
        let mut path = String::new();
        loop {
            match self.peek() {
                TokenKind::Slash => {
                    self.advance();
                    path.push('/');
                }
                TokenKind::Word(w) => {
                    path.push_str(w);
                    self.advance();
                }
                TokenKind::Colon => {
                    self.advance();
                    path.push(':');
                }
                TokenKind::Arrow => break,
                _ => return self.unexpected("a route path or `->`"),
            }
        }
        self.expect(TokenKind::Arrow, "`->`")?;
        let target = self.expect_word("a page name")?;
        self.expect_newline()?;
        Ok(RouteDecl { path, target, span })
    }

    fn parse_auth(&mut self, span: Span) -> PResult<AuthDecl> {
        self.open_block()?;
        let mut clauses = Vec::new();
        while !self.at_block_end() {
            if self.eat(&TokenKind::Newline) {
                continue;
            }
            let key = self.expect_word("an auth clause")?;
            let value = if matches!(self.peek(), TokenKind::Newline) {
                Expr::Bool(true)
            } else {
                self.parse_expr()?
            };
            self.expect_newline()?;
            clauses.push((key, value));
        }
        self.close_block()?;
        Ok(AuthDecl { clauses, span })
    }

    fn parse_roles(&mut self, span: Span) -> PResult<RolesDecl> {
        self.expect(TokenKind::Colon, "`:`")?;
        let mut roles = Vec::new();
        if matches!(self.peek(), TokenKind::Newline) {
            // Indented block form
            self.expect_newline()?;
            self.expect(TokenKind::Indent, "an indented role list")?;
            while !self.at_block_end() {
                if self.eat(&TokenKind::Newline) {
                    continue;
                }
                roles.push(self.expect_word("a role name")?);
                while self.eat(&TokenKind::Comma) {
                    roles.push(self.expect_word("a role name")?);
                }
            }
            self.close_block()?;
        } else {
            // Inline form: `roles: admin, editor, viewer`
            roles.push(self.expect_word("a role name")?);
            while self.eat(&TokenKind::Comma) {
                roles.push(self.expect_word("a role name")?);
            }
            self.expect_newline()?;
        }
        Ok(RolesDecl { roles, span })
    }

    // ---- statements --------------------------------------------------

    fn parse_stmt_block(&mut self) -> PResult<Vec<Stmt>> {
        self.open_block()?;
        let mut stmts = Vec::new();
        while !self.at_block_end() {
            if self.eat(&TokenKind::Newline) {
                continue;
            }
            stmts.push(self.parse_stmt()?);
        }
        self.close_block()?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let span = self.span();
        if self.at_word("if") {
            self.advance();
            let cond = self.parse_expr()?;
            let then = self.parse_stmt_block()?;
            let els = if self.at_word("else") {
                self.advance();
                self.parse_stmt_block()?
            } else {
                Vec::new()
            };
            return Ok(Stmt::If { cond, then, els, span });
        }
        let expr = self.parse_expr()?;
        if self.eat(&TokenKind::Eq) {
            let value = self.parse_expr()?;
            self.expect_newline()?;
            return Ok(Stmt::Assign { target: expr, value, span });
        }
        self.expect_newline()?;
        Ok(Stmt::Expr { expr, span })
    }

    // ---- layout ------------------------------------------------------

    fn parse_layout_child(&mut self) -> PResult<LayoutChild> {
        let span = self.span();
        if self.at_word("for") {
            self.advance();
            let var = self.expect_word("a loop variable")?;
            if !self.eat_word("in") {
                return self.unexpected("`in`");
            }
            let iter = self.parse_expr()?;
            let body = self.parse_layout_block()?;
            return Ok(LayoutChild::For { var, iter, body, span });
        }
        if self.at_word("if") {
            self.advance();
            let cond = self.parse_expr()?;
            let then = self.parse_layout_block()?;
            let els = if self.at_word("else") {
                self.advance();
                self.parse_layout_block()?
            } else {
                Vec::new()
            };
            return Ok(LayoutChild::If { cond, then, els, span });
        }
        Ok(LayoutChild::Node(self.parse_element()?))
    }

    fn parse_layout_block(&mut self) -> PResult<Vec<LayoutChild>> {
        self.open_block()?;
        let mut children = Vec::new();
        while !self.at_block_end() {
            if self.eat(&TokenKind::Newline) {
                continue;
            }
            children.push(self.parse_layout_child()?);
        }
        self.close_block()?;
        Ok(children)
    }

    /// True for words usable in element position: a layout keyword or a
    /// component reference (capitalized identifier).
    fn is_element_word(word: &str) -> bool {
        LAYOUT_KEYWORDS.contains(&word)
            || word.chars().next().is_some_and(|c| c.is_uppercase())
    }

    fn parse_element(&mut self) -> PResult<LayoutNode> {
        let span = self.span();
        let kind = match self.peek() {
            TokenKind::Word(w) if Self::is_element_word(w) => {
                let w = w.clone();
                self.advance();
                w
            }
            _ => {
                return self.unexpected(
                    "a layout element (`col`, `row`, `text`, `button`, ...), `for`, or `if`",
                )
            }
        };

        let mut node = LayoutNode {
            kind,
            arg: None,
            attrs: Vec::new(),
            events: Vec::new(),
            children: Vec::new(),
            span,
        };

        loop {
            match self.peek() {
                TokenKind::Newline => {
                    self.advance();
                    return Ok(node);
                }
                TokenKind::Colon => {
                    node.children = self.parse_layout_block()?;
                    return Ok(node);
                }
                TokenKind::Arrow => {
                    let ev_span = self.span();
                    self.advance();
                    let handler = self.parse_expr()?;
                    node.events.push(EventBinding { event: None, handler, span: ev_span });
                }
                TokenKind::Word(w) => {
                    let w = w.clone();
                    if matches!(self.peek_at(1), TokenKind::Eq) {
                        // `key=value` attribute
                        let attr_span = self.span();
                        self.advance();
                        self.advance();
                        let value = self.parse_expr()?;
                        node.attrs.push(Attr { key: w, value, span: attr_span });
                    } else if matches!(self.peek_at(1), TokenKind::Arrow) {
                        // Named event binding: `message -> onMessage(m)`
                        let ev_span = self.span();
                        self.advance();
                        self.advance();
                        let handler = self.parse_expr()?;
                        node.events.push(EventBinding { event: Some(w), handler, span: ev_span });
                    } else if node.arg.is_none() {
                        node.arg = Some(self.parse_expr()?);
                    } else {
                        return self.unexpected("`key=value`, `->`, `:` or end of line");
                    }
                }
                TokenKind::Str(_)
                | TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::LBracket
                | TokenKind::LParen
                | TokenKind::Minus => {
                    if node.arg.is_none() {
                        node.arg = Some(self.parse_expr()?);
                    } else {
                        return self.unexpected("`key=value`, `->`, `:` or end of line");
                    }
                }
                TokenKind::Eof => return Ok(node),
                _ => return self.unexpected("`key=value`, `->`, `:` or end of line"),
            }
        }
    }

    fn parse_attr_list(&mut self) -> PResult<Vec<Attr>> {
        let mut attrs = Vec::new();
        while let TokenKind::Word(w) = self.peek() {
            let key = w.clone();
            let span = self.span();
            self.advance();
            self.expect(TokenKind::Eq, "`=` after the attribute key")?;
            let value = self.parse_expr()?;
            attrs.push(Attr { key, value, span });
        }
        Ok(attrs)
    }

    // ---- types -------------------------------------------------------

    fn parse_type(&mut self) -> PResult<TypeExpr> {
        let word = self.expect_word("a type")?;
        Ok(match word.as_str() {
            "int" => TypeExpr::Int,
            "float" => TypeExpr::Float,
            "str" => TypeExpr::Str,
            "bool" => TypeExpr::Bool,
            "datetime" => TypeExpr::Datetime,
            "list" => {
                self.expect(TokenKind::LBracket, "`[` after `list`")?;
                let inner = self.parse_type()?;
                self.expect(TokenKind::RBracket, "`]`")?;
                TypeExpr::List(Box::new(inner))
            }
            _ => TypeExpr::Named(word),
        })
    }

    // ---- expressions -------------------------------------------------

    pub(crate) fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> PResult<Expr> {
        let cond = self.parse_or()?;
        if self.eat(&TokenKind::Question) {
            let then = self.parse_expr()?;
            self.expect(TokenKind::Colon, "`:` in ternary expression")?;
            let els = self.parse_expr()?;
            return Ok(Expr::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                els: Box::new(els),
            });
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::OrOr) || self.eat_word("or") {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary { op: BinOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&TokenKind::AndAnd) || self.eat_word("and") {
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary { op: BinOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = if self.eat(&TokenKind::EqEq) {
                BinOp::Eq
            } else if self.eat(&TokenKind::NotEq) {
                BinOp::Ne
            } else {
                break;
            };
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = if self.eat(&TokenKind::Le) {
                BinOp::Le
            } else if self.eat(&TokenKind::Ge) {
                BinOp::Ge
            } else if self.eat(&TokenKind::Lt) {
                BinOp::Lt
            } else if self.eat(&TokenKind::Gt) {
                BinOp::Gt
            } else {
                break;
            };
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = if self.eat(&TokenKind::Plus) {
                BinOp::Add
            } else if self.eat(&TokenKind::Minus) {
                BinOp::Sub
            } else {
                break;
            };
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.eat(&TokenKind::Star) {
                BinOp::Mul
            } else if self.eat(&TokenKind::Slash) {
                BinOp::Div
            } else if self.eat(&TokenKind::Percent) {
                BinOp::Mod
            } else {
                break;
            };
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        if self.eat(&TokenKind::Minus) {
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary { op: UnaryOp::Neg, expr: Box::new(expr) });
        }
        if self.eat(&TokenKind::Bang) || self.eat_word("not") {
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary { op: UnaryOp::Not, expr: Box::new(expr) });
        }
        if self.at_word("await") {
            self.advance();
            let expr = self.parse_unary()?;
            return Ok(Expr::Await(Box::new(expr)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_word("a member name")?;
                    expr = Expr::Member(Box::new(expr), name);
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !matches!(self.peek(), TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen, "`)`")?;
                    expr = Expr::Call { callee: Box::new(expr), args };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket, "`]`")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let span = self.span();
        match self.peek().clone() {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::Int(n))
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Expr::Float(n))
            }
            TokenKind::Str(parts) => {
                self.advance();
                let mut segs = Vec::new();
                for part in parts {
                    match part {
                        StrPart::Text(t) => segs.push(StrSeg::Text(t)),
                        StrPart::Expr(slot) => {
                            let expr = parse_embedded_expr(&slot, span)?;
                            segs.push(StrSeg::Expr(Box::new(expr)));
                        }
                    }
                }
                Ok(Expr::Str(segs))
            }
            TokenKind::Word(w) => match w.as_str() {
                "true" => {
                    self.advance();
                    Ok(Expr::Bool(true))
                }
                "false" => {
                    self.advance();
                    Ok(Expr::Bool(false))
                }
                _ => {
                    // `x => expr` lambda shorthand
                    if matches!(self.peek_at(1), TokenKind::FatArrow) {
                        self.advance();
                        self.advance();
                        let body = self.parse_expr()?;
                        return Ok(Expr::Lambda { param: w, body: Box::new(body) });
                    }
                    self.advance();
                    Ok(Expr::Ident(w))
                }
            },
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !matches!(self.peek(), TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket, "`]`")?;
                Ok(Expr::List(items))
            }
            _ => self.unexpected("an expression"),
        }
    }
}

/// Parses the raw text of an interpolation slot into an expression. Slots
/// are single-line, so the embedded tokenizer sees exactly one logical line.
fn parse_embedded_expr(slot: &str, span: Span) -> PResult<Expr> {
    let tokens = tokenize(slot).map_err(|e| ParseError::InvalidInterpolation {
        slot: slot.to_string(),
        detail: e.to_string(),
        span,
    })?;
    let mut parser = Parser::new(&tokens);
    let expr = parser.parse_expr().map_err(|e| ParseError::InvalidInterpolation {
        slot: slot.to_string(),
        detail: e.to_string(),
        span,
    })?;
    match parser.peek() {
        TokenKind::Newline | TokenKind::Eof => Ok(expr),
        other => Err(ParseError::InvalidInterpolation {
            slot: slot.to_string(),
            detail: format!("trailing `{}` after expression", other),
            span,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn parse_src(src: &str) -> Program {
        parse(&tokenize(src).unwrap()).unwrap()
    }

    fn parse_err(src: &str) -> ParseError {
        parse(&tokenize(src).unwrap()).unwrap_err()
    }

    fn first_page(program: &Program) -> &PageDecl {
        match &program.decls[0] {
            Decl::Page(p) => p,
            other => panic!("expected page, got {:?}", other),
        }
    }

    #[test]
    fn parses_state_and_derived() {
        let program = parse_src("page Counter:\n  state count: int = 0\n  derived doubled = count * 2\n");
        let page = first_page(&program);
        assert_eq!(page.states.len(), 1);
        assert_eq!(page.states[0].name, "count");
        assert_eq!(page.states[0].ty, TypeExpr::Int);
        assert_eq!(page.derived[0].name, "doubled");
        assert_eq!(
            page.derived[0].expr,
            Expr::Binary {
                op: BinOp::Mul,
                lhs: Box::new(Expr::Ident("count".into())),
                rhs: Box::new(Expr::Int(2)),
            }
        );
    }

    #[test]
    fn parses_function_with_body() {
        let program = parse_src(
            "page P:\n  state count: int = 0\n  fn increment():\n    count = count + 1\n",
        );
        let page = first_page(&program);
        assert_eq!(page.functions.len(), 1);
        assert_eq!(page.functions[0].name, "increment");
        assert!(matches!(page.functions[0].body[0], Stmt::Assign { .. }));
    }

    #[test]
    fn parses_layout_with_event_binding() {
        let program = parse_src(
            "page P:\n  layout:\n    col gap=16:\n      text \"hi\" size=24\n      button \"Go\" -> go()\n",
        );
        let page = first_page(&program);
        let layout = page.layout.as_ref().unwrap();
        let LayoutChild::Node(col) = &layout[0] else { panic!() };
        assert_eq!(col.kind, "col");
        assert_eq!(col.attrs[0].key, "gap");
        assert_eq!(col.children.len(), 2);
        let LayoutChild::Node(button) = &col.children[1] else { panic!() };
        assert_eq!(button.events.len(), 1);
        assert!(matches!(
            button.events[0].handler,
            Expr::Call { .. }
        ));
    }

    #[test]
    fn parses_for_and_if_wrappers() {
        let program = parse_src(
            "page P:\n  state items: list[str] = []\n  layout:\n    for item in items:\n      text \"{item}\"\n    if items.length > 0:\n      text \"has items\"\n    else:\n      text \"empty\"\n",
        );
        let page = first_page(&program);
        let layout = page.layout.as_ref().unwrap();
        assert!(matches!(&layout[0], LayoutChild::For { var, .. } if var == "item"));
        assert!(matches!(&layout[1], LayoutChild::If { els, .. } if els.len() == 1));
    }

    #[test]
    fn parses_model_with_clauses() {
        let program = parse_src(
            "model Task:\n  title: str required\n  done: bool = false\n  permission read all\n  permission write owner\n  search title\n  sort title, done\n  validate title.length > 0 \"Title required\"\n",
        );
        let Decl::Model(model) = &program.decls[0] else { panic!() };
        assert_eq!(model.fields.len(), 2);
        assert!(model.fields[0].required);
        assert_eq!(model.fields[1].default, Some(Expr::Bool(false)));
        assert_eq!(model.permissions.len(), 2);
        assert_eq!(model.searchable, vec!["title"]);
        assert_eq!(model.sortable, vec!["title", "done"]);
        assert_eq!(model.validates[0].message, "Title required");
    }

    #[test]
    fn parses_route_auth_roles() {
        let program = parse_src(
            "route /tasks/:id -> TaskPage\nauth:\n  provider email\n  redirect \"/login\"\nroles: admin, editor, viewer\n",
        );
        let Decl::Route(route) = &program.decls[0] else { panic!() };
        assert_eq!(route.path, "/tasks/:id");
        assert_eq!(route.target, "TaskPage");
        let Decl::Auth(auth) = &program.decls[1] else { panic!() };
        assert_eq!(auth.clauses[0].0, "provider");
        let Decl::Roles(roles) = &program.decls[2] else { panic!() };
        assert_eq!(roles.roles, vec!["admin", "editor", "viewer"]);
    }

    #[test]
    fn parses_effects_and_api() {
        let program = parse_src(
            "page P:\n  state data: list[str] = []\n  state loading: bool = false\n  api fetchTasks \"/api/tasks\" await\n  on mount:\n    loading = true\n    data = await fetchTasks()\n    loading = false\n  watch data:\n    log(data)\n",
        );
        let page = first_page(&program);
        assert_eq!(page.apis.len(), 1);
        assert!(page.apis[0].awaited);
        assert_eq!(page.effects.len(), 2);
        let EffectDecl::Mount { body, .. } = &page.effects[0] else { panic!() };
        assert_eq!(body.len(), 3);
        assert!(matches!(&page.effects[1], EffectDecl::Watch { target, .. } if target == "data"));
    }

    #[test]
    fn parses_interpolated_string_expression() {
        let program = parse_src("page P:\n  state n: int = 1\n  derived label = \"n is {n + 1}\"\n");
        let page = first_page(&program);
        let Expr::Str(segs) = &page.derived[0].expr else { panic!() };
        assert_eq!(segs.len(), 2);
        assert!(matches!(&segs[1], StrSeg::Expr(e) if matches!(**e, Expr::Binary { .. })));
    }

    #[test]
    fn parses_collection_method_chain() {
        let program = parse_src("page P:\n  state items: list[int] = []\n  derived evens = items.filter(x => x % 2 == 0).length\n");
        let page = first_page(&program);
        let Expr::Member(inner, name) = &page.derived[0].expr else { panic!() };
        assert_eq!(name, "length");
        assert!(matches!(**inner, Expr::Call { .. }));
    }

    #[test]
    fn ternary_has_lowest_precedence() {
        let program = parse_src("page P:\n  state n: int = 0\n  derived sign = n > 0 ? 1 : 0 - 1\n");
        let page = first_page(&program);
        assert!(matches!(&page.derived[0].expr, Expr::Ternary { cond, .. }
            if matches!(**cond, Expr::Binary { op: BinOp::Gt, .. })));
    }

    #[test]
    fn unknown_statement_keyword_names_expected_set() {
        let err = parse_err("page P:\n  shout \"hi\"\n");
        let ParseError::UnexpectedToken { found, expected, .. } = err else { panic!() };
        assert_eq!(found, "shout");
        assert!(expected.contains("`state`"));
        assert!(expected.contains("`layout`"));
    }

    #[test]
    fn unknown_toplevel_keyword_names_expected_set() {
        let err = parse_err("widget W:\n  state x: int = 0\n");
        let ParseError::UnexpectedToken { expected, .. } = err else { panic!() };
        assert!(expected.contains("`page`"));
        assert!(expected.contains("`roles`"));
    }

    #[test]
    fn nested_component_parses() {
        let program = parse_src(
            "page P:\n  component Card:\n    prop title: str\n    layout:\n      text \"{title}\"\n  layout:\n    Card title=\"hello\"\n",
        );
        let page = first_page(&program);
        assert_eq!(page.components.len(), 1);
        assert_eq!(page.components[0].props[0].name, "title");
        let layout = page.layout.as_ref().unwrap();
        assert!(matches!(&layout[0], LayoutChild::Node(n) if n.kind == "Card"));
    }

    #[test]
    fn realtime_named_event_bindings() {
        let program = parse_src(
            "page P:\n  fn onMsg(m):\n    log(m)\n  layout:\n    realtime channel=\"updates\" message -> onMsg(m)\n",
        );
        let page = first_page(&program);
        let layout = page.layout.as_ref().unwrap();
        let LayoutChild::Node(rt) = &layout[0] else { panic!() };
        assert_eq!(rt.kind, "realtime");
        assert_eq!(rt.events[0].event.as_deref(), Some("message"));
    }
}
