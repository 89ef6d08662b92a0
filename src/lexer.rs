//! # Lexer Module
//!
//! The lexer tokenizes Lumen source code. Individual tokens are recognized
//! with nom combinators; around them a line-driven scanner turns significant
//! indentation into explicit `Indent`/`Dedent` tokens, so the parser never
//! has to look at whitespace.
//!
//! ## Token Categories
//!
//! - **Words**: identifiers and keywords (`page`, `state`, `derived`, ...).
//!   Keyword-ness is contextual in Lumen (`filter` is a model clause *and* a
//!   collection method), so words are classified by the parser; the lexer
//!   only exposes [`keyword_class`] for tooling such as highlighters.
//! - **Literals**: integers, floats, interpolated strings
//! - **Operators**: arithmetic, comparison, logical, the event arrow `->`
//! - **Structure**: `Colon`, `Newline`, `Indent`, `Dedent`
//!
//! ## Example
//!
//! ```rust
//! use lumen_lang::lexer::tokenize;
//!
//! let tokens = tokenize("page Counter:\n  state count: int = 0\n").unwrap();
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{map, recognize, value},
    sequence::pair,
    IResult,
};
use std::fmt;

/// Represents a position in source code as a byte offset range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    /// Creates a new span from start and end byte offsets.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Creates a span covering a single point.
    pub fn point(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// Creates a span that combines two spans.
    pub fn merge(self, other: Span) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Converts the start offset to 1-indexed line and column.
    pub fn to_line_col(&self, source: &str) -> (usize, usize) {
        let mut line = 1;
        let mut col = 1;
        for (i, ch) in source.char_indices() {
            if i >= self.start {
                break;
            }
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        (line, col)
    }
}

/// One run of an interpolated string literal.
///
/// `"Hello {user.name}!"` lexes to `[Text("Hello "), Expr("user.name"),
/// Text("!")]`. The slot payload is raw text; the parser turns it into an
/// expression. Non-Latin text passes through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum StrPart {
    /// Literal text run
    Text(String),
    /// An embedded `{expr}` slot, unparsed
    Expr(String),
}

/// Token types in Lumen.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or keyword (classified contextually by the parser)
    Word(String),
    /// Interpolated string literal
    Str(Vec<StrPart>),
    /// Integer literal
    Int(i64),
    /// Floating-point literal
    Float(f64),

    // Operators
    Arrow,   // -> (event binding)
    FatArrow, // => (lambda shorthand)
    EqEq,    // ==
    NotEq,   // !=
    Le,      // <=
    Ge,      // >=
    Lt,      // <
    Gt,      // >
    AndAnd,  // &&
    OrOr,    // ||
    Bang,    // !
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Percent, // %
    Eq,      // =
    Question, // ?

    // Delimiters
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Dot,      // .
    Colon,    // :

    // Structure
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Word(s) => write!(f, "{}", s),
            TokenKind::Str(_) => write!(f, "string literal"),
            TokenKind::Int(n) => write!(f, "{}", n),
            TokenKind::Float(n) => write!(f, "{}", n),
            TokenKind::Arrow => write!(f, "->"),
            TokenKind::FatArrow => write!(f, "=>"),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::NotEq => write!(f, "!="),
            TokenKind::Le => write!(f, "<="),
            TokenKind::Ge => write!(f, ">="),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::AndAnd => write!(f, "&&"),
            TokenKind::OrOr => write!(f, "||"),
            TokenKind::Bang => write!(f, "!"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Eq => write!(f, "="),
            TokenKind::Question => write!(f, "?"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Newline => write!(f, "<newline>"),
            TokenKind::Indent => write!(f, "<indent>"),
            TokenKind::Dedent => write!(f, "<dedent>"),
            TokenKind::Eof => write!(f, "EOF"),
        }
    }
}

/// A token with its span information.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Lexical errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("Unterminated string literal at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },

    #[error("Illegal character {ch:?} at line {line}, column {column}")]
    IllegalCharacter { ch: char, line: usize, column: usize },

    #[error(
        "Inconsistent indentation at line {line}: width {width} does not match any enclosing block"
    )]
    InconsistentIndentation { line: usize, width: usize },
}

/// Keyword classes for tooling (syntax highlighting, completion).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordClass {
    /// Top-level declaration keywords (`page`, `model`, ...)
    Declaration,
    /// Statement keywords inside a body (`state`, `derived`, ...)
    Statement,
    /// Layout container/element keywords (`col`, `text`, `button`, ...)
    Layout,
    /// Control keywords (`for`, `in`, `if`, `else`, `on`, `mount`, ...)
    Control,
    /// Literal words (`true`, `false`)
    Literal,
}

/// Top-level declaration keywords.
pub const DECL_KEYWORDS: &[&str] = &["page", "model", "component", "route", "auth", "roles"];

/// Statement keywords valid inside a page/component/model body.
pub const STMT_KEYWORDS: &[&str] = &[
    "state", "derived", "fn", "check", "validate", "permission", "search", "sort", "filter",
    "api", "layout", "prop", "style", "seo", "type", "on", "watch", "component",
];

/// Layout container and element keywords.
pub const LAYOUT_KEYWORDS: &[&str] = &[
    "col", "row", "grid", "text", "button", "input", "toggle", "image", "select", "table",
    "chart", "nav", "stat", "modal", "toast", "upload", "realtime", "form", "field", "submit",
    "hero", "crud", "stats", "breadcrumb", "drawer", "mobile", "media", "social", "pay",
    "confirm", "animate",
];

/// Classifies a word for tooling purposes. Returns `None` for plain
/// identifiers. Classification here is advisory: the parser decides
/// keyword-ness from context.
pub fn keyword_class(word: &str) -> Option<KeywordClass> {
    if DECL_KEYWORDS.contains(&word) {
        return Some(KeywordClass::Declaration);
    }
    if STMT_KEYWORDS.contains(&word) {
        return Some(KeywordClass::Statement);
    }
    if LAYOUT_KEYWORDS.contains(&word) {
        return Some(KeywordClass::Layout);
    }
    match word {
        "for" | "in" | "if" | "else" | "mount" | "await" | "and" | "or" | "not" => {
            Some(KeywordClass::Control)
        }
        "true" | "false" => Some(KeywordClass::Literal),
        _ => None,
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn word(input: &str) -> IResult<&str, TokenKind> {
    map(
        recognize(pair(
            take_while1(is_ident_start),
            take_while(is_ident_continue),
        )),
        |s: &str| TokenKind::Word(s.to_string()),
    )(input)
}

fn float(input: &str) -> IResult<&str, TokenKind> {
    map(
        recognize(pair(digit1, pair(char('.'), digit1))),
        |s: &str| TokenKind::Float(s.parse().unwrap_or(0.0)),
    )(input)
}

fn integer(input: &str) -> IResult<&str, TokenKind> {
    map(digit1, |s: &str| TokenKind::Int(s.parse().unwrap_or(0)))(input)
}

fn operator(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::Arrow, tag("->")),
        value(TokenKind::FatArrow, tag("=>")),
        value(TokenKind::EqEq, tag("==")),
        value(TokenKind::NotEq, tag("!=")),
        value(TokenKind::Le, tag("<=")),
        value(TokenKind::Ge, tag(">=")),
        value(TokenKind::AndAnd, tag("&&")),
        value(TokenKind::OrOr, tag("||")),
        value(TokenKind::Lt, tag("<")),
        value(TokenKind::Gt, tag(">")),
        value(TokenKind::Bang, tag("!")),
        value(TokenKind::Plus, tag("+")),
        value(TokenKind::Minus, tag("-")),
        value(TokenKind::Star, tag("*")),
        value(TokenKind::Slash, tag("/")),
        value(TokenKind::Percent, tag("%")),
        value(TokenKind::Eq, tag("=")),
        value(TokenKind::Question, tag("?")),
    ))(input)
}

fn delimiter(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
        value(TokenKind::LBracket, char('[')),
        value(TokenKind::RBracket, char(']')),
        value(TokenKind::Comma, char(',')),
        value(TokenKind::Dot, char('.')),
        value(TokenKind::Colon, char(':')),
    ))(input)
}

/// Recognizes a single non-string token.
fn simple_token(input: &str) -> IResult<&str, TokenKind> {
    alt((float, integer, word, operator, delimiter))(input)
}

/// The indentation-aware lexer state.
struct Lexer<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    /// Stack of enclosing indentation widths; the bottom entry is 0.
    indents: Vec<usize>,
}

impl<'src> Lexer<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            source,
            tokens: Vec::new(),
            indents: vec![0],
        }
    }

    fn line_col(&self, offset: usize) -> (usize, usize) {
        Span::point(offset).to_line_col(self.source)
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token::new(kind, Span::new(start, end)));
    }

    /// Applies the indentation rule for a line whose content starts at
    /// `offset` with leading width `width`.
    fn handle_indent(&mut self, width: usize, offset: usize) -> Result<(), LexError> {
        let current = *self.indents.last().unwrap_or(&0);
        if width > current {
            self.indents.push(width);
            self.push(TokenKind::Indent, offset, offset);
        } else if width < current {
            while *self.indents.last().unwrap_or(&0) > width {
                self.indents.pop();
                self.push(TokenKind::Dedent, offset, offset);
            }
            if *self.indents.last().unwrap_or(&0) != width {
                let (line, _) = self.line_col(offset);
                return Err(LexError::InconsistentIndentation { line, width });
            }
        }
        Ok(())
    }

    /// Lexes one interpolated string literal starting at the opening quote.
    /// Returns the byte length consumed, including both quotes.
    fn lex_string(&mut self, rest: &str, offset: usize) -> Result<usize, LexError> {
        debug_assert!(rest.starts_with('"'));
        let mut parts: Vec<StrPart> = Vec::new();
        let mut text = String::new();
        let mut chars = rest.char_indices().skip(1).peekable();

        while let Some((i, ch)) = chars.next() {
            match ch {
                '"' => {
                    if !text.is_empty() || parts.is_empty() {
                        parts.push(StrPart::Text(text));
                    }
                    self.push(TokenKind::Str(parts), offset, offset + i + 1);
                    return Ok(i + 1);
                }
                '\n' => break,
                '\\' => match chars.next() {
                    Some((_, 'n')) => text.push('\n'),
                    Some((_, 't')) => text.push('\t'),
                    Some((_, '"')) => text.push('"'),
                    Some((_, '\\')) => text.push('\\'),
                    Some((_, other)) => {
                        text.push('\\');
                        text.push(other);
                    }
                    None => break,
                },
                '{' => {
                    // `{{` is a literal brace
                    if matches!(chars.peek(), Some((_, '{'))) {
                        chars.next();
                        text.push('{');
                        continue;
                    }
                    if !text.is_empty() {
                        parts.push(StrPart::Text(std::mem::take(&mut text)));
                    }
                    let mut depth = 1usize;
                    let mut slot = String::new();
                    let mut closed = false;
                    for (_, sc) in chars.by_ref() {
                        match sc {
                            '{' => {
                                depth += 1;
                                slot.push(sc);
                            }
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    closed = true;
                                    break;
                                }
                                slot.push(sc);
                            }
                            '\n' => break,
                            _ => slot.push(sc),
                        }
                    }
                    if !closed {
                        break;
                    }
                    parts.push(StrPart::Expr(slot));
                }
                '}' => {
                    if matches!(chars.peek(), Some((_, '}'))) {
                        chars.next();
                    }
                    text.push('}');
                }
                _ => text.push(ch),
            }
        }
        let (line, column) = self.line_col(offset);
        Err(LexError::UnterminatedString { line, column })
    }

    /// Lexes the content of one line (indentation already consumed).
    fn lex_line(&mut self, line: &str, line_start: usize) -> Result<(), LexError> {
        let mut rest = line;
        loop {
            let trimmed = rest.trim_start_matches([' ', '\t']);
            let offset = line_start + (line.len() - trimmed.len());
            rest = trimmed;
            if rest.is_empty() || rest.starts_with('#') {
                return Ok(());
            }
            if rest.starts_with('"') {
                let consumed = self.lex_string(rest, offset)?;
                rest = &rest[consumed..];
                continue;
            }
            match simple_token(rest) {
                Ok((remaining, kind)) => {
                    let end = offset + (rest.len() - remaining.len());
                    self.push(kind, offset, end);
                    rest = remaining;
                }
                Err(_) => {
                    let ch = rest.chars().next().unwrap_or('\0');
                    let (line, column) = self.line_col(offset);
                    return Err(LexError::IllegalCharacter { ch, line, column });
                }
            }
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        let mut pos = 0usize;
        for raw_line in self.source.split('\n') {
            let line_start = pos;
            pos += raw_line.len() + 1;
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

            // Leading indentation: spaces only. Tabs are rejected so widths
            // stay comparable.
            let mut width = 0usize;
            for ch in line.chars() {
                match ch {
                    ' ' => width += 1,
                    '\t' => {
                        let (l, c) = self.line_col(line_start + width);
                        return Err(LexError::IllegalCharacter {
                            ch: '\t',
                            line: l,
                            column: c,
                        });
                    }
                    _ => break,
                }
            }
            let content = &line[width..];
            if content.is_empty() || content.starts_with('#') {
                continue;
            }

            self.handle_indent(width, line_start + width)?;
            self.lex_line(content, line_start + width)?;
            let line_end = line_start + line.len();
            self.push(TokenKind::Newline, line_end, line_end);
        }

        // Close any open blocks.
        let end = self.source.len();
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, end, end);
        }
        self.push(TokenKind::Eof, end, end);
        Ok(self.tokens)
    }
}

/// Tokenizes Lumen source code.
///
/// Pure function of its input: the same source always yields the same token
/// stream. Every `Indent` in the result has a matching `Dedent`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    log::trace!("tokenize: {} bytes", source.len());
    Lexer::new(source).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_flat_line() {
        assert_eq!(
            kinds("state count: int = 0"),
            vec![
                TokenKind::Word("state".into()),
                TokenKind::Word("count".into()),
                TokenKind::Colon,
                TokenKind::Word("int".into()),
                TokenKind::Eq,
                TokenKind::Int(0),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn indent_and_dedent_are_balanced() {
        let toks = kinds("page P:\n  state a: int = 1\n  state b: int = 2\n");
        let indents = toks.iter().filter(|k| **k == TokenKind::Indent).count();
        let dedents = toks.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(indents, 1);
        assert_eq!(indents, dedents);
    }

    #[test]
    fn nested_blocks_close_at_eof() {
        let toks = kinds("page P:\n  layout:\n    col:\n      text \"hi\"\n");
        let indents = toks.iter().filter(|k| **k == TokenKind::Indent).count();
        let dedents = toks.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(indents, 3);
        assert_eq!(dedents, 3);
    }

    #[test]
    fn inconsistent_indentation_is_rejected() {
        let err = tokenize("page P:\n    state a: int = 1\n  state b: int = 2\n").unwrap_err();
        assert!(matches!(err, LexError::InconsistentIndentation { line: 3, .. }));
    }

    #[test]
    fn string_interpolation_slots() {
        let toks = tokenize("text \"Count: {count * 2}!\"").unwrap();
        let TokenKind::Str(parts) = &toks[1].kind else {
            panic!("expected string, got {:?}", toks[1].kind);
        };
        assert_eq!(
            parts,
            &vec![
                StrPart::Text("Count: ".into()),
                StrPart::Expr("count * 2".into()),
                StrPart::Text("!".into()),
            ]
        );
    }

    #[test]
    fn doubled_braces_are_literal() {
        let toks = tokenize("text \"a {{b}} c\"").unwrap();
        let TokenKind::Str(parts) = &toks[1].kind else {
            panic!("expected string");
        };
        assert_eq!(parts, &vec![StrPart::Text("a {b} c".into())]);
    }

    #[test]
    fn unicode_payload_passes_through() {
        let toks = tokenize("text \"こんにちは {name} 🌍\"").unwrap();
        let TokenKind::Str(parts) = &toks[1].kind else {
            panic!("expected string");
        };
        assert_eq!(parts[0], StrPart::Text("こんにちは ".into()));
        assert_eq!(parts[2], StrPart::Text(" 🌍".into()));
    }

    #[test]
    fn unterminated_string_is_a_lex_error() {
        let err = tokenize("text \"oops\n").unwrap_err();
        assert!(matches!(err, LexError::UnterminatedString { line: 1, .. }));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let toks = kinds("# heading\n\npage P:\n  # inner\n  state a: int = 1\n");
        assert_eq!(toks[0], TokenKind::Word("page".into()));
        assert!(!toks
            .iter()
            .any(|k| matches!(k, TokenKind::Word(w) if w == "heading" || w == "inner")));
    }

    #[test]
    fn arrow_binds_tighter_than_minus_gt_sequence() {
        assert_eq!(
            kinds("button \"Go\" -> go()")[2..5],
            [
                TokenKind::Arrow,
                TokenKind::Word("go".into()),
                TokenKind::LParen,
            ]
        );
    }

    #[test]
    fn spans_map_to_line_and_column() {
        let src = "page P:\n  state a: int = 1\n";
        let toks = tokenize(src).unwrap();
        let state = toks
            .iter()
            .find(|t| t.kind == TokenKind::Word("state".into()))
            .unwrap();
        assert_eq!(state.span.to_line_col(src), (2, 3));
    }

    #[test]
    fn keyword_classes_for_tooling() {
        assert_eq!(keyword_class("page"), Some(KeywordClass::Declaration));
        assert_eq!(keyword_class("derived"), Some(KeywordClass::Statement));
        assert_eq!(keyword_class("toggle"), Some(KeywordClass::Layout));
        assert_eq!(keyword_class("for"), Some(KeywordClass::Control));
        assert_eq!(keyword_class("total"), None);
    }
}
