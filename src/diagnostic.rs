//! # Diagnostics
//!
//! Rust-style terminal diagnostics for compilation failures:
//!
//! ```text
//! error[ParseError]: Unexpected token `=`: expected a statement keyword
//!   --> counter.lum:2:9
//!    |
//!  2 |   state = 3
//!    |         ^ unexpected here
//!    |
//! ```
//!
//! Compilation is fail-fast, so a run produces at most one diagnostic.

use crate::driver::CompileError;
use crate::lexer::Span;
use std::fmt;

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Severity::Error => "\x1b[1;31m",
            Severity::Warning => "\x1b[1;33m",
            Severity::Note => "\x1b[1;36m",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A label attached to a span in the source code.
#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

/// A diagnostic message with optional source labels and help text.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Error taxonomy name (`LexError`, `ParseError`, ...).
    pub code: Option<String>,
    pub message: String,
    pub labels: Vec<Label>,
    pub help: Vec<String>,
    pub filename: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            labels: Vec::new(),
            help: Vec::new(),
            filename: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label {
            span,
            message: message.into(),
        });
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }

    /// Builds the diagnostic for a compilation failure, with a source label
    /// when the failing stage recorded a position.
    pub fn from_compile_error(err: &CompileError, source: &str) -> Self {
        let mut diag = Diagnostic::error(err.message()).with_code(err.kind());
        if let CompileError::Parse(parse) = err {
            if let Some(span) = parse.span() {
                diag = diag.with_label(span, "unexpected here");
            }
        } else if let Some((line, col)) = err.line_col(source) {
            if let Some(offset) = offset_of(source, line, col) {
                diag = diag.with_label(Span::new(offset, offset + 1), "");
            }
        }
        match err {
            CompileError::Semantic(inner) => {
                let text = inner.to_string();
                if text.contains("undefined identifier") {
                    diag = diag
                        .with_help("declare it with `state`, `derived`, or `fn` before use");
                } else if text.contains("cycle") {
                    diag = diag.with_help(
                        "derived values may only read states, props, and earlier derived values",
                    );
                }
            }
            CompileError::Lex(crate::lexer::LexError::InconsistentIndentation { .. }) => {
                diag = diag.with_help("every level of a block must use the same indent width");
            }
            _ => {}
        }
        diag
    }
}

fn offset_of(source: &str, line: usize, col: usize) -> Option<usize> {
    let line_text = source.lines().nth(line.saturating_sub(1))?;
    let mut line_start = 0;
    for (idx, text) in source.lines().enumerate() {
        if idx + 1 == line {
            break;
        }
        line_start += text.len() + 1;
    }
    let col_offset: usize = line_text
        .chars()
        .take(col.saturating_sub(1))
        .map(char::len_utf8)
        .sum();
    Some(line_start + col_offset)
}

const RESET: &str = "\x1b[0m";
const BOLD_BLUE: &str = "\x1b[1;34m";
const BOLD_WHITE: &str = "\x1b[1;37m";
const BOLD_GREEN: &str = "\x1b[1;32m";

/// Renders diagnostics as annotated source snippets.
pub struct DiagnosticRenderer {
    colors: bool,
}

impl DiagnosticRenderer {
    pub fn colored() -> Self {
        Self { colors: true }
    }

    pub fn plain() -> Self {
        Self { colors: false }
    }

    fn color<'a>(&self, code: &'a str) -> &'a str {
        if self.colors {
            code
        } else {
            ""
        }
    }

    pub fn render(&self, diag: &Diagnostic, source: &str) -> String {
        let mut out = String::new();

        out.push_str(self.color(diag.severity.color_code()));
        out.push_str(diag.severity.as_str());
        if let Some(code) = &diag.code {
            out.push_str(&format!("[{}]", code));
        }
        out.push_str(self.color(RESET));
        out.push_str(": ");
        out.push_str(self.color(BOLD_WHITE));
        out.push_str(&diag.message);
        out.push_str(self.color(RESET));
        out.push('\n');

        if !diag.labels.is_empty() {
            self.render_labels(&mut out, diag, source);
        }
        for help in &diag.help {
            out.push_str(&format!(
                " {}={} {}help{}: {}\n",
                self.color(BOLD_BLUE),
                self.color(RESET),
                self.color(BOLD_GREEN),
                self.color(RESET),
                help
            ));
        }
        out
    }

    fn render_labels(&self, out: &mut String, diag: &Diagnostic, source: &str) {
        let lines: Vec<&str> = source.lines().collect();
        let first = &diag.labels[0];
        let (line, col) = first.span.to_line_col(source);
        let filename = diag.filename.as_deref().unwrap_or("<source>");
        let width = line.to_string().len().max(2);

        out.push_str(&format!(
            "{}{:>width$}-->{} {}:{}:{}\n",
            self.color(BOLD_BLUE),
            "",
            self.color(RESET),
            filename,
            line,
            col,
            width = width
        ));
        out.push_str(&format!(
            "{}{:>width$} |{}\n",
            self.color(BOLD_BLUE),
            "",
            self.color(RESET),
            width = width
        ));

        for label in &diag.labels {
            let (line, col) = label.span.to_line_col(source);
            let text = lines.get(line.saturating_sub(1)).copied().unwrap_or("");
            out.push_str(&format!(
                "{}{:>width$} |{} {}\n",
                self.color(BOLD_BLUE),
                line,
                self.color(RESET),
                text,
                width = width
            ));
            let chars = (label.span.end - label.span.start).max(1);
            let caret = "^".repeat(chars.min(text.len().saturating_sub(col - 1).max(1)));
            out.push_str(&format!(
                "{}{:>width$} |{} {}{}{}{}",
                self.color(BOLD_BLUE),
                "",
                self.color(RESET),
                " ".repeat(col.saturating_sub(1)),
                self.color(diag.severity.color_code()),
                caret,
                self.color(RESET),
                width = width
            ));
            if !label.message.is_empty() {
                out.push(' ');
                out.push_str(self.color(diag.severity.color_code()));
                out.push_str(&label.message);
                out.push_str(self.color(RESET));
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "{}{:>width$} |{}\n",
            self.color(BOLD_BLUE),
            "",
            self.color(RESET),
            width = width
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{compile, CompileOptions};

    #[test]
    fn builder_collects_parts() {
        let diag = Diagnostic::error("undefined identifier `missing`")
            .with_code("SemanticError")
            .with_filename("app.lum")
            .with_label(Span::new(10, 17), "not declared in this page")
            .with_help("declare it with `state` before use");
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.code.as_deref(), Some("SemanticError"));
        assert_eq!(diag.labels.len(), 1);
        assert_eq!(diag.help.len(), 1);
    }

    #[test]
    fn parse_error_renders_caret_at_the_token() {
        let src = "page P:\n  state = 3\n";
        let err = compile(src, &CompileOptions::default()).unwrap_err();
        let diag = Diagnostic::from_compile_error(&err, src);
        let out = DiagnosticRenderer::plain().render(&diag, src);
        assert!(out.contains("error[ParseError]"));
        assert!(out.contains("state = 3"));
        assert!(out.contains('^'));
    }

    #[test]
    fn indentation_error_gets_help_text() {
        let src = "page P:\n  state a: int = 0\n   state b: int = 0\n";
        let err = compile(src, &CompileOptions::default()).unwrap_err();
        let diag = Diagnostic::from_compile_error(&err, src);
        assert!(diag.help.iter().any(|h| h.contains("indent width")));
    }

    #[test]
    fn plain_renderer_emits_no_ansi() {
        let src = "page P:\n  state = 3\n";
        let err = compile(src, &CompileOptions::default()).unwrap_err();
        let diag = Diagnostic::from_compile_error(&err, src);
        let out = DiagnosticRenderer::plain().render(&diag, src);
        assert!(!out.contains("\x1b["));
    }
}
