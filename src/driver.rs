//! # Compilation Driver
//!
//! The single entry point that strings the stages together: tokenize,
//! parse, analyze, generate. Compilation is fail-fast — the first error
//! from any stage aborts the run and surfaces as a [`CompileError`] tagged
//! with the stage it came from.

use crate::analyzer::{self, SemanticError};
use crate::codegen::{self, CodeGenError};
use crate::lexer::{self, LexError};
use crate::parser::{self, ParseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::codegen::Target;

/// Compilation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    pub target: Target,
    /// When false, boolean-condition and assignment type checks are skipped.
    /// Name resolution and structural analysis always run.
    pub validate: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            target: Target::React,
            validate: true,
        }
    }
}

/// Successful compilation output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub code: String,
    pub line_count: usize,
    pub token_count: usize,
}

/// A compilation failure, tagged by the stage that produced it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("{0}")]
    Lex(#[from] LexError),
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Semantic(#[from] SemanticError),
    #[error("{0}")]
    Codegen(#[from] CodeGenError),
}

impl CompileError {
    /// The error taxonomy name reported to tooling.
    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::Lex(_) => "LexError",
            CompileError::Parse(_) => "ParseError",
            CompileError::Semantic(_) => "SemanticError",
            CompileError::Codegen(_) => "UnsupportedConstruct",
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    /// 1-indexed source position, when the stage recorded one.
    pub fn line_col(&self, source: &str) -> Option<(usize, usize)> {
        match self {
            CompileError::Lex(err) => match err {
                LexError::UnterminatedString { line, column }
                | LexError::IllegalCharacter { line, column, .. } => Some((*line, *column)),
                LexError::InconsistentIndentation { line, .. } => Some((*line, 1)),
            },
            CompileError::Parse(err) => err.span().map(|span| span.to_line_col(source)),
            CompileError::Semantic(_) | CompileError::Codegen(_) => None,
        }
    }
}

/// Compiles a source text to the requested target.
pub fn compile(source: &str, options: &CompileOptions) -> Result<Output, CompileError> {
    let tokens = lexer::tokenize(source)?;
    let program = parser::parse(&tokens)?;
    let ir = analyzer::analyze(&program, options.validate)?;
    let generated = codegen::generate(&ir, options.target)?;
    log::info!(
        "compiled {} source bytes to {} ({} lines)",
        source.len(),
        options.target,
        generated.line_count
    );
    Ok(Output {
        code: generated.code,
        line_count: generated.line_count,
        token_count: generated.token_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const COUNTER: &str = "\
page Counter:
  state count: int = 0
  derived doubled = count * 2
  fn increment():
    count = count + 1
  layout:
    col gap=16:
      text \"Count: {doubled}\"
      button \"+1\" -> increment()
";

    #[test]
    fn compiles_to_all_three_targets() {
        for target in [Target::React, Target::Vue, Target::Svelte] {
            let out = compile(
                COUNTER,
                &CompileOptions {
                    target,
                    validate: true,
                },
            )
            .unwrap();
            assert!(out.line_count > 0);
            assert!(out.token_count > 0);
            assert!(out.code.contains("Count:"));
        }
    }

    #[test]
    fn first_error_wins() {
        // Both an unterminated string and an undefined identifier; the lex
        // error surfaces because its stage runs first.
        let src = "page P:\n  state s: str = \"oops\n  derived d = missing\n";
        let err = compile(src, &CompileOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "LexError");
    }

    #[test]
    fn semantic_errors_carry_the_kind() {
        let src = "page P:\n  derived d = missing\n  layout:\n    text \"x\"\n";
        let err = compile(src, &CompileOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "SemanticError");
        assert!(err.message().contains("missing"));
    }

    #[test]
    fn parse_error_reports_position() {
        let src = "page P:\n  state = 3\n";
        let err = compile(src, &CompileOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "ParseError");
        assert!(err.line_col(src).is_some());
    }

    #[test]
    fn validate_off_accepts_non_boolean_check() {
        let src = "\
page P:
  state n: int = 1
  check n \"n must be set\"
  layout:
    text \"{n}\"
";
        assert!(compile(src, &CompileOptions::default()).is_err());
        let out = compile(
            src,
            &CompileOptions {
                target: Target::React,
                validate: false,
            },
        );
        assert!(out.is_ok());
    }

    #[test]
    fn output_counts_match_the_code() {
        let out = compile(COUNTER, &CompileOptions::default()).unwrap();
        let lines = out.code.lines().filter(|l| !l.trim().is_empty()).count();
        let tokens = out.code.split_whitespace().count();
        assert_eq!(out.line_count, lines);
        assert_eq!(out.token_count, tokens);
    }
}
