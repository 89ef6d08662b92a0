//! # Lumen
//!
//! A declarative UI language that compiles to React, Vue, and Svelte.
//!
//! Source text describes pages, state, derived values, and an indented
//! layout tree; the compiler lowers one semantic model to idiomatic code
//! for each target framework:
//!
//! ```
//! use lumen_lang::{compile, CompileOptions, Target};
//!
//! let source = "\
//! page Counter:
//!   state count: int = 0
//!   derived doubled = count * 2
//!   fn increment():
//!     count = count + 1
//!   layout:
//!     col gap=16:
//!       text \"Count: {doubled}\"
//!       button \"+1\" -> increment()
//! ";
//! let out = compile(source, &CompileOptions { target: Target::React, validate: true }).unwrap();
//! assert!(out.code.contains("useState"));
//! ```
//!
//! The pipeline is tokenize → parse → analyze → generate, fail-fast on the
//! first error. See [`driver::compile`] for the entry point.

pub mod analyzer;
pub mod ast;
pub mod codegen;
pub mod diagnostic;
pub mod driver;
pub mod ir;
pub mod lexer;
pub mod parser;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use analyzer::{analyze, SemanticError};
pub use codegen::{generate, CodeGenError, GeneratedCode};
pub use diagnostic::{Diagnostic, DiagnosticRenderer};
pub use driver::{compile, CompileError, CompileOptions, Output, Target};
pub use lexer::{tokenize, LexError, Span, Token, TokenKind};
pub use parser::{parse, ParseError};

/// Build metadata generated by `build.rs`.
pub mod build_info {
    include!(concat!(env!("OUT_DIR"), "/build_info.rs"));
}
