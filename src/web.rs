//! Browser playground bindings.
//!
//! Exposes the compiler to JS through wasm-bindgen. Results cross the
//! boundary as plain serde-serialized objects so the playground never has
//! to unwrap a Rust enum.

use crate::driver::{compile, CompileError, CompileOptions, Target};
use crate::lexer;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

#[derive(Serialize, Deserialize)]
pub struct CompilationResult {
    pub success: bool,
    pub code: Option<String>,
    pub line_count: Option<usize>,
    pub token_count: Option<usize>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl CompilationResult {
    fn failure(err: &CompileError, source: &str) -> Self {
        let position = err.line_col(source);
        Self {
            success: false,
            code: None,
            line_count: None,
            token_count: None,
            error: Some(err.message()),
            error_kind: Some(err.kind().to_string()),
            line: position.map(|(line, _)| line),
            column: position.map(|(_, col)| col),
        }
    }
}

#[wasm_bindgen]
pub fn compile_lumen(source: &str, target: &str, validate: bool) -> JsValue {
    let result = compile_internal(source, target, validate);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn compile_internal(source: &str, target: &str, validate: bool) -> CompilationResult {
    let target: Target = match target.parse() {
        Ok(target) => target,
        Err(message) => {
            return CompilationResult {
                success: false,
                code: None,
                line_count: None,
                token_count: None,
                error: Some(message),
                error_kind: Some("UnsupportedConstruct".to_string()),
                line: None,
                column: None,
            };
        }
    };
    match compile(source, &CompileOptions { target, validate }) {
        Ok(out) => CompilationResult {
            success: true,
            code: Some(out.code),
            line_count: Some(out.line_count),
            token_count: Some(out.token_count),
            error: None,
            error_kind: None,
            line: None,
            column: None,
        },
        Err(err) => CompilationResult::failure(&err, source),
    }
}

/// One token for editor tooling: text, position, and keyword class.
#[derive(Serialize, Deserialize)]
pub struct TokenInfo {
    pub text: String,
    pub line: usize,
    pub column: usize,
    pub class: Option<String>,
}

#[wasm_bindgen]
pub fn tokenize_lumen(source: &str) -> JsValue {
    let result = match lexer::tokenize(source) {
        Ok(tokens) => {
            let infos: Vec<TokenInfo> = tokens
                .iter()
                .map(|token| {
                    let (line, column) = token.span.to_line_col(source);
                    let class = match &token.kind {
                        lexer::TokenKind::Word(word) => {
                            lexer::keyword_class(word).map(|c| format!("{:?}", c))
                        }
                        _ => None,
                    };
                    TokenInfo {
                        text: token.kind.to_string(),
                        line,
                        column,
                        class,
                    }
                })
                .collect();
            Ok(infos)
        }
        Err(err) => Err(CompilationResult::failure(&CompileError::Lex(err), source)),
    };
    match result {
        Ok(infos) => serde_wasm_bindgen::to_value(&infos).unwrap_or(JsValue::NULL),
        Err(failure) => serde_wasm_bindgen::to_value(&failure).unwrap_or(JsValue::NULL),
    }
}

#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}
