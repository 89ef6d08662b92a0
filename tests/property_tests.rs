//! Property tests for the front end: the tokenizer must never panic, and
//! well-formed generated programs must survive the whole pipeline.

use lumen_lang::lexer::TokenKind;
use lumen_lang::{compile, parse, tokenize, CompileOptions, Target};
use quickcheck::{Arbitrary, Gen, QuickCheck};

/// Arbitrary byte soup rendered as text.
#[derive(Clone, Debug)]
struct AnySource(String);

impl Arbitrary for AnySource {
    fn arbitrary(g: &mut Gen) -> Self {
        let len = usize::arbitrary(g) % 200;
        let mut text = String::new();
        for _ in 0..len {
            let ch = *g
                .choose(&[
                    'a', 'z', 'A', '0', '9', ' ', '\n', '\t', ':', '=', '"', '{', '}', '(',
                    ')', '[', ']', '<', '>', '-', '+', '*', '/', '#', '.', ',', '!', '?',
                    '世', 'é',
                ])
                .unwrap();
            text.push(ch);
        }
        AnySource(text)
    }
}

#[test]
fn tokenizer_never_panics_and_compile_never_hangs() {
    fn property(source: AnySource) -> bool {
        // Either outcome is fine; panicking or looping forever is not.
        let _ = tokenize(&source.0);
        let _ = compile(&source.0, &CompileOptions::default());
        true
    }
    QuickCheck::new()
        .tests(500)
        .quickcheck(property as fn(AnySource) -> bool);
}

/// A structurally valid generated page.
#[derive(Clone, Debug)]
struct ValidPage(String);

impl Arbitrary for ValidPage {
    fn arbitrary(g: &mut Gen) -> Self {
        let states = 1 + usize::arbitrary(g) % 3;
        let mut source = String::from("page Generated:\n");
        for i in 0..states {
            let init = u8::arbitrary(g) % 100;
            source.push_str(&format!("  state s{}: int = {}\n", i, init));
        }
        // Each derived value reads only earlier names, so ordering holds.
        for i in 0..(usize::arbitrary(g) % 3) {
            let dep = usize::arbitrary(g) % states;
            let offset = u8::arbitrary(g) % 10;
            source.push_str(&format!("  derived d{} = s{} + {}\n", i, dep, offset));
        }
        source.push_str("  fn bump():\n");
        source.push_str("    s0 = s0 + 1\n");
        source.push_str("  layout:\n");
        source.push_str("    col:\n");
        source.push_str("      text \"value: {s0}\"\n");
        source.push_str("      button \"go\" -> bump()\n");
        ValidPage(source)
    }
}

#[test]
fn generated_pages_tokenize_with_balanced_indentation() {
    fn property(page: ValidPage) -> bool {
        let tokens = match tokenize(&page.0) {
            Ok(tokens) => tokens,
            Err(_) => return false,
        };
        let indents = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Indent)
            .count();
        let dedents = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Dedent)
            .count();
        indents == dedents && parse(&tokens).is_ok()
    }
    QuickCheck::new()
        .tests(200)
        .quickcheck(property as fn(ValidPage) -> bool);
}

#[test]
fn generated_pages_compile_for_every_target() {
    fn property(page: ValidPage) -> bool {
        [Target::React, Target::Vue, Target::Svelte]
            .into_iter()
            .all(|target| {
                compile(
                    &page.0,
                    &CompileOptions {
                        target,
                        validate: true,
                    },
                )
                .is_ok()
            })
    }
    QuickCheck::new()
        .tests(100)
        .quickcheck(property as fn(ValidPage) -> bool);
}
