use anyhow::{bail, Context, Result};
use colored::Colorize;
use lumen_lang::diagnostic::{Diagnostic, DiagnosticRenderer};
use lumen_lang::{compile, tokenize, CompileOptions, Target};
use std::fs;
use std::process::ExitCode;

struct Args {
    file: String,
    target: Target,
    validate: bool,
    json: bool,
    tokens: bool,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {} <source.lum> [options]\n\
         \n\
         Options:\n\
         \x20 --target <react|vue|svelte>  generation target (default: react)\n\
         \x20 --no-validate                skip type and boolean-condition checks\n\
         \x20 --json                       machine-readable output\n\
         \x20 --tokens                     print the token stream and exit",
        program
    )
}

fn parse_args() -> Result<Args> {
    let mut argv = std::env::args();
    let program = argv.next().unwrap_or_else(|| "lumen".to_string());
    let mut file = None;
    let mut target = Target::React;
    let mut validate = true;
    let mut json = false;
    let mut tokens = false;

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--target" => {
                let value = argv
                    .next()
                    .with_context(|| format!("--target needs a value\n\n{}", usage(&program)))?;
                target = value
                    .parse()
                    .map_err(|message: String| anyhow::anyhow!(message))?;
            }
            "--no-validate" => validate = false,
            "--json" => json = true,
            "--tokens" => tokens = true,
            "--help" | "-h" => bail!("{}", usage(&program)),
            other if other.starts_with('-') => {
                bail!("unknown option `{}`\n\n{}", other, usage(&program));
            }
            other => {
                if file.replace(other.to_string()).is_some() {
                    bail!("more than one source file given\n\n{}", usage(&program));
                }
            }
        }
    }
    let file = file.with_context(|| usage(&program))?;
    Ok(Args {
        file,
        target,
        validate,
        json,
        tokens,
    })
}

fn print_tokens(source: &str, json: bool) -> ExitCode {
    match tokenize(source) {
        Ok(tokens) => {
            if json {
                let listed: Vec<serde_json::Value> = tokens
                    .iter()
                    .map(|token| {
                        let (line, column) = token.span.to_line_col(source);
                        serde_json::json!({
                            "token": token.kind.to_string(),
                            "line": line,
                            "column": column,
                        })
                    })
                    .collect();
                println!("{}", serde_json::json!(listed));
            } else {
                for token in &tokens {
                    let (line, column) = token.span.to_line_col(source);
                    println!("{:>4}:{:<3} {}", line, column, token.kind);
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}: {}", "error".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    let source = match fs::read_to_string(&args.file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!(
                "{}: cannot read {}: {}",
                "error".red().bold(),
                args.file,
                err
            );
            return ExitCode::FAILURE;
        }
    };

    if args.tokens {
        return print_tokens(&source, args.json);
    }

    let options = CompileOptions {
        target: args.target,
        validate: args.validate,
    };
    match compile(&source, &options) {
        Ok(out) => {
            if args.json {
                match serde_json::to_string_pretty(&out) {
                    Ok(text) => println!("{}", text),
                    Err(err) => {
                        eprintln!("{}: {}", "error".red().bold(), err);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                print!("{}", out.code);
                eprintln!(
                    "{} {} -> {} ({} lines, {} tokens)",
                    "compiled".green().bold(),
                    args.file,
                    args.target,
                    out.line_count,
                    out.token_count
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            if args.json {
                let position = err.line_col(&source);
                let payload = serde_json::json!({
                    "error": err.message(),
                    "kind": err.kind(),
                    "line": position.map(|(line, _)| line),
                    "column": position.map(|(_, col)| col),
                });
                println!("{}", payload);
            } else {
                let diag =
                    Diagnostic::from_compile_error(&err, &source).with_filename(args.file.clone());
                eprint!("{}", DiagnosticRenderer::colored().render(&diag, &source));
            }
            ExitCode::FAILURE
        }
    }
}
