//! `tokenize-cli` — a small debugging/demo aid, not part of the library's
//! public contract. Tokenizes a source file (or stdin) against a single
//! grammar JSON file and prints the resulting token tree.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use kaleido::{Fragment, RawGrammar, Registry, Token, TokenContent};

/// Output format for the printed token tree.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    /// Indented `{:#?}`-style debug output.
    Debug,
    /// JSON.
    Json,
}

/// Tokenize a source file against a grammar and print the resulting tokens.
#[derive(Parser, Debug)]
#[command(name = "tokenize-cli")]
struct Args {
    /// Path to a grammar JSON file (see `RawGrammar` for the accepted shape).
    grammar: PathBuf,

    /// Path to the source file to tokenize. Reads stdin if omitted.
    source: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Debug)]
    format: Format,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let registry = Registry::new();
    registry.add_grammar_from_path(&args.grammar)?;
    let grammar_id = args
        .grammar
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let source = match &args.source {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let tokens = kaleido::tokenize_with(&source, grammar_id, &registry)?;

    match args.format {
        Format::Debug => println!("{tokens:#?}"),
        Format::Json => {
            let json = fragments_to_json(&tokens);
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}

fn fragments_to_json(fragments: &[Fragment]) -> serde_json::Value {
    serde_json::Value::Array(fragments.iter().map(fragment_to_json).collect())
}

fn fragment_to_json(fragment: &Fragment) -> serde_json::Value {
    match fragment {
        Fragment::Text(s) => serde_json::Value::String(s.clone()),
        Fragment::Token(token) => token_to_json(token),
    }
}

fn token_to_json(token: &Token) -> serde_json::Value {
    let content = match &token.content {
        TokenContent::Plain(s) => serde_json::Value::String(s.clone()),
        TokenContent::Nested(fragments) => fragments_to_json(fragments),
    };
    serde_json::json!({
        "kind": token.kind,
        "content": content,
        "alias": token.alias,
        "length": token.length,
    })
}
