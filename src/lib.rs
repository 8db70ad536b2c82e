//! A generic, grammar-driven tokenizer for syntax highlighting.
//!
//! `kaleido` turns a source string plus a declarative [`Grammar`] into an
//! ordered tree of typed [`Token`]s, the way a PrismJS-style highlighter
//! does: an ordered list of named rules, each carrying one or more regex
//! patterns, is applied to a growing list of fragments, with "greedy"
//! rules allowed to subsume fragments a higher-priority rule already
//! classified and a nested `inside` grammar recursively tokenizing a
//! token's own content.
//!
//! # Example
//!
//! ```
//! use kaleido::{tokenize, RawGrammar};
//!
//! let grammar = RawGrammar::load_from_str(r#"{
//!     "string": "\"[^\"]*\"",
//!     "number": "\\d+"
//! }"#)
//! .unwrap()
//! .compile()
//! .unwrap();
//!
//! let tokens = tokenize(r#"let a = "hi" + 3;"#, &grammar);
//! assert_eq!(kaleido::flatten_text(&tokens), r#"let a = "hi" + 3;"#);
//! ```
//!
//! Rendering tokens into highlighted markup, theme/CSS handling, and the
//! library of concrete language grammars are out of scope for this crate:
//! it is a pure, headless tokenizer. `(text, grammar)` in, a token tree
//! out.

#![deny(missing_docs)]

mod error;
pub mod grammar;
mod token;
mod tokenizer;

pub use error::Error;
pub use grammar::{Grammar, RawGrammar, Registry};
pub use token::{Fragment, Token, TokenContent, flatten_text};
pub use tokenizer::{tokenize, tokenize_with};
