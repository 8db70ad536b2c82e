use std::fmt;
use std::io;

/// Errors that can occur while building or composing grammars.
///
/// `tokenize` itself never returns an `Error`: it is designed to be infallible
/// on well-formed input and a well-formed grammar (see the module docs on
/// `tokenizer`). Everything here happens at grammar-construction or
/// grammar-composition time, before any text is ever tokenized.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred while reading a grammar file from disk.
    Io(io::Error),

    /// JSON parsing failed while loading a `RawGrammar`.
    Json(serde_json::Error),

    /// A pattern failed to compile while building a `Grammar` from a `RawGrammar`.
    Pattern {
        /// Name of the rule the offending pattern belongs to.
        rule: String,
        /// The source text of the offending pattern.
        pattern: String,
        /// The underlying regex compilation error.
        source: regex::Error,
    },

    /// `extend`/`insert_before`/`tokenize_with` referenced a language id that
    /// isn't present in the registry.
    GrammarNotFound(String),

    /// `insert_before`'s `before` key isn't present in the target grammar.
    RuleNotFound {
        /// The grammar that was searched.
        grammar: String,
        /// The rule name that was missing.
        rule: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {err}"),
            Error::Json(err) => write!(f, "JSON parsing error: {err}"),
            Error::Pattern {
                rule,
                pattern,
                source,
            } => write!(f, "invalid pattern in rule '{rule}': /{pattern}/ ({source})"),
            Error::GrammarNotFound(name) => write!(f, "grammar '{name}' not found"),
            Error::RuleNotFound { grammar, rule } => {
                write!(f, "rule '{rule}' not found in grammar '{grammar}'")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Pattern { source, .. } => Some(source),
            Error::GrammarNotFound(_) | Error::RuleNotFound { .. } => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
