//! The output representation emitted by [`tokenize`](crate::tokenizer::tokenize):
//! an ordered sequence of raw text and classified [`Token`]s, themselves
//! possibly containing a further nested sequence.

/// A tagged union of either a raw, unclassified string slice or a
/// classified [`Token`]. This is the element type of the sequence
/// `tokenize` returns, and of a `Token`'s nested `content` when it has one.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Unclassified input text.
    Text(String),
    /// A classified token.
    Token(Token),
}

impl Fragment {
    /// The original text this fragment projects back to: for `Text`, the
    /// text itself; for `Token`, its full matched substring (recursively
    /// flattening nested content).
    pub fn text(&self) -> String {
        match self {
            Fragment::Text(s) => s.clone(),
            Fragment::Token(t) => t.text(),
        }
    }

    pub(crate) fn is_text(&self) -> bool {
        matches!(self, Fragment::Text(_))
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Fragment::Text(s) => s.len(),
            Fragment::Token(t) => t.length,
        }
    }
}

/// The content of a [`Token`]: either the matched substring verbatim, or —
/// when the rule that produced it carried a nested (`inside`) grammar — the
/// ordered sequence of fragments that substring was recursively tokenized
/// into.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenContent {
    /// No nested grammar; the matched substring itself.
    Plain(String),
    /// The matched substring, recursively tokenized with the rule's
    /// `inside` grammar.
    Nested(Vec<Fragment>),
}

/// A classified span of the original input.
///
/// `length` is fixed at construction from the length of the original
/// matched substring and is never mutated afterward; `content` may hold a
/// lazily-produced nested token tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The rule name that produced this token (e.g. `"keyword"`, `"string"`).
    pub kind: String,
    /// The token's content: plain text, or a nested fragment sequence.
    pub content: TokenContent,
    /// Secondary classification labels, for rendering purposes.
    pub alias: Vec<String>,
    /// Length, in bytes, of the original matched substring. Fixed at
    /// construction.
    pub length: usize,
}

impl Token {
    pub(crate) fn new(kind: String, content: TokenContent, alias: Vec<String>, length: usize) -> Self {
        Self {
            kind,
            content,
            alias,
            length,
        }
    }

    /// Reconstructs the original matched substring from `content`,
    /// recursively flattening nested fragments back into plain text.
    pub fn text(&self) -> String {
        match &self.content {
            TokenContent::Plain(s) => s.clone(),
            TokenContent::Nested(fragments) => fragments.iter().map(Fragment::text).collect(),
        }
    }
}

/// Flattens a fragment sequence back into a single string, recursively.
/// Used by the length-preservation property tests.
pub fn flatten_text(fragments: &[Fragment]) -> String {
    fragments.iter().map(Fragment::text).collect()
}
