use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The result of matching a [`Pattern`] against some text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PatternMatch {
    /// Absolute start of the matched substring, after lookbehind adjustment.
    pub start: usize,
    /// Absolute end of the matched substring (exclusive).
    pub end: usize,
}

/// A compiled regular expression plus the metadata the tokenizer needs to
/// decide how to use it: whether it may cross fragment boundaries (`greedy`),
/// whether its first capture group is context to exclude from the token
/// (`lookbehind`), a nested grammar to recurse into (`inside`), and secondary
/// classification labels (`alias`).
///
/// Lazily compiled behind a `OnceLock`, same shape as a hand-rolled
/// "compile once, share forever" regex wrapper: cheap to clone (the source
/// string is cloned, compilation is redone lazily rather than shared), cheap
/// to construct from a `RawPattern`.
pub struct Pattern {
    source: String,
    compiled: OnceLock<Option<Regex>>,
    pub(crate) lookbehind: bool,
    pub(crate) greedy: bool,
    pub(crate) inside: Option<super::model::GrammarRef>,
    pub(crate) alias: Vec<String>,
    /// Idempotent marker standing in for the host engine's one-time rewrite
    /// of a greedy pattern to carry a stateful "global" flag (see the
    /// design doc). The `regex` crate already searches from an arbitrary byte
    /// offset without needing such a flag, so this has no functional effect;
    /// it exists purely so the "prepare a greedy pattern exactly once"
    /// invariant is observable and testable.
    greedy_prepared: OnceLock<()>,
}

impl Pattern {
    pub(crate) fn new(
        rule_name: &str,
        source: String,
        lookbehind: bool,
        greedy: bool,
        inside: Option<super::model::GrammarRef>,
        alias: Vec<String>,
    ) -> Result<Self, Error> {
        let pattern = Self {
            source,
            compiled: OnceLock::new(),
            lookbehind,
            greedy,
            inside,
            alias,
            greedy_prepared: OnceLock::new(),
        };
        // Patterns are compiled eagerly at grammar-construction time so that
        // malformed regex fails loudly there, not during tokenization.
        if pattern.compiled().is_none() {
            let source = pattern.source.clone();
            let err = Regex::new(&source).unwrap_err();
            return Err(Error::Pattern {
                rule: rule_name.to_string(),
                pattern: source,
                source: err,
            });
        }
        Ok(pattern)
    }

    pub(crate) fn source(&self) -> &str {
        &self.source
    }

    fn compiled(&self) -> Option<&Regex> {
        self.compiled
            .get_or_init(|| Regex::new(&self.source).ok())
            .as_ref()
    }

    /// Ensures the pattern has been "prepared" for greedy use. Idempotent:
    /// calling this any number of times only ever records the preparation
    /// once, regardless of how many times it is called.
    pub(crate) fn ensure_greedy_prepared(&self) {
        self.greedy_prepared.get_or_init(|| ());
    }

    #[cfg(test)]
    pub(crate) fn is_greedy_prepared(&self) -> bool {
        self.greedy_prepared.get().is_some()
    }

    /// Non-greedy match attempt: ordinary unanchored search over `fragment`,
    /// the text of the current raw fragment. The match need not start at
    /// index 0 of `fragment` — only the search does.
    pub(crate) fn match_in_fragment(&self, fragment: &str, fragment_abs_start: usize) -> Option<PatternMatch> {
        let regex = self.compiled()?;
        let m = regex.find(fragment)?;
        self.adjust_for_lookbehind(fragment, m.start(), m.end(), fragment_abs_start)
    }

    /// Greedy match attempt: ordinary unanchored search over `text[pos..]`,
    /// translated back to absolute offsets in `text`.
    pub(crate) fn match_at(&self, text: &str, pos: usize) -> Option<PatternMatch> {
        let regex = self.compiled()?;
        let tail = text.get(pos..)?;
        let m = regex.find(tail)?;
        self.adjust_for_lookbehind(tail, m.start(), m.end(), pos)
    }

    /// Shifts the match start forward by the length of capture group 1 when
    /// `lookbehind` is set, so the "context" the lookbehind group captured
    /// stays outside the produced token and is retained as raw text.
    fn adjust_for_lookbehind(
        &self,
        haystack: &str,
        local_start: usize,
        local_end: usize,
        abs_offset: usize,
    ) -> Option<PatternMatch> {
        let mut start = abs_offset + local_start;
        let end = abs_offset + local_end;

        if self.lookbehind {
            let regex = self.compiled()?;
            if let Some(caps) = regex.captures(haystack)
                && let Some(group1) = caps.get(1)
            {
                start = abs_offset + group1.end();
            }
        }

        Some(PatternMatch { start, end })
    }
}

impl Clone for Pattern {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            compiled: OnceLock::new(),
            lookbehind: self.lookbehind,
            greedy: self.greedy,
            inside: self.inside.clone(),
            alias: self.alias.clone(),
            greedy_prepared: OnceLock::new(),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("source", &self.source)
            .field("lookbehind", &self.lookbehind)
            .field("greedy", &self.greedy)
            .field("alias", &self.alias)
            .finish()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.lookbehind == other.lookbehind
            && self.greedy == other.greedy
            && self.alias == other.alias
    }
}

impl Serialize for Pattern {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let source = String::deserialize(deserializer)?;
        Pattern::new("", source, false, false, None, Vec::new()).map_err(serde::de::Error::custom)
    }
}
