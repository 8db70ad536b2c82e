use std::sync::Arc;

use indexmap::IndexMap;

use super::rule::Rule;

/// How a [`Pattern`](super::pattern::Pattern)'s `inside` field points at the
/// nested grammar used to recursively tokenize its matches.
///
/// Mirrors the way TextMate-style grammars distinguish a same-object
/// self-reference from a named reference into a registry from a plain
/// inline sub-grammar, without requiring a self-referential `Arc` cycle:
/// `SelfRef` is resolved dynamically against whichever grammar the current
/// top-level `tokenize` call started with, and `Named` is resolved against
/// the [`Registry`](super::registry::Registry) at match time. Only `Inline`
/// carries a baked-in `Arc`, which is exactly the case `insert_before`'s
/// depth-first back-reference rewrite needs to find and replace.
#[derive(Debug, Clone)]
pub(crate) enum GrammarRef {
    /// A grammar embedded directly (an anonymous object literal, or a
    /// grammar shared by direct reference from another language).
    Inline(Arc<Grammar>),
    /// Refers to the grammar the current top-level `tokenize` call started
    /// with (e.g. a markup language nesting itself inside a `<b>` tag).
    SelfRef,
    /// Refers to another entry in the grammar registry by language id,
    /// resolved lazily so registry edits are picked up without rewriting.
    Named(String),
}

/// An ordered, named collection of [`Rule`]s describing a language.
///
/// Rule order is semantically significant: earlier rules are tried first at
/// every position (see the tokenizer's engine docs). Backed by
/// [`indexmap::IndexMap`] rather than a hash map so insertion order is an
/// intrinsic property of the type, not an accident of iteration.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    pub(crate) rules: IndexMap<String, Rule>,
}

impl Grammar {
    pub(crate) fn new(rules: IndexMap<String, Rule>) -> Self {
        Self { rules }
    }

    /// Iterates rules in declared order: `(rule_name, rule)`.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.rules.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub(crate) fn len(&self) -> usize {
        self.rules.len()
    }
}
