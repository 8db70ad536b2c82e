//! The JSON interchange format a grammar author writes by hand.
//!
//! Affords authors several equivalent shapes for the same entry (a bare
//! string vs. a rule object vs. an array of rule objects, `alias` as a
//! string or an array of strings): `#[serde(untagged)]` does the
//! shape-sniffing at the JSON boundary so the rest of the crate never has
//! to duck-type.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;
use crate::grammar::model::{Grammar, GrammarRef};
use crate::grammar::pattern::Pattern;
use crate::grammar::rule::Rule;

const REST_KEY: &str = "rest";

/// A single rule definition as written in a grammar JSON file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPattern {
    /// The regex source.
    pub pattern: String,
    /// See [`Pattern`]'s docs on `lookbehind`.
    #[serde(default)]
    pub lookbehind: bool,
    /// See [`Pattern`]'s docs on `greedy`.
    #[serde(default)]
    pub greedy: bool,
    /// Accepts both a single string and an array of strings; normalized to
    /// `Vec<String>` by [`RawAlias`].
    #[serde(default)]
    pub alias: Option<RawAlias>,
    /// Either `"$self"`, the id of another grammar in the registry, or an
    /// inline nested grammar object.
    #[serde(default)]
    pub inside: Option<RawInside>,
}

/// Accepts `"name"` or `["name", "other-name"]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAlias {
    /// A single alias label.
    Single(String),
    /// Several alias labels.
    Many(Vec<String>),
}

impl RawAlias {
    fn into_vec(self) -> Vec<String> {
        match self {
            RawAlias::Single(s) => vec![s],
            RawAlias::Many(v) => v,
        }
    }
}

/// Accepts a bare regex string, a single rule object, or an array of rule
/// objects (alternative patterns tried in order for one named rule).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawRuleValue {
    Bare(String),
    Single(RawPattern),
    Many(Vec<RawPattern>),
}

impl RawRuleValue {
    fn into_patterns(self) -> Vec<RawPattern> {
        match self {
            RawRuleValue::Bare(pattern) => vec![RawPattern {
                pattern,
                ..Default::default()
            }],
            RawRuleValue::Single(p) => vec![p],
            RawRuleValue::Many(ps) => ps,
        }
    }
}

/// Either a named reference into the registry (`"javascript"`) or an inline
/// nested grammar object. `"$self"` is sugar for a dynamic self-reference.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawInside {
    /// `"$self"` or the id of another grammar registered elsewhere.
    Reference(String),
    /// An inline nested grammar object.
    Grammar(RawGrammar),
}

/// The full JSON shape of a hand-authored grammar: an ordered mapping from
/// rule name to rule definition, with an optional reserved `rest` entry.
#[derive(Debug, Clone, Default)]
pub struct RawGrammar {
    rules: IndexMap<String, RawRuleValue>,
    rest: Option<Box<RawGrammar>>,
}

impl<'de> Deserialize<'de> for RawGrammar {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // `rest` holds a nested grammar object, every other entry holds a
        // rule definition; those are two different shapes, so we pull the
        // map apart via `serde_json::Value` instead of trying to express
        // the split declaratively.
        let raw: IndexMap<String, Value> = IndexMap::deserialize(deserializer)?;
        let mut rules = IndexMap::with_capacity(raw.len());
        let mut rest = None;

        for (key, value) in raw {
            if key == REST_KEY {
                let nested: RawGrammar = serde_json::from_value(value).map_err(serde::de::Error::custom)?;
                rest = Some(Box::new(nested));
                continue;
            }
            let rule_value: RawRuleValue =
                serde_json::from_value(value).map_err(serde::de::Error::custom)?;
            rules.insert(key, rule_value);
        }

        Ok(RawGrammar { rules, rest })
    }
}

impl RawGrammar {
    /// Parses a grammar from a JSON string.
    pub fn load_from_str(content: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(content)?)
    }

    /// Parses a grammar from a JSON file on disk.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        Self::load_from_str(&content)
    }

    /// Compiles this raw grammar into a ready-to-use [`Grammar`], eagerly
    /// compiling every pattern's regex (the "pattern compilation" fault
    /// class) and inlining `rest` into the rule order once, at construction
    /// time. `Grammar` is immutable afterward, so there is no observable
    /// difference between inlining here versus lazily on first tokenize.
    pub fn compile(self) -> Result<Arc<Grammar>, Error> {
        Ok(Arc::new(Grammar::new(self.compile_rules()?)))
    }

    /// Compiles just the rule map, inlining `rest` but without wrapping the
    /// result in a [`Grammar`]. Used both by [`RawGrammar::compile`] and by
    /// [`Registry::extend`](crate::grammar::registry::Registry::extend) to
    /// compile a partial "redef" grammar into the same `IndexMap<String,
    /// Rule>` shape `extend`/`insert_before` operate on.
    pub(crate) fn compile_rules(mut self) -> Result<IndexMap<String, Rule>, Error> {
        // `rest`'s entries are appended at the end, overwriting any
        // duplicate keys already present at their existing position.
        if let Some(rest) = self.rest.take() {
            for (name, value) in rest.rules {
                self.rules.insert(name, value);
            }
        }

        let mut rules = IndexMap::with_capacity(self.rules.len());
        for (name, value) in self.rules {
            let compiled = compile_rule(&name, value.into_patterns())?;
            rules.insert(name, compiled);
        }

        Ok(rules)
    }
}

fn compile_rule(name: &str, raw_patterns: Vec<RawPattern>) -> Result<Rule, Error> {
    let mut patterns = Vec::with_capacity(raw_patterns.len());
    for raw in raw_patterns {
        let alias = raw.alias.map(RawAlias::into_vec).unwrap_or_default();
        let inside = match raw.inside {
            None => None,
            Some(RawInside::Reference(id)) if id == "$self" => Some(GrammarRef::SelfRef),
            Some(RawInside::Reference(id)) => Some(GrammarRef::Named(id)),
            Some(RawInside::Grammar(g)) => Some(GrammarRef::Inline(g.compile()?)),
        };
        patterns.push(Pattern::new(
            name,
            raw.pattern,
            raw.lookbehind,
            raw.greedy,
            inside,
            alias,
        )?);
    }
    Ok(Rule::new(patterns))
}

/// Loads several grammars keyed by language id from a directory of `.json`
/// files, for tests and the CLI demo — not part of the core API.
pub fn load_grammar_dir(dir: impl AsRef<Path>) -> Result<BTreeMap<String, Arc<Grammar>>, Error> {
    let mut out = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let grammar = RawGrammar::load_from_file(&path)?.compile()?;
        out.insert(stem.to_string(), grammar);
    }
    Ok(out)
}
