//! The process-wide, concurrency-safe map from language id to compiled
//! [`Grammar`].
//!
//! Backed by [`papaya::HashMap`] rather than a `HashMap` behind a coarse
//! `RwLock`: lookups during tokenization (the hot path, potentially run
//! concurrently from many threads) never contend with each other, and a
//! composition call (`extend`, `insert_before`) installs a fresh `Arc<Grammar>`
//! atomically at the map-entry granularity — a reader either observes the
//! grammar from before the edit or the one from after, never a partially
//! rewritten one.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::Error;
use crate::grammar::compose;
use crate::grammar::model::{Grammar, GrammarRef};
use crate::grammar::raw::RawGrammar;
use crate::grammar::rule::Rule;

/// The grammar registry. Cheap to clone (`papaya::HashMap` is itself a
/// cheaply-cloned handle to shared storage); typically kept behind a single
/// `Arc<Registry>` or just passed by reference.
#[derive(Default)]
pub struct Registry {
    grammars: papaya::HashMap<String, Arc<Grammar>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `grammar` under `id`, replacing whatever was previously
    /// registered there.
    pub fn register(&self, id: impl Into<String>, grammar: Arc<Grammar>) {
        self.grammars.pin().insert(id.into(), grammar);
    }

    /// Registers `alias` to point at the same `Grammar` object already
    /// registered under `id` (e.g. `"plaintext"` and `"txt"`).
    pub fn alias(&self, id: &str, alias: impl Into<String>) -> Result<(), Error> {
        let grammar = self.get(id).ok_or_else(|| Error::GrammarNotFound(id.to_string()))?;
        self.grammars.pin().insert(alias.into(), grammar);
        Ok(())
    }

    /// Loads and registers a grammar from a JSON file, keyed by its file stem.
    pub fn add_grammar_from_path(&self, path: impl AsRef<std::path::Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let grammar = RawGrammar::load_from_file(path)?.compile()?;
        self.register(id, grammar);
        Ok(())
    }

    /// Looks up a grammar by language id.
    pub fn get(&self, id: &str) -> Option<Arc<Grammar>> {
        self.grammars.pin().get(id).cloned()
    }

    pub(crate) fn resolve(&self, grammar_ref: &GrammarRef, root: &Arc<Grammar>) -> Option<Arc<Grammar>> {
        match grammar_ref {
            GrammarRef::Inline(g) => Some(g.clone()),
            GrammarRef::SelfRef => Some(root.clone()),
            GrammarRef::Named(id) => self.get(id),
        }
    }

    /// Deep-clones the grammar registered under `id` and overlays `redef`
    /// onto it (see [`compose::extend`]), then installs the result back
    /// into the registry under `id` and rewrites every other registered
    /// grammar's direct (`Inline`) references to the old grammar object so
    /// they observe the new one too.
    pub fn extend(&self, id: &str, redef: RawGrammar) -> Result<Arc<Grammar>, Error> {
        let base = self.get(id).ok_or_else(|| Error::GrammarNotFound(id.to_string()))?;
        let redef_rules = redef.compile_rules()?;
        let extended = Arc::new(compose::extend(&base, redef_rules));
        self.replace(id, base, extended.clone());
        Ok(extended)
    }

    /// Builds a new grammar from the one registered under `inside` with
    /// `insert`'s rules spliced in immediately before `before` (see
    /// [`compose::insert_before`]), installs it back into the registry
    /// under `inside`, and rewrites every other registered grammar's direct
    /// references to the old grammar object.
    pub fn insert_before(
        &self,
        inside: &str,
        before: &str,
        insert: RawGrammar,
    ) -> Result<Arc<Grammar>, Error> {
        let target = self
            .get(inside)
            .ok_or_else(|| Error::GrammarNotFound(inside.to_string()))?;
        let insert_rules: IndexMap<String, Rule> = insert.compile_rules()?;
        let replaced = Arc::new(compose::insert_before(&target, inside, before, insert_rules)?);
        self.replace(inside, target, replaced.clone());
        Ok(replaced)
    }

    /// Installs `new_grammar` under `id` (and under any alias currently
    /// pointing at `old_grammar`), then walks every registered grammar's
    /// `Inline` nested-grammar references and replaces any pointer to
    /// `old_grammar` with `new_grammar` — the depth-first back-reference
    /// rewrite described in the design notes.
    fn replace(&self, id: &str, old_grammar: Arc<Grammar>, new_grammar: Arc<Grammar>) {
        let pinned = self.grammars.pin();

        let mut entries: Vec<(String, Arc<Grammar>)> = Vec::new();
        for (key, grammar) in pinned.iter() {
            if key == id {
                continue;
            }
            entries.push((key.clone(), grammar.clone()));
        }

        pinned.insert(id.to_string(), new_grammar.clone());

        for (key, grammar) in entries {
            let rewritten = rewrite_inline_refs(&grammar, &old_grammar, &new_grammar);
            if !Arc::ptr_eq(&rewritten, &grammar) {
                pinned.insert(key, rewritten);
            }
        }
    }
}

/// Recursively rebuilds `grammar` (and any `Inline` sub-grammars it embeds)
/// so every occurrence of `old` becomes `new`, by `Arc` pointer identity.
/// Returns `grammar` unchanged (same `Arc`, no allocation) if nothing needed
/// rewriting.
fn rewrite_inline_refs(grammar: &Arc<Grammar>, old: &Arc<Grammar>, new: &Arc<Grammar>) -> Arc<Grammar> {
    if Arc::ptr_eq(grammar, old) {
        return new.clone();
    }

    let mut changed = false;
    let mut rules = IndexMap::with_capacity(grammar.rules.len());

    for (name, rule) in grammar.rules.iter() {
        let mut patterns = Vec::with_capacity(rule.patterns().len());
        for pattern in rule.patterns() {
            let mut rewritten = pattern.clone();
            if let Some(GrammarRef::Inline(inner)) = &pattern.inside {
                let replacement = if Arc::ptr_eq(inner, old) {
                    new.clone()
                } else {
                    rewrite_inline_refs(inner, old, new)
                };
                if !Arc::ptr_eq(&replacement, inner) {
                    rewritten.inside = Some(GrammarRef::Inline(replacement));
                    changed = true;
                }
            }
            patterns.push(rewritten);
        }
        rules.insert(name.clone(), Rule::new(patterns));
    }

    if changed {
        Arc::new(Grammar::new(rules))
    } else {
        grammar.clone()
    }
}
