//! Pure grammar-manipulation primitives: `extend` and `insert_before`.
//!
//! Both take an existing [`Grammar`] and a set of new rules and return a
//! brand new `Grammar`; neither one mutates its input. The
//! [`Registry`](super::registry::Registry) wraps these with the
//! depth-first back-reference rewrite described in the module docs there —
//! that rewrite is a registry-wide concern, not a grammar-level one, so it
//! doesn't belong in this module.

use indexmap::IndexMap;

use crate::error::Error;
use crate::grammar::model::Grammar;
use crate::grammar::rule::Rule;

/// Deep-clones `base` and overlays `redef` onto it: a rule whose name
/// already exists in `base` is replaced in place (its position in the
/// iteration order is unchanged, `IndexMap::insert`'s standard behavior);
/// any other rule in `redef` is appended at the end.
pub(crate) fn extend(base: &Grammar, redef: IndexMap<String, Rule>) -> Grammar {
    let mut rules = base.rules.clone();
    for (name, rule) in redef {
        rules.insert(name, rule);
    }
    Grammar::new(rules)
}

/// Builds a new grammar from `target` with every entry of `insert` spliced
/// in immediately before the rule named `before`, except for entries of
/// `insert` whose names collide with *any* existing key of `target`
/// (those are omitted — this is how a caller can overwrite a rule while
/// also adding brand new ones in the same call).
pub(crate) fn insert_before(
    target: &Grammar,
    target_name: &str,
    before: &str,
    insert: IndexMap<String, Rule>,
) -> Result<Grammar, Error> {
    if !target.contains(before) {
        return Err(Error::RuleNotFound {
            grammar: target_name.to_string(),
            rule: before.to_string(),
        });
    }

    let mut rules = IndexMap::with_capacity(target.rules.len() + insert.len());
    for (name, rule) in target.rules.iter() {
        if name == before {
            for (insert_name, insert_rule) in insert.iter() {
                if target.contains(insert_name) {
                    continue;
                }
                rules.insert(insert_name.clone(), insert_rule.clone());
            }
        }
        rules.insert(name.clone(), rule.clone());
    }

    Ok(Grammar::new(rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::raw::RawGrammar;

    fn base_grammar() -> Grammar {
        let compiled = RawGrammar::load_from_str(r#"{"a": "a", "b": "b"}"#)
            .unwrap()
            .compile()
            .unwrap();
        (*compiled).clone()
    }

    fn redef(json: &str) -> IndexMap<String, Rule> {
        RawGrammar::load_from_str(json).unwrap().compile_rules().unwrap()
    }

    #[test]
    fn extend_replaces_existing_rule_in_place_and_appends_new_ones() {
        let base = base_grammar();
        let extended = extend(&base, redef(r#"{"a": "A", "c": "c"}"#));

        let names: Vec<&str> = extended.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn extend_does_not_mutate_the_original_grammar() {
        let base = base_grammar();
        let _ = extend(&base, redef(r#"{"a": "A"}"#));
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn insert_before_splices_new_entries_at_the_right_position() {
        let base = base_grammar();
        let spliced = insert_before(&base, "base", "b", redef(r#"{"x": "x"}"#)).unwrap();

        let names: Vec<&str> = spliced.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "x", "b"]);
    }

    #[test]
    fn insert_before_omits_entries_colliding_with_any_target_key() {
        let base = base_grammar();
        // "b" collides with an existing target key, so it's omitted even
        // though "y" is brand new and kept.
        let spliced = insert_before(&base, "base", "a", redef(r#"{"y": "y", "b": "B"}"#)).unwrap();

        let names: Vec<&str> = spliced.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["y", "a", "b"]);
    }

    #[test]
    fn insert_before_errors_when_before_key_is_missing() {
        let base = base_grammar();
        let err = insert_before(&base, "base", "nonexistent", redef(r#"{"x": "x"}"#)).unwrap_err();
        assert!(matches!(err, Error::RuleNotFound { grammar, rule }
            if grammar == "base" && rule == "nonexistent"));
    }
}
