//! The tokenizer engine: turns a flat string plus a [`Grammar`] into an
//! ordered [`Fragment`] tree.
//!
//! This is a from-scratch port of the splice-based matching algorithm that
//! the flat grammar model (as opposed to a TextMate-style begin/end state
//! stack) calls for: rules are tried in declared order against a doubly
//! linked list of raw-text and already-classified fragments, greedy rules
//! may re-anchor across the whole remaining text and subsume fragments a
//! prior rule already produced, and doing so triggers a bounded local
//! "rematch" so higher-priority rules get a chance to re-apply to the
//! freshly reopened text.

mod fragment_list;

use std::sync::Arc;

use crate::error::Error;
use crate::grammar::model::{Grammar, GrammarRef};
use crate::grammar::pattern::{Pattern, PatternMatch};
use crate::grammar::Registry;
use crate::token::{Fragment, Token, TokenContent};

use fragment_list::{FragmentList, NodeId};

/// Tracks a local rematch in progress: the `(rule, pattern index)` that
/// triggered it (skipped on re-entry to avoid reprocessing the same greedy
/// match forever) and the absolute position the rematch may not scan past.
struct Rematch {
    cause_rule: String,
    cause_pattern: usize,
    reach: usize,
}

/// Tokenizes `text` against `grammar`. `inside` references that name another
/// grammar by id (rather than an inline object or `$self`) cannot be
/// resolved without a [`Registry`] and are left unexpanded — their matched
/// text is still classified as a Token, just without nested content. Use
/// [`tokenize_with`] when any rule in `grammar` (transitively) references
/// another grammar by name.
///
/// Infallible: returns an empty sequence for empty input, never panics on
/// well-formed input.
pub fn tokenize(text: &str, grammar: &Arc<Grammar>) -> Vec<Fragment> {
    tokenize_fragments(text, grammar, grammar, None)
}

/// Looks up `grammar_id` in `registry` and tokenizes `text` against it, with
/// every `inside` reference — inline, `$self`, or named — resolved through
/// `registry`.
pub fn tokenize_with(text: &str, grammar_id: &str, registry: &Registry) -> Result<Vec<Fragment>, Error> {
    let grammar = registry
        .get(grammar_id)
        .ok_or_else(|| Error::GrammarNotFound(grammar_id.to_string()))?;
    Ok(tokenize_fragments(text, &grammar, &grammar, Some(registry)))
}

fn tokenize_fragments(
    text: &str,
    grammar: &Arc<Grammar>,
    root: &Arc<Grammar>,
    registry: Option<&Registry>,
) -> Vec<Fragment> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut list = FragmentList::new(text.to_string());
    let head = list.head();
    match_grammar(text, &mut list, grammar, root, registry, head, 0, None);
    list.into_vec()
}

/// The splice-matching core. See the module docs for the algorithm shape;
/// steps below are numbered to match the design notes.
fn match_grammar(
    text: &str,
    list: &mut FragmentList,
    grammar: &Arc<Grammar>,
    root: &Arc<Grammar>,
    registry: Option<&Registry>,
    start_node: NodeId,
    start_pos: usize,
    mut rematch: Option<&mut Rematch>,
) {
    for (rule_name, rule) in grammar.iter() {
        for (pattern_index, pattern) in rule.patterns().iter().enumerate() {
            // Step 1: rematch guard.
            if let Some(r) = rematch.as_deref() {
                if r.cause_rule == rule_name && r.cause_pattern == pattern_index {
                    return;
                }
            }

            // Step 2: greedy preflight.
            if pattern.greedy {
                pattern.ensure_greedy_prepared();
            }

            let mut current_node = list.next(start_node);
            let mut pos = start_pos;

            while !list.is_tail(current_node) {
                if let Some(r) = rematch.as_deref() {
                    if pos >= r.reach {
                        break;
                    }
                }

                // Step 3: safety valve.
                if list.len() > text.len() {
                    #[cfg(feature = "debug")]
                    log::error!(
                        "[match_grammar] fragment list ({} nodes) outgrew input text ({} bytes); aborting rule '{rule_name}'",
                        list.len(),
                        text.len()
                    );
                    return;
                }

                #[cfg(feature = "debug")]
                log::trace!("[match_grammar] rule '{rule_name}'[{pattern_index}] at pos {pos}");

                let is_text = list.value(current_node).map(Fragment::is_text).unwrap_or(false);

                if !is_text {
                    // Token nodes are opaque to both greedy and non-greedy
                    // search; greedy rules re-anchor against `text` directly
                    // in step 5 rather than inspecting this node's value.
                    pos += list.value(current_node).map(Fragment::len).unwrap_or(0);
                    current_node = list.next(current_node);
                    continue;
                }

                if pattern.greedy {
                    // Step 5: greedy match attempt.
                    let Some(found) = pattern.match_at(text, pos) else {
                        break;
                    };
                    if found.start >= text.len() {
                        break;
                    }

                    let mut p = pos + list.value(current_node).map(Fragment::len).unwrap_or(0);
                    while found.start >= p && !list.is_tail(list.next(current_node)) {
                        current_node = list.next(current_node);
                        p += list.value(current_node).map(Fragment::len).unwrap_or(0);
                    }
                    p -= list.value(current_node).map(Fragment::len).unwrap_or(0);
                    pos = p;

                    if !list.value(current_node).map(Fragment::is_text).unwrap_or(false) {
                        // The match would have to start inside an already
                        // classified Token; greedy rules don't look inside
                        // Tokens, so skip this node entirely.
                        pos += list.value(current_node).map(Fragment::len).unwrap_or(0);
                        current_node = list.next(current_node);
                        continue;
                    }

                    let mut remove_count = 0usize;
                    let mut k = current_node;
                    let mut kp = pos;
                    loop {
                        let k_is_text = list.value(k).map(Fragment::is_text).unwrap_or(false);
                        if list.is_tail(k) || !(kp < found.end || k_is_text) {
                            break;
                        }
                        remove_count += 1;
                        kp += list.value(k).map(Fragment::len).unwrap_or(0);
                        k = list.next(k);
                    }

                    let span_text = text.get(pos..kp).unwrap_or_default().to_string();
                    let (new_node, new_pos) = splice_match(
                        text,
                        list,
                        grammar,
                        root,
                        registry,
                        rule_name,
                        pattern_index,
                        pattern,
                        pos,
                        &span_text,
                        &found,
                        current_node,
                        remove_count,
                        &mut rematch,
                    );
                    current_node = new_node;
                    pos = new_pos;
                } else {
                    // Step 4: non-greedy match attempt.
                    let fragment_text = list.value(current_node).map(Fragment::text).unwrap_or_default();
                    let Some(found) = pattern.match_in_fragment(&fragment_text, pos) else {
                        pos += fragment_text.len();
                        current_node = list.next(current_node);
                        continue;
                    };

                    let (new_node, new_pos) = splice_match(
                        text,
                        list,
                        grammar,
                        root,
                        registry,
                        rule_name,
                        pattern_index,
                        pattern,
                        pos,
                        &fragment_text,
                        &found,
                        current_node,
                        1,
                        &mut rematch,
                    );
                    current_node = new_node;
                    pos = new_pos;
                }

                // Step 8: continue from the node the splice left us at.
                pos += list.value(current_node).map(Fragment::len).unwrap_or(0);
                current_node = list.next(current_node);
            }
        }
    }
}

/// Performs step 6 (splice) and step 7 (rematch propagation) for a single
/// match, returning the new current node (the inserted Token) and the
/// position it starts at — mirroring the cursor state the caller's walk
/// expects to resume from.
#[allow(clippy::too_many_arguments)]
fn splice_match(
    text: &str,
    list: &mut FragmentList,
    grammar: &Arc<Grammar>,
    root: &Arc<Grammar>,
    registry: Option<&Registry>,
    rule_name: &str,
    pattern_index: usize,
    pattern: &Pattern,
    span_start: usize,
    span_text: &str,
    m: &PatternMatch,
    current_node: NodeId,
    remove_count: usize,
    outer_rematch: &mut Option<&mut Rematch>,
) -> (NodeId, usize) {
    let from_local = m.start - span_start;
    let match_len = m.end - m.start;
    let before = span_text.get(..from_local).unwrap_or_default().to_string();
    let after = span_text.get(from_local + match_len..).unwrap_or_default().to_string();
    let matched = span_text
        .get(from_local..from_local + match_len)
        .unwrap_or_default()
        .to_string();
    let reach = span_start + span_text.len();

    if let Some(r) = outer_rematch.as_deref_mut() {
        if reach > r.reach {
            r.reach = reach;
        }
    }

    let mut anchor = list.prev(current_node);
    let mut pos = span_start;
    if !before.is_empty() {
        anchor = list.add_after(anchor, Fragment::Text(before));
        pos += list.value(anchor).map(Fragment::len).unwrap_or(0);
    }
    list.remove_range(anchor, remove_count);

    #[cfg(feature = "debug")]
    log::debug!(
        "[match_grammar] rule '{rule_name}' matched [{}..{}) ({} fragment(s) consumed)",
        m.start,
        m.end,
        remove_count
    );

    let content = match &pattern.inside {
        Some(inside_ref) => match resolve_inside(inside_ref, root, registry) {
            Some(inside_grammar) => {
                TokenContent::Nested(tokenize_fragments(&matched, &inside_grammar, &inside_grammar, registry))
            }
            None => TokenContent::Plain(matched.clone()),
        },
        None => TokenContent::Plain(matched.clone()),
    };

    let token = Token::new(rule_name.to_string(), content, pattern.alias.clone(), matched.len());
    let token_node = list.add_after(anchor, Fragment::Token(token));

    if !after.is_empty() {
        list.add_after(token_node, Fragment::Text(after));
    }

    if remove_count > 1 {
        #[cfg(feature = "debug")]
        log::debug!("[match_grammar] launching rematch for '{rule_name}'[{pattern_index}], reach {reach}");

        let mut nested = Rematch {
            cause_rule: rule_name.to_string(),
            cause_pattern: pattern_index,
            reach,
        };
        match_grammar(text, list, grammar, root, registry, anchor, pos, Some(&mut nested));
        if let Some(r) = outer_rematch.as_deref_mut() {
            if nested.reach > r.reach {
                r.reach = nested.reach;
            }
        }
    }

    (token_node, pos)
}

/// Resolves a pattern's `inside` reference to a concrete grammar, if
/// possible. `Named` references can only be resolved through a registry;
/// without one they're left unexpanded (see [`tokenize`]'s docs).
fn resolve_inside(inside: &GrammarRef, root: &Arc<Grammar>, registry: Option<&Registry>) -> Option<Arc<Grammar>> {
    match registry {
        Some(registry) => registry.resolve(inside, root),
        None => match inside {
            GrammarRef::Inline(g) => Some(g.clone()),
            GrammarRef::SelfRef => Some(root.clone()),
            GrammarRef::Named(_) => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::raw::RawGrammar;

    fn grammar(json: &str) -> Arc<Grammar> {
        RawGrammar::load_from_str(json).unwrap().compile().unwrap()
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let g = grammar(r#"{"number": "\\d+"}"#);
        assert_eq!(tokenize("", &g), Vec::new());
    }

    #[test]
    fn plain_text_with_no_matching_rule_stays_raw() {
        let g = grammar(r#"{"number": "\\d+"}"#);
        let out = tokenize("hello world", &g);
        assert_eq!(out, vec![Fragment::Text("hello world".to_string())]);
    }

    #[test]
    fn single_rule_produces_one_token() {
        let g = grammar(r#"{"number": "\\d+"}"#);
        let out = tokenize("x = 42;", &g);
        let text: String = out.iter().map(Fragment::text).collect();
        assert_eq!(text, "x = 42;");
        assert!(out.iter().any(|f| matches!(f, Fragment::Token(t) if t.kind == "number")));
    }

    #[test]
    fn length_preservation_holds_across_multiple_rules() {
        let g = grammar(
            r#"{
                "string": "\"[^\"]*\"",
                "number": "\\d+"
            }"#,
        );
        let input = r#"let a = "hi" + 3;"#;
        let out = tokenize(input, &g);
        assert_eq!(crate::token::flatten_text(&out), input);
    }

    #[test]
    fn lookbehind_excludes_captured_context_from_token() {
        let g = grammar(
            r#"{
                "punctuation": { "pattern": "(\\.)\\.", "lookbehind": true }
            }"#,
        );
        let out = tokenize("a..b", &g);
        let token = out
            .iter()
            .find_map(|f| match f {
                Fragment::Token(t) if t.kind == "punctuation" => Some(t),
                _ => None,
            })
            .expect("expected a punctuation token");
        assert_eq!(token.text(), ".");
    }

    #[test]
    fn nested_inside_grammar_recurses() {
        let g = grammar(
            r#"{
                "template": {
                    "pattern": "\\{\\{[^}]*\\}\\}",
                    "inside": {
                        "keyword": "if"
                    }
                }
            }"#,
        );
        let out = tokenize("before {{if}} after", &g);
        let template = out
            .iter()
            .find_map(|f| match f {
                Fragment::Token(t) if t.kind == "template" => Some(t),
                _ => None,
            })
            .expect("expected a template token");
        match &template.content {
            TokenContent::Nested(inner) => {
                assert!(inner
                    .iter()
                    .any(|f| matches!(f, Fragment::Token(t) if t.kind == "keyword")));
            }
            TokenContent::Plain(_) => panic!("expected nested content"),
        }
    }

    #[test]
    fn greedy_rule_subsumes_a_prior_token_and_rematches() {
        let g = grammar(
            r#"{
                "number": "\\d+",
                "comment": { "pattern": "//.*\\d+.*$", "greedy": true }
            }"#,
        );
        // "42" would be tokenized as `number` first; the greedy comment rule
        // must then delete that token and subsume the whole line into one
        // `comment` token.
        let out = tokenize("// see 42 above", &g);
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], Fragment::Token(t) if t.kind == "comment"));
        assert_eq!(crate::token::flatten_text(&out), "// see 42 above");
    }

    #[test]
    fn earlier_rule_wins_over_later_rule_on_overlap() {
        let first = grammar(
            r#"{
                "keyword": "let",
                "identifier": "[a-z]+"
            }"#,
        );
        let out = tokenize("let", &first);
        assert!(matches!(&out[0], Fragment::Token(t) if t.kind == "keyword"));

        let swapped = grammar(
            r#"{
                "identifier": "[a-z]+",
                "keyword": "let"
            }"#,
        );
        let out = tokenize("let", &swapped);
        assert!(matches!(&out[0], Fragment::Token(t) if t.kind == "identifier"));
    }

    #[test]
    fn rematch_terminates_on_repeated_greedy_overlap() {
        let g = grammar(
            r#"{
                "digit": "\\d",
                "run": { "pattern": "\\d+", "greedy": true }
            }"#,
        );
        let out = tokenize(&"7".repeat(200), &g);
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], Fragment::Token(t) if t.kind == "run"));
    }

    #[test]
    fn tokenize_with_resolves_named_inside_through_registry() {
        let registry = Registry::new();
        registry.register("inner", grammar(r#"{"keyword": "if"}"#));
        registry.register(
            "outer",
            grammar(r#"{"template": { "pattern": "\\{\\{[^}]*\\}\\}", "inside": "inner" }}"#),
        );

        let out = tokenize_with("before {{if}} after", "outer", &registry).unwrap();
        let template = out
            .iter()
            .find_map(|f| match f {
                Fragment::Token(t) if t.kind == "template" => Some(t),
                _ => None,
            })
            .expect("expected a template token");
        match &template.content {
            TokenContent::Nested(inner) => {
                assert!(inner.iter().any(|f| matches!(f, Fragment::Token(t) if t.kind == "keyword")));
            }
            TokenContent::Plain(_) => panic!("expected nested content"),
        }
    }

    #[test]
    fn tokenize_with_unknown_grammar_id_is_a_caller_error() {
        let registry = Registry::new();
        let err = tokenize_with("x", "nonexistent", &registry).unwrap_err();
        assert!(matches!(err, Error::GrammarNotFound(id) if id == "nonexistent"));
    }

    /// A TypeScript-flavored decorator rule spliced into a JavaScript-like
    /// base grammar via `insert_before`, then tokenized end to end, through
    /// the registry rather than the bare `compose` functions.
    #[test]
    fn composed_grammar_tokenizes_a_decorated_class() {
        let registry = Registry::new();
        registry.register(
            "javascript",
            grammar(
                r#"{
                    "keyword": "\\b(?:class|function)\\b",
                    "punctuation": "[{}()]",
                    "identifier": "[A-Za-z_][A-Za-z0-9_]*"
                }"#,
            ),
        );

        registry
            .insert_before(
                "javascript",
                "identifier",
                RawGrammar::load_from_str(r#"{"decorator": "@[A-Za-z_][A-Za-z0-9_]*"}"#).unwrap(),
            )
            .unwrap();

        let out = tokenize_with("@sealed class Foo {}", "javascript", &registry).unwrap();
        let kinds: Vec<&str> = out
            .iter()
            .filter_map(|f| match f {
                Fragment::Token(t) => Some(t.kind.as_str()),
                Fragment::Text(_) => None,
            })
            .collect();

        insta::assert_snapshot!(
            kinds.join(" "),
            @"decorator keyword identifier punctuation punctuation"
        );
        assert_eq!(crate::token::flatten_text(&out), "@sealed class Foo {}");
    }

    /// A grammar whose `rest` key inlines a shared sub-grammar, snapshotted
    /// to pin the observable rule order after flattening.
    #[test]
    fn rest_inlined_grammar_snapshot() {
        let g = grammar(
            r#"{
                "string": "\"[^\"]*\"",
                "rest": {
                    "number": "\\d+",
                    "identifier": "[a-z]+"
                }
            }"#,
        );
        let out = tokenize(r#"x = "hi" 42"#, &g);
        let kinds: Vec<&str> = out
            .iter()
            .filter_map(|f| match f {
                Fragment::Token(t) => Some(t.kind.as_str()),
                Fragment::Text(_) => None,
            })
            .collect();
        insta::assert_snapshot!(kinds.join(" "), @"identifier string number");
    }
}
