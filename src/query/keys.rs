//! Keyword expression trees.
//!
//! Callers either parse a user-typed string or build the tree directly.
//! Before compilation the tree is normalized: phrases expand into AND groups
//! of their words, duplicates are eliminated, too-short words move to the
//! ignored list, and degenerate nesting collapses.

use std::collections::HashSet;

use crate::tokenizer::{canonicalize_word, split_words, truncate_bytes, MAX_WORD_BYTES};

/// Conjunction of a keyword or filter group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

impl Conjunction {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Conjunction::And => " AND ",
            Conjunction::Or => " OR ",
        }
    }
}

impl Default for Conjunction {
    fn default() -> Self {
        Conjunction::And
    }
}

/// A keyword expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Keys {
    /// A single term; multi-word input is split and AND-ed on normalization.
    Term(String),
    /// A quoted phrase, kept intact through parsing. Word positions are not
    /// stored, so it matches as an AND group of its words.
    Phrase(String),
    Group {
        conjunction: Conjunction,
        negated: bool,
        children: Vec<Keys>,
    },
}

impl Keys {
    /// Parse a user-typed keyword string. Whitespace separates terms, double
    /// quotes delimit phrases, and the terms combine under `conjunction`.
    /// Returns `None` for blank input.
    pub fn parse(input: &str, conjunction: Conjunction) -> Option<Keys> {
        let mut children = Vec::new();
        let mut rest = input.trim();
        while !rest.is_empty() {
            if let Some(after_quote) = rest.strip_prefix('"') {
                let (phrase, tail) = match after_quote.find('"') {
                    Some(end) => (&after_quote[..end], &after_quote[end + 1..]),
                    // unbalanced quote: the rest of the input is the phrase
                    None => (after_quote, ""),
                };
                if !phrase.trim().is_empty() {
                    children.push(Keys::Phrase(phrase.trim().to_string()));
                }
                rest = tail.trim_start();
            } else {
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                let (term, tail) = rest.split_at(end);
                let term = term.trim_matches('"');
                if !term.is_empty() {
                    children.push(Keys::Term(term.to_string()));
                }
                rest = tail.trim_start();
            }
        }
        if children.is_empty() {
            None
        } else {
            Some(Keys::Group {
                conjunction,
                negated: false,
                children,
            })
        }
    }

    pub fn and(children: Vec<Keys>) -> Keys {
        Keys::Group {
            conjunction: Conjunction::And,
            negated: false,
            children,
        }
    }

    pub fn or(children: Vec<Keys>) -> Keys {
        Keys::Group {
            conjunction: Conjunction::Or,
            negated: false,
            children,
        }
    }

    pub fn negated(self) -> Keys {
        match self {
            Keys::Group {
                conjunction,
                children,
                ..
            } => Keys::Group {
                conjunction,
                negated: true,
                children,
            },
            leaf => Keys::Group {
                conjunction: Conjunction::And,
                negated: true,
                children: vec![leaf],
            },
        }
    }
}

/// Normalized keyword tree: only canonical words and groups remain.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WordTree {
    Word(String),
    Group {
        conjunction: Conjunction,
        negated: bool,
        children: Vec<WordTree>,
    },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NormalizedKeys {
    pub root: Option<WordTree>,
    /// Terms dropped for being shorter than the minimum word length.
    pub ignored: Vec<String>,
}

/// Normalize a keyword tree against the index's minimum word length.
pub(crate) fn normalize(keys: &Keys, min_chars: usize) -> NormalizedKeys {
    let mut seen = HashSet::new();
    let mut ignored = Vec::new();
    let root = normalize_node(keys, min_chars, &mut seen, &mut ignored);
    // A directly negated top-level group would lose its conjunction
    // semantics; wrap it as the only child of a plain AND group.
    let root = root.map(|node| match node {
        WordTree::Group { negated: true, .. } => WordTree::Group {
            conjunction: Conjunction::And,
            negated: false,
            children: vec![node],
        },
        other => other,
    });
    NormalizedKeys { root, ignored }
}

fn normalize_node(
    node: &Keys,
    min_chars: usize,
    seen: &mut HashSet<String>,
    ignored: &mut Vec<String>,
) -> Option<WordTree> {
    match node {
        Keys::Term(text) | Keys::Phrase(text) => {
            let mut words = Vec::new();
            for raw in split_words(text) {
                if let Some(word) = normalize_word(raw, min_chars, seen, ignored) {
                    words.push(WordTree::Word(word));
                }
            }
            match words.len() {
                0 => None,
                1 => words.pop(),
                _ => Some(WordTree::Group {
                    conjunction: Conjunction::And,
                    negated: false,
                    children: words,
                }),
            }
        }
        Keys::Group {
            conjunction,
            negated,
            children,
        } => {
            let mut kept: Vec<WordTree> = children
                .iter()
                .filter_map(|c| normalize_node(c, min_chars, seen, ignored))
                .collect();
            match kept.len() {
                0 => None,
                // redundant single-child nesting collapses, unless the
                // group carries a negation
                1 if !negated => kept.pop(),
                _ => Some(WordTree::Group {
                    conjunction: *conjunction,
                    negated: *negated,
                    children: kept,
                }),
            }
        }
    }
}

fn normalize_word(
    raw: &str,
    min_chars: usize,
    seen: &mut HashSet<String>,
    ignored: &mut Vec<String>,
) -> Option<String> {
    let word = canonicalize_word(raw);
    if word.chars().count() < min_chars {
        if !ignored.contains(&raw.to_string()) {
            ignored.push(raw.to_string());
        }
        return None;
    }
    let word = if word.len() > MAX_WORD_BYTES {
        truncate_bytes(&word, MAX_WORD_BYTES).to_string()
    } else {
        word
    };
    // only the first occurrence of a term is kept, across the whole tree
    if seen.insert(word.clone()) {
        Some(word)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(node: &WordTree) -> Vec<String> {
        match node {
            WordTree::Word(w) => vec![w.clone()],
            WordTree::Group { children, .. } => {
                children.iter().flat_map(words).collect()
            }
        }
    }

    #[test]
    fn test_parse_splits_on_whitespace() {
        let keys = Keys::parse("foo bar  baz", Conjunction::And).unwrap();
        match keys {
            Keys::Group {
                conjunction,
                negated,
                children,
            } => {
                assert_eq!(conjunction, Conjunction::And);
                assert!(!negated);
                assert_eq!(
                    children,
                    vec![
                        Keys::Term("foo".into()),
                        Keys::Term("bar".into()),
                        Keys::Term("baz".into())
                    ]
                );
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_keeps_quoted_phrases() {
        let keys = Keys::parse("foo \"multi word\" bar", Conjunction::And).unwrap();
        match keys {
            Keys::Group { children, .. } => {
                assert_eq!(children[1], Keys::Phrase("multi word".into()));
                assert_eq!(children.len(), 3);
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_blank_input() {
        assert_eq!(Keys::parse("   ", Conjunction::And), None);
    }

    #[test]
    fn test_phrase_normalizes_to_and_group() {
        let norm = normalize(&Keys::Phrase("multi word".into()), 1);
        match norm.root.unwrap() {
            WordTree::Group {
                conjunction,
                children,
                ..
            } => {
                assert_eq!(conjunction, Conjunction::And);
                assert_eq!(children.len(), 2);
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_short_words_are_ignored() {
        let keys = Keys::parse("foo test", Conjunction::And).unwrap();
        let norm = normalize(&keys, 4);
        assert_eq!(norm.ignored, vec!["foo"]);
        assert_eq!(norm.root, Some(WordTree::Word("test".into())));
    }

    #[test]
    fn test_all_words_ignored_leaves_no_root() {
        let keys = Keys::parse("a be", Conjunction::And).unwrap();
        let norm = normalize(&keys, 3);
        assert_eq!(norm.root, None);
        assert_eq!(norm.ignored, vec!["a", "be"]);
    }

    #[test]
    fn test_duplicates_eliminated_across_tree() {
        let keys = Keys::and(vec![
            Keys::Term("foo".into()),
            Keys::or(vec![Keys::Term("foo".into()), Keys::Term("bar".into())]),
        ]);
        let norm = normalize(&keys, 1);
        let all = words(&norm.root.unwrap());
        assert_eq!(all, vec!["foo", "bar"]);
    }

    #[test]
    fn test_redundant_nesting_collapses() {
        let keys = Keys::and(vec![Keys::and(vec![Keys::and(vec![Keys::Term(
            "foo".into(),
        )])])]);
        let norm = normalize(&keys, 1);
        assert_eq!(norm.root, Some(WordTree::Word("foo".into())));
    }

    #[test]
    fn test_negated_single_child_group_survives() {
        let keys = Keys::and(vec![
            Keys::Term("foo".into()),
            Keys::and(vec![Keys::Term("bar".into())]).negated(),
        ]);
        let norm = normalize(&keys, 1);
        match norm.root.unwrap() {
            WordTree::Group { children, .. } => {
                assert!(matches!(
                    &children[1],
                    WordTree::Group { negated: true, .. }
                ));
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_top_level_negated_group_is_wrapped() {
        let keys = Keys::and(vec![
            Keys::Term("foo".into()),
            Keys::Term("bar".into()),
        ])
        .negated();
        let norm = normalize(&keys, 1);
        match norm.root.unwrap() {
            WordTree::Group {
                negated: false,
                conjunction: Conjunction::And,
                children,
            } => {
                assert_eq!(children.len(), 1);
                assert!(matches!(
                    &children[0],
                    WordTree::Group { negated: true, .. }
                ));
            }
            other => panic!("expected wrapper group, got {:?}", other),
        }
    }

    #[test]
    fn test_terms_are_canonicalized() {
        let keys = Keys::parse("FOO 007", Conjunction::And).unwrap();
        let norm = normalize(&keys, 1);
        let all = words(&norm.root.unwrap());
        assert_eq!(all, vec!["foo", "7"]);
    }
}
