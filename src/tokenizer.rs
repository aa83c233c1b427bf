//! Fulltext tokenization and relevance accumulation.
//!
//! Text is split on runs of non-letter/non-digit characters (Unicode-aware),
//! lower-cased and canonicalized. Scores decay with the number of distinct
//! words already seen, so words early in a text weigh more than words buried
//! deep in a long one.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

/// Maximum stored word length, in bytes.
pub(crate) const MAX_WORD_BYTES: usize = 50;

fn word_boundary() -> &'static Regex {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    BOUNDARY.get_or_init(|| Regex::new(r"[^\p{L}\p{N}]+").expect("static pattern"))
}

/// Split text into raw word tokens.
pub(crate) fn split_words(text: &str) -> impl Iterator<Item = &str> {
    word_boundary().split(text).filter(|w| !w.is_empty())
}

/// Lower-case a raw token; purely numeric tokens additionally lose leading
/// zeros and a leading minus so "007" and "7" match.
pub(crate) fn canonicalize_word(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let unsigned = lower.strip_prefix('-').unwrap_or(&lower);
    if !unsigned.is_empty() && unsigned.bytes().all(|b| b.is_ascii_digit()) {
        let stripped = unsigned.trim_start_matches('0');
        return if stripped.is_empty() {
            "0".to_string()
        } else {
            stripped.to_string()
        };
    }
    lower
}

/// Truncate to at most `max` bytes without splitting a character.
pub(crate) fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Accumulates scored words for one field of one item.
///
/// Duplicate words sum their scores; the distinct-word count drives the
/// decaying focus factor applied to each incoming token.
pub(crate) struct WordAccumulator {
    min_chars: usize,
    distinct: HashSet<String>,
    scores: HashMap<String, f64>,
    order: Vec<String>,
}

impl WordAccumulator {
    pub fn new(min_chars: usize) -> Self {
        WordAccumulator {
            min_chars,
            distinct: HashSet::new(),
            scores: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Weight applied to the next token, from the count of distinct words
    /// seen so far.
    fn focus(&self) -> f64 {
        (0.01 + 3.5 / (2.0 + self.distinct.len() as f64 * 0.015)).min(1.0)
    }

    /// Tokenize `text` and feed every token with the given base score.
    pub fn add_text(&mut self, text: &str, base_score: f64) {
        for raw in split_words(text) {
            self.add_word(raw, base_score);
        }
    }

    fn add_word(&mut self, raw: &str, base_score: f64) {
        let word = canonicalize_word(raw);
        if word.chars().count() < self.min_chars {
            return;
        }
        let word = if word.len() > MAX_WORD_BYTES {
            // Over-long tokens are mis-tokenized input; re-split them, and
            // only hard-truncate a single unbreakable run.
            let parts: Vec<String> = split_words(&word).map(str::to_string).collect();
            if parts.len() > 1 {
                for part in parts {
                    self.add_word(&part, base_score);
                }
                return;
            }
            log::warn!(
                "word longer than {} bytes was truncated during indexing",
                MAX_WORD_BYTES
            );
            truncate_bytes(&word, MAX_WORD_BYTES).to_string()
        } else {
            word
        };
        let score = base_score * self.focus();
        if self.distinct.insert(word.clone()) {
            self.order.push(word.clone());
        }
        *self.scores.entry(word).or_insert(0.0) += score;
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Scored words in first-seen order.
    pub fn finish(mut self) -> Vec<(String, f64)> {
        self.order
            .drain(..)
            .map(|w| {
                let score = self.scores.remove(&w).unwrap_or(0.0);
                (w, score)
            })
            .collect()
    }
}
