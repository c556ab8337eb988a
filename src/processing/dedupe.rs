//! Sentence-level duplicate removal.
//!
//! A heuristic, not a linguistic sentence splitter: a sentence ends at `.`, `!` or `?`
//! followed by whitespace. Abbreviations such as "e.g. " split too. Comparison is exact and
//! case-sensitive on the trimmed sentence, so differing interior whitespace keeps two
//! sentences distinct.

use std::collections::HashSet;

/// Text with repeated sentences removed, plus how many were dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deduplicated {
    /// Kept sentences joined by single spaces.
    pub text: String,
    /// Number of candidate sentences discarded as repeats.
    pub removed: usize,
}

/// Keep the first occurrence of each sentence, in original order.
pub fn deduplicate(text: &str) -> String {
    deduplicate_with_stats(text).text
}

/// Same as [`deduplicate`], also reporting the number of removed sentences.
pub fn deduplicate_with_stats(text: &str) -> Deduplicated {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    let mut removed = 0;

    for sentence in sentences(text) {
        if seen.insert(sentence) {
            kept.push(sentence);
        } else {
            removed += 1;
        }
    }

    Deduplicated {
        text: kept.join(" "),
        removed,
    }
}

/// Split into trimmed, non-empty sentence candidates.
fn sentences(text: &str) -> impl Iterator<Item = &str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next_index, next)) = chars.peek()
            && next.is_whitespace()
        {
            pieces.push(&text[start..next_index]);
            start = next_index;
        }
    }
    pieces.push(&text[start..]);

    pieces
        .into_iter()
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
}
