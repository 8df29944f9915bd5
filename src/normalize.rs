//! Query normalization and the token-overlap relevance filter

use std::collections::HashSet;

/// Trim, collapse whitespace runs to single spaces and lowercase.
///
/// The result is used verbatim as cache key, store key and extractor input,
/// so it must be stable: `normalize_query(normalize_query(s)) == normalize_query(s)`.
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Lowercased whitespace-separated tokens of `text`.
pub fn query_tokens(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Distinct lowercased tokens of `text`.
fn distinct_tokens(text: &str) -> HashSet<String> {
    query_tokens(text).into_iter().collect()
}

/// Number of distinct query tokens that also appear among the title's tokens.
pub fn relevance_overlap(query: &str, title: &str) -> usize {
    let title_tokens = distinct_tokens(title);
    distinct_tokens(query)
        .iter()
        .filter(|token| title_tokens.contains(*token))
        .count()
}

/// A candidate is relevant when at least half (rounded up) of the query's
/// distinct tokens appear in its title. Coarse filter only, not a ranking signal.
pub fn is_relevant(query: &str, title: &str) -> bool {
    let wanted = distinct_tokens(query).len();
    if wanted == 0 {
        return false;
    }
    relevance_overlap(query, title) >= wanted.div_ceil(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_and_lowercases() {
        assert_eq!(normalize_query("  Wireless   Mouse  "), "wireless mouse");
        assert_eq!(normalize_query("USB\tC\n Hub"), "usb c hub");
    }

    #[test]
    fn whitespace_only_normalizes_to_empty() {
        assert_eq!(normalize_query(""), "");
        assert_eq!(normalize_query(" \t\n "), "");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["  Wireless   Mouse  ", "iPhone 15 PRO", "", "a  b\tc", "Ünïcode  Tëxt"] {
            let once = normalize_query(raw);
            assert_eq!(normalize_query(&once), once, "input: {raw:?}");
        }
    }

    #[test]
    fn full_overlap_is_relevant() {
        assert_eq!(relevance_overlap("wireless mouse", "Wireless Mouse for Laptop"), 2);
        assert!(is_relevant("wireless mouse", "Wireless Mouse for Laptop"));
    }

    #[test]
    fn zero_overlap_is_discarded() {
        assert_eq!(relevance_overlap("wireless mouse", "Bluetooth Keyboard"), 0);
        assert!(!is_relevant("wireless mouse", "Bluetooth Keyboard"));
    }

    #[test]
    fn half_of_the_tokens_is_enough() {
        // 3 tokens -> needs 2
        assert!(is_relevant("logitech wireless mouse", "HP Wireless Mouse"));
        assert!(!is_relevant("logitech wireless mouse", "HP Wired Mouse"));
        // 2 tokens -> needs 1
        assert!(is_relevant("wireless mouse", "Gaming Mouse"));
    }

    #[test]
    fn repeated_query_tokens_count_once() {
        assert_eq!(relevance_overlap("mouse mouse pad", "Gaming Mouse"), 1);
        // distinct tokens {mouse, pad} -> needs 1
        assert!(is_relevant("mouse mouse pad", "Gaming Mouse"));
        assert!(!is_relevant("pad pad pad mouse", "Keyboard Wrist Rest"));
    }

    #[test]
    fn empty_query_is_never_relevant() {
        assert!(!is_relevant("", "Anything"));
    }
}
