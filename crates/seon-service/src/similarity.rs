//! Near-duplicate detection by normalized Levenshtein similarity.

/// Similarity at or above which two queries count as the same.
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Lowercases, collapses whitespace runs and trims.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Returns `true` if `a` and `b` are at least `threshold` similar.
///
/// Similarity is `(max_len - edit_distance) / max_len` over the normalized
/// strings. Two strings that normalize to empty are similar.
pub fn is_similar(a: &str, b: &str, threshold: f64) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    if a == b {
        return true;
    }

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return true;
    }

    let distance = levenshtein(&a, &b);
    let similarity = (longest - distance) as f64 / longest as f64;
    similarity >= threshold
}

/// Unit-cost edit distance, two-row dynamic programming.
pub fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn identical_queries_are_similar() {
        for q in ["a", "setup guide", "How do I deploy?"] {
            assert!(is_similar(q, q, DEFAULT_THRESHOLD));
        }
    }

    #[test]
    fn whitespace_and_case_are_ignored() {
        assert!(is_similar("hello world", "hello   world", DEFAULT_THRESHOLD));
        assert!(is_similar("  Setup Guide", "setup guide ", DEFAULT_THRESHOLD));
    }

    #[test]
    fn unrelated_queries_are_not_similar() {
        assert!(!is_similar("abc", "xyz", DEFAULT_THRESHOLD));
        assert!(!is_similar("setup guide", "release notes", DEFAULT_THRESHOLD));
    }

    #[test]
    fn small_edits_cross_the_threshold() {
        // 1 edit over 11 chars: 0.909
        assert!(is_similar("setup guide", "setup guids", DEFAULT_THRESHOLD));
        // 3 edits over 11 chars: 0.727
        assert!(!is_similar("setup guide", "setup gxxxe", DEFAULT_THRESHOLD));
        assert!(is_similar("setup guide", "setup gxxxe", 0.7));
    }

    #[test]
    fn empty_strings_are_similar() {
        assert!(is_similar("", "   ", DEFAULT_THRESHOLD));
        assert!(!is_similar("", "docs", DEFAULT_THRESHOLD));
    }

    #[test]
    fn levenshtein_classic_cases() {
        assert_eq!(levenshtein(&chars("kitten"), &chars("sitting")), 3);
        assert_eq!(levenshtein(&chars("flaw"), &chars("lawn")), 2);
        assert_eq!(levenshtein(&chars(""), &chars("abc")), 3);
        assert_eq!(levenshtein(&chars("abc"), &chars("abc")), 0);
    }
}
