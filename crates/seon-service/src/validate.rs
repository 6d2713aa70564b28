//! Query screening and sanitization.
//!
//! Runs before any limiter slot or upstream call is spent. Pure: no state,
//! no I/O.

use std::sync::LazyLock;

use regex::Regex;

/// Minimum trimmed query length, in characters.
pub const MIN_QUERY_CHARS: usize = 2;
/// Maximum trimmed query length, in characters.
pub const MAX_QUERY_CHARS: usize = 200;

/// A character repeated this many times in a row is rejected.
const MAX_REPEAT_RUN: usize = 11;

const SPAM_PHRASES: [&str; 8] = [
    "click here",
    "buy now",
    "limited time",
    "act now",
    "free money",
    "guaranteed",
    "no obligation",
    "risk free",
];

static BLOCKED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // markup / script injection
        r"(?i)(<script|javascript:|data:|vbscript:)",
        // symbol runs
        r#"[^\w\s\-.,?!'"()]{5,}"#,
        // one oversized word
        r"\b\w{50,}\b",
        r"[!?]{5,}",
        r"[A-Z]{30,}",
    ]
    .into_iter()
    .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("invalid blocked pattern {p:?}: {e}")))
    .collect()
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap_or_else(|e| panic!("invalid pattern: {e}")));

/// Why a query was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationFailure {
    #[error("query is required and must be a string")]
    Missing,

    #[error("search query must be at least 2 characters long")]
    TooShort,

    #[error("search query must be at most 200 characters long")]
    TooLong,

    #[error("query contains invalid characters or patterns")]
    BlockedPattern,

    #[error("query contains content that appears to be spam")]
    Spam,

    #[error("valid file names are required")]
    NoCandidateFiles,
}

/// Screens a raw query and returns its sanitized form.
///
/// The sanitized query has whitespace runs collapsed to a single space,
/// angle brackets removed, and is at most [`MAX_QUERY_CHARS`] long.
pub fn validate(raw: &str) -> Result<String, ValidationFailure> {
    if raw.is_empty() {
        return Err(ValidationFailure::Missing);
    }

    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len < MIN_QUERY_CHARS {
        return Err(ValidationFailure::TooShort);
    }
    if len > MAX_QUERY_CHARS {
        return Err(ValidationFailure::TooLong);
    }

    if has_repeat_run(trimmed, MAX_REPEAT_RUN)
        || BLOCKED_PATTERNS.iter().any(|re| re.is_match(trimmed))
    {
        return Err(ValidationFailure::BlockedPattern);
    }

    let lower = trimmed.to_lowercase();
    if SPAM_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return Err(ValidationFailure::Spam);
    }

    let collapsed = WHITESPACE_RUN.replace_all(trimmed, " ");
    Ok(collapsed
        .chars()
        .filter(|c| !matches!(c, '<' | '>'))
        .take(MAX_QUERY_CHARS)
        .collect())
}

/// Returns true if any single character occurs `run` or more times in a row.
fn has_repeat_run(text: &str, run: usize) -> bool {
    let mut prev = None;
    let mut count = 0;
    for c in text.chars() {
        if Some(c) == prev {
            count += 1;
        } else {
            prev = Some(c);
            count = 1;
        }
        if count >= run {
            return true;
        }
    }
    false
}
