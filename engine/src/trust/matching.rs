//! Glob-style matching of classification labels against trust patterns.
//!
//! `imports:*` matches `imports:added` and `imports:removed`; `imports`
//! without a wildcard matches only the literal label `imports`. Matching is
//! pure and deterministic — it underlies auto-approval, so a false positive
//! here silently approves a hunk a human never saw.

use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;

/// Result of checking a hunk's labels against the trust list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustEvaluation {
    /// True iff the hunk has at least one label and every label is covered
    /// by some trust pattern.
    pub all_trusted: bool,
    /// Labels not covered by any trust pattern.
    pub untrusted: Vec<String>,
}

/// Check whether `label` matches `pattern`.
///
/// Without a `*` the match is exact. With wildcards the pattern is compiled
/// by escaping every regex metacharacter and replacing `*` with `.*`,
/// anchored over the whole label.
pub fn matches_pattern(label: &str, pattern: &str) -> bool {
    if !pattern.contains('*') {
        return label == pattern;
    }
    compiled(pattern).is_some_and(|re| re.is_match(label))
}

/// Check whether `label` matches any pattern in `patterns`.
pub fn matches_any_pattern(label: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| matches_pattern(label, p))
}

/// Evaluate a hunk's labels against the trust list.
///
/// A hunk with zero labels is never trusted: an unlabeled change is
/// ambiguous and always requires human review.
pub fn evaluate_trust(labels: &[String], trust_list: &[String]) -> TrustEvaluation {
    if labels.is_empty() {
        return TrustEvaluation {
            all_trusted: false,
            untrusted: Vec::new(),
        };
    }

    let untrusted: Vec<String> = labels
        .iter()
        .filter(|label| !matches_any_pattern(label, trust_list))
        .cloned()
        .collect();

    TrustEvaluation {
        all_trusted: untrusted.is_empty(),
        untrusted,
    }
}

/// Compile a wildcard pattern, caching the result. Patterns come from the
/// user's trust list, which is small and repeats on every evaluation.
fn compiled(pattern: &str) -> Option<Regex> {
    static CACHE: Mutex<Option<HashMap<String, Option<Regex>>>> = Mutex::new(None);

    let mut guard = CACHE.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let cache = guard.get_or_insert_with(HashMap::new);
    cache
        .entry(pattern.to_owned())
        .or_insert_with(|| {
            let anchored = format!("^{}$", regex::escape(pattern).replace("\\*", ".*"));
            Regex::new(&anchored).ok()
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_exact_match() {
        assert!(matches_pattern("imports:added", "imports:added"));
        assert!(!matches_pattern("imports:added", "imports:removed"));
        assert!(matches_pattern("x", "x"));
        assert!(!matches_pattern("x", "y"));
    }

    #[test]
    fn test_suffix_wildcard() {
        assert!(matches_pattern("imports:added", "imports:*"));
        assert!(matches_pattern("imports:removed", "imports:*"));
        assert!(!matches_pattern("imports:added", "formatting:*"));
    }

    #[test]
    fn test_prefix_wildcard() {
        assert!(matches_pattern("imports:added", "*:added"));
        assert!(matches_pattern("comments:added", "*:added"));
        assert!(!matches_pattern("imports:removed", "*:added"));
    }

    #[test]
    fn test_no_wildcard_means_no_prefix_match() {
        // "imports" must not cover "imports:added".
        assert!(!matches_pattern("imports:added", "imports"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(matches_pattern("file.name", "file.name"));
        assert!(!matches_pattern("filexname", "file.name"));
        assert!(matches_pattern("a+b", "a+b"));
        assert!(!matches_pattern("aab", "a+b"));
        assert!(matches_pattern("a(x)b:done", "a(x)b:*"));
    }

    #[test]
    fn test_wildcard_edge_cases() {
        assert!(matches_pattern("anything", "*"));
        assert!(matches_pattern("", "*"));
        assert!(matches_pattern("a:b", "*:*"));
        assert!(matches_pattern("", ""));
        assert!(!matches_pattern("something", ""));
    }

    #[test]
    fn test_matches_any_pattern() {
        let patterns = strings(&["imports:*", "formatting:*"]);
        assert!(matches_any_pattern("imports:added", &patterns));
        assert!(matches_any_pattern("formatting:whitespace", &patterns));
        assert!(!matches_any_pattern("comments:added", &patterns));
        assert!(!matches_any_pattern("imports:added", &[]));
    }

    #[test]
    fn test_empty_labels_never_trusted() {
        let eval = evaluate_trust(&[], &strings(&["*"]));
        assert!(!eval.all_trusted);
        assert!(eval.untrusted.is_empty());
    }

    #[test]
    fn test_all_labels_must_be_covered() {
        let trust = strings(&["imports:*"]);

        let eval = evaluate_trust(&strings(&["imports:added"]), &trust);
        assert!(eval.all_trusted);

        let eval = evaluate_trust(&strings(&["imports:added", "code:logic"]), &trust);
        assert!(!eval.all_trusted);
        assert_eq!(eval.untrusted, strings(&["code:logic"]));
    }

    #[test]
    fn test_evaluation_is_reproducible() {
        let labels = strings(&["imports:added", "comments:added"]);
        let trust = strings(&["imports:*", "comments:*"]);
        let first = evaluate_trust(&labels, &trust);
        for _ in 0..10 {
            assert_eq!(evaluate_trust(&labels, &trust), first);
        }
    }
}
