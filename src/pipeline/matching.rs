//! Fuzzy name matching between a registered name and an extracted name.
//!
//! Normalization is order-independent (tokens sorted after cleanup), so
//! "OCHIENG EASTON MICHURA" and "Easton Michura Ochieng" compare equal.
//! The similarity floors tolerate OCR substitution errors and missing
//! middle names.

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Default similarity bar for declaring a match.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.7;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameMatchResult {
    pub is_match: bool,
    pub confidence: f32,
    pub normalized_registered: String,
    pub normalized_extracted: String,
    pub method: String,
    pub explanation: String,
}

pub struct NameMatcher {
    threshold: f32,
}

impl Default for NameMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl NameMatcher {
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    pub fn with_threshold(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Compare a registered name against an extracted one.
    pub fn match_names(&self, registered: &str, extracted: &str) -> NameMatchResult {
        let normalized_registered = normalize_name(registered);
        let normalized_extracted = normalize_name(extracted);

        let similarity = if normalized_registered.is_empty() || normalized_extracted.is_empty() {
            0.0
        } else {
            self.similarity(&normalized_registered, &normalized_extracted)
        };

        let is_match = similarity >= self.threshold;
        let verdict = if is_match { "MATCH" } else { "NO MATCH" };
        NameMatchResult {
            is_match,
            confidence: similarity,
            normalized_registered,
            normalized_extracted,
            method: "fuzzy_matching".to_string(),
            explanation: format!("Similarity: {similarity:.2} ({verdict})"),
        }
    }

    /// Maximum over: exact match, character sequence ratio, token subset
    /// floor, and a shared-token floor scaled by the overlap fraction.
    fn similarity(&self, a: &str, b: &str) -> f32 {
        if a == b {
            return 1.0;
        }
        let seq = sequence_ratio(a, b);

        let tokens_a: Vec<&str> = a.split_whitespace().collect();
        let tokens_b: Vec<&str> = b.split_whitespace().collect();
        let set_a: std::collections::HashSet<&str> = tokens_a.iter().copied().collect();
        let set_b: std::collections::HashSet<&str> = tokens_b.iter().copied().collect();

        if set_a.is_subset(&set_b) || set_b.is_subset(&set_a) {
            return seq.max(0.8);
        }

        let common = set_a.intersection(&set_b).count();
        if common > 0 {
            let larger = set_a.len().max(set_b.len()) as f32;
            return seq.max(0.7 * common as f32 / larger);
        }
        seq
    }
}

/// Canonical comparison form: decomposed with diacritics dropped, letters
/// only, lowercased, single-letter tokens removed (initials are unreliable
/// in OCR output), tokens sorted.
pub fn normalize_name(name: &str) -> String {
    let mut tokens: Vec<String> = name
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c.is_alphabetic() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .filter(|t| t.len() > 1)
        .map(str::to_string)
        .collect();
    tokens.sort();
    tokens.join(" ")
}

/// Ratcliff/Obershelp ratio: twice the total matched characters over the
/// combined length, matches found by recursive longest common substring.
fn sequence_ratio(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matched_chars(&a, &b);
    2.0 * matched as f32 / total as f32
}

fn matched_chars(a: &[char], b: &[char]) -> usize {
    let (ia, ib, len) = longest_common_substring(a, b);
    if len == 0 {
        return 0;
    }
    len + matched_chars(&a[..ia], &b[..ib]) + matched_chars(&a[ia + len..], &b[ib + len..])
}

fn longest_common_substring(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // Rolling single-row DP keyed on the shorter dimension.
    let mut row = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut prev_diag = 0;
        for (j, cb) in b.iter().enumerate() {
            let current = row[j + 1];
            if ca == cb {
                let run = prev_diag + 1;
                row[j + 1] = run;
                if run > best.2 {
                    best = (i + 1 - run, j + 1 - run, run);
                }
            } else {
                row[j + 1] = 0;
            }
            prev_diag = current;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_name_after_normalization_is_full_confidence() {
        let result = NameMatcher::new().match_names("Easton Michura Ochieng", "EASTON MICHURA OCHIENG");
        assert!(result.is_match);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn word_order_does_not_matter() {
        let result = NameMatcher::new().match_names("Ochieng Easton Michura", "Easton Michura Ochieng");
        assert!(result.is_match);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn matching_is_symmetric() {
        let matcher = NameMatcher::new();
        let pairs = [
            ("Easton Michura Ochieng", "EASTON OCHIENG"),
            ("Jane Wanjiru", "Grace Atieno"),
            ("Peter K Mwangi", "Peter Mwangi"),
        ];
        for (a, b) in pairs {
            assert_eq!(
                matcher.match_names(a, b).is_match,
                matcher.match_names(b, a).is_match
            );
        }
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_name("  José K. OCHIENG-Otieno ");
        assert_eq!(normalize_name(&once), once);
    }

    #[test]
    fn missing_middle_name_floors_at_subset_bonus() {
        let result = NameMatcher::new().match_names("Easton Michura Ochieng", "Easton Ochieng");
        assert!(result.is_match);
        assert!(result.confidence >= 0.8);
    }

    #[test]
    fn ocr_substitution_still_matches() {
        // OCR commonly reads I as 1-like glyphs or swaps single letters.
        let result = NameMatcher::new().match_names("Easton Michura Ochieng", "EASTON MICHURA OCHIANG");
        assert!(result.is_match);
        assert!(result.confidence >= 0.7);
    }

    #[test]
    fn unrelated_names_do_not_match() {
        let result = NameMatcher::new().match_names("Easton Michura Ochieng", "Grace Wanjiru Kamau");
        assert!(!result.is_match);
        assert!(result.confidence < 0.7);
    }

    #[test]
    fn empty_extracted_name_never_matches() {
        let result = NameMatcher::new().match_names("Easton Michura Ochieng", "");
        assert!(!result.is_match);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn single_letter_initials_are_dropped() {
        assert_eq!(normalize_name("Peter K Mwangi"), "mwangi peter");
    }

    #[test]
    fn diacritics_are_stripped() {
        assert_eq!(normalize_name("José Núñez"), "jose nunez");
    }

    #[test]
    fn explanation_carries_similarity_and_verdict() {
        let result = NameMatcher::new().match_names("Jane Wanjiru", "Jane Wanjiru");
        assert_eq!(result.explanation, "Similarity: 1.00 (MATCH)");
        assert_eq!(result.method, "fuzzy_matching");
    }
}
