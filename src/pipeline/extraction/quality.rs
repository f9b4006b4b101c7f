//! Heuristic scoring of extracted text for academic-document-ness.
//!
//! Used by every strategy to self-report confidence and by the transcript
//! extractor to rank candidate texts. Purely additive weights, capped at 1.0.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::types::StrategyFamily;

/// Texts shorter than this never score above 0 for digital extraction.
pub const MIN_LEN_DIGITAL: usize = 20;

/// OCR output is noisier; require more characters before trusting any of it.
pub const MIN_LEN_OPTICAL: usize = 50;

/// Keyword categories. Each category found contributes 0.1, capped at 0.5.
/// The analyzer reuses this list for its per-page keyword signal.
pub(crate) const ACADEMIC_KEYWORDS: &[&str] = &[
    "transcript", "student", "course", "unit", "grade", "semester",
    "program", "degree", "university", "college", "gpa", "credit",
];

/// Structural pattern families. Each family matched contributes 0.05,
/// capped at 0.3 in total.
static STRUCTURAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // Course codes: CIT3105, CMT 108
        Regex::new(r"\b[A-Z]{2,4}\s*\d{3,4}[A-Z]?\b").unwrap(),
        // Grade tokens at word boundaries
        Regex::new(r"\b[A-F][+-]?\b").unwrap(),
        // Unit/credit counts
        Regex::new(r"(?i)\b(?:units?|credits?|hours?)\s*[:\s]\s*\d+").unwrap(),
        // GPA figures
        Regex::new(r"(?i)\b(?:gpa|cgpa)\s*[:\s]\s*\d\.\d+").unwrap(),
        // Semester term codes: SEPT-DEC24, JAN-APR25
        Regex::new(r"\b(?:JAN-APR|MAY-AUG|SEPT-DEC)\d{2}\b").unwrap(),
        // Student info labels
        Regex::new(r"(?i)\b(?:student\s+no|admission\s+number|registration)\b").unwrap(),
    ]
});

/// Score a block of extracted text in [0, 1].
///
/// The family sets the minimum-length floor: OCR text below 50 chars (or
/// digital below 20) is too short to mean anything and scores 0 outright.
pub fn score_text(text: &str, family: StrategyFamily) -> f32 {
    let min_len = match family {
        StrategyFamily::Digital => MIN_LEN_DIGITAL,
        StrategyFamily::Optical => MIN_LEN_OPTICAL,
    };
    if text.trim().len() < min_len {
        return 0.0;
    }

    let lower = text.to_lowercase();
    let mut score = 0.0f32;

    let keyword_hits = ACADEMIC_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .count();
    score += (keyword_hits as f32 * 0.1).min(0.5);

    let non_empty_lines = text.lines().filter(|l| !l.trim().is_empty()).count();
    if non_empty_lines > 10 {
        score += 0.2;
    }

    let pattern_hits = STRUCTURAL_PATTERNS
        .iter()
        .filter(|re| re.is_match(text))
        .count();
    score += (pattern_hits as f32 * 0.05).min(0.3);

    score = score.min(1.0);

    if let Some(ratio) = repetition_ratio(&lower) {
        score *= 1.0 - ratio;
    }

    score.clamp(0.0, 1.0)
}

/// Frequency of the most common token, when it dominates a long text.
///
/// Returns `Some(ratio)` only when the text has more than 100 tokens and the
/// top token exceeds 10% of them. OCR failure modes often repeat one garbled
/// word thousands of times.
fn repetition_ratio(lower: &str) -> Option<f32> {
    let tokens: Vec<&str> = lower.split_whitespace().collect();
    if tokens.len() <= 100 {
        return None;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in &tokens {
        *counts.entry(token).or_insert(0) += 1;
    }

    let top = counts.values().copied().max().unwrap_or(0);
    let ratio = top as f32 / tokens.len() as f32;
    (ratio > 0.1).then_some(ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TRANSCRIPT: &str = "\
UNIVERSITY OF EXAMPLE\n\
Student No: 1046098\n\
Programme: Bachelor of Science in Computer Science\n\
CMT 108 INTRO. TO WEB DEVELOPMENT 24 50 74 A 3\n\
CIT 3105 MACHINE LEARNING 20 55 75 B+ 3\n\
CSC 2201 DATA STRUCTURES 22 48 70 A 3\n\
MAT 1102 CALCULUS II 18 40 58 C 3\n\
CSC 2103 OPERATING SYSTEMS 25 52 77 A 3\n\
BIT 3201 DATABASE SYSTEMS 21 47 68 B 3\n\
CSC 1204 DISCRETE MATHEMATICS 19 45 64 B 3\n\
Semester: 2 Year: 3\n\
GPA: 3.42\n\
Units completed this semester: 7\n";

    #[test]
    fn short_text_scores_zero() {
        assert_eq!(score_text("Hi there", StrategyFamily::Digital), 0.0);
        assert_eq!(score_text("", StrategyFamily::Digital), 0.0);
    }

    #[test]
    fn under_twenty_chars_is_zero_for_digital() {
        let text = "1234567890123456789"; // 19 chars
        assert_eq!(score_text(text, StrategyFamily::Digital), 0.0);
    }

    #[test]
    fn optical_floor_is_fifty_chars() {
        let text = "transcript grade semester unit found here"; // 42 chars
        assert_eq!(score_text(text, StrategyFamily::Optical), 0.0);
        assert!(score_text(text, StrategyFamily::Digital) > 0.0);
    }

    #[test]
    fn transcript_text_scores_high() {
        let score = score_text(SAMPLE_TRANSCRIPT, StrategyFamily::Digital);
        assert!(score > 0.6, "transcript should score high, got {score}");
    }

    #[test]
    fn unrelated_prose_scores_low() {
        let prose = "The weather today was pleasant and the market stalls \
                     were busy with fruit sellers calling out their prices.";
        let score = score_text(prose, StrategyFamily::Digital);
        assert!(score < 0.3, "prose should score low, got {score}");
    }

    #[test]
    fn line_count_bonus_applies() {
        let few_lines = "student course grade semester unit transcript";
        let many_lines = format!("{}\n", few_lines).repeat(12);
        let low = score_text(few_lines, StrategyFamily::Digital);
        let high = score_text(&many_lines, StrategyFamily::Digital);
        assert!(high > low);
    }

    #[test]
    fn repetition_penalty_applied() {
        // 200 copies of one word plus a little real content
        let mut garbled = String::from("student transcript grade semester unit course\n");
        for _ in 0..200 {
            garbled.push_str("lorem ");
        }
        let clean_score = score_text(
            "student transcript grade semester unit course",
            StrategyFamily::Digital,
        );
        let garbled_score = score_text(&garbled, StrategyFamily::Digital);
        assert!(garbled_score < clean_score);
    }

    #[test]
    fn repetition_ratio_needs_over_100_tokens() {
        let short = "word word word word word";
        assert!(repetition_ratio(short).is_none());

        let long = "word ".repeat(150);
        let ratio = repetition_ratio(&long).unwrap();
        assert!(ratio > 0.9);
    }

    #[test]
    fn score_never_exceeds_one() {
        let score = score_text(SAMPLE_TRANSCRIPT, StrategyFamily::Digital);
        assert!(score <= 1.0);
    }
}
