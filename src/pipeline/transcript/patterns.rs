//! Regex pattern tables for transcript parsing.
//!
//! Every fallback chain is an ordered table evaluated in priority order with
//! early exit on the first valid match. Tables are compiled once.

use std::sync::LazyLock;

use regex::Regex;

use super::types::UnitStatus;

/// One tabular-row rule. `title_group` and `grade_group` index into the
/// pattern's capture groups; the course code is always group 1.
pub(crate) struct UnitRule {
    pub pattern: Regex,
    pub title_group: usize,
    pub grade_group: usize,
    pub confidence: f32,
}

/// Grade token alternation shared by the row rules. Multi-character tokens
/// come first so the regex engine does not stop at a one-letter prefix.
const GRADE: &str = r"(?:PASS|FAIL|INCOMPLETE|WITHDRAWN|NO CREDIT|CREDIT|N/A|CR|NC|AU|EX|[A-E][+-]?|F\*?|[IXZPW])";

/// Tabular row rules, most structured first.
pub(crate) static UNIT_RULES: LazyLock<Vec<UnitRule>> = LazyLock::new(|| {
    let code = r"([A-Z]{2,4}\s?\d{3,4}[A-Z]?)";
    vec![
        // Full marks row: CODE TITLE CAT EXAM TOTAL GRADE CREDIT
        // e.g. "CMT 108 INTRO. TO WEB DEVELOPMENT 24 50 74 A 3"
        UnitRule {
            pattern: Regex::new(&format!(
                r"^{code}\s+(.+?)\s+(\d{{1,3}})\s+(\d{{1,3}})\s+(\d{{1,3}})\s+({GRADE})\s+(\d+)\s*$"
            ))
            .unwrap(),
            title_group: 2,
            grade_group: 6,
            confidence: 0.95,
        },
        // CODE TITLE GRADE CREDIT
        UnitRule {
            pattern: Regex::new(&format!(
                r"^{code}\s+(.+?)\s+({GRADE})\s+(\d+(?:\.\d+)?)\s*$"
            ))
            .unwrap(),
            title_group: 2,
            grade_group: 3,
            confidence: 0.9,
        },
        // Pipe-separated: CODE | TITLE | GRADE [| ...]
        UnitRule {
            pattern: Regex::new(&format!(
                r"^{code}\s*\|\s*(.+?)\s*\|\s*({GRADE})\s*(?:\|.*)?$"
            ))
            .unwrap(),
            title_group: 2,
            grade_group: 3,
            confidence: 0.85,
        },
        // Dash-separated: CODE - TITLE - GRADE
        UnitRule {
            pattern: Regex::new(&format!(
                r"^{code}\s*[-\u{{2013}}\u{{2014}}]\s*(.+?)\s*[-\u{{2013}}\u{{2014}}]\s*({GRADE})\s*$"
            ))
            .unwrap(),
            title_group: 2,
            grade_group: 3,
            confidence: 0.85,
        },
        // CODE CREDIT TITLE GRADE
        UnitRule {
            pattern: Regex::new(&format!(
                r"^{code}\s+(\d{{1,2}})\s+(.+?)\s+({GRADE})\s*$"
            ))
            .unwrap(),
            title_group: 3,
            grade_group: 4,
            confidence: 0.8,
        },
        // CODE TITLE GRADE with nothing trailing
        UnitRule {
            pattern: Regex::new(&format!(r"^{code}\s+(.+?)\s+({GRADE})\s*$")).unwrap(),
            title_group: 2,
            grade_group: 3,
            confidence: 0.75,
        },
    ]
});

/// Header/footer fragments. A line containing any of these (uppercased
/// comparison) is never a course row.
pub(crate) const SKIP_LINE_FRAGMENTS: &[&str] = &[
    "UNIT CODE",
    "UNIT DESCRIPTION",
    "GRADE CREDIT",
    "PAGE",
    "PROGRESSIVE",
    "SIGNATURE",
    "ACADEMIC REGISTRAR",
    "KEY:",
    "MEAN",
    "BALANCE",
];

/// Tokens that disqualify a name candidate. Transcripts carry PDF-producer
/// metadata and institutional headers in the same all-caps register as names.
pub(crate) const NAME_STOPLIST: &[&str] = &[
    "ADOBE",
    "PHOTOSHOP",
    "MICROSOFT",
    "STUDENT",
    "UNIVERSITY",
    "PAGE",
    "ADMISSION NUMBER",
    "FULL NAME",
    "STUDENT NAME",
    "PROGRAMME",
    "SCIENCE",
    "COMPUTER",
    "BACHELOR",
    "OFFICE",
    "ACADEMIC",
    "REGISTRAR",
    "PROGRESSIVE",
];

/// Name candidates, most specific first. Caps-run patterns are compiled
/// case-sensitive on purpose; only label text is case-insensitive.
pub(crate) static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // All-caps name line immediately followed by a 6-8 digit ID line
        Regex::new(r"(?m)^\s*([A-Z][A-Z'\-]+(?:\s+[A-Z][A-Z'\-]+){1,3})\s*\n\s*\d{6,8}\b")
            .unwrap(),
        // Labeled name field
        Regex::new(
            r"(?m)(?i:(?:full\s+name|student\s+name|name))\s*[:\-]\s*([A-Za-z][A-Za-z'\-]+(?:\s+[A-Za-z][A-Za-z'\-]+){1,3})",
        )
        .unwrap(),
        // Name adjacent to an admission label
        Regex::new(
            r"(?m)^\s*([A-Z][A-Z'\-]+(?:\s+[A-Z][A-Z'\-]+){1,3})\s+(?i:admission|reg)",
        )
        .unwrap(),
        // Bare run of 2-4 all-caps tokens
        Regex::new(r"\b([A-Z]{2,}(?:\s+[A-Z]{2,}){1,3})\b").unwrap(),
    ]
});

/// Student ID candidates, explicit labels before bare digits.
pub(crate) static ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(
            r"(?i)(?:student\s*(?:no|number)|admission\s+number|registration\s+(?:no|number))\s*[.:#]?\s*(\d{6,8})\b",
        )
        .unwrap(),
        // Footer form "#1046098 Page 1 of 3"
        Regex::new(r"#(\d{6,8})\s+(?i:page)").unwrap(),
        Regex::new(r"(?i)(?:student\s*id|id\s*(?:no|number)?)\s*[.:#]?\s*([A-Z0-9]{6,15})\b")
            .unwrap(),
        Regex::new(r"\b([A-Z]{2,3}\d{6,10})\b").unwrap(),
        Regex::new(r"\b(\d{6,8})\b").unwrap(),
    ]
});

/// Program candidates. Degree-phrase patterns capture the whole phrase, not
/// just the discipline, so "Bachelor of Science in Computer Science" survives
/// intact for downstream degree/diploma inference.
pub(crate) static PROGRAM_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?im)^.*?(?:programme|program|course\s+of\s+study)\s*[:\-]\s*(.+)$")
            .unwrap(),
        Regex::new(
            r"(?i)\b(bachelor\s+of\s+[a-z]+(?:\s+[a-z]+){0,2}(?:\s+in\s+[a-z]+(?:\s+[a-z]+){0,3})?)",
        )
        .unwrap(),
        Regex::new(r"(?i)\b(diploma\s+in\s+[a-z]+(?:\s+[a-z]+){0,3})").unwrap(),
    ]
});

/// "Y3S2" stage token, the most authoritative period signal.
pub(crate) static STAGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:stage\s*)?Y(\d)S(\d)\b").unwrap());

pub(crate) static YEAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:year|stage)\s*[:\-]?\s*(\d)\b").unwrap());

pub(crate) static SEMESTER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsemester\s*[:\-]?\s*(\d)\b").unwrap());

/// Semester term codes like "SEPT-DEC24". The calendar year maps to an
/// academic year through a configurable institutional epoch.
pub(crate) static TERM_CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(JAN-APR|MAY-AUG|SEPT-DEC)(\d{2})\b").unwrap());

pub(crate) static GPA_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:gpa|cgpa)\s*[:\s]\s*(\d+\.?\d*)").unwrap());

/// Bare course-code tokens for the counting-only fallback scan.
pub(crate) static COURSE_CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{2,4})\s*(\d{3,4}[A-Z]?)\b").unwrap());

/// Collapse "CMT 108A" style codes to their canonical "CMT108A" form.
pub(crate) fn normalize_course_code(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase()
}

/// Map spelled-out grade words to their single-token forms.
pub(crate) fn normalize_grade(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    match upper.as_str() {
        "PASS" => "P".to_string(),
        "FAIL" => "F".to_string(),
        "INCOMPLETE" => "I".to_string(),
        "WITHDRAWN" => "W".to_string(),
        "CREDIT" => "CR".to_string(),
        "NO CREDIT" => "NC".to_string(),
        _ => upper,
    }
}

/// Derive completion status from a normalized grade token.
pub(crate) fn status_for_grade(grade: &str) -> UnitStatus {
    match grade {
        "I" | "X" | "Z" | "F*" => UnitStatus::Incomplete,
        "F" | "FAIL" => UnitStatus::Failed,
        "AU" | "N/A" | "EX" => UnitStatus::Exempt,
        _ => UnitStatus::Complete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_marks_row_captures_grade_not_total() {
        let line = "CMT 108 INTRO. TO WEB DEVELOPMENT 24 50 74 A 3";
        let rule = &UNIT_RULES[0];
        let caps = rule.pattern.captures(line).unwrap();
        assert_eq!(caps.get(1).unwrap().as_str(), "CMT 108");
        assert_eq!(caps.get(rule.title_group).unwrap().as_str(), "INTRO. TO WEB DEVELOPMENT");
        assert_eq!(caps.get(rule.grade_group).unwrap().as_str(), "A");
    }

    #[test]
    fn grade_alternation_prefers_multi_char_tokens() {
        let line = "BIT 2105 DISCRETE MATHEMATICS PASS 3";
        let rule = &UNIT_RULES[1];
        let caps = rule.pattern.captures(line).unwrap();
        assert_eq!(caps.get(rule.grade_group).unwrap().as_str(), "PASS");
    }

    #[test]
    fn grade_normalization_table() {
        assert_eq!(normalize_grade("PASS"), "P");
        assert_eq!(normalize_grade("fail"), "F");
        assert_eq!(normalize_grade("No Credit"), "NC");
        assert_eq!(normalize_grade("b+"), "B+");
    }

    #[test]
    fn status_classification() {
        assert_eq!(status_for_grade("A"), UnitStatus::Complete);
        assert_eq!(status_for_grade("I"), UnitStatus::Incomplete);
        assert_eq!(status_for_grade("F"), UnitStatus::Failed);
        assert_eq!(status_for_grade("EX"), UnitStatus::Exempt);
    }

    #[test]
    fn course_code_normalization_strips_internal_space() {
        assert_eq!(normalize_course_code("CMT 108"), "CMT108");
        assert_eq!(normalize_course_code("cit3105"), "CIT3105");
    }

    #[test]
    fn stage_token_parses_year_and_semester() {
        let caps = STAGE_PATTERN.captures("PROGRESSIVE Y3S2 RESULTS").unwrap();
        assert_eq!(&caps[1], "3");
        assert_eq!(&caps[2], "2");
    }
}
