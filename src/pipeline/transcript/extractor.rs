//! Heuristic transcript-data extraction from raw text.
//!
//! Deterministic for identical input. Every field falls through an ordered
//! pattern table; missing fields degrade to defaults instead of erroring so
//! the eligibility evaluator always receives usable (if empty) data.

use std::collections::HashSet;

use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::patterns::{
    normalize_course_code, normalize_grade, status_for_grade, COURSE_CODE_PATTERN, GPA_PATTERN,
    ID_PATTERNS, NAME_PATTERNS, NAME_STOPLIST, PROGRAM_PATTERNS, SEMESTER_PATTERN,
    SKIP_LINE_FRAGMENTS, STAGE_PATTERN, TERM_CODE_PATTERN, UNIT_RULES, YEAR_PATTERN,
};
use super::types::{AcademicUnit, CandidateText, TranscriptData, UnitStatus};
use crate::pipeline::extraction::{score_text, StrategyFamily};

/// Calendar year of an institutional Year 1 intake, used to map semester
/// term codes like "SEPT-DEC24" to an academic year.
pub const DEFAULT_TERM_EPOCH_YEAR: i32 = 2020;

/// Confidence assigned to bare-code fallback units. Counting only; title and
/// grade in that mode are placeholders, never verified facts.
const FALLBACK_UNIT_CONFIDENCE: f32 = 0.5;

pub struct TranscriptExtractor {
    term_epoch_year: i32,
}

impl Default for TranscriptExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptExtractor {
    pub fn new() -> Self {
        Self {
            term_epoch_year: DEFAULT_TERM_EPOCH_YEAR,
        }
    }

    pub fn with_epoch_year(term_epoch_year: i32) -> Self {
        Self { term_epoch_year }
    }

    /// Extract structured academic facts from one raw text.
    pub fn extract(&self, text: &str) -> TranscriptData {
        let cleaned = clean_text(text);

        let student_name = self.extract_name(&cleaned);
        let student_id = self.extract_id(&cleaned);
        let program = self.extract_program(&cleaned);
        let (year, semester) = self.extract_period(&cleaned);
        let units = self.extract_units(&cleaned);
        let gpa = extract_gpa(&cleaned);

        let mut data = TranscriptData {
            student_name,
            student_id,
            program,
            year,
            semester,
            units,
            total_units: 0,
            completed_units: 0,
            gpa,
            confidence_scores: Default::default(),
        };
        finalize_counts(&mut data);
        score_fields(&mut data);
        debug!(
            name = ?data.student_name,
            units = data.units.len(),
            year = data.year,
            semester = data.semester,
            "transcript extraction complete"
        );
        data
    }

    /// Extract from several candidate texts and keep the best result.
    ///
    /// Candidates are scored on text quality, unit yield, and whether a name
    /// was found. After selection, a cross-candidate pass swaps in another
    /// candidate's unit list when it found strictly more courses; a transcript
    /// parse that recovers more rows is more complete regardless of which
    /// strategy's text read better overall.
    pub fn extract_best(&self, candidates: &[CandidateText]) -> TranscriptData {
        if candidates.is_empty() {
            return self.extract("");
        }

        let mut scored: Vec<(TranscriptData, f32, String)> = candidates
            .iter()
            .map(|c| {
                let data = self.extract(&c.text);
                let quality = score_text(&c.text, StrategyFamily::Digital);
                let unit_yield = (data.units.len() as f32 / 20.0).min(1.0);
                let name_bonus = if data.student_name.is_some() { 1.0 } else { 0.0 };
                let score = quality * 0.4 + unit_yield * 0.3 + name_bonus * 0.3;
                (data, score, c.strategy_name.clone())
            })
            .collect();

        let best_idx = scored
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);

        let richest_idx = scored
            .iter()
            .enumerate()
            .max_by_key(|(_, (data, _, _))| data.units.len())
            .map(|(i, _)| i)
            .unwrap_or(best_idx);

        if richest_idx != best_idx
            && scored[richest_idx].0.units.len() > scored[best_idx].0.units.len()
        {
            debug!(
                from = %scored[richest_idx].2,
                count = scored[richest_idx].0.units.len(),
                "replacing selected unit list with richer candidate"
            );
            let richer_units = scored[richest_idx].0.units.clone();
            let best = &mut scored[best_idx].0;
            best.units = richer_units;
            finalize_counts(best);
            score_fields(best);
        }

        scored.swap_remove(best_idx).0
    }

    fn extract_name(&self, text: &str) -> Option<String> {
        for pattern in NAME_PATTERNS.iter() {
            for caps in pattern.captures_iter(text) {
                let Some(group) = caps.get(1) else { continue };
                let candidate = group.as_str().trim();
                if is_valid_name(candidate) {
                    return Some(title_case(candidate));
                }
            }
        }
        None
    }

    fn extract_id(&self, text: &str) -> Option<String> {
        for pattern in ID_PATTERNS.iter() {
            if let Some(caps) = pattern.captures(text) {
                return Some(caps[1].to_string());
            }
        }
        None
    }

    fn extract_program(&self, text: &str) -> Option<String> {
        for pattern in PROGRAM_PATTERNS.iter() {
            for caps in pattern.captures_iter(text) {
                let cleaned = caps[1].split_whitespace().collect::<Vec<_>>().join(" ");
                if cleaned.len() >= 10 {
                    return Some(cleaned);
                }
            }
        }
        None
    }

    /// Resolve current academic standing. Transcripts list progressive
    /// history, so the highest value found represents current standing.
    fn extract_period(&self, text: &str) -> (u32, u32) {
        // A stage token like "Y3S2" carries both values at once.
        let stage = STAGE_PATTERN
            .captures_iter(text)
            .filter_map(|c| {
                let y: u32 = c[1].parse().ok()?;
                let s: u32 = c[2].parse().ok()?;
                Some((y, s))
            })
            .max();
        if let Some((y, s)) = stage {
            return (y.clamp(1, 6), s.clamp(1, 2));
        }

        let year = YEAR_PATTERN
            .captures_iter(text)
            .filter_map(|c| c[1].parse::<u32>().ok())
            .filter(|y| (1..=6).contains(y))
            .max();
        let semester = SEMESTER_PATTERN
            .captures_iter(text)
            .filter_map(|c| c[1].parse::<u32>().ok())
            .filter(|s| (1..=2).contains(s))
            .max();

        if year.is_none() && semester.is_none() {
            if let Some(period) = self.period_from_term_codes(text) {
                return period;
            }
        }
        (year.unwrap_or(1), semester.unwrap_or(1))
    }

    /// Infer standing from the latest semester term code in the document.
    fn period_from_term_codes(&self, text: &str) -> Option<(u32, u32)> {
        let latest = TERM_CODE_PATTERN
            .captures_iter(text)
            .filter_map(|c| {
                let yy: i32 = c[2].parse().ok()?;
                let (rank, semester) = match &c[1] {
                    "SEPT-DEC" => (2, 1),
                    "JAN-APR" => (0, 2),
                    _ => (1, 2),
                };
                Some((2000 + yy, rank, semester))
            })
            .max()?;
        let (calendar_year, _, semester) = latest;
        let year = (calendar_year - self.term_epoch_year).clamp(1, 6) as u32;
        Some((year, semester))
    }

    /// Fold course rows into a unit list plus a seen-code set. Later
    /// occurrences of an already-seen code are dropped.
    fn extract_units(&self, text: &str) -> Vec<AcademicUnit> {
        let mut units = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for line in text.lines() {
            let line = line.trim();
            if line.len() < 8 {
                continue;
            }
            let upper = line.to_uppercase();
            if SKIP_LINE_FRAGMENTS.iter().any(|f| upper.contains(f)) {
                continue;
            }
            for rule in UNIT_RULES.iter() {
                let Some(caps) = rule.pattern.captures(line) else {
                    continue;
                };
                let code = normalize_course_code(&caps[1]);
                let title = caps[rule.title_group].trim().to_string();
                let grade = normalize_grade(&caps[rule.grade_group]);
                if !is_valid_unit(&code, &title) {
                    continue;
                }
                if seen.insert(code.clone()) {
                    let status = status_for_grade(&grade);
                    units.push(AcademicUnit {
                        code,
                        title,
                        grade,
                        units: 1,
                        status,
                        confidence: rule.confidence,
                    });
                }
                break;
            }
        }

        if units.is_empty() {
            // Counting-only fallback: bare course-code tokens anywhere in the
            // text, synthetic passing grade, low confidence by construction.
            for caps in COURSE_CODE_PATTERN.captures_iter(text) {
                let code = format!("{}{}", &caps[1], &caps[2]);
                if !(5..=10).contains(&code.len()) {
                    continue;
                }
                if seen.insert(code.clone()) {
                    units.push(AcademicUnit {
                        code,
                        title: "Unknown".to_string(),
                        grade: "P".to_string(),
                        units: 1,
                        status: UnitStatus::Complete,
                        confidence: FALLBACK_UNIT_CONFIDENCE,
                    });
                }
            }
        }
        units
    }
}

/// Unicode-decompose and drop combining marks so OCR accents do not break
/// the ASCII-oriented pattern tables. Line structure is preserved; runs of
/// horizontal whitespace collapse to single spaces.
pub(crate) fn clean_text(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.nfd()
                .filter(|c| !is_combining_mark(*c))
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_valid_name(candidate: &str) -> bool {
    let len = candidate.len();
    if !(4..=50).contains(&len) {
        return false;
    }
    let upper = candidate.to_uppercase();
    if NAME_STOPLIST.iter().any(|s| upper.contains(s)) {
        return false;
    }
    let words: Vec<&str> = candidate.split_whitespace().collect();
    if !(2..=4).contains(&words.len()) {
        return false;
    }
    words.iter().all(|w| {
        w.chars().filter(|c| c.is_alphabetic()).count() >= 2
            && w.chars().all(|c| c.is_alphabetic() || c == '\'' || c == '-')
    })
}

fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_valid_unit(code: &str, title: &str) -> bool {
    if !(5..=10).contains(&code.len()) || title.len() < 3 {
        return false;
    }
    const BAD: &[&str] = &["PAGE", "YEAR", "SEMESTER", "GRADE"];
    !BAD.iter().any(|b| code.contains(b))
}

fn extract_gpa(text: &str) -> Option<f32> {
    let caps = GPA_PATTERN.captures(text)?;
    let value: f32 = caps[1].parse().ok()?;
    (0.0..=4.0).contains(&value).then_some(value)
}

/// Total and completed counts exclude exempt units.
fn finalize_counts(data: &mut TranscriptData) {
    data.total_units = data
        .units
        .iter()
        .filter(|u| u.status != UnitStatus::Exempt)
        .count() as u32;
    data.completed_units = data
        .units
        .iter()
        .filter(|u| u.status == UnitStatus::Complete)
        .count() as u32;
}

fn score_fields(data: &mut TranscriptData) {
    let name_score = if data.student_name.is_some() { 0.8 } else { 0.2 };
    let program_score = match &data.program {
        Some(p) if p.len() > 5 => 0.8,
        _ => 0.3,
    };
    let unit_score = if data.units.is_empty() {
        0.1
    } else {
        data.units.iter().map(|u| u.confidence).sum::<f32>() / data.units.len() as f32
    };
    let overall = (name_score + program_score + unit_score) / 3.0;

    data.confidence_scores.insert("name".to_string(), name_score);
    data.confidence_scores.insert("program".to_string(), program_score);
    data.confidence_scores.insert("units".to_string(), unit_score);
    data.confidence_scores.insert("overall".to_string(), overall);
}
