use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One course unit parsed from a transcript row.
///
/// `units` is always 1 per course. Credit-hour values printed on the row are
/// intentionally ignored: eligibility counts courses, not credit hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicUnit {
    /// Normalized course code, e.g. "CIT3105". 5 to 10 chars, alphabetic
    /// prefix plus numeric suffix, no internal whitespace.
    pub code: String,
    pub title: String,
    /// Normalized grade token, e.g. "A", "B+", "P", "I".
    pub grade: String,
    pub units: u32,
    pub status: UnitStatus,
    pub confidence: f32,
}

/// Completion status derived from the normalized grade token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Complete,
    Incomplete,
    Failed,
    Exempt,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Complete => "complete",
            UnitStatus::Incomplete => "incomplete",
            UnitStatus::Failed => "failed",
            UnitStatus::Exempt => "exempt",
        }
    }
}

/// Structured academic facts pulled out of one raw-text candidate.
///
/// Built fresh per verification call, never mutated after construction.
/// `total_units` and `completed_units` exclude exempt units.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptData {
    pub student_name: Option<String>,
    pub student_id: Option<String>,
    pub program: Option<String>,
    /// Current academic year, clamped to [1, 6].
    pub year: u32,
    /// Current semester, clamped to [1, 2].
    pub semester: u32,
    /// Discovery order. Order is not significant downstream.
    pub units: Vec<AcademicUnit>,
    pub total_units: u32,
    pub completed_units: u32,
    pub gpa: Option<f32>,
    pub confidence_scores: HashMap<String, f32>,
}

impl TranscriptData {
    /// Overall extraction confidence, 0.0 when no per-field scores exist.
    pub fn overall_confidence(&self) -> f32 {
        self.confidence_scores.get("overall").copied().unwrap_or(0.0)
    }
}

/// One raw-text candidate offered to the extractor, tagged with the
/// strategy that produced it and that strategy's self-reported confidence.
#[derive(Debug, Clone)]
pub struct CandidateText {
    pub strategy_name: String,
    pub text: String,
    pub confidence: f32,
}

impl CandidateText {
    pub fn new(strategy_name: impl Into<String>, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            text: text.into(),
            confidence,
        }
    }
}
