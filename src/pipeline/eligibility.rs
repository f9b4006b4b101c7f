//! Attachment-eligibility rules over structured transcript data.
//!
//! A student qualifies after crossing Year 3 Semester 2 (degree) or Year 2
//! Semester 2 (diploma), with enough completed units, no outstanding
//! incompletes, and a matching name.

use serde::{Deserialize, Serialize};

use super::matching::NameMatchResult;
use super::transcript::{TranscriptData, UnitStatus};

pub const DEFAULT_REQUIRED_UNITS_DEGREE: u32 = 39;
pub const DEFAULT_REQUIRED_UNITS_DIPLOMA: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramType {
    Degree,
    Diploma,
}

impl ProgramType {
    /// Infer from the program name. Absent or unrecognized program text is
    /// treated as a diploma.
    pub fn infer(program: Option<&str>) -> Self {
        match program {
            Some(p) => {
                let lower = p.to_lowercase();
                if lower.contains("degree") || lower.contains("bachelor") {
                    ProgramType::Degree
                } else {
                    ProgramType::Diploma
                }
            }
            None => ProgramType::Diploma,
        }
    }

    fn threshold(&self) -> (u32, u32) {
        match self {
            ProgramType::Degree => (3, 2),
            ProgramType::Diploma => (2, 2),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityVerdict {
    pub overall: bool,
    pub name_matched: bool,
    pub has_required_units: bool,
    pub no_incompletes: bool,
    pub meets_year_requirement: bool,
    pub required_units: u32,
    pub completed_units: u32,
    pub incomplete_count: u32,
    pub summary: String,
}

pub struct EligibilityEvaluator {
    required_units_degree: u32,
    required_units_diploma: u32,
}

impl Default for EligibilityEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl EligibilityEvaluator {
    pub fn new() -> Self {
        Self {
            required_units_degree: DEFAULT_REQUIRED_UNITS_DEGREE,
            required_units_diploma: DEFAULT_REQUIRED_UNITS_DIPLOMA,
        }
    }

    pub fn with_requirements(required_units_degree: u32, required_units_diploma: u32) -> Self {
        Self {
            required_units_degree,
            required_units_diploma,
        }
    }

    pub fn evaluate(
        &self,
        data: &TranscriptData,
        name_match: &NameMatchResult,
        program_type: ProgramType,
    ) -> EligibilityVerdict {
        let required_units = match program_type {
            ProgramType::Degree => self.required_units_degree,
            ProgramType::Diploma => self.required_units_diploma,
        };
        let (gate_year, gate_semester) = program_type.threshold();

        let name_matched = name_match.is_match;
        let has_required_units = data.completed_units >= required_units;
        let meets_year_requirement = (data.year == gate_year && data.semester >= gate_semester)
            || data.year > gate_year;

        let incomplete_count = data
            .units
            .iter()
            .filter(|u| u.status == UnitStatus::Incomplete)
            .count() as u32;
        // Incompletes recorded before the eligibility period are presumed
        // resolved once the student's current standing is past the gate.
        // Known approximation: individual units are not dated against their
        // term codes, so this cannot be verified per unit.
        let past_gate = data.year > gate_year
            || (data.year == gate_year && data.semester > gate_semester);
        let no_incompletes = past_gate || incomplete_count == 0;

        let overall =
            name_matched && has_required_units && no_incompletes && meets_year_requirement;

        let mut failures = Vec::new();
        if !name_matched {
            failures.push(format!(
                "Name mismatch (extracted: '{}')",
                data.student_name.as_deref().unwrap_or("none")
            ));
        }
        if !has_required_units {
            failures.push(format!(
                "Insufficient units ({}/{})",
                data.completed_units, required_units
            ));
        }
        if !no_incompletes {
            failures.push(format!(
                "{incomplete_count} incomplete units before eligibility period"
            ));
        }
        if !meets_year_requirement {
            failures.push(format!(
                "Must reach Year {gate_year} Sem {gate_semester} (currently Year {}, Sem {})",
                data.year, data.semester
            ));
        }
        let summary = if failures.is_empty() {
            "All requirements met".to_string()
        } else {
            failures.join("; ")
        };

        EligibilityVerdict {
            overall,
            name_matched,
            has_required_units,
            no_incompletes,
            meets_year_requirement,
            required_units,
            completed_units: data.completed_units,
            incomplete_count,
            summary,
        }
    }
}
