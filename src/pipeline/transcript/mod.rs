//! Structured transcript-data extraction from raw extracted text.
//!
//! Layered regex fallback chains pull out the student name, ID, program,
//! academic period, and course units, each with a rule-derived confidence.

mod extractor;
mod patterns;
mod types;

pub use extractor::{TranscriptExtractor, DEFAULT_TERM_EPOCH_YEAR};
pub use types::{AcademicUnit, CandidateText, TranscriptData, UnitStatus};
