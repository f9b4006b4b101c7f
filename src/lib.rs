//! Veridoc: academic transcript verification pipeline.
//!
//! Multi-strategy PDF text extraction over digital and optical families, a
//! layered regex transcript parser, fuzzy name matching, and attachment
//! eligibility rules. One call drives the whole chain:
//! [`pipeline::processor::VerificationProcessor::verify`].

pub mod config;
pub mod pipeline;

pub use config::PipelineConfig;
pub use pipeline::eligibility::{EligibilityEvaluator, EligibilityVerdict, ProgramType};
pub use pipeline::extraction::{DocumentAnalyzer, DocumentProfile, ExtractionOrchestrator};
pub use pipeline::fees::{FeeStatementParser, FeeStatementResult};
pub use pipeline::matching::{NameMatchResult, NameMatcher};
pub use pipeline::processor::{
    DocumentSubmission, VerificationProcessor, VerificationResult, VerifyError,
};
pub use pipeline::transcript::{AcademicUnit, TranscriptData, TranscriptExtractor};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries and integration tests. Honors
/// `RUST_LOG`, defaults to info for this crate and warn elsewhere.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,veridoc=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
