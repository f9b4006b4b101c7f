//! Verification entry point.
//!
//! Drives the full pipeline for one submission: analyze → extract →
//! transcript parse → name match → eligibility verdict. Everything inside
//! the pipeline degrades gracefully; only boundary violations (no file,
//! wrong extension) reach the caller as errors.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::pipeline::eligibility::{EligibilityEvaluator, EligibilityVerdict, ProgramType};
use crate::pipeline::extraction::ocr::{self, OpticalStrategy};
use crate::pipeline::extraction::pdfium::PdfiumRenderer;
use crate::pipeline::extraction::preprocess::OcrPreprocessor;
use crate::pipeline::extraction::strategies::{ContentStreamStrategy, PdfiumTextStrategy};
use crate::pipeline::extraction::{
    DocumentAnalyzer, DocumentProfile, ExtractionOrchestrator, ExtractionOutcome,
    ExtractionStrategy,
};
use crate::pipeline::fees::{FeeStatementParser, FeeStatementResult};
use crate::pipeline::matching::{NameMatchResult, NameMatcher};
use crate::pipeline::transcript::{CandidateText, TranscriptData, TranscriptExtractor};

// ---------------------------------------------------------------------------
// Boundary types
// ---------------------------------------------------------------------------

/// A document as submitted by the caller. `content` is `None` when the
/// request carried no file at all.
#[derive(Debug, Clone)]
pub struct DocumentSubmission {
    pub file_name: String,
    pub content: Option<Vec<u8>>,
}

impl DocumentSubmission {
    pub fn new(file_name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content: Some(content),
        }
    }

    pub fn empty(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content: None,
        }
    }
}

/// Boundary violations rejected before the pipeline runs.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("no document was provided")]
    MissingDocument,

    #[error("unsupported file type '{0}': only PDF documents are accepted")]
    UnsupportedFileType(String),
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Full verification outcome returned to the caller, who persists it
/// against the student's verification record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub request_id: Uuid,
    pub eligible: bool,
    pub requirements: EligibilityVerdict,
    pub extracted_data: ExtractedData,
    pub name_matching: NameMatchResult,
    pub processing_details: ProcessingDetails,
}

/// Academic facts surfaced to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedData {
    pub student_name: Option<String>,
    pub program: Option<String>,
    pub year: u32,
    pub semester: u32,
    pub total_units: u32,
    pub completed_units: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpa: Option<f32>,
    pub units_count: usize,
}

impl ExtractedData {
    fn from_transcript(data: &TranscriptData) -> Self {
        Self {
            student_name: data.student_name.clone(),
            program: data.program.clone(),
            year: data.year,
            semester: data.semester,
            total_units: data.total_units,
            completed_units: data.completed_units,
            gpa: data.gpa,
            units_count: data.units.len(),
        }
    }
}

/// Diagnostics for audit logging, never used for the verdict itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingDetails {
    pub pdf_analysis: DocumentProfile,
    pub extraction: ExtractionSummary,
    pub confidence_scores: HashMap<String, f32>,
}

/// Summary of the selected extraction attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionSummary {
    pub strategy_name: String,
    pub confidence: f32,
    pub processing_time_ms: u64,
    pub page_count: usize,
    pub attempts: usize,
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Owns one configured instance of every pipeline stage. Stateless between
/// calls; a single processor serves concurrent verifications safely.
pub struct VerificationProcessor {
    orchestrator: ExtractionOrchestrator,
    transcript: TranscriptExtractor,
    matcher: NameMatcher,
    evaluator: EligibilityEvaluator,
    fees: FeeStatementParser,
}

impl VerificationProcessor {
    /// Build a processor wired to the real PDF and OCR backends. Strategies
    /// whose backend fails to load are simply left out; the orchestrator
    /// copes with whatever set remains.
    pub fn new(config: &PipelineConfig) -> Self {
        let mut digital: Vec<Arc<dyn ExtractionStrategy>> = Vec::new();
        digital.push(Arc::new(PdfiumTextStrategy::new(config.max_pages_digital)));
        digital.push(Arc::new(ContentStreamStrategy::new(config.max_pages_digital)));

        let mut optical: Vec<Arc<dyn ExtractionStrategy>> = Vec::new();
        match (PdfiumRenderer::new(), ocr::first_available_engine()) {
            (Ok(renderer), Some(engine)) => {
                optical.push(Arc::new(OpticalStrategy::new(
                    Arc::new(renderer),
                    engine,
                    Arc::new(OcrPreprocessor::standard()),
                    config.render_dpi,
                    config.max_pages_optical,
                )));
            }
            (renderer, engine) => {
                warn!(
                    renderer_ok = renderer.is_ok(),
                    engine_found = engine.is_some(),
                    "optical extraction unavailable, digital strategies only"
                );
            }
        }

        let orchestrator = ExtractionOrchestrator::new(
            DocumentAnalyzer::new(),
            digital,
            optical,
            config.strategy_timeout_ms,
        );
        Self::with_orchestrator(config, orchestrator)
    }

    /// Build around a pre-assembled orchestrator, used by tests to inject
    /// mock strategies.
    pub fn with_orchestrator(config: &PipelineConfig, orchestrator: ExtractionOrchestrator) -> Self {
        Self {
            orchestrator,
            transcript: TranscriptExtractor::with_epoch_year(config.term_epoch_year),
            matcher: NameMatcher::with_threshold(config.name_match_threshold),
            evaluator: EligibilityEvaluator::with_requirements(
                config.required_units_degree,
                config.required_units_diploma,
            ),
            fees: FeeStatementParser::new(),
        }
    }

    /// Verify a transcript submission against the registered student name.
    pub fn verify(
        &self,
        submission: &DocumentSubmission,
        registered_name: &str,
    ) -> Result<VerificationResult, VerifyError> {
        let bytes = validate_submission(submission)?;
        let request_id = Uuid::new_v4();
        info!(%request_id, file = %submission.file_name, "verification started");

        let outcome = self.orchestrator.extract(bytes);
        let data = self.transcript.extract_best(&candidates_from(&outcome));

        let name_matching = self
            .matcher
            .match_names(registered_name, data.student_name.as_deref().unwrap_or(""));
        let program_type = ProgramType::infer(data.program.as_deref());
        let requirements = self.evaluator.evaluate(&data, &name_matching, program_type);

        info!(
            %request_id,
            eligible = requirements.overall,
            strategy = %outcome.selected.strategy_name,
            units = data.units.len(),
            "verification complete"
        );

        let eligible = requirements.overall;
        Ok(VerificationResult {
            request_id,
            eligible,
            requirements,
            extracted_data: ExtractedData::from_transcript(&data),
            name_matching,
            processing_details: ProcessingDetails {
                pdf_analysis: outcome.profile.clone(),
                extraction: ExtractionSummary {
                    strategy_name: outcome.selected.strategy_name.clone(),
                    confidence: outcome.selected.confidence,
                    processing_time_ms: outcome.selected.processing_time_ms,
                    page_count: outcome.selected.page_count,
                    attempts: outcome.attempts.len(),
                },
                confidence_scores: data.confidence_scores.clone(),
            },
        })
    }

    /// Extract the closing balance from a fee-statement submission.
    pub fn verify_fee_statement(
        &self,
        submission: &DocumentSubmission,
    ) -> Result<FeeStatementResult, VerifyError> {
        let bytes = validate_submission(submission)?;
        let outcome = self.orchestrator.extract(bytes);
        Ok(self.fees.parse(&outcome.selected.text))
    }
}

fn validate_submission(submission: &DocumentSubmission) -> Result<&[u8], VerifyError> {
    let bytes = submission
        .content
        .as_deref()
        .filter(|b| !b.is_empty())
        .ok_or(VerifyError::MissingDocument)?;
    if !submission.file_name.to_lowercase().ends_with(".pdf") {
        return Err(VerifyError::UnsupportedFileType(
            submission.file_name.clone(),
        ));
    }
    Ok(bytes)
}

/// Successful, non-empty attempts become transcript candidates. The selected
/// result is always included even when it was the combined fallback.
fn candidates_from(outcome: &ExtractionOutcome) -> Vec<CandidateText> {
    let mut candidates: Vec<CandidateText> = outcome
        .attempts
        .iter()
        .filter(|a| a.succeeded && !a.text.trim().is_empty())
        .map(|a| CandidateText::new(a.strategy_name.clone(), a.text.clone(), a.confidence))
        .collect();
    if !outcome.selected.text.trim().is_empty()
        && !candidates
            .iter()
            .any(|c| c.strategy_name == outcome.selected.strategy_name)
    {
        candidates.push(CandidateText::new(
            outcome.selected.strategy_name.clone(),
            outcome.selected.text.clone(),
            outcome.selected.confidence,
        ));
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::analyzer::MockDocumentInspector;
    use crate::pipeline::extraction::types::PageStats;
    use crate::pipeline::extraction::{RawExtraction, StrategyFamily};

    struct FixedStrategy {
        text: &'static str,
        confidence: f32,
        page_count: usize,
    }

    impl ExtractionStrategy for FixedStrategy {
        fn name(&self) -> &'static str {
            "fixed_digital"
        }

        fn family(&self) -> StrategyFamily {
            StrategyFamily::Digital
        }

        fn extract(&self, _pdf_bytes: &[u8]) -> RawExtraction {
            RawExtraction {
                strategy_name: self.name().to_string(),
                text: self.text.to_string(),
                confidence: self.confidence,
                processing_time_ms: 5,
                page_count: self.page_count,
                succeeded: true,
                error_detail: None,
            }
        }
    }

    const TRANSCRIPT_TEXT: &str = "\
EASTON MICHURA OCHIENG
1046098
Programme: Bachelor of Science in Computer Science
Transcript of student academic record, Y4S2
CMT 101 PROGRAMMING I 20 40 60 A 3
CMT 102 COMPUTER ARCHITECTURE 20 40 60 B 3
CMT 103 DATABASES 20 40 60 A 3
CMT 104 NETWORKS 20 40 60 B 3
CMT 105 SOFTWARE ENGINEERING 20 40 60 A 3
CMT 106 DISCRETE MATHEMATICS 20 40 60 B 3
CMT 107 OPERATING SYSTEMS 20 40 60 A 3
CMT 108 INTRO. TO WEB DEVELOPMENT 24 50 74 A 3
CMT 109 THEORY OF COMPUTATION 20 40 60 B 3
CMT 110 COMPILER CONSTRUCTION 20 40 60 A 3";

    fn digital_page() -> PageStats {
        PageStats {
            text_block_count: 12,
            distinct_font_sizes: 3,
            text: "transcript student course unit grade semester program ".repeat(5),
            page_area: 500_000.0,
            ..Default::default()
        }
    }

    fn test_processor(strategy_text: &'static str, confidence: f32) -> VerificationProcessor {
        let analyzer = DocumentAnalyzer::with_inspector(Box::new(MockDocumentInspector::new(
            3,
            vec![digital_page(), digital_page(), digital_page()],
        )));
        let orchestrator = ExtractionOrchestrator::new(
            analyzer,
            vec![Arc::new(FixedStrategy {
                text: strategy_text,
                confidence,
                page_count: 3,
            })],
            vec![],
            1_000,
        );
        VerificationProcessor::with_orchestrator(&PipelineConfig::default(), orchestrator)
    }

    #[test]
    fn missing_document_rejected_before_pipeline() {
        let processor = test_processor(TRANSCRIPT_TEXT, 0.8);
        let err = processor
            .verify(&DocumentSubmission::empty("transcript.pdf"), "Jane Wanjiru")
            .unwrap_err();
        assert!(matches!(err, VerifyError::MissingDocument));
    }

    #[test]
    fn non_pdf_extension_rejected() {
        let processor = test_processor(TRANSCRIPT_TEXT, 0.8);
        let err = processor
            .verify(
                &DocumentSubmission::new("transcript.docx", vec![1, 2, 3]),
                "Jane Wanjiru",
            )
            .unwrap_err();
        assert!(matches!(err, VerifyError::UnsupportedFileType(name) if name == "transcript.docx"));
    }

    #[test]
    fn digital_transcript_end_to_end() {
        let processor = test_processor(TRANSCRIPT_TEXT, 0.8);
        let result = processor
            .verify(
                &DocumentSubmission::new("transcript.pdf", vec![0u8; 64]),
                "Easton Michura Ochieng",
            )
            .unwrap();

        assert_eq!(
            result.processing_details.pdf_analysis.recommended_strategy.as_str(),
            "digital_text"
        );
        assert!(result.processing_details.extraction.confidence > 0.3);
        assert_eq!(result.extracted_data.total_units, 10);
        assert!(result.name_matching.is_match);
        assert!(result.requirements.meets_year_requirement);
        assert!(result.requirements.has_required_units == (result.extracted_data.completed_units >= 39) );
        assert_eq!(result.eligible, result.requirements.overall);
    }

    #[test]
    fn name_mismatch_yields_ineligible_not_error() {
        let processor = test_processor(TRANSCRIPT_TEXT, 0.8);
        let result = processor
            .verify(
                &DocumentSubmission::new("transcript.pdf", vec![0u8; 64]),
                "Grace Wanjiru Kamau",
            )
            .unwrap();
        assert!(!result.eligible);
        assert!(!result.name_matching.is_match);
        assert!(result.requirements.summary.contains("Name mismatch"));
    }

    #[test]
    fn empty_extraction_still_produces_verdict() {
        let processor = test_processor("", 0.0);
        let result = processor
            .verify(
                &DocumentSubmission::new("transcript.pdf", vec![0u8; 64]),
                "Jane Wanjiru",
            )
            .unwrap();
        assert!(!result.eligible);
        assert!(!result.requirements.summary.is_empty());
        assert_eq!(result.extracted_data.units_count, 0);
    }

    #[test]
    fn fee_statement_balance_extracted_through_pipeline() {
        let processor = test_processor("01/03/2025 TUITION PAYMENT 52,000 -", 0.8);
        let result = processor
            .verify_fee_statement(&DocumentSubmission::new("fees.pdf", vec![0u8; 64]))
            .unwrap();
        assert_eq!(result.balance, Some(0.0));
        assert!(result.balance_cleared);
    }

    #[test]
    fn result_serializes_with_camel_case_boundary_names() {
        let processor = test_processor(TRANSCRIPT_TEXT, 0.8);
        let result = processor
            .verify(
                &DocumentSubmission::new("transcript.pdf", vec![0u8; 64]),
                "Easton Michura Ochieng",
            )
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("extractedData").is_some());
        assert!(json["requirements"].get("meetsYearRequirement").is_some());
        assert!(json["nameMatching"].get("isMatch").is_some());
        assert!(json["processingDetails"].get("pdfAnalysis").is_some());
    }
}
