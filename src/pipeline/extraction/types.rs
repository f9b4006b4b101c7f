use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Result of one strategy attempt over a single document.
///
/// Produced once per attempt, immutable afterwards. Failed attempts carry
/// `succeeded = false` and confidence 0.0 instead of propagating errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExtraction {
    pub strategy_name: String,
    pub text: String,
    pub confidence: f32,
    pub processing_time_ms: u64,
    pub page_count: usize,
    pub succeeded: bool,
    pub error_detail: Option<String>,
}

impl RawExtraction {
    /// Build a failed attempt for a strategy that raised internally.
    pub fn failure(strategy_name: &str, detail: impl Into<String>) -> Self {
        Self {
            strategy_name: strategy_name.to_string(),
            text: String::new(),
            confidence: 0.0,
            processing_time_ms: 0,
            page_count: 0,
            succeeded: false,
            error_detail: Some(detail.into()),
        }
    }
}

/// The two families of extraction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyFamily {
    /// Parse embedded text/structure directly. Lossless, fast.
    Digital,
    /// Rasterize and recognize characters. Lossy, slow, required for scans.
    Optical,
}

/// Which strategy family the analyzer recommends trying first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedStrategy {
    DigitalText,
    DigitalWithTables,
    AdvancedOcr,
    Hybrid,
}

impl RecommendedStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedStrategy::DigitalText => "digital_text",
            RecommendedStrategy::DigitalWithTables => "digital_with_tables",
            RecommendedStrategy::AdvancedOcr => "advanced_ocr",
            RecommendedStrategy::Hybrid => "hybrid",
        }
    }
}

/// Structural classification of a document, derived once per verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentProfile {
    pub is_digital: bool,
    pub is_scanned: bool,
    pub has_tables: bool,
    pub has_complex_layout: bool,
    pub text_coverage_ratio: f32,
    pub page_count: usize,
    pub recommended_strategy: RecommendedStrategy,
    pub confidence: f32,
}

impl DocumentProfile {
    /// Profile returned when the document cannot be opened at all.
    /// Assumes a scan so the orchestrator still attempts optical recovery.
    pub fn pessimistic(page_count: usize) -> Self {
        Self {
            is_digital: false,
            is_scanned: true,
            has_tables: false,
            has_complex_layout: false,
            text_coverage_ratio: 0.0,
            page_count,
            recommended_strategy: RecommendedStrategy::AdvancedOcr,
            confidence: 0.5,
        }
    }
}

/// Position of one text run on a page, in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePosition {
    pub x: f32,
    pub y: f32,
}

/// Per-page structural statistics gathered by a [`DocumentInspector`].
#[derive(Debug, Clone, Default)]
pub struct PageStats {
    pub text_block_count: usize,
    /// Pixel dimensions of embedded raster images.
    pub image_dimensions: Vec<(u32, u32)>,
    pub distinct_font_sizes: usize,
    pub text: String,
    /// Page area in square points (MediaBox width x height).
    pub page_area: f32,
    pub line_positions: Vec<LinePosition>,
}

/// Raw OCR output for one page image.
#[derive(Debug, Clone)]
pub struct OcrPageResult {
    pub text: String,
    pub confidence: f32,
}

/// Structural PDF inspection abstraction (allows mocking for tests).
///
/// Returns the total page count plus stats for at most `max_pages`
/// sampled pages.
pub trait DocumentInspector: Send + Sync {
    fn inspect(
        &self,
        pdf_bytes: &[u8],
        max_pages: usize,
    ) -> Result<(usize, Vec<PageStats>), ExtractionError>;
}

/// One document-to-text converter with a declared name and family.
///
/// Implementations are independently fault-tolerant: internal errors are
/// captured into a failed [`RawExtraction`], never propagated.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn family(&self) -> StrategyFamily;

    fn extract(&self, pdf_bytes: &[u8]) -> RawExtraction;
}

/// PDF page rasterization abstraction.
pub trait PdfPageRenderer: Send + Sync {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError>;

    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError>;
}

/// OCR engine abstraction (allows mocking for tests).
///
/// Heavyweight engines load lazily; `available()` is the capability flag the
/// orchestrator consults before attempting the optical family.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn available(&self) -> bool;

    fn recognize(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_has_zero_confidence() {
        let attempt = RawExtraction::failure("pdfium_text", "boom");
        assert!(!attempt.succeeded);
        assert_eq!(attempt.confidence, 0.0);
        assert!(attempt.text.is_empty());
        assert_eq!(attempt.error_detail.as_deref(), Some("boom"));
    }

    #[test]
    fn pessimistic_profile_recommends_ocr() {
        let profile = DocumentProfile::pessimistic(0);
        assert!(profile.is_scanned);
        assert!(!profile.is_digital);
        assert_eq!(profile.recommended_strategy, RecommendedStrategy::AdvancedOcr);
        assert!((profile.confidence - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn recommended_strategy_names_are_stable() {
        assert_eq!(RecommendedStrategy::DigitalText.as_str(), "digital_text");
        assert_eq!(
            RecommendedStrategy::DigitalWithTables.as_str(),
            "digital_with_tables"
        );
        assert_eq!(RecommendedStrategy::AdvancedOcr.as_str(), "advanced_ocr");
        assert_eq!(RecommendedStrategy::Hybrid.as_str(), "hybrid");
    }

    #[test]
    fn profile_serializes_camel_case() {
        let profile = DocumentProfile::pessimistic(2);
        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains("\"isScanned\":true"));
        assert!(json.contains("\"recommendedStrategy\":\"advanced_ocr\""));
    }
}
