//! Optical extraction: page rendering, preprocessing, and character
//! recognition behind the `OcrEngine` seam.
//!
//! A bundled Tesseract engine is available behind the `ocr` feature flag.
//! Deployments can also register their own engine at startup (a cloud OCR
//! client, a local vision model); everything else in the optical path is
//! engine-agnostic. When no engine is registered the optical family
//! degrades to failed attempts and the orchestrator falls back to the
//! digital strategies.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use tracing::{debug, info, warn};

use super::preprocess::ImagePreprocessor;
use super::quality::score_text;
use super::strategies::PAGE_BREAK;
use super::types::{
    ExtractionStrategy, OcrEngine, OcrPageResult, PdfPageRenderer, RawExtraction, StrategyFamily,
};
use super::ExtractionError;

static ENGINE_REGISTRY: OnceLock<Mutex<Vec<Arc<dyn OcrEngine>>>> = OnceLock::new();

fn registry() -> &'static Mutex<Vec<Arc<dyn OcrEngine>>> {
    ENGINE_REGISTRY.get_or_init(|| Mutex::new(Vec::new()))
}

/// Register an OCR engine for optical extraction. Call once at startup
/// per engine; later registrations take precedence.
pub fn register_engine(engine: Arc<dyn OcrEngine>) {
    info!(
        engine = engine.name(),
        available = engine.available(),
        "OCR engine registered"
    );
    if let Ok(mut engines) = registry().lock() {
        engines.insert(0, engine);
    }
}

/// First registered engine that reports itself available.
pub fn first_available_engine() -> Option<Arc<dyn OcrEngine>> {
    registry()
        .lock()
        .ok()?
        .iter()
        .find(|e| e.available())
        .cloned()
}

/// Names of all registered engines with their availability.
pub fn registered_engines() -> Vec<(String, bool)> {
    registry()
        .lock()
        .map(|engines| {
            engines
                .iter()
                .map(|e| (e.name().to_string(), e.available()))
                .collect()
        })
        .unwrap_or_default()
}

/// Bundled Tesseract engine.
/// Only available when compiled with the `ocr` feature flag.
#[cfg(feature = "ocr")]
pub struct TesseractEngine {
    tessdata_dir: std::path::PathBuf,
    lang: String,
}

#[cfg(feature = "ocr")]
impl TesseractEngine {
    /// Initialize with a tessdata directory. Requires English traineddata.
    pub fn new(tessdata_dir: &std::path::Path) -> Result<Self, ExtractionError> {
        if !tessdata_dir.join("eng.traineddata").exists() {
            return Err(ExtractionError::EngineUnavailable(format!(
                "tesseract (no eng.traineddata at {})",
                tessdata_dir.display()
            )));
        }
        Ok(Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
            lang: "eng".to_string(),
        })
    }

    /// Set language(s) for recognition (e.g. "eng", "eng+swa").
    pub fn with_languages(mut self, langs: &str) -> Self {
        self.lang = langs.to_string();
        self
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn available(&self) -> bool {
        self.tessdata_dir.join("eng.traineddata").exists()
    }

    fn recognize(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let tessdata_str = self
            .tessdata_dir
            .to_str()
            .ok_or_else(|| ExtractionError::OcrProcessing("Invalid tessdata path".into()))?;

        let tess = tesseract::Tesseract::new(Some(tessdata_str), Some(&self.lang))
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        let mut tess = tess
            .set_image_from_mem(image_bytes)
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        let text = tess
            .get_text()
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;
        let confidence = tess.mean_text_conf().max(0) as f32 / 100.0;

        Ok(OcrPageResult { text, confidence })
    }
}

/// OCR over rendered PDF pages.
///
/// Per page: render at the configured DPI, preprocess, recognize. Blank
/// pages are skipped without calling the engine. The attempt confidence
/// averages the text quality score with the engine's own mean confidence.
pub struct OpticalStrategy {
    renderer: Arc<dyn PdfPageRenderer>,
    engine: Arc<dyn OcrEngine>,
    preprocessor: Arc<dyn ImagePreprocessor>,
    dpi: u32,
    max_pages: usize,
}

impl OpticalStrategy {
    pub fn new(
        renderer: Arc<dyn PdfPageRenderer>,
        engine: Arc<dyn OcrEngine>,
        preprocessor: Arc<dyn ImagePreprocessor>,
        dpi: u32,
        max_pages: usize,
    ) -> Self {
        Self {
            renderer,
            engine,
            preprocessor,
            dpi,
            max_pages,
        }
    }

    fn extract_inner(
        &self,
        pdf_bytes: &[u8],
    ) -> Result<(String, Vec<f32>, usize), ExtractionError> {
        if !self.engine.available() {
            return Err(ExtractionError::EngineUnavailable(
                self.engine.name().to_string(),
            ));
        }

        let page_count = self.renderer.page_count(pdf_bytes)?;
        if page_count == 0 {
            return Err(ExtractionError::EmptyDocument);
        }

        let mut pages = Vec::new();
        let mut confidences = Vec::new();
        for page in 0..page_count.min(self.max_pages) {
            let rendered = self.renderer.render_page(pdf_bytes, page, self.dpi)?;
            let prepared = self.preprocessor.preprocess(&rendered)?;
            if prepared.quality.is_blank {
                debug!(page, "Skipping blank page");
                pages.push(String::new());
                continue;
            }
            match self.engine.recognize(&prepared.png_bytes) {
                Ok(OcrPageResult { text, confidence }) => {
                    confidences.push(confidence);
                    pages.push(text);
                }
                Err(e) => {
                    warn!(page, error = %e, "Page recognition failed");
                    pages.push(String::new());
                }
            }
        }

        if confidences.is_empty() {
            return Err(ExtractionError::OcrProcessing(
                "No page produced recognizable text".into(),
            ));
        }

        Ok((pages.join(PAGE_BREAK), confidences, page_count))
    }
}

impl ExtractionStrategy for OpticalStrategy {
    fn name(&self) -> &'static str {
        "optical_ocr"
    }

    fn family(&self) -> StrategyFamily {
        StrategyFamily::Optical
    }

    fn extract(&self, pdf_bytes: &[u8]) -> RawExtraction {
        let started = Instant::now();
        match self.extract_inner(pdf_bytes) {
            Ok((text, confidences, page_count)) => {
                let engine_conf = confidences.iter().sum::<f32>() / confidences.len() as f32;
                let quality = score_text(&text, StrategyFamily::Optical);
                let confidence = (quality + engine_conf) / 2.0;
                debug!(
                    engine = self.engine.name(),
                    pages = page_count,
                    quality,
                    engine_conf,
                    confidence,
                    "Optical extraction complete"
                );
                RawExtraction {
                    strategy_name: self.name().to_string(),
                    text,
                    confidence,
                    processing_time_ms: started.elapsed().as_millis() as u64,
                    page_count,
                    succeeded: true,
                    error_detail: None,
                }
            }
            Err(e) => {
                warn!(engine = self.engine.name(), error = %e, "Optical extraction failed");
                let mut attempt = RawExtraction::failure(self.name(), e.to_string());
                attempt.processing_time_ms = started.elapsed().as_millis() as u64;
                attempt
            }
        }
    }
}

/// Mock OCR engine returning scripted page results.
pub struct MockOcrEngine {
    available: bool,
    results: Mutex<Vec<OcrPageResult>>,
}

impl MockOcrEngine {
    pub fn new(pages: Vec<(&str, f32)>) -> Self {
        let mut results: Vec<OcrPageResult> = pages
            .into_iter()
            .map(|(text, confidence)| OcrPageResult {
                text: text.to_string(),
                confidence,
            })
            .collect();
        results.reverse();
        Self {
            available: true,
            results: Mutex::new(results),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            results: Mutex::new(Vec::new()),
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn name(&self) -> &'static str {
        "mock_ocr"
    }

    fn available(&self) -> bool {
        self.available
    }

    fn recognize(&self, _image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        self.results
            .lock()
            .ok()
            .and_then(|mut r| r.pop())
            .ok_or_else(|| ExtractionError::OcrProcessing("No scripted result left".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::pdfium::{minimal_png, MockPdfPageRenderer};
    use crate::pipeline::extraction::preprocess::MockImagePreprocessor;

    fn strategy(engine: MockOcrEngine, pages: usize) -> OpticalStrategy {
        OpticalStrategy::new(
            Arc::new(MockPdfPageRenderer::new(pages)),
            Arc::new(engine),
            Arc::new(MockImagePreprocessor::new()),
            300,
            15,
        )
    }

    #[test]
    fn recognizes_scripted_pages() {
        let engine = MockOcrEngine::new(vec![
            ("Student No: 1046098 transcript", 0.9),
            ("CMT 108 WEB DEVELOPMENT A 1", 0.8),
        ]);
        let result = strategy(engine, 2).extract(&minimal_png());
        assert!(result.succeeded);
        assert_eq!(result.page_count, 2);
        assert!(result.text.contains("1046098"));
        assert!(result.text.contains(PAGE_BREAK));
        assert!(result.confidence > 0.0);
    }

    #[test]
    fn unavailable_engine_fails_cleanly() {
        let result = strategy(MockOcrEngine::unavailable(), 1).extract(&minimal_png());
        assert!(!result.succeeded);
        assert!(result
            .error_detail
            .as_deref()
            .is_some_and(|d| d.contains("mock_ocr")));
    }

    #[test]
    fn page_failures_do_not_abort_document() {
        // Two pages, one scripted result: second page recognition errors
        let engine = MockOcrEngine::new(vec![("readable page text here", 0.7)]);
        let result = strategy(engine, 2).extract(&minimal_png());
        assert!(result.succeeded);
        assert!(result.text.contains("readable page"));
    }

    #[test]
    fn all_pages_failing_is_a_failed_attempt() {
        let engine = MockOcrEngine::new(vec![]);
        let result = strategy(engine, 2).extract(&minimal_png());
        assert!(!result.succeeded);
    }

    #[test]
    fn confidence_averages_quality_and_engine() {
        let engine = MockOcrEngine::new(vec![("short", 1.0)]);
        let result = strategy(engine, 1).extract(&minimal_png());
        assert!(result.succeeded);
        // Quality of a 5-char page is 0, engine reports 1.0
        assert!((result.confidence - 0.5).abs() < 0.01);
    }

    #[test]
    fn engine_registry_prefers_available() {
        register_engine(Arc::new(MockOcrEngine::unavailable()));
        register_engine(Arc::new(MockOcrEngine::new(vec![("text", 0.5)])));
        let engine = first_available_engine();
        assert!(engine.is_some_and(|e| e.available()));
        assert!(!registered_engines().is_empty());
    }
}
