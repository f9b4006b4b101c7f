//! Digital extraction strategies: lossless parsers over embedded text.
//!
//! Two independent parsers cover the digital family. `PdfiumTextStrategy`
//! reads the text layer PDFium exposes; `ContentStreamStrategy` decodes the
//! content-stream show operators directly via lopdf, with UTF-16BE and
//! Latin-1 fallbacks for documents PDFium mis-handles. Both self-report
//! confidence through the quality scorer and never propagate errors.

use std::time::Instant;

use lopdf::{Document, Object};
use tracing::{debug, warn};

use super::pdfium;
use super::quality::score_text;
use super::types::{ExtractionStrategy, RawExtraction, StrategyFamily};
use super::ExtractionError;

/// Separator used when joining per-page texts.
pub const PAGE_BREAK: &str = "\n\n--- Page Break ---\n\n";

/// Text layer extraction through PDFium.
pub struct PdfiumTextStrategy {
    max_pages: usize,
}

impl PdfiumTextStrategy {
    pub fn new(max_pages: usize) -> Self {
        Self { max_pages }
    }
}

impl ExtractionStrategy for PdfiumTextStrategy {
    fn name(&self) -> &'static str {
        "pdfium_text"
    }

    fn family(&self) -> StrategyFamily {
        StrategyFamily::Digital
    }

    fn extract(&self, pdf_bytes: &[u8]) -> RawExtraction {
        let started = Instant::now();
        match pdfium::extract_text_layer(pdf_bytes) {
            Ok(pages) => {
                let page_count = pages.len();
                let text = pages
                    .iter()
                    .take(self.max_pages)
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(PAGE_BREAK);
                finish(self.name(), text, page_count, started)
            }
            Err(e) => {
                warn!(strategy = self.name(), error = %e, "Digital extraction failed");
                timed_failure(self.name(), e, started)
            }
        }
    }
}

/// Direct content-stream decoding through lopdf.
pub struct ContentStreamStrategy {
    max_pages: usize,
}

impl ContentStreamStrategy {
    pub fn new(max_pages: usize) -> Self {
        Self { max_pages }
    }

    fn extract_inner(&self, pdf_bytes: &[u8]) -> Result<(String, usize), ExtractionError> {
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;

        let page_ids = doc.get_pages();
        let page_count = page_ids.len();
        if page_count == 0 {
            return Err(ExtractionError::EmptyDocument);
        }

        let mut pages = Vec::new();
        for (_, &page_id) in page_ids.iter().take(self.max_pages) {
            let mut page_text = String::new();
            if let Ok(content) = doc.get_page_content(page_id) {
                if let Ok(decoded) = lopdf::content::Content::decode(&content) {
                    for op in &decoded.operations {
                        match op.operator.as_str() {
                            "Tj" | "TJ" | "'" | "\"" => {
                                for operand in &op.operands {
                                    if let Ok(text) = decode_text_operand(&doc, operand) {
                                        page_text.push_str(&text);
                                    }
                                }
                                page_text.push('\n');
                            }
                            _ => {}
                        }
                    }
                }
            }
            pages.push(page_text);
        }

        Ok((pages.join(PAGE_BREAK), page_count))
    }
}

impl ExtractionStrategy for ContentStreamStrategy {
    fn name(&self) -> &'static str {
        "content_stream"
    }

    fn family(&self) -> StrategyFamily {
        StrategyFamily::Digital
    }

    fn extract(&self, pdf_bytes: &[u8]) -> RawExtraction {
        let started = Instant::now();
        match self.extract_inner(pdf_bytes) {
            Ok((text, page_count)) => finish(self.name(), text, page_count, started),
            Err(e) => {
                warn!(strategy = self.name(), error = %e, "Digital extraction failed");
                timed_failure(self.name(), e, started)
            }
        }
    }
}

fn finish(name: &str, text: String, page_count: usize, started: Instant) -> RawExtraction {
    let confidence = score_text(&text, StrategyFamily::Digital);
    debug!(
        strategy = name,
        pages = page_count,
        chars = text.len(),
        confidence,
        "Digital extraction complete"
    );
    RawExtraction {
        strategy_name: name.to_string(),
        text,
        confidence,
        processing_time_ms: started.elapsed().as_millis() as u64,
        page_count,
        succeeded: true,
        error_detail: None,
    }
}

fn timed_failure(name: &str, e: ExtractionError, started: Instant) -> RawExtraction {
    let mut attempt = RawExtraction::failure(name, e.to_string());
    attempt.processing_time_ms = started.elapsed().as_millis() as u64;
    attempt
}

/// Decode the text payload of a show operator operand.
///
/// Tries UTF-8 first, then UTF-16BE (BOM-prefixed, common in PDFs), then
/// falls back to Latin-1. Array operands interleave strings with kerning
/// adjustments; large negative adjustments become word gaps.
pub(crate) fn decode_text_operand(doc: &Document, operand: &Object) -> Result<String, ()> {
    match operand {
        Object::String(bytes, _) => {
            if let Ok(s) = String::from_utf8(bytes.clone()) {
                return Ok(s);
            }
            if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
                let units: Vec<u16> = bytes[2..]
                    .chunks(2)
                    .filter_map(|chunk| {
                        (chunk.len() == 2).then(|| u16::from_be_bytes([chunk[0], chunk[1]]))
                    })
                    .collect();
                if let Ok(s) = String::from_utf16(&units) {
                    return Ok(s);
                }
            }
            Ok(bytes.iter().map(|&b| b as char).collect())
        }
        Object::Array(arr) => {
            let mut text = String::new();
            for item in arr {
                match item {
                    Object::String(_, _) => {
                        if let Ok(s) = decode_text_operand(doc, item) {
                            text.push_str(&s);
                        }
                    }
                    Object::Integer(n) if *n < -100 => text.push(' '),
                    _ => {}
                }
            }
            Ok(text)
        }
        _ => Err(()),
    }
}
