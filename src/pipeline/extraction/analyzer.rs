//! Structural document analysis: digital vs scanned classification.
//!
//! Walks the PDF object graph directly (no rendering) to decide which
//! extraction family to try first. Classification is pure logic over
//! per-page [`PageStats`], so it runs identically against the production
//! lopdf inspector and the mock used in tests.

use std::sync::LazyLock;

use lopdf::{Dictionary, Document, Object};
use regex::Regex;
use tracing::{debug, warn};

use super::quality::ACADEMIC_KEYWORDS;
use super::strategies::decode_text_operand;
use super::types::{
    DocumentInspector, DocumentProfile, LinePosition, PageStats, RecommendedStrategy,
};
use super::ExtractionError;

/// Only the first pages are inspected; transcripts are short and the
/// classification signal saturates quickly.
pub const MAX_SAMPLE_PAGES: usize = 5;

/// An embedded image at least this large on both axes suggests a scan.
const SCAN_IMAGE_PX: u32 = 1000;

/// Chars per square point above which a page reads as dense digital text.
const DENSE_TEXT_RATIO: f32 = 0.01;

/// Below this the page has essentially no text layer.
const SPARSE_TEXT_RATIO: f32 = 0.001;

/// Y coordinates within the same 10-point band belong to one table row.
const ROW_BAND_POINTS: f32 = 10.0;

static COURSE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2,4}\s*\d{3,4}[A-Z]?\b").unwrap());

/// Classifies a document and recommends an extraction family.
pub struct DocumentAnalyzer {
    inspector: Box<dyn DocumentInspector>,
}

impl Default for DocumentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentAnalyzer {
    pub fn new() -> Self {
        Self {
            inspector: Box::new(LopdfInspector),
        }
    }

    pub fn with_inspector(inspector: Box<dyn DocumentInspector>) -> Self {
        Self { inspector }
    }

    /// Derive a [`DocumentProfile`] from raw document bytes.
    ///
    /// Never fails: corrupt bytes yield a pessimistic profile so the
    /// orchestrator always receives something usable.
    pub fn analyze(&self, pdf_bytes: &[u8]) -> DocumentProfile {
        match self.inspector.inspect(pdf_bytes, MAX_SAMPLE_PAGES) {
            Ok((page_count, stats)) => {
                let profile = classify(page_count, &stats);
                debug!(
                    pages = page_count,
                    sampled = stats.len(),
                    digital = profile.is_digital,
                    scanned = profile.is_scanned,
                    tables = profile.has_tables,
                    strategy = profile.recommended_strategy.as_str(),
                    confidence = profile.confidence,
                    "Document analysis complete"
                );
                profile
            }
            Err(e) => {
                warn!(error = %e, "Document analysis failed, assuming scanned");
                DocumentProfile::pessimistic(0)
            }
        }
    }
}

/// Pure classification over sampled page stats.
fn classify(page_count: usize, stats: &[PageStats]) -> DocumentProfile {
    if stats.is_empty() {
        return DocumentProfile::pessimistic(page_count);
    }

    let mut digital_score = 0u32;
    let mut scanned_score = 0u32;
    let mut table_score = 0usize;
    let mut busy_font_pages = 0usize;
    let mut covered_pages = 0usize;

    for page in stats {
        if page.text_block_count > 5 {
            digital_score += 2;
        }
        if page.distinct_font_sizes > 0 {
            digital_score += 1;
        }
        if page
            .image_dimensions
            .iter()
            .any(|&(w, h)| w >= SCAN_IMAGE_PX && h >= SCAN_IMAGE_PX)
        {
            scanned_score += 2;
        }

        let area = page.page_area.max(1.0);
        let density = page.text.len() as f32 / area;
        if density > DENSE_TEXT_RATIO {
            digital_score += 1;
        } else if density < SPARSE_TEXT_RATIO {
            scanned_score += 1;
        }

        if page.text.len() >= 100 && keyword_hits(&page.text) >= 2 {
            digital_score += 2;
        }

        if page.distinct_font_sizes > 5 {
            busy_font_pages += 1;
        }
        if page.text.len() > 50 {
            covered_pages += 1;
        }

        if page_has_table_rows(&page.line_positions) {
            table_score += 2;
        }
        table_score += COURSE_CODE.find_iter(&page.text).count().min(10);
    }

    let sampled = stats.len();
    let is_digital = digital_score > scanned_score;
    let is_scanned = scanned_score > digital_score;
    let has_tables = table_score > sampled * 2;
    let has_complex_layout = busy_font_pages * 2 > sampled;
    let total = (digital_score + scanned_score).max(1);
    let confidence = digital_score.max(scanned_score) as f32 / total as f32;

    let recommended_strategy = if is_digital && has_tables {
        RecommendedStrategy::DigitalWithTables
    } else if is_digital {
        RecommendedStrategy::DigitalText
    } else if is_scanned {
        RecommendedStrategy::AdvancedOcr
    } else {
        RecommendedStrategy::Hybrid
    };

    DocumentProfile {
        is_digital,
        is_scanned,
        has_tables,
        has_complex_layout,
        text_coverage_ratio: covered_pages as f32 / sampled as f32,
        page_count,
        recommended_strategy,
        confidence,
    }
}

fn keyword_hits(text: &str) -> usize {
    let lower = text.to_lowercase();
    ACADEMIC_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .count()
}

/// A page has tables when at least two Y-bands each hold three or more
/// aligned column entries.
fn page_has_table_rows(lines: &[LinePosition]) -> bool {
    use std::collections::HashMap;

    let mut bands: HashMap<i64, Vec<f32>> = HashMap::new();
    for pos in lines {
        let band = (pos.y / ROW_BAND_POINTS).round() as i64;
        bands.entry(band).or_default().push(pos.x);
    }

    bands
        .values()
        .filter(|xs| {
            let mut sorted: Vec<i64> = xs.iter().map(|x| *x as i64).collect();
            sorted.sort_unstable();
            sorted.dedup();
            sorted.len() >= 3
        })
        .count()
        >= 2
}

// ── Production inspector ──────────────────────────────────

/// Inspects PDF structure via lopdf: page tree, content streams, XObject
/// image dictionaries, and font resources.
pub struct LopdfInspector;

impl DocumentInspector for LopdfInspector {
    fn inspect(
        &self,
        pdf_bytes: &[u8],
        max_pages: usize,
    ) -> Result<(usize, Vec<PageStats>), ExtractionError> {
        if pdf_bytes.len() < 4 || &pdf_bytes[0..4] != b"%PDF" {
            return Err(ExtractionError::PdfParsing(
                "missing %PDF header".to_string(),
            ));
        }

        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;

        let pages = doc.get_pages();
        let total = pages.len();
        if total == 0 {
            return Err(ExtractionError::EmptyDocument);
        }

        let mut stats = Vec::new();
        for (_, &page_id) in pages.iter().take(max_pages) {
            // A broken page still contributes default (scanned-leaning) stats.
            stats.push(inspect_page(&doc, page_id).unwrap_or_default());
        }

        Ok((total, stats))
    }
}

fn inspect_page(doc: &Document, page_id: lopdf::ObjectId) -> Option<PageStats> {
    let page_dict = doc.get_object(page_id).ok()?.as_dict().ok()?;

    let mut stats = PageStats {
        page_area: page_area(doc, page_dict),
        ..Default::default()
    };

    if let Ok(content) = doc.get_page_content(page_id) {
        if let Ok(decoded) = lopdf::content::Content::decode(&content) {
            scan_content_ops(doc, &decoded.operations, &mut stats);
        }
    }

    collect_image_dimensions(doc, page_dict, &mut stats.image_dimensions);

    Some(stats)
}

/// Walk content-stream operations collecting text blocks, font sizes, text,
/// and the position of each text run (for table-row clustering).
fn scan_content_ops(doc: &Document, ops: &[lopdf::content::Operation], stats: &mut PageStats) {
    let mut font_sizes: Vec<i64> = Vec::new();
    let mut cur_x = 0.0f32;
    let mut cur_y = 0.0f32;

    for op in ops {
        match op.operator.as_str() {
            "BT" => stats.text_block_count += 1,
            "Tf" => {
                if let Some(size) = op.operands.get(1).and_then(operand_to_f32) {
                    let rounded = size.round() as i64;
                    if !font_sizes.contains(&rounded) {
                        font_sizes.push(rounded);
                    }
                }
            }
            "Tm" => {
                if op.operands.len() == 6 {
                    cur_x = op.operands.get(4).and_then(operand_to_f32).unwrap_or(cur_x);
                    cur_y = op.operands.get(5).and_then(operand_to_f32).unwrap_or(cur_y);
                }
            }
            "Td" | "TD" => {
                cur_x += op.operands.first().and_then(operand_to_f32).unwrap_or(0.0);
                cur_y += op.operands.get(1).and_then(operand_to_f32).unwrap_or(0.0);
            }
            "Tj" | "TJ" | "'" | "\"" => {
                let mut shown = String::new();
                for operand in &op.operands {
                    if let Ok(text) = decode_text_operand(doc, operand) {
                        shown.push_str(&text);
                    }
                }
                if !shown.trim().is_empty() {
                    stats
                        .line_positions
                        .push(LinePosition { x: cur_x, y: cur_y });
                    stats.text.push_str(&shown);
                    stats.text.push('\n');
                }
            }
            _ => {}
        }
    }

    stats.distinct_font_sizes = font_sizes.len();
}

fn operand_to_f32(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}

fn page_area(doc: &Document, page: &Dictionary) -> f32 {
    if let Some(arr) = resolve_array(doc, page.get(b"MediaBox").ok()) {
        let bounds: Vec<f32> = arr.iter().filter_map(operand_to_f32).collect();
        if bounds.len() == 4 {
            let width = bounds[2] - bounds[0];
            let height = bounds[3] - bounds[1];
            if width > 0.0 && height > 0.0 {
                return width * height;
            }
        }
    }
    // US Letter default
    612.0 * 792.0
}

fn resolve_array<'a>(doc: &'a Document, obj: Option<&'a Object>) -> Option<&'a Vec<Object>> {
    match obj? {
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Array(arr) => Some(arr),
            _ => None,
        },
        Object::Array(arr) => Some(arr),
        _ => None,
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: Option<&'a Object>) -> Option<&'a Dictionary> {
    match obj? {
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        },
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Collect pixel dimensions of image XObjects referenced by the page.
fn collect_image_dimensions(doc: &Document, page: &Dictionary, out: &mut Vec<(u32, u32)>) {
    let Some(resources) = resolve_dict(doc, page.get(b"Resources").ok()) else {
        return;
    };
    let Some(xobjects) = resolve_dict(doc, resources.get(b"XObject").ok()) else {
        return;
    };

    for (_name, obj) in xobjects.iter() {
        let stream = match obj {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(Object::Stream(s)) => s,
                _ => continue,
            },
            Object::Stream(s) => s,
            _ => continue,
        };

        let is_image = matches!(
            stream.dict.get(b"Subtype"),
            Ok(Object::Name(name)) if name == b"Image"
        );
        if !is_image {
            continue;
        }

        let width = stream
            .dict
            .get(b"Width")
            .ok()
            .and_then(operand_to_f32)
            .unwrap_or(0.0) as u32;
        let height = stream
            .dict
            .get(b"Height")
            .ok()
            .and_then(operand_to_f32)
            .unwrap_or(0.0) as u32;
        if width > 0 && height > 0 {
            out.push((width, height));
        }
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Mock inspector returning canned per-page stats.
pub struct MockDocumentInspector {
    pub total_pages: usize,
    pub pages: Vec<PageStats>,
    pub fail: bool,
}

impl MockDocumentInspector {
    pub fn new(total_pages: usize, pages: Vec<PageStats>) -> Self {
        Self {
            total_pages,
            pages,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            total_pages: 0,
            pages: vec![],
            fail: true,
        }
    }
}

impl DocumentInspector for MockDocumentInspector {
    fn inspect(
        &self,
        _pdf_bytes: &[u8],
        max_pages: usize,
    ) -> Result<(usize, Vec<PageStats>), ExtractionError> {
        if self.fail {
            return Err(ExtractionError::PdfParsing("mock failure".to_string()));
        }
        let sampled = self.pages.iter().take(max_pages).cloned().collect();
        Ok((self.total_pages, sampled))
    }
}
