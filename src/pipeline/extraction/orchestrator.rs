//! Strategy orchestration: profile the document, fan strategies out on
//! worker threads, and select the winning extraction.
//!
//! Selection rules, in order:
//! 1. Successful attempts below the family acceptance floor are discarded
//!    (0.1 digital, 0.05 optical).
//! 2. Highest confidence wins; on a tie the longer text wins.
//! 3. When the profiled family disappoints (best below 0.3), the other
//!    family runs too and the overall best is kept.
//! 4. If nothing passes a floor but some attempt produced text, the
//!    distinct texts are concatenated as a last-resort candidate.
//! 5. Total failure still returns an outcome: empty text, confidence 0.
//!
//! The selected text is sanitized before it leaves this module.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::analyzer::DocumentAnalyzer;
use super::sanitize::sanitize_extracted_text;
use super::types::{
    DocumentProfile, ExtractionStrategy, RawExtraction, RecommendedStrategy, StrategyFamily,
};

/// Acceptance floors per family. Optical output is noisier, so its bar
/// is lower.
const DIGITAL_ACCEPT: f32 = 0.1;
const OPTICAL_ACCEPT: f32 = 0.05;

/// Below this the profiled family is considered to have disappointed
/// and the other family is tried as well.
const RERUN_THRESHOLD: f32 = 0.3;

/// An attempt at or above this confidence is accepted immediately
/// without waiting for slower strategies.
const EARLY_ACCEPT: f32 = 0.9;

/// Confidence assigned to the concatenated last-resort candidate.
const COMBINED_CONFIDENCE: f32 = 0.1;

/// Result of orchestrated extraction. Always produced, even on total
/// failure.
#[derive(Debug)]
pub struct ExtractionOutcome {
    /// The winning attempt, text already sanitized.
    pub selected: RawExtraction,
    /// Every attempt that ran, including failures and timeouts.
    pub attempts: Vec<RawExtraction>,
    pub profile: DocumentProfile,
}

impl ExtractionOutcome {
    /// True when the selected attempt carries usable text.
    pub fn has_text(&self) -> bool {
        !self.selected.text.is_empty()
    }
}

pub struct ExtractionOrchestrator {
    analyzer: DocumentAnalyzer,
    digital: Vec<Arc<dyn ExtractionStrategy>>,
    optical: Vec<Arc<dyn ExtractionStrategy>>,
    strategy_timeout: Duration,
}

impl ExtractionOrchestrator {
    pub fn new(
        analyzer: DocumentAnalyzer,
        digital: Vec<Arc<dyn ExtractionStrategy>>,
        optical: Vec<Arc<dyn ExtractionStrategy>>,
        strategy_timeout_ms: u64,
    ) -> Self {
        Self {
            analyzer,
            digital,
            optical,
            strategy_timeout: Duration::from_millis(strategy_timeout_ms),
        }
    }

    /// Profile the document and run the recommended strategy families.
    pub fn extract(&self, pdf_bytes: &[u8]) -> ExtractionOutcome {
        let profile = self.analyzer.analyze(pdf_bytes);
        let bytes: Arc<[u8]> = Arc::from(pdf_bytes);

        let (mut attempts, best) = match profile.recommended_strategy {
            RecommendedStrategy::DigitalText
            | RecommendedStrategy::DigitalWithTables
            | RecommendedStrategy::Hybrid => self.digital_first(&bytes),
            RecommendedStrategy::AdvancedOcr => self.optical_first(&bytes),
        };

        let selected = match best {
            Some(mut winner) => {
                winner.text = sanitize_extracted_text(&winner.text);
                winner
            }
            None => combined_fallback(&mut attempts),
        };

        info!(
            strategy = %selected.strategy_name,
            confidence = selected.confidence,
            chars = selected.text.len(),
            attempts = attempts.len(),
            "Extraction selection complete"
        );

        ExtractionOutcome {
            selected,
            attempts,
            profile,
        }
    }

    fn digital_first(&self, bytes: &Arc<[u8]>) -> (Vec<RawExtraction>, Option<RawExtraction>) {
        let mut attempts = self.run_family(&self.digital, bytes);
        let mut best = best_of(&attempts, DIGITAL_ACCEPT);

        let disappointed = best.as_ref().map_or(true, |b| b.confidence < RERUN_THRESHOLD);
        if disappointed && !self.optical.is_empty() {
            let optical_attempts = self.run_family(&self.optical, bytes);
            let optical_best = best_of(&optical_attempts, OPTICAL_ACCEPT);
            attempts.extend(optical_attempts);
            best = prefer_higher(best, optical_best);
        }
        (attempts, best)
    }

    fn optical_first(&self, bytes: &Arc<[u8]>) -> (Vec<RawExtraction>, Option<RawExtraction>) {
        let mut attempts = self.run_family(&self.optical, bytes);
        let mut best = best_of(&attempts, OPTICAL_ACCEPT);

        let disappointed = best.as_ref().map_or(true, |b| b.confidence < RERUN_THRESHOLD);
        if disappointed && !self.digital.is_empty() {
            let digital_attempts = self.run_family(&self.digital, bytes);
            let digital_best = best_of(&digital_attempts, DIGITAL_ACCEPT);
            attempts.extend(digital_attempts);
            best = prefer_higher(best, digital_best);
        }
        (attempts, best)
    }

    /// Run one family's strategies on worker threads, collecting results
    /// until the deadline. Strategies that miss the deadline are recorded
    /// as timed-out failures; their threads are left to finish detached.
    fn run_family(
        &self,
        strategies: &[Arc<dyn ExtractionStrategy>],
        bytes: &Arc<[u8]>,
    ) -> Vec<RawExtraction> {
        if strategies.is_empty() {
            return Vec::new();
        }

        let (tx, rx) = mpsc::channel::<(usize, RawExtraction)>();
        for (idx, strategy) in strategies.iter().enumerate() {
            let strategy = Arc::clone(strategy);
            let bytes = Arc::clone(bytes);
            let tx = tx.clone();
            thread::spawn(move || {
                let attempt = strategy.extract(&bytes);
                let _ = tx.send((idx, attempt));
            });
        }
        drop(tx);

        let deadline = Instant::now() + self.strategy_timeout;
        let mut results: Vec<Option<RawExtraction>> = (0..strategies.len()).map(|_| None).collect();
        let mut received = 0;
        while received < strategies.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((idx, attempt)) => {
                    let early = attempt.succeeded && attempt.confidence >= EARLY_ACCEPT;
                    results[idx] = Some(attempt);
                    received += 1;
                    if early {
                        break;
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => break,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        results
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| {
                    let name = strategies[idx].name();
                    warn!(
                        strategy = name,
                        timeout_ms = self.strategy_timeout.as_millis() as u64,
                        "Strategy missed the deadline"
                    );
                    RawExtraction::failure(
                        name,
                        format!(
                            "Timed out after {}ms",
                            self.strategy_timeout.as_millis()
                        ),
                    )
                })
            })
            .collect()
    }
}

/// Best successful attempt at or above the acceptance floor. Ties go to
/// the longer text.
fn best_of(attempts: &[RawExtraction], floor: f32) -> Option<RawExtraction> {
    attempts
        .iter()
        .filter(|a| a.succeeded && a.confidence >= floor && !a.text.trim().is_empty())
        .max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.text.len().cmp(&b.text.len()))
        })
        .cloned()
}

fn prefer_higher(a: Option<RawExtraction>, b: Option<RawExtraction>) -> Option<RawExtraction> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if y.confidence > x.confidence { y } else { x }),
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (None, None) => None,
    }
}

/// Last resort when no attempt passed its floor: concatenate the
/// distinct texts the attempts did produce. Returns an empty zero
/// confidence result when nothing produced text at all.
fn combined_fallback(attempts: &mut Vec<RawExtraction>) -> RawExtraction {
    let mut texts: Vec<&str> = Vec::new();
    for attempt in attempts.iter() {
        let trimmed = attempt.text.trim();
        if !trimmed.is_empty() && !texts.contains(&trimmed) {
            texts.push(trimmed);
        }
    }

    if texts.is_empty() {
        warn!("All extraction strategies failed");
        return RawExtraction::failure("none", "All strategies failed to produce text");
    }

    let combined = sanitize_extracted_text(&texts.join("\n\n"));
    warn!(
        sources = texts.len(),
        chars = combined.len(),
        "No strategy passed its floor, using combined text"
    );
    RawExtraction {
        strategy_name: "combined_text".to_string(),
        text: combined,
        confidence: COMBINED_CONFIDENCE,
        processing_time_ms: 0,
        page_count: attempts.iter().map(|a| a.page_count).max().unwrap_or(0),
        succeeded: true,
        error_detail: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::analyzer::MockDocumentInspector;
    use crate::pipeline::extraction::types::PageStats;

    struct MockStrategy {
        name: &'static str,
        family: StrategyFamily,
        text: String,
        confidence: f32,
        succeeded: bool,
        delay: Duration,
    }

    impl MockStrategy {
        fn digital(name: &'static str, text: &str, confidence: f32) -> Arc<dyn ExtractionStrategy> {
            Arc::new(Self {
                name,
                family: StrategyFamily::Digital,
                text: text.to_string(),
                confidence,
                succeeded: true,
                delay: Duration::ZERO,
            })
        }

        fn optical(name: &'static str, text: &str, confidence: f32) -> Arc<dyn ExtractionStrategy> {
            Arc::new(Self {
                name,
                family: StrategyFamily::Optical,
                text: text.to_string(),
                confidence,
                succeeded: true,
                delay: Duration::ZERO,
            })
        }

        fn failing(name: &'static str) -> Arc<dyn ExtractionStrategy> {
            Arc::new(Self {
                name,
                family: StrategyFamily::Digital,
                text: String::new(),
                confidence: 0.0,
                succeeded: false,
                delay: Duration::ZERO,
            })
        }

        fn slow(name: &'static str, delay_ms: u64) -> Arc<dyn ExtractionStrategy> {
            Arc::new(Self {
                name,
                family: StrategyFamily::Digital,
                text: "slow text that never arrives in time".to_string(),
                confidence: 0.8,
                succeeded: true,
                delay: Duration::from_millis(delay_ms),
            })
        }
    }

    impl ExtractionStrategy for MockStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        fn family(&self) -> StrategyFamily {
            self.family
        }

        fn extract(&self, _pdf_bytes: &[u8]) -> RawExtraction {
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            if self.succeeded {
                RawExtraction {
                    strategy_name: self.name.to_string(),
                    text: self.text.clone(),
                    confidence: self.confidence,
                    processing_time_ms: self.delay.as_millis() as u64,
                    page_count: 1,
                    succeeded: true,
                    error_detail: None,
                }
            } else {
                RawExtraction::failure(self.name, "mock failure")
            }
        }
    }

    fn digital_page() -> PageStats {
        PageStats {
            text_block_count: 12,
            image_dimensions: vec![],
            distinct_font_sizes: 3,
            text: "Student transcript with course grades for the semester. \
                   The student completed each unit listed below in the program."
                .repeat(5),
            page_area: 612.0 * 792.0,
            line_positions: vec![],
        }
    }

    fn scanned_page() -> PageStats {
        PageStats {
            text_block_count: 0,
            image_dimensions: vec![(2480, 3508)],
            distinct_font_sizes: 0,
            text: String::new(),
            page_area: 612.0 * 792.0,
            line_positions: vec![],
        }
    }

    fn digital_analyzer() -> DocumentAnalyzer {
        DocumentAnalyzer::with_inspector(Box::new(MockDocumentInspector::new(
            2,
            vec![digital_page(), digital_page()],
        )))
    }

    fn scanned_analyzer() -> DocumentAnalyzer {
        DocumentAnalyzer::with_inspector(Box::new(MockDocumentInspector::new(
            2,
            vec![scanned_page(), scanned_page()],
        )))
    }

    #[test]
    fn highest_confidence_wins() {
        let orchestrator = ExtractionOrchestrator::new(
            digital_analyzer(),
            vec![
                MockStrategy::digital("alpha", "lower confidence text here", 0.5),
                MockStrategy::digital("beta", "higher confidence text here", 0.7),
            ],
            vec![],
            5_000,
        );
        let outcome = orchestrator.extract(b"%PDF-fake");
        assert_eq!(outcome.selected.strategy_name, "beta");
        assert_eq!(outcome.attempts.len(), 2);
    }

    #[test]
    fn tie_prefers_longer_text() {
        let orchestrator = ExtractionOrchestrator::new(
            digital_analyzer(),
            vec![
                MockStrategy::digital("short", "brief output text", 0.6),
                MockStrategy::digital("long", "a much longer extraction with more content", 0.6),
            ],
            vec![],
            5_000,
        );
        let outcome = orchestrator.extract(b"%PDF-fake");
        assert_eq!(outcome.selected.strategy_name, "long");
    }

    #[test]
    fn failed_attempts_are_recorded_but_never_selected() {
        let orchestrator = ExtractionOrchestrator::new(
            digital_analyzer(),
            vec![
                MockStrategy::failing("broken"),
                MockStrategy::digital("working", "usable extracted text", 0.4),
            ],
            vec![],
            5_000,
        );
        let outcome = orchestrator.extract(b"%PDF-fake");
        assert_eq!(outcome.selected.strategy_name, "working");
        assert!(outcome.attempts.iter().any(|a| !a.succeeded));
    }

    #[test]
    fn slow_strategy_recorded_as_timeout() {
        let orchestrator = ExtractionOrchestrator::new(
            digital_analyzer(),
            vec![
                MockStrategy::digital("fast", "fast strategy output text", 0.6),
                MockStrategy::slow("sluggish", 2_000),
            ],
            vec![],
            150,
        );
        let outcome = orchestrator.extract(b"%PDF-fake");
        assert_eq!(outcome.selected.strategy_name, "fast");
        let timed_out = outcome
            .attempts
            .iter()
            .find(|a| a.strategy_name == "sluggish")
            .unwrap();
        assert!(!timed_out.succeeded);
        assert!(timed_out
            .error_detail
            .as_deref()
            .is_some_and(|d| d.contains("Timed out")));
    }

    #[test]
    fn weak_digital_triggers_optical_rerun() {
        let orchestrator = ExtractionOrchestrator::new(
            digital_analyzer(),
            vec![MockStrategy::digital("weak", "sparse digital text", 0.15)],
            vec![MockStrategy::optical("ocr", "full optical page text", 0.6)],
            5_000,
        );
        let outcome = orchestrator.extract(b"%PDF-fake");
        assert_eq!(outcome.selected.strategy_name, "ocr");
        assert_eq!(outcome.attempts.len(), 2);
    }

    #[test]
    fn strong_digital_skips_optical() {
        let orchestrator = ExtractionOrchestrator::new(
            digital_analyzer(),
            vec![MockStrategy::digital("strong", "rich digital layer text", 0.8)],
            vec![MockStrategy::optical("ocr", "should never run", 0.9)],
            5_000,
        );
        let outcome = orchestrator.extract(b"%PDF-fake");
        assert_eq!(outcome.selected.strategy_name, "strong");
        assert_eq!(outcome.attempts.len(), 1);
    }

    #[test]
    fn scanned_profile_runs_optical_first() {
        let orchestrator = ExtractionOrchestrator::new(
            scanned_analyzer(),
            vec![MockStrategy::digital("digital", "stray text layer", 0.2)],
            vec![MockStrategy::optical("ocr", "recognized page content", 0.7)],
            5_000,
        );
        let outcome = orchestrator.extract(b"%PDF-fake");
        assert!(outcome.profile.is_scanned);
        assert_eq!(outcome.selected.strategy_name, "ocr");
    }

    #[test]
    fn combined_fallback_when_nothing_passes_floor() {
        let orchestrator = ExtractionOrchestrator::new(
            digital_analyzer(),
            vec![MockStrategy::digital("faint", "fragment of a transcript", 0.05)],
            vec![MockStrategy::optical("noisy", "another fragment entirely", 0.01)],
            5_000,
        );
        let outcome = orchestrator.extract(b"%PDF-fake");
        assert_eq!(outcome.selected.strategy_name, "combined_text");
        assert!(outcome.selected.text.contains("fragment of a transcript"));
        assert!(outcome.selected.text.contains("another fragment"));
        assert!((outcome.selected.confidence - COMBINED_CONFIDENCE).abs() < f32::EPSILON);
    }

    #[test]
    fn total_failure_yields_empty_outcome() {
        let orchestrator = ExtractionOrchestrator::new(
            digital_analyzer(),
            vec![MockStrategy::failing("a"), MockStrategy::failing("b")],
            vec![],
            5_000,
        );
        let outcome = orchestrator.extract(b"%PDF-fake");
        assert!(!outcome.has_text());
        assert_eq!(outcome.selected.confidence, 0.0);
        assert!(!outcome.selected.succeeded);
    }

    #[test]
    fn selected_text_is_sanitized() {
        let orchestrator = ExtractionOrchestrator::new(
            digital_analyzer(),
            vec![MockStrategy::digital(
                "messy",
                "Line one\u{0000} with junk\n\n\n   \nLine two",
                0.6,
            )],
            vec![],
            5_000,
        );
        let outcome = orchestrator.extract(b"%PDF-fake");
        assert!(!outcome.selected.text.contains('\u{0000}'));
        assert!(outcome.selected.text.contains("Line one"));
        assert!(outcome.selected.text.contains("Line two"));
    }

    #[test]
    fn early_accept_stops_waiting_for_slow_strategies() {
        let orchestrator = ExtractionOrchestrator::new(
            digital_analyzer(),
            vec![
                MockStrategy::digital("instant", "excellent immediate extraction", 0.95),
                MockStrategy::slow("glacial", 3_000),
            ],
            vec![],
            10_000,
        );
        let started = Instant::now();
        let outcome = orchestrator.extract(b"%PDF-fake");
        assert_eq!(outcome.selected.strategy_name, "instant");
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
