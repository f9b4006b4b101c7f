//! Fee-statement balance extraction.
//!
//! Simpler sibling of the transcript pipeline: single-pass text scan for a
//! trailing balance figure. Statements conventionally end the balance column
//! with a bare dash when nothing is owed.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Only the tail of the statement is searched; the balance row is always
/// near the bottom.
const TAIL_LINES: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeStatementResult {
    pub balance: Option<f64>,
    pub balance_display: String,
    pub balance_cleared: bool,
    pub confidence: f32,
    pub method: String,
}

impl FeeStatementResult {
    fn found(balance: f64, confidence: f32, method: &str) -> Self {
        Self {
            balance: Some(balance),
            balance_display: format!("KSH {balance}"),
            balance_cleared: balance <= 0.0,
            confidence,
            method: method.to_string(),
        }
    }

    fn not_found() -> Self {
        Self {
            balance: None,
            balance_display: "unknown".to_string(),
            balance_cleared: false,
            confidence: 0.0,
            method: "not_found".to_string(),
        }
    }
}

static BALANCE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:balance|bal\.?|amount\s+due|outstanding)\s*(?:b/?f|c/?f)?\s*[:\-]?\s*(?:ksh?s?\.?\s*)?(-?[\d,]+(?:\.\d{1,2})?)\b",
    )
    .unwrap()
});

static NUMBER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?[\d,]+(?:\.\d{1,2})?").unwrap());

static TRAILING_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)[-\u{2013}]\s*$").unwrap());

#[derive(Default)]
pub struct FeeStatementParser;

impl FeeStatementParser {
    pub fn new() -> Self {
        Self
    }

    /// Scan extracted statement text bottom-up for the closing balance.
    pub fn parse(&self, text: &str) -> FeeStatementResult {
        let tail: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .rev()
            .take(TAIL_LINES)
            .collect();

        for line in &tail {
            // A row ending in a bare dash is the zero-balance convention.
            if TRAILING_DASH.is_match(line) {
                debug!(line, "balance row ends in bare dash, zero balance");
                return FeeStatementResult::found(0.0, 0.9, "trailing_dash");
            }

            if let Some(caps) = BALANCE_LABEL.captures(line) {
                if let Some(value) = parse_amount(&caps[1]) {
                    return FeeStatementResult::found(value, 0.85, "balance_label");
                }
            }

            // Transaction rows: wide line with several figures, balance last.
            if line.len() > 20 {
                let numbers: Vec<f64> = NUMBER_TOKEN
                    .find_iter(line)
                    .filter_map(|m| parse_amount(m.as_str()))
                    .collect();
                if numbers.len() >= 2 {
                    if let Some(&last) = numbers.last() {
                        return FeeStatementResult::found(last, 0.6, "last_row_figure");
                    }
                }
            }
        }
        FeeStatementResult::not_found()
    }
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}
