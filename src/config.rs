//! Pipeline configuration.
//!
//! Institutional parameters (epoch year, unit requirements) and resource
//! limits (timeouts, page caps) gathered in one place so deployments for
//! other institutions only touch configuration, never the pipeline code.

use serde::{Deserialize, Serialize};

/// Tunable parameters for one verification pipeline instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Calendar year of a Year 1 intake; maps semester term codes like
    /// "SEPT-DEC24" to an academic year. Institution-specific.
    pub term_epoch_year: i32,
    /// Completed units required before attachment, degree programs.
    pub required_units_degree: u32,
    /// Completed units required before attachment, diploma programs.
    pub required_units_diploma: u32,
    /// Similarity bar for the fuzzy name match.
    pub name_match_threshold: f32,
    /// Wall-clock budget per extraction strategy.
    pub strategy_timeout_ms: u64,
    /// Page cap for digital strategies.
    pub max_pages_digital: usize,
    /// Page cap for optical strategies. OCR is far slower per page.
    pub max_pages_optical: usize,
    /// Rasterization resolution for optical extraction.
    pub render_dpi: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            term_epoch_year: 2020,
            required_units_degree: 39,
            required_units_diploma: 20,
            name_match_threshold: 0.7,
            strategy_timeout_ms: 30_000,
            max_pages_digital: 20,
            max_pages_optical: 15,
            render_dpi: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_institutional_policy() {
        let config = PipelineConfig::default();
        assert_eq!(config.required_units_degree, 39);
        assert_eq!(config.required_units_diploma, 20);
        assert!((config.name_match_threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.render_dpi, 300);
    }

    #[test]
    fn partial_config_fills_missing_fields() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"term_epoch_year": 2021}"#).unwrap();
        assert_eq!(config.term_epoch_year, 2021);
        assert_eq!(config.strategy_timeout_ms, 30_000);
        assert_eq!(config.max_pages_digital, 20);
    }
}
