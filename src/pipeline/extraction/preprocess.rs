//! Image preprocessing services for OCR input.
//!
//! Each processing step is an independent, reusable service composed by
//! `OcrPreprocessor`. Rendered transcript pages are usually clean, so the
//! pipeline only intervenes where measurements say it should: denoising is
//! conditional on a noise estimate, binarization is conditional on contrast.
//! Clean pages pass through as plain grayscale.

use std::borrow::Cow;
use std::io::Cursor;

use image::{DynamicImage, GenericImageView, GrayImage, ImageOutputFormat, Luma};
use tracing::debug;

use super::ExtractionError;

/// Maximum input image size (in bytes) before rejecting.
/// Prevents OOM on corrupt or adversarial files.
const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

/// Minimum valid image size in bytes (smallest valid PNG is ~67 bytes).
const MIN_IMAGE_BYTES: usize = 67;

/// Largest dimension to feed the OCR engine. Rendered pages at 300 DPI
/// stay under this; anything larger is downscaled first.
const MAX_INPUT_DIMENSION: u32 = 4096;

/// Noise level above which the median filter is applied. Clean renders
/// score 2-8, degraded photocopies 15-30.
const NOISE_THRESHOLD: f32 = 12.0;

/// RMS contrast below which adaptive binarization kicks in. Typical
/// printed transcripts score 50-100.
const LOW_CONTRAST: f32 = 30.0;

/// Adaptive threshold window radius and offset.
const THRESHOLD_RADIUS: u32 = 12;
const THRESHOLD_OFFSET: i32 = 10;

// ── Service traits ─────────────────────────────────────────

/// Prepares raw page-image bytes for OCR.
///
/// Pure image-to-image transform. Inserted between PDF page rendering
/// and character recognition.
pub trait ImagePreprocessor: Send + Sync {
    /// Input: raw image bytes (PNG, JPEG, TIFF).
    /// Output: preprocessed grayscale PNG bytes plus a quality report.
    fn preprocess(&self, image_bytes: &[u8]) -> Result<PreparedPage, ExtractionError>;
}

/// Assesses page quality without modifying it. Pure read-only analysis.
pub trait QualityAssessor: Send + Sync {
    fn assess(&self, image: &GrayImage) -> QualityReport;
}

/// Reduces noise on degraded inputs. No-op on clean pages.
pub trait NoiseReducer: Send + Sync {
    fn reduce_if_needed(&self, image: GrayImage, quality: &QualityReport) -> GrayImage;
}

// ── Result types ───────────────────────────────────────────

/// Quality assessment with numeric scores. Downstream consumers
/// threshold on the scores independently.
#[derive(Debug, Default, Clone)]
pub struct QualityReport {
    /// Page appears mostly blank (>95% near-white).
    pub is_blank: bool,
    /// Page appears mostly dark (>80% near-black).
    pub is_dark: bool,
    /// RMS contrast (0-127.5). Printed documents score 50-100.
    pub contrast_score: f32,
    /// Local-variance noise estimate. Clean renders score 2-8.
    pub noise_level: f32,
}

/// Result of preprocessing one page image.
#[derive(Debug)]
pub struct PreparedPage {
    /// Grayscale PNG bytes ready for the OCR engine.
    pub png_bytes: Vec<u8>,
    pub quality: QualityReport,
    pub width: u32,
    pub height: u32,
}

// ── OcrPreprocessor ────────────────────────────────────────

/// Composes the preprocessing services.
///
/// Flow: validate bytes, decode, grayscale, downscale guard, assess
/// quality, conditional denoise, conditional binarize, encode PNG.
pub struct OcrPreprocessor {
    quality: Box<dyn QualityAssessor>,
    noise_reducer: Box<dyn NoiseReducer>,
    binarize_low_contrast: bool,
}

impl OcrPreprocessor {
    pub fn new(quality: Box<dyn QualityAssessor>, noise_reducer: Box<dyn NoiseReducer>) -> Self {
        Self {
            quality,
            noise_reducer,
            binarize_low_contrast: true,
        }
    }

    /// Standard pipeline for rendered transcript pages.
    pub fn standard() -> Self {
        Self::new(
            Box::new(GrayQualityAssessor),
            Box::new(MedianNoiseReducer::default()),
        )
    }

    /// Disable adaptive binarization. Some engines binarize internally.
    pub fn without_binarization(mut self) -> Self {
        self.binarize_low_contrast = false;
        self
    }
}

impl ImagePreprocessor for OcrPreprocessor {
    fn preprocess(&self, image_bytes: &[u8]) -> Result<PreparedPage, ExtractionError> {
        validate_image_bytes(image_bytes)?;

        let img = image::load_from_memory(image_bytes).map_err(|e| {
            ExtractionError::ImageProcessing(format!("Failed to decode page image: {e}"))
        })?;
        let (orig_w, orig_h) = img.dimensions();

        let gray = img.to_luma8();
        let gray = match downscale_guard(&gray, MAX_INPUT_DIMENSION) {
            Cow::Borrowed(_) => gray,
            Cow::Owned(scaled) => scaled,
        };

        let report = self.quality.assess(&gray);
        let gray = self.noise_reducer.reduce_if_needed(gray, &report);

        let gray = if self.binarize_low_contrast
            && report.contrast_score < LOW_CONTRAST
            && !report.is_blank
            && !report.is_dark
        {
            debug!(
                contrast = report.contrast_score,
                "Low-contrast page, applying adaptive threshold"
            );
            adaptive_mean_threshold(&gray, THRESHOLD_RADIUS, THRESHOLD_OFFSET)
        } else {
            gray
        };

        let png_bytes = encode_gray_png(&gray)?;
        debug!(
            original = format!("{orig_w}x{orig_h}"),
            output = format!("{}x{}", gray.width(), gray.height()),
            blank = report.is_blank,
            noise = report.noise_level,
            "Page preprocessed for OCR"
        );

        Ok(PreparedPage {
            width: gray.width(),
            height: gray.height(),
            png_bytes,
            quality: report,
        })
    }
}

// ── Production services ────────────────────────────────────

/// Grayscale quality assessment: blank, dark, contrast, noise.
pub struct GrayQualityAssessor;

impl QualityAssessor for GrayQualityAssessor {
    fn assess(&self, image: &GrayImage) -> QualityReport {
        let mut report = QualityReport::default();
        let pixel_count = (image.width() as usize) * (image.height() as usize);
        if pixel_count == 0 {
            return report;
        }

        let white_pixels = image.pixels().filter(|p| p.0[0] > 240).count();
        report.is_blank = white_pixels as f32 / pixel_count as f32 > 0.95;

        let dark_pixels = image.pixels().filter(|p| p.0[0] < 15).count();
        report.is_dark = dark_pixels as f32 / pixel_count as f32 > 0.80;

        report.contrast_score = compute_contrast_score(image);
        report.noise_level = assess_noise_level(image);
        report
    }
}

/// Median filter applied only above the noise threshold. Clean pages
/// are left untouched.
pub struct MedianNoiseReducer {
    noise_threshold: f32,
}

impl Default for MedianNoiseReducer {
    fn default() -> Self {
        Self {
            noise_threshold: NOISE_THRESHOLD,
        }
    }
}

impl MedianNoiseReducer {
    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            noise_threshold: threshold,
        }
    }
}

impl NoiseReducer for MedianNoiseReducer {
    fn reduce_if_needed(&self, image: GrayImage, quality: &QualityReport) -> GrayImage {
        if quality.is_blank || quality.is_dark {
            return image;
        }
        if quality.noise_level < self.noise_threshold {
            return image;
        }
        debug!(
            noise = quality.noise_level,
            threshold = self.noise_threshold,
            "Degraded page, applying median filter"
        );
        median_filter_3x3(&image)
    }
}

/// No-op noise reducer for tests and engines that denoise internally.
pub struct NoOpNoiseReducer;

impl NoiseReducer for NoOpNoiseReducer {
    fn reduce_if_needed(&self, image: GrayImage, _quality: &QualityReport) -> GrayImage {
        image
    }
}

// ── Analysis helpers ───────────────────────────────────────

/// RMS contrast: standard deviation of grayscale intensities.
pub fn compute_contrast_score(img: &GrayImage) -> f32 {
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;
    for pixel in img.pixels() {
        let val = pixel.0[0] as f64;
        sum += val;
        sum_sq += val * val;
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    let mean = sum / count as f64;
    let variance = (sum_sq / count as f64) - (mean * mean);
    variance.max(0.0).sqrt() as f32
}

/// Noise estimate: median of the lowest quartile of 5x5 block variances.
/// Smooth regions carry the noise floor; text regions are ignored.
pub fn assess_noise_level(img: &GrayImage) -> f32 {
    let (w, h) = (img.width(), img.height());
    if w < 5 || h < 5 {
        return 0.0;
    }

    let block = 5u32;
    let mut variances = Vec::new();
    let mut y = 0;
    while y + block <= h {
        let mut x = 0;
        while x + block <= w {
            let mut sum = 0.0f64;
            let mut sum_sq = 0.0f64;
            let count = (block * block) as f64;
            for by in 0..block {
                for bx in 0..block {
                    let val = img.get_pixel(x + bx, y + by).0[0] as f64;
                    sum += val;
                    sum_sq += val * val;
                }
            }
            let mean = sum / count;
            variances.push(((sum_sq / count) - (mean * mean)).max(0.0) as f32);
            x += block;
        }
        y += block;
    }

    if variances.is_empty() {
        return 0.0;
    }
    variances.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let quartile_end = (variances.len() / 4).max(1);
    let smooth = &variances[..quartile_end];
    smooth[smooth.len() / 2].sqrt()
}

/// 3x3 median filter. Removes salt-and-pepper noise while keeping
/// stroke edges sharper than a box blur would.
pub fn median_filter_3x3(img: &GrayImage) -> GrayImage {
    let (w, h) = (img.width(), img.height());
    if w < 3 || h < 3 {
        return img.clone();
    }

    let mut out = img.clone();
    let mut window = [0u8; 9];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut i = 0;
            for dy in 0..3 {
                for dx in 0..3 {
                    window[i] = img.get_pixel(x + dx - 1, y + dy - 1).0[0];
                    i += 1;
                }
            }
            window.sort_unstable();
            out.put_pixel(x, y, Luma([window[4]]));
        }
    }
    out
}

/// Adaptive mean threshold: each pixel is compared against the mean of
/// its local window minus a fixed offset. Handles uneven illumination
/// that a global threshold cannot.
pub fn adaptive_mean_threshold(img: &GrayImage, radius: u32, offset: i32) -> GrayImage {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return img.clone();
    }
    let integral = integral_image(img);
    let mut out = GrayImage::new(w, h);

    for y in 0..h {
        for x in 0..w {
            let x0 = x.saturating_sub(radius);
            let y0 = y.saturating_sub(radius);
            let x1 = (x + radius).min(w - 1);
            let y1 = (y + radius).min(h - 1);
            let area = ((x1 - x0 + 1) * (y1 - y0 + 1)) as i64;
            let sum = window_sum(&integral, w as usize, x0, y0, x1, y1);
            let mean = (sum / area) as i32;
            let value = if (img.get_pixel(x, y).0[0] as i32) < mean - offset {
                0
            } else {
                255
            };
            out.put_pixel(x, y, Luma([value]));
        }
    }
    out
}

/// Summed-area table with a one-row, one-column zero border.
fn integral_image(img: &GrayImage) -> Vec<i64> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let stride = w + 1;
    let mut table = vec![0i64; stride * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0i64;
        for x in 0..w {
            row_sum += img.get_pixel(x as u32, y as u32).0[0] as i64;
            table[(y + 1) * stride + x + 1] = table[y * stride + x + 1] + row_sum;
        }
    }
    table
}

fn window_sum(table: &[i64], width: usize, x0: u32, y0: u32, x1: u32, y1: u32) -> i64 {
    let stride = width + 1;
    let (x0, y0, x1, y1) = (x0 as usize, y0 as usize, x1 as usize + 1, y1 as usize + 1);
    table[y1 * stride + x1] - table[y0 * stride + x1] - table[y1 * stride + x0]
        + table[y0 * stride + x0]
}

// ── Pure helpers ───────────────────────────────────────────

/// Validate image bytes before decoding.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), ExtractionError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(ExtractionError::ImageProcessing(
            "Image data too small to be valid".into(),
        ));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ExtractionError::ImageProcessing(format!(
            "Image data exceeds {}MB limit",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Downscale images whose largest edge exceeds `max_dim`. Borrows when
/// no work is needed.
fn downscale_guard(img: &GrayImage, max_dim: u32) -> Cow<'_, GrayImage> {
    let (w, h) = (img.width(), img.height());
    let largest = w.max(h);
    if largest <= max_dim {
        return Cow::Borrowed(img);
    }
    let scale = max_dim as f32 / largest as f32;
    let new_w = ((w as f32 * scale).round() as u32).max(1);
    let new_h = ((h as f32 * scale).round() as u32).max(1);
    debug!(
        from = format!("{w}x{h}"),
        to = format!("{new_w}x{new_h}"),
        "Downscaling oversized page image"
    );
    Cow::Owned(image::imageops::resize(
        img,
        new_w,
        new_h,
        image::imageops::FilterType::Triangle,
    ))
}

/// Encode a grayscale image as PNG bytes.
pub fn encode_gray_png(img: &GrayImage) -> Result<Vec<u8>, ExtractionError> {
    let dynamic = DynamicImage::ImageLuma8(img.clone());
    let mut cursor = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

// ── Mocks ──────────────────────────────────────────────────

/// Mock preprocessor returning the input bytes unchanged.
pub struct MockImagePreprocessor {
    fail: bool,
}

impl MockImagePreprocessor {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl ImagePreprocessor for MockImagePreprocessor {
    fn preprocess(&self, image_bytes: &[u8]) -> Result<PreparedPage, ExtractionError> {
        if self.fail {
            return Err(ExtractionError::ImageProcessing(
                "Mock preprocessing failure".into(),
            ));
        }
        Ok(PreparedPage {
            png_bytes: image_bytes.to_vec(),
            quality: QualityReport::default(),
            width: 1,
            height: 1,
        })
    }
}
