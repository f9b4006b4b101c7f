pub mod types;
pub mod quality;
pub mod sanitize;
pub mod analyzer;
pub mod pdfium;
pub mod strategies;
pub mod preprocess;
pub mod ocr;
pub mod orchestrator;

pub use types::*;
pub use quality::*;
pub use sanitize::*;
pub use analyzer::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF is password-protected")]
    PdfEncrypted,

    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Text encoding error: {0}")]
    EncodingError(String),

    #[error("Document contains no pages")]
    EmptyDocument,

    #[error("OCR engine '{0}' is not available")]
    EngineUnavailable(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Strategy '{strategy}' timed out after {millis}ms")]
    Timeout { strategy: String, millis: u64 },

    #[error("Unsupported format for extraction")]
    UnsupportedFormat,
}
