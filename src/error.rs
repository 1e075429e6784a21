//! Error types for the scanning pipeline

use thiserror::Error;

/// Errors raised by pipeline collaborators.
///
/// Lookup failures are deliberately absent: they are recorded on the
/// [`SerialRecord`](crate::lookup::SerialRecord) as `Failed` instead of being
/// propagated.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("frame capture failed: {0}")]
    Capture(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ScanError>;
