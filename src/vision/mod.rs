//! Vision/OCR Layer
//!
//! Turns captured frames into validated serial-number candidates:
//! - `preprocess`: grayscale, deskew, binarize, rotate
//! - `ocr`: recognizer seam and Tesseract TSV parsing
//! - `tesseract`: Tesseract backend (feature `ocr`)
//! - `filter`: confidence/length/charset/blacklist rules

pub mod filter;
pub mod ocr;
pub mod preprocess;
#[cfg(feature = "ocr")]
pub mod tesseract;

pub use filter::{CandidateFilter, Rejection};
pub use ocr::{parse_tsv, Candidate, TextExtractor};
pub use preprocess::{ImagePreprocessor, PreprocessedImage};
#[cfg(feature = "ocr")]
pub use tesseract::TesseractExtractor;
