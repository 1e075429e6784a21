//! Tesseract OCR backend
//!
//! Runs Tesseract through `leptess` in sparse-text mode and reads the TSV
//! word table so every word comes with a confidence score.
//!
//! Only available with the `ocr` feature, which needs the Tesseract and
//! Leptonica system libraries.

use image::{GrayImage, ImageFormat};
use leptess::{LepTess, Variable};
use std::io::Cursor;
use tracing::{debug, info};

use super::ocr::{parse_tsv, Candidate, TextExtractor};
use crate::config::OcrSettings;
use crate::error::{Result, ScanError};

/// Tesseract-backed [`TextExtractor`]
pub struct TesseractExtractor {
    engine: LepTess,
}

impl TesseractExtractor {
    /// Initialize Tesseract with the configured language and segmentation mode
    pub fn new(settings: &OcrSettings) -> Result<Self> {
        info!(
            "Initializing Tesseract (language={}, psm={})",
            settings.language, settings.page_segmentation_mode
        );

        let data_path = settings
            .data_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());

        let mut engine = LepTess::new(data_path.as_deref(), &settings.language).map_err(|e| {
            ScanError::Ocr(format!(
                "failed to initialize Tesseract for {:?}: {}. Is Tesseract installed?",
                settings.language, e
            ))
        })?;

        engine
            .set_variable(
                Variable::TesseditPagesegMode,
                &settings.page_segmentation_mode.to_string(),
            )
            .map_err(|e| ScanError::Ocr(format!("failed to set page segmentation mode: {}", e)))?;

        info!("Tesseract initialized successfully");
        Ok(Self { engine })
    }
}

impl TextExtractor for TesseractExtractor {
    fn extract(&mut self, image: &GrayImage) -> Result<Vec<Candidate>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(vec![]);
        }

        // leptess loads images from encoded bytes
        let mut encoded = Vec::new();
        image.write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)?;

        self.engine
            .set_image_from_mem(&encoded)
            .map_err(|e| ScanError::Ocr(format!("failed to load image into Tesseract: {}", e)))?;

        let tsv = self
            .engine
            .get_tsv_text(0)
            .map_err(|e| ScanError::Ocr(format!("failed to read TSV output: {}", e)))?;

        let candidates = parse_tsv(&tsv)?;
        debug!("Tesseract: {} words in {}x{} image", candidates.len(), width, height);
        Ok(candidates)
    }
}
