//! OCR (Optical Character Recognition) module
//!
//! Defines the recognizer seam used by the pipeline and the parser for
//! Tesseract's TSV word table, which carries per-word confidence.

use image::GrayImage;

use crate::error::{Result, ScanError};

/// Tesseract TSV level for individual words
const WORD_LEVEL: u32 = 5;
/// Number of columns in a TSV row (`level` .. `text`)
const TSV_COLUMNS: usize = 12;

/// Single OCR token with its recognizer confidence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Recognized text
    pub text: String,
    /// Engine confidence (Tesseract: 0-100, -1 when unknown)
    pub confidence: i32,
}

impl Candidate {
    /// Create a new candidate
    pub fn new(text: impl Into<String>, confidence: i32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Text recognizer run once per tick over the preprocessed image.
///
/// Candidates are returned in detection order. Confidence is a recognizer
/// heuristic; callers only compare it against the filter threshold.
pub trait TextExtractor {
    /// Extract candidate tokens from a binarized image
    fn extract(&mut self, image: &GrayImage) -> Result<Vec<Candidate>>;
}

/// Parse Tesseract's TSV output into word candidates.
///
/// Only word-level rows with non-empty text are kept. The header row and
/// rows with the wrong column count are skipped; a malformed numeric field is
/// an error.
pub fn parse_tsv(tsv: &str) -> Result<Vec<Candidate>> {
    let mut candidates = Vec::new();

    for (index, line) in tsv.lines().enumerate() {
        if line.is_empty() || line.starts_with("level") {
            continue;
        }

        let columns: Vec<&str> = line.splitn(TSV_COLUMNS, '\t').collect();
        if columns.len() < TSV_COLUMNS {
            continue;
        }

        let level: u32 = columns[0].trim().parse().map_err(|_| {
            ScanError::Ocr(format!("bad level {:?} on TSV line {}", columns[0], index + 1))
        })?;
        if level != WORD_LEVEL {
            continue;
        }

        let text = columns[11].trim();
        if text.is_empty() {
            continue;
        }

        let confidence: f32 = columns[10].trim().parse().map_err(|_| {
            ScanError::Ocr(format!(
                "bad confidence {:?} on TSV line {}",
                columns[10],
                index + 1
            ))
        })?;

        candidates.push(Candidate::new(text, confidence.trunc() as i32));
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn test_parse_words_in_detection_order() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t\n\
             4\t1\t1\t1\t1\t0\t10\t10\t200\t30\t-1\t\n\
             5\t1\t1\t1\t1\t1\t10\t10\t90\t30\t91.5\tSERIAL\n\
             5\t1\t1\t1\t1\t2\t110\t10\t100\t30\t35\tC02XK0ABJGH5\n"
        );

        let candidates = parse_tsv(&tsv).unwrap();
        assert_eq!(
            candidates,
            vec![Candidate::new("SERIAL", 91), Candidate::new("C02XK0ABJGH5", 35)]
        );
    }

    #[test]
    fn test_parse_skips_empty_words() {
        let tsv = format!("{HEADER}\n5\t1\t1\t1\t1\t1\t0\t0\t5\t5\t95\t \n");
        assert!(parse_tsv(&tsv).unwrap().is_empty());
    }

    #[test]
    fn test_parse_truncates_confidence() {
        let tsv = "5\t1\t1\t1\t1\t1\t0\t0\t5\t5\t40.9\tABCDEFGH\n";
        assert_eq!(parse_tsv(tsv).unwrap()[0].confidence, 40);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_tsv("").unwrap().is_empty());
        assert!(parse_tsv(HEADER).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_confidence() {
        let tsv = "5\t1\t1\t1\t1\t1\t0\t0\t5\t5\thigh\tABCDEFGH\n";
        assert!(matches!(parse_tsv(tsv), Err(ScanError::Ocr(_))));
    }
}
