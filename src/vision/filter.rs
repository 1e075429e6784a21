//! Candidate filter
//!
//! Deterministic rules that separate plausible serial numbers from OCR noise.

use tracing::trace;

use super::ocr::Candidate;
use crate::config::FilterSettings;

/// Why a candidate was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Confidence not strictly above the minimum
    LowConfidence,
    /// Shorter than the minimum length
    TooShort,
    /// Contains something other than A-Z and 0-9
    BadCharacters,
    /// Contains a blacklisted substring
    Blacklisted,
}

/// Confidence, length, charset and blacklist rules
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    min_confidence: i32,
    min_length: usize,
    blacklist: Vec<String>,
}

impl Default for CandidateFilter {
    fn default() -> Self {
        Self::from_settings(&FilterSettings::default())
    }
}

impl CandidateFilter {
    /// Build a filter from configuration
    pub fn from_settings(settings: &FilterSettings) -> Self {
        Self {
            min_confidence: settings.min_confidence,
            min_length: settings.min_length,
            blacklist: settings
                .blacklist
                .iter()
                .filter(|entry| !entry.is_empty())
                .cloned()
                .collect(),
        }
    }

    /// Check a candidate against every rule, reporting the first failure
    pub fn check(&self, candidate: &Candidate) -> Result<(), Rejection> {
        let text = candidate.text.as_str();

        if candidate.confidence <= self.min_confidence {
            return Err(Rejection::LowConfidence);
        }
        if text.chars().count() < self.min_length {
            return Err(Rejection::TooShort);
        }
        if !text
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(Rejection::BadCharacters);
        }
        if self.blacklist.iter().any(|entry| text.contains(entry.as_str())) {
            return Err(Rejection::Blacklisted);
        }
        Ok(())
    }

    /// Whether the candidate looks like a serial number
    pub fn is_valid(&self, candidate: &Candidate) -> bool {
        match self.check(candidate) {
            Ok(()) => true,
            Err(reason) => {
                trace!("Rejected {:?} ({}): {:?}", candidate.text, candidate.confidence, reason);
                false
            }
        }
    }
}
