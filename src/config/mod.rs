//! Application Configuration
//!
//! Scanner settings stored in TOML format. Every section falls back to its
//! defaults, so a config file only needs the keys it overrides.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::shared::{clamp_threshold, Rotation};

/// Environment variable that overrides `lookup.api_key`
pub const API_KEY_ENV: &str = "SERIAL_SCANNER_API_KEY";

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Frame source settings
    pub capture: CaptureSettings,
    /// Image preprocessing settings
    pub preprocess: PreprocessSettings,
    /// Text extraction settings
    pub ocr: OcrSettings,
    /// Candidate filter rules
    pub filter: FilterSettings,
    /// Enrichment service settings
    pub lookup: LookupSettings,
}

impl AppConfig {
    /// Apply overrides taken from the process environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.lookup.api_key = key.trim().to_string();
            }
        }
    }
}

/// Frame source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Image file or directory of images to replay as the camera feed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Capture width in pixels (0 keeps the source size)
    pub width: u32,
    /// Capture height in pixels (0 keeps the source size)
    pub height: u32,
    /// Tick rate of the scan loop
    pub fps: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            source: None,
            width: 1920,
            height: 1080,
            fps: 30,
        }
    }
}

/// Image preprocessing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    /// Initial binarization threshold, clamped into 0-255 on load
    #[serde(deserialize_with = "deserialize_threshold")]
    pub threshold: u8,
    /// Amount the threshold moves per operator nudge
    pub threshold_step: i32,
    /// Initial fixed rotation
    pub rotation: Rotation,
    /// Estimate and correct skew before binarization
    pub deskew: bool,
}

fn deserialize_threshold<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    i64::deserialize(deserializer).map(clamp_threshold)
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            threshold: 180,
            threshold_step: 5,
            rotation: Rotation::None,
            deskew: true,
        }
    }
}

/// Text extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Tesseract language code
    pub language: String,
    /// Tesseract page segmentation mode (11 = sparse text)
    pub page_segmentation_mode: u32,
    /// Directory holding the traineddata files (system default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            page_segmentation_mode: 11,
            data_path: None,
        }
    }
}

/// Candidate filter rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Candidates must score strictly above this confidence
    pub min_confidence: i32,
    /// Minimum serial length in characters
    pub min_length: usize,
    /// Known OCR artifacts; a candidate containing any of these is dropped
    pub blacklist: Vec<String>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            min_confidence: 40,
            min_length: 8,
            blacklist: vec!["BCGA".to_string()],
        }
    }
}

/// Enrichment service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupSettings {
    /// Service endpoint
    pub endpoint: String,
    /// Service code sent with every request
    pub service: u32,
    /// API credential
    pub api_key: String,
    /// User-Agent header value
    pub user_agent: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://sickw.com/api.php".to_string(),
            service: 26,
            api_key: String::new(),
            user_agent: concat!("serial-scanner/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 60,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
