//! Storage Layer
//!
//! Session history and the on-disk locations for exports and saved images.

pub mod history;

pub use history::SerialHistory;

use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, ScanError};

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "serialscanner", "SerialScanner")
        .ok_or_else(|| ScanError::Config("Could not determine project directories".to_string()))
}

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = project_dirs()?.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    Ok(data_dir)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Export the session history as pretty JSON
pub fn save_history(history: &SerialHistory, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = serde_json::to_string_pretty(history)?;
    std::fs::write(path, content)?;
    info!("Saved {} records to {:?}", history.len(), path);
    Ok(())
}

/// Load a previously exported history
pub fn load_history(path: &Path) -> Result<SerialHistory> {
    let content = std::fs::read_to_string(path)?;
    let history: SerialHistory = serde_json::from_str(&content)?;
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{LookupStatus, SerialRecord};
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_history() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exports").join("history.json");

        let mut history = SerialHistory::new();
        history.append_if_absent(SerialRecord {
            status: LookupStatus::Success,
            name: "MacBook Pro".to_string(),
            year: 2018,
            ..SerialRecord::pending("C02XK0ABJGH5")
        });
        history.append_if_absent(SerialRecord::failed("ABCDEFGH"));

        save_history(&history, &path).unwrap();
        let loaded = load_history(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.success_count(), 1);
        assert_eq!(loaded.get("C02XK0ABJGH5").unwrap().year, 2018);
        assert_eq!(loaded.find("ABCDEFGH"), Some(("", LookupStatus::Failed)));
    }

    #[test]
    fn test_load_history_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load_history(&path), Err(ScanError::Json(_))));
    }

    #[test]
    fn test_load_history_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_history(&dir.path().join("missing.json")),
            Err(ScanError::Io(_))
        ));
    }
}
