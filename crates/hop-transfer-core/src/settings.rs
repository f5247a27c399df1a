// SPDX-License-Identifier: AGPL-3.0
// Hop Transfer Core - Settings loading
//
// Settings are read from a local JSON file. Writing them back is left to
// the frontend.

use crate::types::{AppSettings, TransferError};
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the settings file
pub fn default_settings_path() -> Result<PathBuf, TransferError> {
    let config_dir = directories::ProjectDirs::from("org", "hop", "transfer")
        .ok_or_else(|| {
            TransferError::InvalidConfig("Could not determine config directory".to_string())
        })?
        .config_dir()
        .to_path_buf();

    Ok(config_dir.join("settings.json"))
}

/// Load settings from `path`, falling back to defaults when the file is
/// missing or can't be parsed.
pub fn load_settings(path: &Path) -> Result<AppSettings, TransferError> {
    tracing::info!("Settings file path: {:?}", path);

    let settings = if path.exists() {
        tracing::info!("Loading settings from disk");
        let content = fs::read_to_string(path).map_err(TransferError::fs(path))?;

        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse settings, using defaults: {}", e);
            AppSettings::default()
        })
    } else {
        tracing::info!("No settings file found, using defaults");
        AppSettings::default()
    };

    settings.validate()?;
    Ok(settings)
}

/// Serialize settings the way `load_settings` reads them
pub fn settings_to_json(settings: &AppSettings) -> Result<String, TransferError> {
    serde_json::to_string_pretty(settings)
        .map_err(|e| TransferError::Serialization(format!("Failed to serialize settings: {}", e)))
}
