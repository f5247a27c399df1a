// SPDX-License-Identifier: AGPL-3.0
// Hop Transfer Core - Type definitions

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// Smallest number of words in a generated code phrase
pub const MIN_COMPONENT_LENGTH: u8 = 2;
/// Largest number of words in a generated code phrase
pub const MAX_COMPONENT_LENGTH: u8 = 9;

/// Application settings (frontend-agnostic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// Directory received files are written into
    pub download_dir: PathBuf,
    /// Replace existing files instead of picking a free name
    pub overwrite_existing: bool,
    /// Ask the transfer client to have both sides verify the content hash
    pub verify: bool,
    /// Number of words in generated code phrases
    pub passphrase_component_length: u8,
    /// Application ID override for the rendezvous server
    pub app_id: Option<String>,
    /// Rendezvous server override
    pub rendezvous_url: Option<String>,
    /// Transit relay override
    pub transit_relay_address: Option<String>,
}

/// The user's Downloads folder, or the current directory when it can't be found
pub fn default_download_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|d| d.download_dir().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            overwrite_existing: false,
            verify: false,
            passphrase_component_length: MIN_COMPONENT_LENGTH,
            app_id: None,
            rendezvous_url: None,
            transit_relay_address: None,
        }
    }
}

impl AppSettings {
    /// Check that all values are in range
    pub fn validate(&self) -> Result<(), TransferError> {
        let length = self.passphrase_component_length;
        if !(MIN_COMPONENT_LENGTH..=MAX_COMPONENT_LENGTH).contains(&length) {
            return Err(TransferError::InvalidConfig(format!(
                "passphrase component length must be between {} and {}, got {}",
                MIN_COMPONENT_LENGTH, MAX_COMPONENT_LENGTH, length
            )));
        }
        Ok(())
    }

    /// Change the download directory. The path must be an existing directory.
    pub fn set_download_dir(&mut self, path: &Path) -> Result<(), TransferError> {
        let path = crate::path::resolve(path)?;
        let metadata = std::fs::metadata(&path).map_err(TransferError::fs(&path))?;
        if !metadata.is_dir() {
            return Err(TransferError::InvalidConfig(format!(
                "{} is not a directory",
                path.display()
            )));
        }

        tracing::info!("Download directory set to {}", path.display());
        self.download_dir = path;
        Ok(())
    }

    /// Build the options handed to the transfer client for one send
    pub fn to_send_options(&self, code: Option<String>) -> SendOptions {
        SendOptions {
            code,
            passphrase_component_length: self.passphrase_component_length,
            verify: self.verify,
            app_id: self.app_id.clone(),
            rendezvous_url: self.rendezvous_url.clone(),
            transit_relay_address: self.transit_relay_address.clone(),
        }
    }
}

/// Per-send options for the transfer client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Use this code instead of letting the client generate one
    pub code: Option<String>,
    pub passphrase_component_length: u8,
    pub verify: bool,
    pub app_id: Option<String>,
    pub rendezvous_url: Option<String>,
    pub transit_relay_address: Option<String>,
}

/// Error types for transfer preparation and sending
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Path escapes the transfer root: {0}")]
    PathEscape(String),

    #[error("Duplicate entry in transfer set: {0}")]
    DuplicateEntry(String),

    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transfer failed: {0}")]
    Transport(String),

    #[error("Transfer cancelled")]
    Cancelled,
}

impl TransferError {
    /// Wrap an I/O error with the path it happened on, for use with `map_err`
    pub fn fs(path: impl AsRef<Path>) -> impl FnOnce(io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        move |source| TransferError::Filesystem { path, source }
    }

    /// True when a selection tried to reach outside its root.
    /// Callers should refuse to proceed rather than retry.
    pub fn is_path_escape(&self) -> bool {
        matches!(self, TransferError::PathEscape(_))
    }
}

impl From<walkdir::Error> for TransferError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(Path::to_path_buf).unwrap_or_default();
        let source = err
            .into_io_error()
            .unwrap_or_else(|| io::Error::other("filesystem loop detected"));
        TransferError::Filesystem { path, source }
    }
}
