// SPDX-License-Identifier: AGPL-3.0
// Hop Transfer Core - Transfer entries and sets
//
// Entries carry only metadata until the transfer client asks for their
// bytes; opening is deferred so descriptor usage does not grow with the
// size of the selection.

use crate::types::TransferError;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File type and permission bits captured at enumeration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FileMode(u32);

impl FileMode {
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[cfg(unix)]
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        use std::os::unix::fs::PermissionsExt;
        Self(metadata.permissions().mode())
    }

    #[cfg(not(unix))]
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        if metadata.permissions().readonly() {
            Self(0o444)
        } else {
            Self(0o644)
        }
    }

    /// Raw mode bits, including the file type on Unix
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Permission bits only (setuid/setgid/sticky and rwx)
    pub fn permissions(self) -> u32 {
        self.0 & 0o7777
    }

    /// True when no write bit is set
    pub fn is_readonly(self) -> bool {
        self.0 & 0o222 == 0
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o}", self.permissions())
    }
}

/// A deferred source of bytes for one entry.
///
/// `open` is called by the transfer client at the moment the entry is sent,
/// once per send attempt. Implementations must not retry on their own.
pub trait OpenContent: Send + Sync {
    fn open(&self) -> Result<Box<dyn Read + Send>, TransferError>;
}

/// Reopens a file from disk on demand
#[derive(Debug, Clone)]
pub struct FileContent {
    path: PathBuf,
}

impl FileContent {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OpenContent for FileContent {
    fn open(&self) -> Result<Box<dyn Read + Send>, TransferError> {
        let file = fs::File::open(&self.path).map_err(TransferError::fs(&self.path))?;
        Ok(Box::new(file))
    }
}

/// One file to be sent
#[derive(Clone)]
pub struct TransferEntry {
    relative_path: String,
    mode: FileMode,
    content: Arc<dyn OpenContent>,
}

impl TransferEntry {
    pub fn new(
        relative_path: impl Into<String>,
        mode: FileMode,
        content: Arc<dyn OpenContent>,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            mode,
            content,
        }
    }

    pub(crate) fn from_file(relative_path: &str, metadata: &fs::Metadata, path: &Path) -> Self {
        Self::new(
            relative_path,
            FileMode::from_metadata(metadata),
            Arc::new(FileContent::new(path)),
        )
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// Open the entry's bytes. Only call this when they are about to be sent.
    pub fn open(&self) -> Result<Box<dyn Read + Send>, TransferError> {
        self.content.open()
    }
}

impl fmt::Debug for TransferEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferEntry")
            .field("relative_path", &self.relative_path)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Ordered entries plus the name presented to the peer
#[derive(Debug, Clone, Default)]
pub struct TransferSet {
    name: String,
    entries: Vec<TransferEntry>,
    seen: HashSet<String>,
}

/// Serializable view of a transfer set, without content handles
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSetSummary {
    pub name: String,
    pub entries: Vec<EntrySummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySummary {
    pub path: String,
    pub mode: FileMode,
}

impl TransferSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TransferEntry] {
        &self.entries
    }

    /// Append an entry. Relative paths must be unique within the set.
    pub fn push(&mut self, entry: TransferEntry) -> Result<(), TransferError> {
        if !self.seen.insert(entry.relative_path.clone()) {
            return Err(TransferError::DuplicateEntry(entry.relative_path));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn into_parts(self) -> (String, Vec<TransferEntry>) {
        (self.name, self.entries)
    }

    pub fn summary(&self) -> TransferSetSummary {
        TransferSetSummary {
            name: self.name.clone(),
            entries: self
                .entries
                .iter()
                .map(|e| EntrySummary {
                    path: e.relative_path.clone(),
                    mode: e.mode,
                })
                .collect(),
        }
    }
}

impl IntoIterator for TransferSet {
    type Item = TransferEntry;
    type IntoIter = std::vec::IntoIter<TransferEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
