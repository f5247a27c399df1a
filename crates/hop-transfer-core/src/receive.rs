// SPDX-License-Identifier: AGPL-3.0
// Hop Transfer Core - Receive side
//
// Writes received entries below a destination directory. Relative paths
// come from the peer and are untrusted: they go through the same
// containment check used when sending.

use crate::entry::FileMode;
use crate::path::normalize_relative;
use crate::types::TransferError;
use chrono::{DateTime, TimeZone};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Candidates tried before giving up on finding a free file name
const MAX_NAME_CANDIDATES: usize = 1000;

/// Where a received entry lands below `dest_root`
pub fn destination_path(dest_root: &Path, relative: &str) -> Result<PathBuf, TransferError> {
    let parts = normalize_relative(relative).inspect_err(|_| {
        tracing::warn!("Refusing received entry outside destination: {:?}", relative);
    })?;

    let mut path = dest_root.to_path_buf();
    path.extend(parts);
    Ok(path)
}

fn split_file_name(name: &str) -> (&str, &str) {
    if let Some((stem, ext)) = name.rsplit_once('.') {
        if !stem.is_empty() {
            return (stem, ext);
        }
    }
    (name, "")
}

fn open_unique_file(path: &Path) -> Result<(PathBuf, File), io::Error> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let base_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "file name is not valid UTF-8"))?;
    let (stem, ext) = split_file_name(base_name);

    for index in 0..MAX_NAME_CANDIDATES {
        let candidate = if index == 0 {
            base_name.to_string()
        } else if ext.is_empty() {
            format!("{} ({})", stem, index)
        } else {
            format!("{} ({}).{}", stem, index, ext)
        };

        let candidate = dir.join(&candidate);
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        ErrorKind::AlreadyExists,
        "Too many filename conflicts",
    ))
}

/// Create the file for a received entry, including missing parent
/// directories. Without `overwrite`, an existing file is kept and the
/// entry is written to `name (1).ext`, `name (2).ext`, ...
pub fn create_destination(
    dest_root: &Path,
    relative: &str,
    overwrite: bool,
) -> Result<(PathBuf, File), TransferError> {
    let path = destination_path(dest_root, relative)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(TransferError::fs(parent))?;
    }

    if overwrite {
        let file = File::create(&path).map_err(TransferError::fs(&path))?;
        return Ok((path, file));
    }
    open_unique_file(&path).map_err(TransferError::fs(&path))
}

/// Restore permission bits on a received file
#[cfg(unix)]
pub fn apply_mode(path: &Path, mode: FileMode) -> Result<(), TransferError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode.permissions()))
        .map_err(TransferError::fs(path))
}

/// Restore the read-only flag on a received file
#[cfg(not(unix))]
pub fn apply_mode(path: &Path, mode: FileMode) -> Result<(), TransferError> {
    let mut permissions = fs::metadata(path).map_err(TransferError::fs(path))?.permissions();
    permissions.set_readonly(mode.is_readonly());
    fs::set_permissions(path, permissions).map_err(TransferError::fs(path))
}

/// Write one received entry and restore its mode. Returns where it landed.
pub fn write_entry(
    dest_root: &Path,
    relative: &str,
    mode: FileMode,
    reader: &mut dyn Read,
    overwrite: bool,
) -> Result<PathBuf, TransferError> {
    let (path, mut file) = create_destination(dest_root, relative, overwrite)?;

    let written = io::copy(reader, &mut file).map_err(TransferError::fs(&path))?;
    file.flush().map_err(TransferError::fs(&path))?;
    drop(file);

    apply_mode(&path, mode)?;
    tracing::info!("File received: {} ({} bytes)", path.display(), written);
    Ok(path)
}

/// File name offered when saving a received text snippet
pub fn text_file_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("received-{}.txt", now.format("%Y-%m-%dT%H:%M"))
}
