// SPDX-License-Identifier: AGPL-3.0
// Hop Transfer Core - Path resolution and containment
//
// Relative paths are derived by byte offset rather than by trimming a prefix
// string, so a root written with `/` still matches entries discovered with
// `\` on platforms that accept both. Every containment decision goes through
// `PathResolver::relative` and `normalize_relative`.

use crate::types::TransferError;
use std::path::{Component, Path, PathBuf};

/// Make `path` absolute and remove `.`, `..` and repeated separators
/// without touching the filesystem.
pub fn resolve(path: &Path) -> Result<PathBuf, TransferError> {
    let absolute = std::path::absolute(path).map_err(TransferError::fs(path))?;

    let mut clean = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => clean.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            Component::Normal(part) => clean.push(part),
        }
    }

    Ok(clean)
}

/// Borrow a path as UTF-8. Relative paths travel as strings.
pub fn path_str(path: &Path) -> Result<&str, TransferError> {
    path.to_str()
        .ok_or_else(|| TransferError::NonUtf8Path(path.to_path_buf()))
}

/// Split immediately after the final host separator.
/// `"/home/user/dir"` becomes `("/home/user/", "dir")`.
pub fn split(path: &str) -> (&str, &str) {
    match path.rfind(std::path::is_separator) {
        Some(index) => path.split_at(index + 1),
        None => ("", path),
    }
}

fn is_host_separator(byte: u8) -> bool {
    byte.is_ascii() && std::path::is_separator(byte as char)
}

// Receivers may run on any platform, so both characters count on the wire.
fn is_wire_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

// `C:`, `C:name` and NTFS stream names all replace or redirect the path
// they are pushed onto on Windows.
fn has_volume_marker(part: &str) -> bool {
    part.contains(':')
}

/// Byte-wise prefix match of `root` against `path` where any two separator
/// bytes compare equal. `path` must be `root` itself or continue with a
/// separator.
fn starts_with_root(root: &[u8], path: &[u8], is_separator: impl Fn(u8) -> bool) -> bool {
    if path.len() < root.len() {
        return false;
    }

    let head_matches = root
        .iter()
        .zip(path)
        .all(|(a, b)| a == b || (is_separator(*a) && is_separator(*b)));

    head_matches
        && match path.get(root.len()) {
            None => true,
            Some(&next) => is_separator(next),
        }
}

/// Validate a relative wire path and return its normalized components.
///
/// Rejects empty paths, absolute paths, components carrying a drive or
/// stream marker (`:`), and any `..` that climbs to or above the starting
/// directory. The result always names a strict descendant of whatever
/// directory it is later joined onto.
pub fn normalize_relative(relative: &str) -> Result<Vec<&str>, TransferError> {
    let escape = || TransferError::PathEscape(relative.to_string());

    if relative.is_empty() || relative.starts_with(is_wire_separator) {
        return Err(escape());
    }

    let mut parts = Vec::new();
    for part in relative.split(is_wire_separator) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop().ok_or_else(escape)?;
            }
            _ if has_volume_marker(part) => return Err(escape()),
            _ => parts.push(part),
        }
    }

    if parts.is_empty() {
        return Err(escape());
    }
    Ok(parts)
}

/// Check that `root + separator + relative` stays below `root`.
pub fn check_relative(relative: &str) -> Result<(), TransferError> {
    normalize_relative(relative).map(|_| ())
}

/// Computes where relative paths begin for one transfer set.
///
/// The prefix is the root's parent directory including its trailing
/// separator, so relative paths keep the root's own name as their first
/// component: sending `/home/user/photos` yields `photos/a.jpg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    root: String,
    prefix_len: usize,
}

impl PathResolver {
    pub fn new(root: &Path) -> Result<Self, TransferError> {
        let resolved = resolve(root)?;
        let root = path_str(&resolved)?.to_string();

        let (parent, base) = split(&root);
        if base.is_empty() {
            return Err(TransferError::InvalidSelection(format!(
                "{} has no name to send it under",
                root
            )));
        }

        let prefix_len = parent.len();
        tracing::debug!("Resolved transfer root {} (prefix length {})", root, prefix_len);

        Ok(Self { root, prefix_len })
    }

    /// The resolved, absolute root
    pub fn root(&self) -> &Path {
        Path::new(&self.root)
    }

    /// Byte offset where relative paths begin
    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }

    /// Base name of the root, presented to the peer as the transfer name
    pub fn name(&self) -> &str {
        &self.root[self.prefix_len..]
    }

    /// True when `path` is the root or lies below it. Separator characters
    /// compare equal to each other.
    pub fn contains(&self, path: &str) -> bool {
        starts_with_root(self.root.as_bytes(), path.as_bytes(), is_host_separator)
    }

    /// Strip the prefix from a resolved path, refusing anything outside the root.
    pub fn relative<'a>(&self, path: &'a str) -> Result<&'a str, TransferError> {
        if !self.contains(path) {
            return Err(TransferError::PathEscape(path.to_string()));
        }

        let relative = path
            .get(self.prefix_len..)
            .ok_or_else(|| TransferError::PathEscape(path.to_string()))?;
        check_relative(relative)?;

        Ok(relative)
    }
}
