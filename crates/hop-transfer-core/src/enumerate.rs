// SPDX-License-Identifier: AGPL-3.0
// Hop Transfer Core - Selection enumeration
//
// Turns a user's selection into a transfer set. Only metadata is read here;
// file contents are opened later by the transfer client.

use crate::entry::{TransferEntry, TransferSet};
use crate::path::{path_str, resolve, PathResolver};
use crate::types::TransferError;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What the user picked to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    File(PathBuf),
    Directory(PathBuf),
    /// Several files and directories sharing one parent directory
    Items(Vec<PathBuf>),
}

impl Selection {
    /// Classify picked paths. A single path is stat'ed to tell files from
    /// directories; several paths always form an item list.
    pub fn from_paths(mut paths: Vec<PathBuf>) -> Result<Self, TransferError> {
        match paths.len() {
            0 => Err(TransferError::InvalidSelection(
                "nothing selected".to_string(),
            )),
            1 => {
                let path = paths.remove(0);
                let metadata = fs::metadata(&path).map_err(TransferError::fs(&path))?;
                if metadata.is_dir() {
                    Ok(Selection::Directory(path))
                } else {
                    Ok(Selection::File(path))
                }
            }
            _ => Ok(Selection::Items(paths)),
        }
    }

    pub fn enumerate(&self) -> Result<TransferSet, TransferError> {
        match self {
            Selection::File(path) => enumerate_file(path),
            Selection::Directory(path) => enumerate_directory(path),
            Selection::Items(paths) => enumerate_items(paths),
        }
    }
}

/// A set holding exactly one entry named after the file.
pub fn enumerate_file(path: &Path) -> Result<TransferSet, TransferError> {
    let resolver = PathResolver::new(path)?;
    let root = resolver.root();

    let metadata = fs::metadata(root).map_err(TransferError::fs(root))?;
    if !metadata.is_file() {
        return Err(TransferError::InvalidSelection(format!(
            "{} is not a regular file",
            root.display()
        )));
    }

    let mut set = TransferSet::new(resolver.name());
    let relative = resolver.relative(path_str(root)?)?;
    set.push(TransferEntry::from_file(relative, &metadata, root))?;

    tracing::info!("Prepared file {} for sending", set.name());
    Ok(set)
}

/// Every regular file below `path`, in walk order.
pub fn enumerate_directory(path: &Path) -> Result<TransferSet, TransferError> {
    let resolver = PathResolver::new(path)?;
    let root = resolver.root();

    let metadata = fs::metadata(root).map_err(TransferError::fs(root))?;
    if !metadata.is_dir() {
        return Err(TransferError::InvalidSelection(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut set = TransferSet::new(resolver.name());
    walk_into(&mut set, &resolver, root)?;

    tracing::info!(
        "Prepared directory {} for sending: {} files",
        set.name(),
        set.len()
    );
    Ok(set)
}

/// Files and directories that share the parent directory of the first item.
///
/// Relative paths start with that parent's name. Any item that resolves
/// outside of it aborts the whole enumeration with a path-escape error.
/// Symlinked items are followed after that check, so a link keeps its own
/// name in the set while its target supplies content and mode.
pub fn enumerate_items(paths: &[PathBuf]) -> Result<TransferSet, TransferError> {
    let first = paths
        .first()
        .ok_or_else(|| TransferError::InvalidSelection("nothing selected".to_string()))?;

    let first = resolve(first)?;
    let base_dir = first.parent().ok_or_else(|| {
        TransferError::InvalidSelection(format!("{} has no parent directory", first.display()))
    })?;
    let resolver = PathResolver::new(base_dir)?;

    let mut set = TransferSet::new(resolver.name());
    for item in paths {
        let resolved = resolve(item)?;
        let resolved_str = path_str(&resolved)?;

        if resolved == resolver.root() {
            return Err(TransferError::PathEscape(item.display().to_string()));
        }
        let relative = resolver.relative(resolved_str).inspect_err(|_| {
            tracing::warn!(
                "Refusing selection item outside {}: {}",
                resolver.root().display(),
                item.display()
            );
        })?;

        // Picked items are followed like a single picked file; links found
        // during the walk are not.
        let metadata = fs::metadata(&resolved).map_err(TransferError::fs(&resolved))?;
        if metadata.is_dir() {
            walk_into(&mut set, &resolver, &resolved)?;
        } else if metadata.is_file() {
            tracing::debug!("Adding {}", relative);
            set.push(TransferEntry::from_file(relative, &metadata, &resolved))?;
        } else {
            return Err(TransferError::InvalidSelection(format!(
                "{} is neither a file nor a directory",
                item.display()
            )));
        }
    }

    tracing::info!(
        "Prepared {} selected items from {} for sending: {} files",
        paths.len(),
        set.name(),
        set.len()
    );
    Ok(set)
}

/// Walk `dir` and append every regular file to `set`, relative to `resolver`.
fn walk_into(
    set: &mut TransferSet,
    resolver: &PathResolver,
    dir: &Path,
) -> Result<(), TransferError> {
    let walker = WalkDir::new(dir).follow_links(false).sort_by_file_name();

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }

        let metadata = entry.metadata()?;
        if !metadata.file_type().is_file() {
            tracing::debug!("Skipping non-regular file {}", entry.path().display());
            continue;
        }

        let relative = resolver.relative(path_str(entry.path())?)?;
        tracing::debug!("Adding {}", relative);
        set.push(TransferEntry::from_file(relative, &metadata, entry.path()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn paths(set: &TransferSet) -> Vec<&str> {
        set.entries().iter().map(|e| e.relative_path()).collect()
    }

    /// tmp/shared/{a.txt, photos/{b.jpg, nested/c.jpg}, z.txt}
    fn shared_tree() -> (TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let shared = tmp.path().join("shared");
        write(&shared.join("a.txt"), "alpha");
        write(&shared.join("photos/b.jpg"), "bravo");
        write(&shared.join("photos/nested/c.jpg"), "charlie");
        write(&shared.join("z.txt"), "zulu");
        (tmp, shared)
    }

    #[test]
    fn test_single_file() {
        let (_tmp, shared) = shared_tree();
        let set = enumerate_file(&shared.join("a.txt")).unwrap();

        assert_eq!(set.name(), "a.txt");
        assert_eq!(paths(&set), vec!["a.txt"]);
    }

    #[test]
    fn test_single_file_rejects_directory() {
        let (_tmp, shared) = shared_tree();
        assert!(matches!(
            enumerate_file(&shared),
            Err(TransferError::InvalidSelection(_))
        ));
    }

    #[test]
    fn test_directory_walk() {
        let (_tmp, shared) = shared_tree();
        let set = enumerate_directory(&shared.join("photos")).unwrap();

        assert_eq!(set.name(), "photos");
        assert_eq!(paths(&set), vec!["photos/b.jpg", "photos/nested/c.jpg"]);
    }

    #[test]
    fn test_directory_walk_is_depth_first_by_name() {
        let (_tmp, shared) = shared_tree();
        let set = enumerate_directory(&shared).unwrap();

        assert_eq!(
            paths(&set),
            vec![
                "shared/a.txt",
                "shared/photos/b.jpg",
                "shared/photos/nested/c.jpg",
                "shared/z.txt",
            ]
        );
    }

    #[test]
    fn test_directory_walk_with_unclean_root() {
        let (_tmp, shared) = shared_tree();
        let unclean = shared.join("photos").join("..").join(".").join("photos");
        let set = enumerate_directory(&unclean).unwrap();

        assert_eq!(paths(&set), vec!["photos/b.jpg", "photos/nested/c.jpg"]);
    }

    #[test]
    fn test_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let empty = tmp.path().join("empty");
        fs::create_dir(&empty).unwrap();

        let set = enumerate_directory(&empty).unwrap();
        assert_eq!(set.name(), "empty");
        assert!(set.is_empty());
    }

    #[test]
    fn test_directory_rejects_file() {
        let (_tmp, shared) = shared_tree();
        assert!(matches!(
            enumerate_directory(&shared.join("a.txt")),
            Err(TransferError::InvalidSelection(_))
        ));
    }

    #[test]
    fn test_missing_directory_is_filesystem_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = enumerate_directory(&tmp.path().join("missing")).unwrap_err();
        match err {
            TransferError::Filesystem { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_skips_symlinks() {
        let (_tmp, shared) = shared_tree();
        std::os::unix::fs::symlink("/etc/passwd", shared.join("photos/passwd")).unwrap();
        std::os::unix::fs::symlink(shared.join("a.txt"), shared.join("photos/link.txt")).unwrap();

        let set = enumerate_directory(&shared.join("photos")).unwrap();
        assert_eq!(paths(&set), vec!["photos/b.jpg", "photos/nested/c.jpg"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_preserves_mode() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, shared) = shared_tree();
        let script = shared.join("photos/run.sh");
        write(&script, "#!/bin/sh\n");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o750)).unwrap();

        let set = enumerate_directory(&shared.join("photos")).unwrap();
        let entry = set
            .entries()
            .iter()
            .find(|e| e.relative_path() == "photos/run.sh")
            .unwrap();
        assert_eq!(entry.mode().permissions(), 0o750);
    }

    #[cfg(unix)]
    #[test]
    #[ignore = "needs a non-root user; root ignores permission bits"]
    fn test_unreadable_directory_aborts_walk() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, shared) = shared_tree();
        let locked = shared.join("photos/nested");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let result = enumerate_directory(&shared);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        match result {
            Err(TransferError::Filesystem { path, source }) => {
                assert_eq!(path, locked);
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_walk_error_keeps_path_and_kind() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("vanished");
        let resolver = PathResolver::new(tmp.path()).unwrap();

        let mut set = TransferSet::new(resolver.name());
        match walk_into(&mut set, &resolver, &missing) {
            Err(TransferError::Filesystem { path, source }) => {
                assert_eq!(path, missing);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(set.is_empty());
    }

    #[test]
    fn test_mixed_items_order_and_prefix() {
        let (_tmp, shared) = shared_tree();
        let items = vec![shared.join("z.txt"), shared.join("photos")];
        let set = enumerate_items(&items).unwrap();

        assert_eq!(set.name(), "shared");
        assert_eq!(
            paths(&set),
            vec!["shared/z.txt", "shared/photos/b.jpg", "shared/photos/nested/c.jpg"]
        );
    }

    #[test]
    fn test_mixed_items_reject_parent_escape() {
        let (tmp, shared) = shared_tree();
        write(&tmp.path().join("outside.txt"), "secret");

        let items = vec![
            shared.join("a.txt"),
            shared.join("..").join("outside.txt"),
        ];
        let err = enumerate_items(&items).unwrap_err();
        assert!(err.is_path_escape(), "unexpected error: {err}");
    }

    #[test]
    fn test_mixed_items_reject_absolute_injection() {
        let (tmp, shared) = shared_tree();
        let elsewhere = tmp.path().join("elsewhere.txt");
        write(&elsewhere, "secret");

        let items = vec![shared.join("a.txt"), elsewhere];
        let err = enumerate_items(&items).unwrap_err();
        assert!(err.is_path_escape());
    }

    #[test]
    fn test_mixed_items_reject_root_itself() {
        let (_tmp, shared) = shared_tree();
        let items = vec![shared.join("a.txt"), shared.join(".")];
        let err = enumerate_items(&items).unwrap_err();
        assert!(err.is_path_escape());
    }

    #[test]
    fn test_mixed_items_reject_duplicates() {
        let (_tmp, shared) = shared_tree();
        let items = vec![shared.join("a.txt"), shared.join("photos/../a.txt")];
        let err = enumerate_items(&items).unwrap_err();
        assert!(matches!(err, TransferError::DuplicateEntry(ref p) if p == "shared/a.txt"));
    }

    #[test]
    fn test_mixed_items_missing_item() {
        let (_tmp, shared) = shared_tree();
        let items = vec![shared.join("a.txt"), shared.join("gone.txt")];
        assert!(matches!(
            enumerate_items(&items),
            Err(TransferError::Filesystem { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_mixed_items_follow_symlinks() {
        use std::os::unix::fs::symlink;

        let (_tmp, shared) = shared_tree();
        symlink(shared.join("z.txt"), shared.join("link.txt")).unwrap();
        symlink(shared.join("photos/nested"), shared.join("album")).unwrap();

        let items = vec![
            shared.join("a.txt"),
            shared.join("link.txt"),
            shared.join("album"),
        ];
        let set = enumerate_items(&items).unwrap();
        assert_eq!(
            paths(&set),
            vec!["shared/a.txt", "shared/link.txt", "shared/album/c.jpg"]
        );

        let mut buf = String::new();
        set.entries()[1]
            .open()
            .unwrap()
            .read_to_string(&mut buf)
            .unwrap();
        assert_eq!(buf, "zulu");
    }

    #[cfg(unix)]
    #[test]
    fn test_mixed_items_dangling_symlink() {
        let (_tmp, shared) = shared_tree();
        std::os::unix::fs::symlink(shared.join("gone.txt"), shared.join("dangling")).unwrap();

        let items = vec![shared.join("a.txt"), shared.join("dangling")];
        match enumerate_items(&items) {
            Err(TransferError::Filesystem { source, .. }) => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_empty_item_list() {
        assert!(matches!(
            enumerate_items(&[]),
            Err(TransferError::InvalidSelection(_))
        ));
    }

    #[test]
    fn test_selection_dispatch() {
        let (_tmp, shared) = shared_tree();

        let file = Selection::from_paths(vec![shared.join("a.txt")]).unwrap();
        assert!(matches!(file, Selection::File(_)));
        assert_eq!(file.enumerate().unwrap().name(), "a.txt");

        let dir = Selection::from_paths(vec![shared.clone()]).unwrap();
        assert!(matches!(dir, Selection::Directory(_)));
        assert_eq!(dir.enumerate().unwrap().len(), 4);

        let items =
            Selection::from_paths(vec![shared.join("a.txt"), shared.join("z.txt")]).unwrap();
        let set = items.enumerate().unwrap();
        assert_eq!(set.name(), "shared");
        assert_eq!(set.len(), 2);

        assert!(Selection::from_paths(Vec::new()).is_err());
    }

    #[test]
    fn test_every_entry_stays_below_root() {
        let (_tmp, shared) = shared_tree();
        let set = enumerate_directory(&shared).unwrap();
        let parent = resolve(shared.parent().unwrap()).unwrap();

        for entry in set.entries() {
            let joined = resolve(&parent.join(entry.relative_path())).unwrap();
            assert!(joined.starts_with(resolve(&shared).unwrap()));
            assert_ne!(joined, resolve(&shared).unwrap());
        }
    }

    #[test]
    fn test_enumeration_opens_nothing() {
        let (_tmp, shared) = shared_tree();
        let set = enumerate_directory(&shared).unwrap();

        // Deleting every file after enumeration still leaves a valid set.
        fs::remove_dir_all(&shared).unwrap();
        assert_eq!(set.len(), 4);

        for entry in set.entries() {
            match entry.open() {
                Err(TransferError::Filesystem { source, .. }) => {
                    assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
                }
                Err(other) => panic!("unexpected error: {other}"),
                Ok(_) => panic!("opened a deleted file"),
            }
        }
    }

    #[test]
    fn test_open_reads_current_content() {
        let (_tmp, shared) = shared_tree();
        let set = enumerate_file(&shared.join("a.txt")).unwrap();
        write(&shared.join("a.txt"), "changed");

        let mut buf = String::new();
        set.entries()[0]
            .open()
            .unwrap()
            .read_to_string(&mut buf)
            .unwrap();
        assert_eq!(buf, "changed");
    }
}
