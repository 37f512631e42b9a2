//! Directory lifecycle helpers
//!
//! Staging directories are created on demand and pruned as soon as they are
//! empty. Both operations report their outcome as a value so callers never
//! need to pick apart `io::Error`s to tell "nothing to do" from a real
//! failure.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{FixerError, Result};

/// Result of [`ensure_dir`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    AlreadyExists,
}

/// Why a [`prune_dirs`] chain stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneStop {
    /// Reached the boundary directory (or a path outside it)
    Boundary,
    /// Directory still holds entries
    NotEmpty,
    /// Directory was already gone
    Missing,
    /// Removal failed for another reason; treated as a normal stop
    Refused(io::ErrorKind),
}

/// Result of [`prune_dirs`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneOutcome {
    /// Directories removed, deepest first
    pub removed: Vec<PathBuf>,
    pub stop: PruneStop,
}

/// Create `path` and any missing ancestors.
///
/// An existing directory is reported as [`EnsureOutcome::AlreadyExists`].
/// Anything else that prevents the directory from existing is an error.
pub fn ensure_dir(path: &Path) -> Result<EnsureOutcome> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => {
            debug!(?path, "ensure_dir: already exists");
            return Ok(EnsureOutcome::AlreadyExists);
        }
        Ok(_) => {
            return Err(FixerError::NotADirectory {
                path: path.to_path_buf(),
            });
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(FixerError::CreateDir {
                path: path.to_path_buf(),
                source,
            });
        }
    }

    fs::create_dir_all(path).map_err(|source| FixerError::CreateDir {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Created dir {}", path.display());
    Ok(EnsureOutcome::Created)
}

/// Remove `path`, then its parents, while each is empty and strictly below
/// `boundary`.
///
/// `boundary` itself is never removed. The chain ends at the first directory
/// that cannot be removed; that is the normal way for a prune to finish.
pub fn prune_dirs(path: &Path, boundary: &Path) -> PruneOutcome {
    let mut removed = Vec::new();
    let mut current = path.to_path_buf();

    let stop = loop {
        if !is_strictly_below(&current, boundary) {
            break PruneStop::Boundary;
        }

        if let Err(e) = fs::remove_dir(&current) {
            let stop = classify_remove_error(&e);
            debug!(path = ?current, ?stop, "prune_dirs: stopping");
            break stop;
        }
        info!("Removed dir {}", current.display());

        let parent = current.parent().map(Path::to_path_buf);
        removed.push(current);
        match parent {
            Some(parent) => current = parent,
            None => break PruneStop::Boundary,
        }
    };

    PruneOutcome { removed, stop }
}

fn is_strictly_below(path: &Path, boundary: &Path) -> bool {
    path != boundary && path.starts_with(boundary)
}

fn classify_remove_error(e: &io::Error) -> PruneStop {
    match e.kind() {
        io::ErrorKind::NotFound => PruneStop::Missing,
        // Some platforms report a non-empty rmdir as EEXIST
        io::ErrorKind::DirectoryNotEmpty | io::ErrorKind::AlreadyExists => PruneStop::NotEmpty,
        kind => PruneStop::Refused(kind),
    }
}

/// Rename `from` to `to` within one filesystem.
///
/// The rename is atomic, so an interrupted move leaves the file in exactly
/// one of the two places. Cross-device moves are rejected rather than
/// emulated with copy and delete.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    debug!(?from, ?to, "move_file: called");
    fs::rename(from, to).map_err(|source| {
        if source.kind() == io::ErrorKind::CrossesDevices {
            FixerError::CrossDevice {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
            }
        } else {
            FixerError::Move {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source,
            }
        }
    })
}

/// Remove a file if it exists.
///
/// Returns whether a file was removed.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(FixerError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// First path derived from `path` that does not exist yet.
///
/// `path` itself when free, otherwise `<stem>-1.<ext>`, `<stem>-2.<ext>`, ...
pub fn vacant_path(path: &Path) -> PathBuf {
    if !exists_no_follow(path) {
        return path.to_path_buf();
    }

    let stem = path.file_stem().map(OsString::from).unwrap_or_default();
    let ext = path.extension().map(OsString::from);

    (1u32..)
        .map(|n| {
            let mut name = stem.clone();
            name.push(format!("-{n}"));
            if let Some(ext) = &ext {
                name.push(".");
                name.push(ext);
            }
            path.with_file_name(name)
        })
        .find(|candidate| !exists_no_follow(candidate))
        .unwrap_or_else(|| path.to_path_buf())
}

/// Whether anything (including a dangling symlink) occupies `path`
pub fn exists_no_follow(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Entries of one directory, split into files and subdirectories
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirListing {
    /// Leaf names of non-directory entries, sorted
    pub files: Vec<OsString>,
    /// Leaf names of subdirectories, sorted
    pub subdirs: Vec<OsString>,
}

/// List a directory without following symlinks.
///
/// Returns `None` if the directory does not exist.
pub fn read_listing(path: &Path) -> Result<Option<DirListing>> {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(FixerError::ReadDir {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut listing = DirListing::default();
    for entry in entries {
        let entry = entry.map_err(|source| FixerError::ReadDir {
            path: path.to_path_buf(),
            source,
        })?;
        let file_type = entry.file_type().map_err(|source| FixerError::ReadDir {
            path: path.to_path_buf(),
            source,
        })?;
        if file_type.is_dir() {
            listing.subdirs.push(entry.file_name());
        } else {
            listing.files.push(entry.file_name());
        }
    }
    listing.files.sort();
    listing.subdirs.sort();
    Ok(Some(listing))
}

/// Whether two existing paths live on the same filesystem
#[cfg(unix)]
pub fn same_filesystem(a: &Path, b: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;
    let dev_a = fs::metadata(a)?.dev();
    let dev_b = fs::metadata(b)?.dev();
    Ok(dev_a == dev_b)
}

/// Whether two existing paths live on the same filesystem
#[cfg(not(unix))]
pub fn same_filesystem(_a: &Path, _b: &Path) -> Result<bool> {
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_dir_creates_missing_ancestors() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("a").join("b").join("c");

        assert_eq!(ensure_dir(&target).unwrap(), EnsureOutcome::Created);
        assert!(target.is_dir());
    }

    #[test]
    fn test_ensure_dir_existing_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("a");
        fs::create_dir(&target).unwrap();

        assert_eq!(ensure_dir(&target).unwrap(), EnsureOutcome::AlreadyExists);
        assert_eq!(ensure_dir(&target).unwrap(), EnsureOutcome::AlreadyExists);
    }

    #[test]
    fn test_ensure_dir_over_file_fails() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("a");
        fs::write(&target, b"x").unwrap();

        let err = ensure_dir(&target).unwrap_err();
        assert!(matches!(err, FixerError::NotADirectory { .. }));
    }

    #[test]
    fn test_ensure_dir_below_file_fails() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), b"x").unwrap();

        let result = ensure_dir(&temp.path().join("a").join("b"));
        assert!(result.is_err());
    }

    #[test]
    fn test_prune_removes_empty_chain_up_to_boundary() {
        let temp = TempDir::new().unwrap();
        let boundary = temp.path().join("root");
        let deep = boundary.join("a").join("b").join("c");
        fs::create_dir_all(&deep).unwrap();

        let outcome = prune_dirs(&deep, &boundary);

        assert_eq!(outcome.stop, PruneStop::Boundary);
        assert_eq!(
            outcome.removed,
            vec![deep.clone(), boundary.join("a").join("b"), boundary.join("a")]
        );
        assert!(boundary.is_dir());
        assert!(!boundary.join("a").exists());
    }

    #[test]
    fn test_prune_stops_at_non_empty_parent() {
        let temp = TempDir::new().unwrap();
        let boundary = temp.path().join("root");
        let deep = boundary.join("a").join("b");
        fs::create_dir_all(&deep).unwrap();
        fs::write(boundary.join("a").join("keep.jpg"), b"x").unwrap();

        let outcome = prune_dirs(&deep, &boundary);

        assert_eq!(outcome.removed, vec![deep.clone()]);
        assert_eq!(outcome.stop, PruneStop::NotEmpty);
        assert!(boundary.join("a").join("keep.jpg").exists());
    }

    #[test]
    fn test_prune_non_empty_start_removes_nothing() {
        let temp = TempDir::new().unwrap();
        let boundary = temp.path().join("root");
        let dir = boundary.join("a");
        fs::create_dir_all(dir.join("child")).unwrap();

        let outcome = prune_dirs(&dir, &boundary);

        assert!(outcome.removed.is_empty());
        assert_eq!(outcome.stop, PruneStop::NotEmpty);
        assert!(dir.join("child").is_dir());
    }

    #[test]
    fn test_prune_missing_directory() {
        let temp = TempDir::new().unwrap();
        let boundary = temp.path().join("root");
        fs::create_dir_all(&boundary).unwrap();

        let outcome = prune_dirs(&boundary.join("gone"), &boundary);

        assert!(outcome.removed.is_empty());
        assert_eq!(outcome.stop, PruneStop::Missing);
    }

    #[test]
    fn test_prune_never_removes_boundary() {
        let temp = TempDir::new().unwrap();
        let boundary = temp.path().join("root");
        fs::create_dir_all(&boundary).unwrap();

        let outcome = prune_dirs(&boundary, &boundary);

        assert!(outcome.removed.is_empty());
        assert_eq!(outcome.stop, PruneStop::Boundary);
        assert!(boundary.is_dir());
    }

    #[test]
    fn test_prune_outside_boundary_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        let boundary = temp.path().join("root");
        let elsewhere = temp.path().join("elsewhere");
        fs::create_dir_all(&boundary).unwrap();
        fs::create_dir_all(&elsewhere).unwrap();

        let outcome = prune_dirs(&elsewhere, &boundary);

        assert_eq!(outcome.stop, PruneStop::Boundary);
        assert!(elsewhere.is_dir());
    }

    #[test]
    fn test_prune_boundary_prefix_is_component_wise() {
        let temp = TempDir::new().unwrap();
        let boundary = temp.path().join("Fix");
        let sibling = temp.path().join("Fixed").join("a");
        fs::create_dir_all(&boundary).unwrap();
        fs::create_dir_all(&sibling).unwrap();

        let outcome = prune_dirs(&sibling, &boundary);

        assert!(outcome.removed.is_empty());
        assert!(sibling.is_dir());
    }

    #[test]
    fn test_move_file_renames() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("a.jpg");
        let to = temp.path().join("b.jpg");
        fs::write(&from, b"data").unwrap();

        move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"data");
    }

    #[test]
    fn test_move_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        let err = move_file(&temp.path().join("nope"), &temp.path().join("dest")).unwrap_err();
        assert!(matches!(err, FixerError::Move { .. }));
    }

    #[test]
    fn test_remove_file_if_exists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.jpg");
        fs::write(&path, b"x").unwrap();

        assert!(remove_file_if_exists(&path).unwrap());
        assert!(!remove_file_if_exists(&path).unwrap());
    }

    #[test]
    fn test_vacant_path_numbers_collisions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("img.jpg");
        assert_eq!(vacant_path(&path), path);

        fs::write(&path, b"x").unwrap();
        assert_eq!(vacant_path(&path), temp.path().join("img-1.jpg"));

        fs::write(temp.path().join("img-1.jpg"), b"x").unwrap();
        assert_eq!(vacant_path(&path), temp.path().join("img-2.jpg"));
    }

    #[test]
    fn test_vacant_path_without_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("README");
        fs::write(&path, b"x").unwrap();

        assert_eq!(vacant_path(&path), temp.path().join("README-1"));
    }

    #[test]
    fn test_read_listing_splits_and_sorts() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.jpg"), b"x").unwrap();
        fs::write(temp.path().join("a.jpg"), b"x").unwrap();
        fs::create_dir(temp.path().join("z")).unwrap();
        fs::create_dir(temp.path().join("y")).unwrap();

        let listing = read_listing(temp.path()).unwrap().unwrap();

        assert_eq!(listing.files, vec![OsString::from("a.jpg"), OsString::from("b.jpg")]);
        assert_eq!(listing.subdirs, vec![OsString::from("y"), OsString::from("z")]);
    }

    #[test]
    fn test_read_listing_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert!(read_listing(&temp.path().join("gone")).unwrap().is_none());
    }

    #[test]
    fn test_same_filesystem_for_siblings() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("a")).unwrap();
        fs::create_dir(temp.path().join("b")).unwrap();

        assert!(same_filesystem(&temp.path().join("a"), &temp.path().join("b")).unwrap());
    }
}
