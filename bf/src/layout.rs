//! Mapping between the source tree and the three staging trees
//!
//! ```text
//! Wonky/a/b/img.jpg
//!   -> Inprogress/a/b/fixed_img.jpg   (conversion output)
//!   -> Fixed/a/b/fixed_img.jpg        (after promotion)
//!   -> Problems/a/b/img.jpg           (on failure, original name)
//! ```

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// The four top-level directories the daemon works with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roots {
    pub source: PathBuf,
    pub in_progress: PathBuf,
    pub problems: PathBuf,
    pub fixed: PathBuf,
}

impl Roots {
    /// All four roots, source first
    pub fn all(&self) -> [&Path; 4] {
        [&self.source, &self.in_progress, &self.problems, &self.fixed]
    }
}

/// Directories that mirror one source directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorDirs {
    pub source: PathBuf,
    pub in_progress: PathBuf,
    pub problems: PathBuf,
    pub fixed: PathBuf,
}

/// Paths that one source file maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorFiles {
    pub source: PathBuf,
    pub in_progress: PathBuf,
    pub problems: PathBuf,
    pub fixed: PathBuf,
}

/// Pure mapping from source-relative locations to staging locations
#[derive(Debug, Clone)]
pub struct PathMapper {
    roots: Roots,
    marker_prefix: String,
}

impl PathMapper {
    pub fn new(roots: Roots, marker_prefix: impl Into<String>) -> Self {
        Self {
            roots,
            marker_prefix: marker_prefix.into(),
        }
    }

    pub fn roots(&self) -> &Roots {
        &self.roots
    }

    pub fn marker_prefix(&self) -> &str {
        &self.marker_prefix
    }

    /// Components of `dir` relative to `root`, or `None` if `dir` is not under `root`
    pub fn relative_components(root: &Path, dir: &Path) -> Option<Vec<OsString>> {
        let rel = dir.strip_prefix(root).ok()?;
        Some(rel.iter().map(OsStr::to_os_string).collect())
    }

    /// Mirror directories for a source directory given by its relative components
    pub fn dirs(&self, rel: &[OsString]) -> MirrorDirs {
        MirrorDirs {
            source: join_all(&self.roots.source, rel),
            in_progress: join_all(&self.roots.in_progress, rel),
            problems: join_all(&self.roots.problems, rel),
            fixed: join_all(&self.roots.fixed, rel),
        }
    }

    /// Mirror paths for the file `leaf` inside the source directory `rel`
    pub fn files(&self, rel: &[OsString], leaf: &OsStr) -> MirrorFiles {
        let dirs = self.dirs(rel);
        let marked = self.marked(leaf);
        MirrorFiles {
            source: dirs.source.join(leaf),
            in_progress: dirs.in_progress.join(&marked),
            problems: dirs.problems.join(leaf),
            fixed: dirs.fixed.join(&marked),
        }
    }

    /// `leaf` with the marker prefix prepended
    pub fn marked(&self, leaf: &OsStr) -> OsString {
        let mut name = OsString::from(&self.marker_prefix);
        name.push(leaf);
        name
    }

    /// Source leaf name for a marked in-progress or fixed name.
    ///
    /// `None` when the name does not carry the marker prefix (or is not
    /// valid UTF-8, in which case it cannot be matched against the prefix).
    pub fn unmarked(&self, name: &OsStr) -> Option<OsString> {
        let leaf = name.to_str()?.strip_prefix(self.marker_prefix.as_str())?;
        if leaf.is_empty() {
            return None;
        }
        Some(OsString::from(leaf))
    }
}

fn join_all(root: &Path, rel: &[OsString]) -> PathBuf {
    let mut path = root.to_path_buf();
    path.extend(rel);
    path
}
