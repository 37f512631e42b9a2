//! One sweep over the source tree
//!
//! Each source file moves through the staging trees like this:
//!
//! ```text
//! Pending --convert ok--> Inprogress/<marked> --promote--> Fixed/<marked>
//!    \
//!     --convert failed / fixed target exists--> Problems/<leaf>
//! ```
//!
//! The in-progress output is durable. Whatever point a previous run died
//! at, the next sweep finishes the job without converting again: an output
//! whose source is gone is promoted, and a source that is still present is
//! simply converted (again).

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::convert::{ConversionOutcome, Converter};
use crate::error::{FixerError, Result};
use crate::fsops::{self, ensure_dir, exists_no_follow, move_file, prune_dirs, read_listing};
use crate::layout::{MirrorDirs, MirrorFiles, PathMapper};

/// Counts of what one sweep did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Source files converted and removed
    pub converted: usize,
    /// Source files quarantined because conversion failed
    pub failed: usize,
    /// Source files quarantined because their fixed output already existed
    pub duplicates: usize,
    /// In-progress outputs moved to the fixed tree
    pub promoted: usize,
    /// In-progress outputs left in place because the fixed target was taken
    pub held: usize,
    /// Empty directories removed from the source and staging trees
    pub pruned: usize,
}

impl SweepReport {
    /// Source files moved to the problems tree
    pub fn quarantined(&self) -> usize {
        self.failed + self.duplicates
    }

    /// Whether the sweep touched nothing
    pub fn is_idle(&self) -> bool {
        self.converted == 0 && self.quarantined() == 0 && self.promoted == 0 && self.pruned == 0
    }
}

enum FileOutcome {
    Converted,
    Failed(String),
    Duplicate,
}

/// Walks the source tree and routes every file through the converter
pub struct Poller<C> {
    mapper: PathMapper,
    converter: C,
}

impl<C: Converter> Poller<C> {
    pub fn new(mapper: PathMapper, converter: C) -> Self {
        Self { mapper, converter }
    }

    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    /// Run one full sweep.
    ///
    /// Visits every source directory once, parents before children, then
    /// reconciles the staging trees. Errors abort the sweep; everything
    /// finished before the error is already durable on disk.
    pub fn sweep(&self) -> Result<SweepReport> {
        debug!("Poller::sweep: called");
        let mut report = SweepReport::default();
        let mut handled = HashSet::new();
        let source_root = &self.mapper.roots().source;

        let mut stack = vec![source_root.clone()];
        while let Some(dir) = stack.pop() {
            let Some(listing) = read_listing(&dir)? else {
                debug!(?dir, "Poller::sweep: directory vanished");
                continue;
            };
            // Reversed so siblings pop in name order
            stack.extend(listing.subdirs.iter().rev().map(|sub| dir.join(sub)));

            let Some(rel) = PathMapper::relative_components(source_root, &dir) else {
                continue;
            };
            let dirs = self.mapper.dirs(&rel);
            self.process_dir(&rel, &dirs, &listing.files, &mut report)?;
            handled.insert(dirs.in_progress);
        }

        self.reconcile(&handled, &mut report)?;

        debug!(?report, "Poller::sweep: done");
        Ok(report)
    }

    fn process_dir(
        &self,
        rel: &[OsString],
        dirs: &MirrorDirs,
        files: &[OsString],
        report: &mut SweepReport,
    ) -> Result<()> {
        let roots = self.mapper.roots();
        let has_files = !files.is_empty();

        if has_files {
            ensure_dir(&dirs.in_progress)?;
        }

        let mut converted = HashSet::new();
        for leaf in files {
            let paths = self.mapper.files(rel, leaf);
            match self.process_file(&paths, dirs)? {
                FileOutcome::Converted => {
                    report.converted += 1;
                    converted.insert(leaf.clone());
                }
                FileOutcome::Failed(_) => report.failed += 1,
                FileOutcome::Duplicate => report.duplicates += 1,
            }
        }

        // Every file was deleted or moved out above
        if has_files {
            report.pruned += prune_dirs(&dirs.source, &roots.source).removed.len();
        }

        self.promote_dir(dirs, &converted, report)?;
        report.pruned += prune_dirs(&dirs.in_progress, &roots.in_progress).removed.len();
        Ok(())
    }

    fn process_file(&self, paths: &MirrorFiles, dirs: &MirrorDirs) -> Result<FileOutcome> {
        let outcome = if exists_no_follow(&paths.fixed) {
            FileOutcome::Duplicate
        } else {
            info!("Starting conversion of {}", paths.source.display());
            match self.converter.convert(&paths.source, &paths.in_progress)? {
                ConversionOutcome::Success => FileOutcome::Converted,
                ConversionOutcome::Failure(detail) => FileOutcome::Failed(detail),
            }
        };

        match &outcome {
            FileOutcome::Converted => {
                std::fs::remove_file(&paths.source).map_err(|source| FixerError::Remove {
                    path: paths.source.clone(),
                    source,
                })?;
                info!("Converting {}... OK", paths.source.display());
            }
            FileOutcome::Failed(detail) => {
                // Whatever the converter left behind is not trustworthy
                if fsops::remove_file_if_exists(&paths.in_progress)? {
                    debug!(path = ?paths.in_progress, "Removed partial output");
                }
                let dest = self.quarantine(paths, dirs)?;
                info!(
                    "Converting {}... {} (moved to {})",
                    paths.source.display(),
                    detail,
                    dest.display()
                );
            }
            FileOutcome::Duplicate => {
                let dest = self.quarantine(paths, dirs)?;
                info!(
                    "Converting {}... Target file exists: {} (moved to {})",
                    paths.source.display(),
                    paths.fixed.display(),
                    dest.display()
                );
            }
        }

        Ok(outcome)
    }

    /// Move a source file into the problems tree, keeping its name when free
    fn quarantine(&self, paths: &MirrorFiles, dirs: &MirrorDirs) -> Result<PathBuf> {
        ensure_dir(&dirs.problems)?;
        let dest = fsops::vacant_path(&paths.problems);
        if dest != paths.problems {
            warn!(
                "{} already exists, quarantining as {}",
                paths.problems.display(),
                dest.display()
            );
        }
        move_file(&paths.source, &dest)?;
        Ok(dest)
    }

    /// Promote every finished output in one in-progress directory.
    ///
    /// Outputs for `converted` leaves were produced by this sweep and are
    /// always finished, even if a new file with the same name has since
    /// arrived in the source directory. Any other output counts as finished
    /// only once its source file is gone. The fixed directory is only
    /// created when something is actually promoted into it.
    fn promote_dir(&self, dirs: &MirrorDirs, converted: &HashSet<OsString>, report: &mut SweepReport) -> Result<()> {
        let Some(listing) = read_listing(&dirs.in_progress)? else {
            return Ok(());
        };

        let mut fixed_ready = false;
        for name in &listing.files {
            let Some(leaf) = self.mapper.unmarked(name) else {
                debug!(?name, dir = ?dirs.in_progress, "promote_dir: not a marked output, skipping");
                continue;
            };
            if !converted.contains(&leaf) && exists_no_follow(&dirs.source.join(&leaf)) {
                debug!(?leaf, "promote_dir: source still pending");
                continue;
            }

            let from = dirs.in_progress.join(name);
            let to = dirs.fixed.join(name);
            if exists_no_follow(&to) {
                warn!("Not promoting {}: {} already exists", from.display(), to.display());
                report.held += 1;
                continue;
            }

            if !fixed_ready {
                ensure_dir(&dirs.fixed)?;
                fixed_ready = true;
            }
            move_file(&from, &to)?;
            debug!(?from, ?to, "promote_dir: promoted");
            report.promoted += 1;
        }
        Ok(())
    }

    /// Finish work whose source directory no longer exists and drop empty staging directories
    fn reconcile(&self, handled: &HashSet<PathBuf>, report: &mut SweepReport) -> Result<()> {
        let roots = self.mapper.roots();

        for dir in subdirs_deepest_first(&roots.in_progress)? {
            if !handled.contains(&dir) {
                if let Some(rel) = PathMapper::relative_components(&roots.in_progress, &dir) {
                    let dirs = self.mapper.dirs(&rel);
                    self.promote_dir(&dirs, &HashSet::new(), report)?;
                }
            }
            report.pruned += prune_dirs(&dir, &roots.in_progress).removed.len();
        }

        for root in [&roots.fixed, &roots.problems] {
            for dir in subdirs_deepest_first(root)? {
                report.pruned += prune_dirs(&dir, root).removed.len();
            }
        }
        Ok(())
    }
}

/// `root` and every directory below it, each listed after all of its descendants
fn subdirs_deepest_first(root: &Path) -> Result<Vec<PathBuf>> {
    let mut preorder = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Some(listing) = read_listing(&dir)? else {
            continue;
        };
        stack.extend(listing.subdirs.iter().map(|sub| dir.join(sub)));
        preorder.push(dir);
    }
    preorder.reverse();
    Ok(preorder)
}
