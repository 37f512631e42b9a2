//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use barrelfix::{ConversionOutcome, Converter, PathMapper, Poller, Roots};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Fake converter that records calls and prefixes the content with "fixed:"
#[derive(Default)]
pub struct RecordingConverter {
    /// Source leaf names that should fail
    pub fail: HashSet<String>,
    pub calls: RefCell<Vec<(PathBuf, PathBuf)>>,
    /// While converting the named leaf, write `(path, content)` once, as an
    /// upstream producer dropping a file mid-sweep would
    pub drop_in: RefCell<Option<(String, PathBuf, String)>>,
}

impl RecordingConverter {
    pub fn failing(names: &[&str]) -> Self {
        Self {
            fail: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Write `content` to `path` while `trigger` is being converted
    pub fn dropping_in(trigger: &str, path: PathBuf, content: &str) -> Self {
        Self {
            drop_in: RefCell::new(Some((trigger.to_string(), path, content.to_string()))),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Converter for RecordingConverter {
    fn convert(&self, source: &Path, dest: &Path) -> barrelfix::Result<ConversionOutcome> {
        self.calls.borrow_mut().push((source.to_path_buf(), dest.to_path_buf()));
        let leaf = source.file_name().unwrap().to_string_lossy().into_owned();
        let fire = matches!(&*self.drop_in.borrow(), Some((trigger, _, _)) if *trigger == leaf);
        if fire {
            if let Some((_, path, content)) = self.drop_in.borrow_mut().take() {
                fs::write(path, content)?;
            }
        }
        if self.fail.contains(&leaf) {
            return Ok(ConversionOutcome::Failure("exit status: 1".to_string()));
        }
        let mut content = b"fixed:".to_vec();
        content.extend(fs::read(source)?);
        fs::write(dest, content)?;
        Ok(ConversionOutcome::Success)
    }
}

/// A temp directory holding the four roots
pub struct Fixture {
    pub temp: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let fixture = Self {
            temp: TempDir::new().expect("Failed to create temp dir"),
        };
        for root in fixture.roots().all() {
            fs::create_dir_all(root).unwrap();
        }
        fixture
    }

    pub fn roots(&self) -> Roots {
        Roots {
            source: self.path("Wonky"),
            in_progress: self.path("Inprogress"),
            problems: self.path("Problems"),
            fixed: self.path("Fixed"),
        }
    }

    pub fn poller(&self, converter: RecordingConverter) -> Poller<RecordingConverter> {
        Poller::new(PathMapper::new(self.roots(), "fixed_"), converter)
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.temp.path().join(rel)
    }

    /// Write a file, creating parent directories
    pub fn put(&self, rel: &str, content: &str) {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap()
    }

    /// Every file and directory under the temp dir, relative, sorted
    pub fn snapshot(&self) -> Vec<String> {
        let mut entries: Vec<String> = WalkDir::new(self.temp.path())
            .min_depth(1)
            .into_iter()
            .map(|e| e.unwrap())
            .map(|e| {
                let rel = e.path().strip_prefix(self.temp.path()).unwrap().to_string_lossy().into_owned();
                if e.file_type().is_dir() { format!("{}/", rel) } else { rel }
            })
            .collect();
        entries.sort();
        entries
    }

    /// Files only, relative, sorted
    pub fn files(&self) -> Vec<String> {
        self.snapshot().into_iter().filter(|e| !e.ends_with('/')).collect()
    }
}
