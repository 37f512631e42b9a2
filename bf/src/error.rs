//! Error types for the fixer pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a sweep
///
/// Expected outcomes (a directory that already exists, a prune that stops at
/// a non-empty directory, a conversion that exits nonzero) are not errors and
/// never show up here.
#[derive(Debug, Error)]
pub enum FixerError {
    #[error("Failed to create directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} exists but is not a directory")]
    NotADirectory { path: PathBuf },

    #[error("Failed to read directory {path}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {from} to {to}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot move {from} to {to}: staging roots must be on the same filesystem as the source root")]
    CrossDevice { from: PathBuf, to: PathBuf },

    #[error("Failed to remove {path}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn converter {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, FixerError>;
