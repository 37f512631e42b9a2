//! barrelfix configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::FixerError;
use crate::layout::{PathMapper, Roots};

/// Main barrelfix configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source and staging directories
    pub paths: PathsConfig,

    /// External conversion command
    pub converter: ConverterConfig,

    /// Seconds to sleep between sweeps
    #[serde(rename = "poll-interval-secs")]
    pub poll_interval_secs: u64,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            converter: ConverterConfig::default(),
            poll_interval_secs: 5,
            log_level: None,
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, it must load
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .barrelfix.yml
        let local_config = PathBuf::from(".barrelfix.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/barrelfix/barrelfix.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("barrelfix").join("barrelfix.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Peek at the log level before logging is set up.
    ///
    /// Errors are swallowed here; [`Config::load`] reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".barrelfix.yml")];
                if let Some(config_dir) = dirs::config_dir() {
                    paths.push(config_dir.join("barrelfix").join("barrelfix.yml"));
                }
                paths
            }
        };

        candidates
            .iter()
            .find(|path| path.exists())
            .and_then(|path| Self::load_from_file(path).ok())
            .and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Check the configuration before the first sweep
    pub fn validate(&self) -> crate::Result<()> {
        let prefix = &self.paths.marker_prefix;
        if prefix.is_empty() {
            return Err(FixerError::InvalidConfig("marker-prefix must not be empty".to_string()));
        }
        if prefix.contains('/') || prefix.contains(std::path::MAIN_SEPARATOR) || prefix == "." || prefix == ".." {
            return Err(FixerError::InvalidConfig(format!(
                "marker-prefix '{}' must be a plain filename fragment",
                prefix
            )));
        }

        if self.converter.program.trim().is_empty() {
            return Err(FixerError::InvalidConfig("converter program must not be empty".to_string()));
        }

        if self.poll_interval_secs == 0 {
            return Err(FixerError::InvalidConfig(
                "poll-interval-secs must be at least 1".to_string(),
            ));
        }

        // Compared as absolute paths so `Wonky` and `/cwd/Wonky/Fixed` are seen to overlap
        let roots = self.roots();
        let named = [
            ("source", absolute_root(&roots.source)?),
            ("in-progress", absolute_root(&roots.in_progress)?),
            ("problems", absolute_root(&roots.problems)?),
            ("fixed", absolute_root(&roots.fixed)?),
        ];
        for (i, (name_a, a)) in named.iter().enumerate() {
            for (name_b, b) in named.iter().skip(i + 1) {
                if a.starts_with(b) || b.starts_with(a) {
                    return Err(FixerError::InvalidConfig(format!(
                        "{} directory {} and {} directory {} overlap",
                        name_a,
                        a.display(),
                        name_b,
                        b.display()
                    )));
                }
            }
        }

        Ok(())
    }

    /// Sleep between sweeps as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn roots(&self) -> Roots {
        Roots {
            source: self.paths.source.clone(),
            in_progress: self.paths.in_progress.clone(),
            problems: self.paths.problems.clone(),
            fixed: self.paths.fixed.clone(),
        }
    }

    pub fn mapper(&self) -> PathMapper {
        PathMapper::new(self.roots(), self.paths.marker_prefix.clone())
    }
}

fn absolute_root(path: &Path) -> crate::Result<PathBuf> {
    std::path::absolute(path)
        .map_err(|e| FixerError::InvalidConfig(format!("cannot resolve directory '{}': {}", path.display(), e)))
}

/// Source and staging directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory an upstream producer drops images into
    pub source: PathBuf,

    /// Conversion outputs awaiting promotion
    #[serde(rename = "in-progress")]
    pub in_progress: PathBuf,

    /// Source images that could not be converted
    pub problems: PathBuf,

    /// Promoted conversion outputs
    pub fixed: PathBuf,

    /// Prefix for converted file names
    #[serde(rename = "marker-prefix")]
    pub marker_prefix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("Wonky"),
            in_progress: PathBuf::from("Inprogress"),
            problems: PathBuf::from("Problems"),
            fixed: PathBuf::from("Fixed"),
            marker_prefix: "fixed_".to_string(),
        }
    }
}

/// External converter configuration
///
/// Invoked as `<program> <source> <args...> <dest>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub program: String,

    /// Arguments placed between the source and destination paths
    pub args: Vec<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: "convert".to_string(),
            args: vec![
                "-distort".to_string(),
                "barrel".to_string(),
                "0.0132 -0.07765 0.14683".to_string(),
            ],
        }
    }
}
