//! Invoking the external distortion-correction command

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::config::ConverterConfig;
use crate::error::{FixerError, Result};

/// Longest stderr excerpt carried in a failure detail
const MAX_DETAIL_LEN: usize = 400;

/// Result of one conversion attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// The converter exited zero; the destination file is complete
    Success,
    /// The converter ran but did not succeed; the destination is untrusted
    Failure(String),
}

/// Something that turns a source file into a corrected destination file
pub trait Converter {
    /// Convert `source` into `dest`, blocking until done.
    ///
    /// `Err` is reserved for failing to run the converter at all.
    fn convert(&self, source: &Path, dest: &Path) -> Result<ConversionOutcome>;
}

/// Runs `<program> <source> <args...> <dest>` as a child process
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
}

impl CommandConverter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    fn command(&self, source: &Path, dest: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(source)
            .args(&self.args)
            .arg(dest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Converter for CommandConverter {
    fn convert(&self, source: &Path, dest: &Path) -> Result<ConversionOutcome> {
        debug!(program = %self.program, ?source, ?dest, "CommandConverter::convert: called");
        let output = self
            .command(source, dest)
            .output()
            .map_err(|source| FixerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(ConversionOutcome::Success);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let detail = if stderr.is_empty() {
            output.status.to_string()
        } else {
            format!("{}: {}", output.status, tail(stderr, MAX_DETAIL_LEN))
        };
        debug!(%detail, "CommandConverter::convert: failed");
        Ok(ConversionOutcome::Failure(detail))
    }
}

/// Last `max` bytes of `s`, cut on a char boundary
fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
