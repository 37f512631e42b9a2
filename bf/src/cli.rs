//! CLI argument parsing for barrelfix
//!
//! Every flag is optional; `bf` on its own runs the daemon in the current
//! directory with the default layout.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bf")]
#[command(author, version, about = "Barrel-distortion correction daemon", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Directory the source and staging roots are relative to
    #[arg(short = 'C', long)]
    pub workdir: Option<PathBuf>,

    /// Run a single sweep and exit
    #[arg(long)]
    pub once: bool,
}
