//! barrelfix - crash-safe barrel-distortion correction daemon
//!
//! Watches a source tree for images, runs each one through an external
//! converter, and routes the result into a mirror of the source tree:
//!
//! ```text
//! Wonky/          # dropped in by an upstream producer
//! Inprogress/     # converter output, not yet promoted
//! Fixed/          # finished output, named fixed_<leaf>
//! Problems/       # originals that could not be converted
//! ```
//!
//! The filesystem is the only state. Every step is either an atomic rename,
//! a delete, or idempotent, so the daemon can be killed at any point and
//! resumes correctly on the next sweep.
//!
//! # Example
//!
//! ```ignore
//! use barrelfix::{Config, Daemon};
//!
//! let config = Config::load(None)?;
//! let daemon = Daemon::from_config(&config)?;
//! daemon.run()?;
//! ```

pub mod cli;
pub mod config;
pub mod convert;
pub mod daemon;
pub mod error;
pub mod fsops;
pub mod layout;
pub mod poller;

pub use config::Config;
pub use convert::{CommandConverter, ConversionOutcome, Converter};
pub use daemon::Daemon;
pub use error::{FixerError, Result};
pub use layout::{PathMapper, Roots};
pub use poller::{Poller, SweepReport};
