//! The polling loop
//!
//! Sweeps run strictly one after another on the calling thread. A failed
//! sweep ends the loop with its error; restarting is left to whatever
//! supervises the process.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::Config;
use crate::convert::{CommandConverter, Converter};
use crate::error::{FixerError, Result};
use crate::fsops::{ensure_dir, same_filesystem};
use crate::poller::{Poller, SweepReport};

/// Runs [`Poller::sweep`] on a fixed interval
pub struct Daemon<C> {
    poller: Poller<C>,
    poll_interval: Duration,
}

impl Daemon<CommandConverter> {
    /// Build a daemon that shells out to the configured converter
    pub fn from_config(config: &Config) -> Result<Self> {
        debug!(?config, "Daemon::from_config: called");
        config.validate()?;
        let converter = CommandConverter::from_config(&config.converter);
        Ok(Self::new(Poller::new(config.mapper(), converter), config.poll_interval()))
    }
}

impl<C: Converter> Daemon<C> {
    pub fn new(poller: Poller<C>, poll_interval: Duration) -> Self {
        Self { poller, poll_interval }
    }

    pub fn poller(&self) -> &Poller<C> {
        &self.poller
    }

    /// Create the four roots and check they can be renamed between
    pub fn prepare(&self) -> Result<()> {
        let roots = self.poller.mapper().roots();
        for root in roots.all() {
            ensure_dir(root)?;
        }

        for staging in [&roots.in_progress, &roots.problems, &roots.fixed] {
            if !same_filesystem(&roots.source, staging)? {
                return Err(FixerError::CrossDevice {
                    from: roots.source.clone(),
                    to: staging.clone(),
                });
            }
        }
        Ok(())
    }

    /// Prepare and run a single sweep
    pub fn run_once(&self) -> Result<SweepReport> {
        self.prepare()?;
        self.poller.sweep()
    }

    /// Sweep forever, sleeping between sweeps
    pub fn run(&self) -> Result<()> {
        self.run_while(|_| true)
    }

    /// Sweep until `keep_going` returns false for a finished sweep's report
    pub fn run_while<F>(&self, mut keep_going: F) -> Result<()>
    where
        F: FnMut(&SweepReport) -> bool,
    {
        info!("Starting up.");
        self.prepare()?;

        loop {
            let report = self.poller.sweep()?;
            if !report.is_idle() {
                info!(
                    converted = report.converted,
                    quarantined = report.quarantined(),
                    promoted = report.promoted,
                    "Sweep finished"
                );
            }
            if !keep_going(&report) {
                debug!("Daemon::run_while: stopping");
                return Ok(());
            }
            std::thread::sleep(self.poll_interval);
        }
    }
}
