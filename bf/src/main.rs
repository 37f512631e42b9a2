use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use barrelfix::Daemon;
use barrelfix::cli::Cli;
use barrelfix::config::Config;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    // One line per event on stdout for the supervisor's log collector
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Resolve the config path before changing directory
    let config_path: Option<PathBuf> = cli
        .config
        .as_deref()
        .map(std::path::absolute)
        .transpose()
        .context("Failed to resolve config path")?;

    if let Some(dir) = &cli.workdir {
        std::env::set_current_dir(dir).context(format!("Failed to change directory to {}", dir.display()))?;
    }

    let config_log_level = Config::load_log_level(config_path.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(config_path.as_ref()).context("Failed to load configuration")?;
    let daemon = Daemon::from_config(&config).context("Invalid configuration")?;

    if cli.once {
        let report = daemon.run_once().context("Sweep failed")?;
        info!(
            converted = report.converted,
            failed = report.failed,
            duplicates = report.duplicates,
            promoted = report.promoted,
            "Single sweep finished"
        );
        return Ok(());
    }

    daemon.run().context("Sweep failed")
}
