//! Command line arguments and start-up wiring for the `plinth` binary

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::Parser;
use log::{debug, LevelFilter};

use crate::config::{ConfigManager, RuntimeConfig};
use crate::display::ColourMode;
use crate::logging::{self, LogConfig, LogDestination, LogFormat};

/// Plugin and component lifecycle runtime
#[derive(Parser, Debug)]
#[command(name = "plinth")]
#[command(about = "Discovers plugin packages, drives them through their lifecycle and creates their components")]
#[command(version)]
pub struct Args {
    /// Directory scanned for plugin packages (overrides runtime.plugin-dir)
    #[arg(short = 'p', long, value_name = "DIR")]
    pub plugin_dir: Option<PathBuf>,

    /// Verbose output (debug level logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (error level logging only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug output (trace level logging)
    #[arg(long)]
    pub debug: bool,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log file path for file output
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level for file output (independent of console level)
    #[arg(long, value_name = "LEVEL")]
    pub log_file_level: Option<String>,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Configuration section name
    #[arg(long, value_name = "SECTION")]
    pub config_name: Option<String>,

    /// Print the registered plugins and their states, then shut down
    #[arg(long)]
    pub list_plugins: bool,

    /// Colour output: auto, always or never
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub colour: String,
}

pub fn validate_args(args: &Args) -> Result<()> {
    debug!("Validating CLI argument combinations");

    let log_flags_count = [args.verbose, args.quiet, args.debug].iter().filter(|&&flag| flag).count();
    if log_flags_count > 1 {
        anyhow::bail!("Conflicting log level flags: only one of --verbose, --quiet, or --debug may be specified");
    }

    LogFormat::from_str(&args.log_format).map_err(|e| anyhow::anyhow!(e))?;
    ColourMode::from_str(&args.colour).map_err(|e| anyhow::anyhow!(e))?;

    if let Some(level) = &args.log_file_level {
        logging::parse_log_level(level)?;
        if args.log_file.is_none() {
            anyhow::bail!("--log-file-level requires --log-file to be specified");
        }
    }

    Ok(())
}

pub fn load_configuration(args: &Args) -> Result<ConfigManager> {
    let mut manager = match &args.config_file {
        Some(config_file) => {
            debug!("Loading configuration from explicit file: {}", config_file.display());
            ConfigManager::load_from_file(config_file.clone())?
        }
        None => ConfigManager::load()?,
    };

    if let Some(section_name) = &args.config_name {
        manager.select_section(section_name.clone());
    }

    Ok(manager)
}

/// Logging setup; flags win over the `[logging]` section
pub fn configure_logging(args: &Args, config: &ConfigManager) -> Result<LogConfig> {
    let console_level = if args.debug {
        LevelFilter::Trace
    } else if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Error
    } else {
        config.get_log_level("logging", "console-level")?.unwrap_or(LevelFilter::Info)
    };

    let format = if args.log_format != "text" {
        LogFormat::from_str(&args.log_format).map_err(|e| anyhow::anyhow!(e))?
    } else {
        match config.get_value("logging", "format") {
            Some(format) => LogFormat::from_str(format).map_err(|e| anyhow::anyhow!(e))?,
            None => LogFormat::Text,
        }
    };

    let log_file = args.log_file.clone().or_else(|| config.get_path("logging", "file"));
    let file_level = match &args.log_file_level {
        Some(level) => Some(logging::parse_log_level(level)?),
        None => config.get_log_level("logging", "file-level")?,
    };

    let (destination, file_level) = match log_file {
        Some(path) => (LogDestination::Both(path), Some(file_level.unwrap_or(console_level))),
        None => (LogDestination::Console, None),
    };

    Ok(LogConfig {
        console_level,
        file_level,
        format,
        destination,
    })
}

/// Runtime settings with command line overrides applied
pub fn runtime_config(args: &Args, config: &ConfigManager) -> Result<RuntimeConfig> {
    let mut runtime = config.runtime_config()?;
    if let Some(dir) = &args.plugin_dir {
        runtime.plugin_dir = dir.clone();
    }
    Ok(runtime)
}
