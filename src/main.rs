use std::process;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error};

use plinth::cli::{self, Args};
use plinth::display::{self, ColourManager, ColourMode};
use plinth::errors::install_panic_hook;
use plinth::logging;
use plinth::runtime::Runtime;

fn main() {
    if let Err(e) = run() {
        error!("Application error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    cli::validate_args(&args)?;

    let config_manager = cli::load_configuration(&args)?;
    let log_config = cli::configure_logging(&args, &config_manager)?;
    logging::init_logger(log_config)?;
    if let Some(path) = config_manager.config_file_path() {
        debug!("Configuration loaded from {}", path.display());
    }

    let colours = ColourManager::new(ColourMode::from_str(&args.colour).map_err(|e| anyhow::anyhow!(e))?);
    let runtime_config = cli::runtime_config(&args, &config_manager)?;

    let runtime = Runtime::builder()
        .config(runtime_config)
        .build()
        .context("Failed to build runtime")?;
    install_panic_hook(Arc::clone(runtime.error_handlers()));

    let report = runtime.start().context("Runtime startup failed")?;

    println!("{}", colours.highlight("Plugins"));
    print!("{}", display::plugin_table(runtime.loader(), &colours));

    if !args.list_plugins {
        println!();
        println!("{}", colours.highlight("Components"));
        print!("{}", display::component_table(runtime.components(), &colours));

        let failures = report.component_failures();
        if !failures.is_empty() {
            println!();
            println!("{}", colours.error("Component failures"));
            let outcomes: Vec<_> = failures.into_iter().cloned().collect();
            print!("{}", display::creation_failures(&outcomes, &colours));
        }
        for name in report.plugin_failures() {
            println!("{}", colours.warning(&format!("Plugin '{}' did not reach Loaded", name)));
        }
    }

    let shutdown = runtime.shutdown().context("Runtime shutdown failed")?;
    if !shutdown.drained {
        eprintln!("{}", colours.warning("Lifecycle events were still queued at shutdown"));
    }
    Ok(())
}
