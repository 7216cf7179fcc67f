mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use audiobook_meta::config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = Config::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract {
            path,
            json,
            offline,
        } => {
            commands::extract::run(&config, &path, json, offline, cli.quiet)?;
        }
        Commands::Validate {
            path,
            tracker,
            offline,
            json,
        } => {
            commands::validate::run(&config, &path, tracker.as_deref(), offline, json)?;
        }
        Commands::Map {
            path,
            tracker,
            offline,
        } => {
            commands::map::run(&config, &path, &tracker, offline)?;
        }
        Commands::Precedence => {
            commands::precedence::run(&config)?;
        }
    }

    Ok(())
}

/// Logs go to stderr so `--json` output stays clean. `RUST_LOG` wins over
/// the verbosity flags.
fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
