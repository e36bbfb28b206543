use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use tl_cli::commands::{blocks, entries, report, status, util};
use tl_cli::{Cli, Commands, Config};
use tl_core::Granularity;

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut stdout = io::stdout().lock();

    match &cli.command {
        Some(Commands::Status) => {
            let config = load_config(cli.config.as_deref())?;
            status::run(&mut stdout, &config.sources())?;
        }
        Some(Commands::Report {
            period,
            blocks,
            json,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let range = util::resolve_range(period, Utc::now())?;
            let (timeline, pipeline) = util::load_timeline(&config, &range)?;
            let granularity = if *blocks {
                Granularity::Blocks
            } else {
                Granularity::Sessions
            };
            report::run(&mut stdout, &timeline, &pipeline, &range, granularity, *json)?;
        }
        Some(Commands::Blocks {
            period,
            gap_threshold,
            json,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let range = util::resolve_range(period, Utc::now())?;
            let (timeline, _pipeline) = util::load_timeline(&config, &range)?;
            blocks::run(&mut stdout, &timeline, &range, *gap_threshold, *json)?;
        }
        Some(Commands::Entries { period, json }) => {
            let config = load_config(cli.config.as_deref())?;
            let range = util::resolve_range(period, Utc::now())?;
            let (timeline, _pipeline) = util::load_timeline(&config, &range)?;
            entries::run(&mut stdout, &timeline, &range, *json)?;
        }
        None => {
            Cli::command().print_help()?;
        }
    }

    Ok(())
}
