//! `geoshare` command line: detect locations and re-render them in other formats.

mod cli;
mod commands;

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use geoshare_core::GeoshareConfig;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = load_config(&cli)?;
    match cli.command {
        Command::Detect(args) => commands::detect(&config, args).await,
        Command::Link(args) => commands::link(&config, &args),
        Command::Text(args) => commands::text(&config, &args),
        Command::Services => commands::services(&config),
        Command::StaticMap(args) => commands::static_map(&config, args).await,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    // logs go to stderr, stdout carries the command output
    if json {
        registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn load_config(cli: &Cli) -> Result<GeoshareConfig> {
    let config = match &cli.config {
        Some(path) => GeoshareConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => {
            let mut config = GeoshareConfig::default();
            config.apply_env().context("invalid GEOSHARE_* environment")?;
            config
        }
    };
    Ok(config)
}
