#![warn(clippy::all, clippy::pedantic)]

use anyhow::{Context, Result};
use clap::Parser;
use keepsweep::Config;
use keepsweep::app::dispatch::dispatch;
use keepsweep::cli::{Cli, Commands};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Reports go to stdout; logs stay on stderr so `--json` output is clean.
    let level = if cli.verbose > 0 {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config = match cli.command {
        Commands::Init { .. } => Config::template(cli.config.as_deref())?,
        _ => Config::load(cli.config.as_deref())?,
    };
    dispatch(cli, config)
}
