mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use tabseek_core::TabSeekError;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::cli::Cli;

const LOG_ENV: &str = "TABSEEK_LOG";

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    let operation = cli.command.name();
    let result = commands::run_from_root(&cli.root, cli.session.as_deref(), cli.command).await;
    if let Err(err) = &result
        && let Some(core) = err.downcast_ref::<TabSeekError>()
    {
        eprintln!("{}", serde_json::to_string(&core.to_payload(operation))?);
    }
    result
}
