use anyhow::{Context, Result};
use clap::Parser;

mod cli;
mod clock;
mod config;
mod database;
mod error;
mod monitoring;
mod monitors;
mod pool;
#[cfg(test)]
mod testing;
mod validation;

use cli::Cli;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = Config::from_config(cli.config.as_ref()).context("Failed to load config")?;
    config.apply_env_overrides();

    logger::init(&config.logging).context("Failed to initialize logging")?;

    cli::execute(cli, config).await
}
