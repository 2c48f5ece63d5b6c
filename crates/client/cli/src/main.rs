//! Leveling command line entry point.
//!
//! Composition root: loads `.env`, installs logging, reads `leveling.toml`
//! from the data directory, builds the service (running the XP migration
//! first when enabled) and executes one command.
//!
//! # Examples
//!
//! ```bash
//! leveling add-xp d3804858-4bb8-4026-ae21-386255ed467d 250
//! LEVELING_FORMULA_TYPE=LINEAR leveling migrate
//! RUST_LOG=debug leveling --data-dir ./save demo
//! ```
mod cli;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use leveling_bootstrap::{LevelingBuilder, LevelingConfig};

use cli::Cli;

fn main() -> Result<()> {
    // Load .env first so clap sees LEVELING_DATA_DIR from it
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = logging::setup_logging(cli.log_file)?;

    let config = LevelingConfig::load_or_create(&cli.data_dir)?.apply_env_overrides();
    tracing::debug!(data_dir = %cli.data_dir.display(), ?config, "Configuration loaded");

    let setup = LevelingBuilder::new(config, &cli.data_dir).build()?;
    commands::register_log_listeners(&setup.service);

    let result = commands::execute(&setup, cli.command);
    let closed = setup.shutdown();
    result.and(closed)
}
