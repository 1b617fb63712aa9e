//! ExpoHarvest CLI — trade-show exhibitor acquisition tool.
//!
//! Runs extraction jobs against exhibitor feeds and maintains a local
//! deduplicated exhibitor database per trade show.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
