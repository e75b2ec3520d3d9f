//! Explainer: answers programming questions with a structured explanation,
//! a runnable example and cited sources.
//!
//! Runs the multi-agent pipeline behind an HTTP API or straight from the
//! command line.

mod commands;
mod http;

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
