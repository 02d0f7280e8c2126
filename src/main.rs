//! Meter Tracker - Main entry point
//!
//! Command-line front end for recording utility meter readings and
//! reviewing consumption against period limits.

mod cli;

use clap::Parser;
use cli::Cli;
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    cli.run()
}
