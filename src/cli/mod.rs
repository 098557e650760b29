//! Command-line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "forager", version, about = "Autonomous task-execution agent")]
pub struct Cli {
    /// Path to a configuration file (overrides the .forager/ hierarchy).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the agent until interrupted.
    Run,
    /// Print the effective merged configuration.
    Config,
}
