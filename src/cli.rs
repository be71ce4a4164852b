//! CLI command definitions for confyg-api
//!
//! The bootstrap inputs (which document, which environment) are the only
//! settings not read through the configuration resolver.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Base document used when neither `--config` nor `CONFIG_PATH` is given.
pub const DEFAULT_CONFIG_PATH: &str = "/app/conf/confyg.yaml";

/// Confyg API service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the base configuration document
    #[arg(short, long, env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Environment overlay to apply (e.g. staging loads confyg.staging.yaml)
    #[arg(short, long, env = "APP_SERVER_ENV", default_value = "", global = true)]
    pub env: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start the HTTP service (default if no subcommand given)
    Serve,

    /// Print the resolved configuration with the source of each value
    Config,
}

impl Cli {
    /// The subcommand to run, `serve` when none was given.
    pub fn subcommand(&self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }
}
