//! Confyg API service
//!
//! Resolves configuration, then builds the logger, the database pool and
//! the HTTP service from it.

use anyhow::{Context, Result};
use clap::Parser;
use confyg_api::cli::{Cli, Command};
use confyg_api::config::ConfigResolver;
use confyg_api::db::Database;
use confyg_api::logging;
use confyg_api::server::{self, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // No logger exists until the configuration says how to build one.
    let resolution = match ConfigResolver::new(&cli.config, cli.env.as_str()).resolve_with_report() {
        Ok(resolution) => resolution,
        Err(e) => {
            eprintln!("load config: {e}");
            std::process::exit(1);
        }
    };

    if cli.subcommand() == Command::Config {
        for warning in &resolution.report.warnings {
            eprintln!("warning: {warning}");
        }
        print!("{}", resolution.render());
        return Ok(());
    }

    let config = resolution.config;
    logging::init(&config.log).context("Failed to initialize logging")?;
    logging::log_resolution(&resolution.report);

    let db = Database::open(&config.database).context("Failed to open database")?;

    info!(
        env = %config.server.env,
        port = config.server.port,
        version = env!("CARGO_PKG_VERSION"),
        "Starting confyg-api"
    );

    server::serve(AppState::new(config, db)).await
}
