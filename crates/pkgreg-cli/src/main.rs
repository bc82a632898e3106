//! # pkgreg CLI entry point
//!
//! Parses command-line arguments, installs logging and dispatches to the
//! subcommand handlers.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pkgreg_cli::commands::run;
use pkgreg_cli::{build_client, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    tracing::debug!("pkgreg v{} starting", env!("CARGO_PKG_VERSION"));

    let result = match build_client(cli.config.as_deref(), cli.registry.as_deref()) {
        Ok(client) => run(&cli.command, &client).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
