//! # pkgreg-cli -- Command Line for the Registry Client
//!
//! Provides the `pkgreg` command-line interface over
//! [`pkgreg_client::RegistryClient`].
//!
//! ## Subcommands
//!
//! - `pkgreg versions <identity>`: available versions.
//! - `pkgreg releases <identity>`: all releases, withdrawn ones marked.
//! - `pkgreg manifest <identity> <version>`: loaded manifest as JSON.
//! - `pkgreg checksum <identity> <version>`: registry source archive checksum.
//! - `pkgreg download <identity> <version> --output <file>`: verified download.
//! - `pkgreg lookup <url>`: identities published from a source URL.
//!
//! ## Registry Selection
//!
//! `--config registries.json` loads a registries document; otherwise the
//! `PKGREG_*` environment variables apply. `--registry <url>` overrides the
//! default registry either way.

pub mod commands;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use pkgreg_client::{ClientConfig, Registry, RegistryClient, RegistryConfiguration};

use crate::commands::Command;

/// Package registry client.
#[derive(Parser, Debug)]
#[command(name = "pkgreg", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Path to a registries.json configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Default registry URL, overriding configuration.
    #[arg(long, global = true, value_name = "URL")]
    pub registry: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Log filter for the `-v` count.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Build the client from `--config`, `--registry` and the environment.
pub fn build_client(config: Option<&Path>, registry: Option<&str>) -> Result<RegistryClient> {
    let mut client_config = ClientConfig::from_env().context("invalid environment configuration")?;

    if let Some(path) = config {
        client_config.registries = RegistryConfiguration::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
    }
    if let Some(url) = registry {
        client_config.registries.default_registry =
            Some(Registry::parse(url).with_context(|| format!("invalid registry URL {url}"))?);
    }

    tracing::debug!(registries = ?client_config.registries, "registry configuration");
    RegistryClient::new(client_config).context("failed to create registry client")
}
