//! # Registry Subcommands
//!
//! Each subcommand maps onto one [`RegistryClient`] operation and prints its
//! result to stdout. Handlers return the process exit code.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use url::Url;

use pkgreg_client::{RegistryClient, ReleaseStatus};
use pkgreg_core::{LocalFileSystem, PackageIdentity, Sha256Checksum, SourceManifestLoader, Version};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available versions of a package.
    Versions {
        /// Package identity, e.g. mona.LinkedList.
        identity: String,
    },

    /// List all releases, including withdrawn ones.
    Releases { identity: String },

    /// Fetch and load a release's manifest, printed as JSON.
    Manifest {
        identity: String,
        version: String,
        /// Request the manifest variant for this language version.
        #[arg(long, value_name = "VERSION")]
        swift_version: Option<String>,
    },

    /// Print the registry's source archive checksum for a release.
    Checksum { identity: String, version: String },

    /// Download and verify a release's source archive.
    Download {
        identity: String,
        version: String,
        /// Destination file for the verified archive.
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
        /// Expected SHA-256 checksum. Defaults to the registry's.
        #[arg(long)]
        checksum: Option<String>,
        /// Also extract the archive into this directory.
        #[arg(long, value_name = "DIR")]
        extract: Option<PathBuf>,
    },

    /// Find registry identities for a source repository URL.
    Lookup { url: String },
}

/// Execute a subcommand.
pub async fn run(command: &Command, client: &RegistryClient) -> Result<u8> {
    match command {
        Command::Versions { identity } => {
            let versions = client.fetch_versions(&parse_identity(identity)).await?;
            for version in versions {
                println!("{version}");
            }
            Ok(0)
        }

        Command::Releases { identity } => {
            let releases = client.fetch_releases(&parse_identity(identity)).await?;
            for release in releases {
                match release.status {
                    ReleaseStatus::Available { .. } => println!("{}", release.version),
                    ReleaseStatus::Withdrawn { problem } => println!(
                        "{} (withdrawn: {})",
                        release.version,
                        problem
                            .detail
                            .or(problem.title)
                            .unwrap_or_else(|| "no reason given".to_string())
                    ),
                }
            }
            Ok(0)
        }

        Command::Manifest {
            identity,
            version,
            swift_version,
        } => {
            let manifest = client
                .fetch_manifest(
                    &parse_identity(identity),
                    &parse_version(version)?,
                    &SourceManifestLoader,
                    swift_version.as_deref(),
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&manifest)?);
            Ok(0)
        }

        Command::Checksum { identity, version } => {
            let checksum = client
                .fetch_source_archive_checksum(&parse_identity(identity), &parse_version(version)?)
                .await?;
            println!("{checksum}");
            Ok(0)
        }

        Command::Download {
            identity,
            version,
            output,
            checksum,
            extract,
        } => {
            let stored = client
                .download_source_archive(
                    &parse_identity(identity),
                    &parse_version(version)?,
                    &LocalFileSystem,
                    output,
                    checksum.as_deref(),
                    &Sha256Checksum,
                )
                .await?;
            println!("OK: verified {}", stored.display());

            if let Some(directory) = extract {
                client
                    .extract_source_archive(&LocalFileSystem, &stored, directory)
                    .await?;
                println!("OK: extracted to {}", directory.display());
            }
            Ok(0)
        }

        Command::Lookup { url } => {
            let source = Url::parse(url).with_context(|| format!("invalid URL: {url}"))?;
            let identities = client.lookup_identities(&source).await?;
            if identities.is_empty() {
                tracing::info!(%source, "no identities found");
            }
            for identity in identities {
                println!("{identity}");
            }
            Ok(0)
        }
    }
}

fn parse_identity(raw: &str) -> PackageIdentity {
    PackageIdentity::plain(raw)
}

fn parse_version(raw: &str) -> Result<Version> {
    Version::parse(raw).with_context(|| format!("invalid version: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cli;
    use clap::Parser;

    #[test]
    fn download_arguments() {
        let cli = Cli::try_parse_from([
            "pkgreg",
            "download",
            "mona.LinkedList",
            "1.1.1",
            "--output",
            "LinkedList-1.1.1.zip",
            "--extract",
            "checkout",
        ])
        .unwrap();
        match cli.command {
            Command::Download {
                identity,
                version,
                output,
                checksum,
                extract,
            } => {
                assert_eq!(identity, "mona.LinkedList");
                assert_eq!(version, "1.1.1");
                assert_eq!(output, PathBuf::from("LinkedList-1.1.1.zip"));
                assert_eq!(checksum, None);
                assert_eq!(extract, Some(PathBuf::from("checkout")));
            }
            other => panic!("expected download, got {other:?}"),
        }
    }

    #[test]
    fn download_requires_output() {
        assert!(Cli::try_parse_from(["pkgreg", "download", "mona.LinkedList", "1.1.1"]).is_err());
    }

    #[test]
    fn manifest_swift_version_flag() {
        let cli = Cli::try_parse_from([
            "pkgreg",
            "manifest",
            "mona.LinkedList",
            "1.1.1",
            "--swift-version",
            "5.0",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Manifest { swift_version: Some(ref v), .. } if v == "5.0"
        ));
    }

    #[test]
    fn invalid_version_is_an_error() {
        assert!(parse_version("1.1").is_err());
        assert_eq!(parse_version("1.1.1").unwrap(), Version::new(1, 1, 1));
    }
}
