//! # pkgreg-core -- Foundational Types for the Registry Client
//!
//! Everything the registry client consumes as a collaborator lives here,
//! each behind a narrow trait so the client can be driven by deterministic
//! fakes in tests:
//!
//! - **Identity**: [`PackageIdentity`] with its `(scope, name)` decomposition,
//!   and the [`IdentityResolver`] that maps source URLs and registry
//!   identifiers onto identities.
//! - **Checksums**: the pluggable [`ChecksumAlgorithm`], rendered as
//!   lowercase hex.
//! - **File systems**: the [`FileSystem`] destination for verified bytes,
//!   with in-memory and local-disk implementations.
//! - **Archives**: the [`Archiver`] that extracts zip source archives.
//! - **Manifests**: the structured [`Manifest`] model and the
//!   [`ManifestLoader`] that produces it from `Package.swift` text.
//!
//! ## Crate Policy
//!
//! This crate performs no network I/O. Request construction, content
//! negotiation, and checksum reconciliation belong to `pkgreg-client`.

pub mod archive;
pub mod checksum;
pub mod error;
pub mod fs;
pub mod identity;
pub mod manifest;

pub use archive::{Archiver, ZipArchiver};
pub use checksum::{to_hex, ChecksumAlgorithm, Sha256Checksum};
pub use error::{ArchiveError, IdentityError, ManifestError};
pub use fs::{FileSystem, InMemoryFileSystem, LocalFileSystem};
pub use identity::{DefaultIdentityResolver, IdentityResolver, Name, PackageIdentity, Scope};
pub use manifest::{
    LibraryKind, Manifest, ManifestLoader, Product, ProductKind, SourceManifestLoader, Target,
    TargetKind,
};

/// Semantic version of a package release.
pub use semver::Version;
