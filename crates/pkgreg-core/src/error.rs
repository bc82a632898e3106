//! # Error Types -- Collaborator Failures
//!
//! Each collaborator surface has its own error enum so the registry client
//! can wrap them into its typed taxonomy without string matching.

use thiserror::Error;

/// Error decomposing or validating a package identity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The identity has no `<scope>.<name>` form.
    #[error("package identity '{0}' is not of the form <scope>.<name>")]
    NotScoped(String),

    /// The scope component violates the registry naming rules.
    #[error("invalid package scope '{scope}': {reason}")]
    InvalidScope {
        /// The rejected scope.
        scope: String,
        /// Which rule was violated.
        reason: &'static str,
    },

    /// The name component violates the registry naming rules.
    #[error("invalid package name '{name}': {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Which rule was violated.
        reason: &'static str,
    },
}

/// Error turning manifest source text into a [`crate::Manifest`].
///
/// Manifest content is fixed per published version, so none of these are
/// worth retrying.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// The first line lacks a `// swift-tools-version:` declaration.
    #[error("manifest is missing a swift-tools-version declaration")]
    MissingToolsVersion,

    /// The declared tools version predates the supported manifest format.
    #[error("unsupported tools version {0}")]
    UnsupportedToolsVersion(String),

    /// No `Package(` initializer was found.
    #[error("manifest does not declare a Package")]
    MissingPackageDeclaration,

    /// The package initializer has no `name:` argument.
    #[error("package declaration has no name")]
    MissingName,

    /// Bracketed or quoted content was left open.
    #[error("malformed manifest: {0}")]
    Malformed(String),
}

/// Error extracting a source archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The archive bytes could not be read as a zip file.
    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// An entry would be written outside the destination directory.
    #[error("archive entry '{0}' escapes the destination directory")]
    UnsafeEntry(String),

    /// Reading the archive or writing an extracted entry failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
