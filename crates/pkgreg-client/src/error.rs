//! Registry client error types.
//!
//! Every operation returns [`RegistryError`]. Callers branch on the variant;
//! the `Display` text is for humans only.

use std::path::PathBuf;

use pkgreg_core::{ArchiveError, IdentityError, ManifestError};

use crate::config::ConfigError;

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The identity does not decompose into a valid scope and name.
    #[error("invalid package identity: {0}")]
    InvalidIdentity(#[from] IdentityError),

    /// Neither a scoped nor a default registry is configured.
    #[error("no registry configured for scope '{scope}'")]
    NoRegistryConfigured { scope: String },

    /// Invalid or insecure registry configuration.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The request failed in transport or the registry answered with an
    /// unexpected status.
    #[error("registry request to {endpoint} failed{}: {detail}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    RegistryCommunication {
        endpoint: String,
        status: Option<u16>,
        detail: String,
    },

    /// The registry has no manifest for this release.
    #[error("manifest not found at {endpoint}")]
    ManifestNotFound { endpoint: String },

    /// The manifest text was retrieved but could not be loaded.
    #[error("failed to load manifest: {0}")]
    ManifestParsing(#[from] ManifestError),

    /// Release metadata lists no source archive with a checksum.
    #[error("registry reports no source archive checksum for {identity} {version}")]
    ChecksumUnavailable { identity: String, version: String },

    /// Downloaded bytes do not hash to the expected checksum.
    #[error("checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// The response violates the registry protocol.
    #[error("malformed response from {endpoint}: {fault}")]
    MalformedRegistryResponse {
        endpoint: String,
        fault: ResponseFault,
    },

    /// Writing verified bytes to the destination failed.
    #[error("failed to write {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Extracting a verified archive failed.
    #[error("failed to extract source archive: {0}")]
    Archive(#[from] ArchiveError),
}

/// Why a registry response was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponseFault {
    #[error("expected content type {expected}, got {}", .actual.as_deref().unwrap_or("none"))]
    UnexpectedContentType {
        expected: &'static str,
        actual: Option<String>,
    },

    #[error("unsupported Content-Version {0}")]
    UnsupportedContentVersion(String),

    #[error("Content-Length {declared} does not match body length {actual}")]
    ContentLengthMismatch { declared: u64, actual: u64 },

    #[error("invalid Content-Length {0:?}")]
    InvalidContentLength(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("body is not valid UTF-8")]
    InvalidUtf8,

    #[error("release lists {0} source archives")]
    DuplicateSourceArchive(usize),

    #[error("invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },
}

impl RegistryError {
    pub(crate) fn malformed(endpoint: &str, fault: ResponseFault) -> Self {
        Self::MalformedRegistryResponse {
            endpoint: endpoint.to_string(),
            fault,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn communication_error_mentions_status() {
        let err = RegistryError::RegistryCommunication {
            endpoint: "https://packages.example.com/mona/linkedlist".into(),
            status: Some(500),
            detail: "Internal Server Error".into(),
        };
        let text = err.to_string();
        assert!(text.contains("status 500"), "{text}");
    }

    #[test]
    fn communication_error_without_status() {
        let err = RegistryError::RegistryCommunication {
            endpoint: "https://packages.example.com".into(),
            status: None,
            detail: "connection refused".into(),
        };
        assert!(!err.to_string().contains("status"));
    }

    #[test]
    fn identity_errors_convert() {
        let err: RegistryError = IdentityError::NotScoped("linkedlist".into()).into();
        assert!(matches!(err, RegistryError::InvalidIdentity(_)));
    }

    #[test]
    fn missing_content_type_is_described() {
        let fault = ResponseFault::UnexpectedContentType {
            expected: "application/json",
            actual: None,
        };
        assert_eq!(
            fault.to_string(),
            "expected content type application/json, got none"
        );
    }
}
