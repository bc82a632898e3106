//! Content negotiation with the registry.
//!
//! Requests name the representation they want in `Accept`; responses must
//! answer with the matching `Content-Type` and, when they declare one, API
//! version `1` in `Content-Version`.

use crate::error::ResponseFault;
use crate::transport::HttpResponse;

/// Registry API version this client speaks.
pub const API_VERSION: &str = "1";

/// The representations a registry serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// Release listings, release metadata, identifier lookups.
    Json,
    /// `Package.swift` manifest text.
    Swift,
    /// Source archives.
    Zip,
}

impl MediaType {
    fn suffix(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Swift => "swift",
            Self::Zip => "zip",
        }
    }

    /// `Accept` header value, e.g. `application/vnd.swift.registry.v1+json`.
    pub fn accept_header(self, namespace: &str) -> String {
        format!(
            "application/vnd.{namespace}.registry.v{API_VERSION}+{}",
            self.suffix()
        )
    }

    /// `Content-Type` the registry answers with.
    pub fn expected_content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Swift => "text/x-swift",
            Self::Zip => "application/zip",
        }
    }

    /// Validate the negotiated headers of `response`.
    pub fn check_response(
        self,
        namespace: &str,
        response: &HttpResponse,
    ) -> Result<(), ResponseFault> {
        let expected = self.expected_content_type();
        let content_type = response.header("content-type");
        let matches = content_type.is_some_and(|actual| {
            let essence = actual
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            essence == expected || essence == self.accept_header(namespace)
        });
        if !matches {
            return Err(ResponseFault::UnexpectedContentType {
                expected,
                actual: content_type.map(str::to_string),
            });
        }

        if let Some(version) = response.header("content-version") {
            if version.trim() != API_VERSION {
                return Err(ResponseFault::UnsupportedContentVersion(version.to_string()));
            }
        }

        if let Some(length) = response.header("content-length") {
            let actual = response.body.len() as u64;
            match length.trim().parse::<u64>() {
                Ok(declared) if declared == actual => {}
                Ok(declared) => {
                    return Err(ResponseFault::ContentLengthMismatch { declared, actual })
                }
                Err(_) => return Err(ResponseFault::InvalidContentLength(length.to_string())),
            }
        }

        Ok(())
    }
}
