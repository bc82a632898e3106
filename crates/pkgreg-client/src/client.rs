//! # Registry Client -- Verified Access to a Package Registry
//!
//! [`RegistryClient`] is the trust boundary between dependency resolution
//! and an untrusted registry. Every operation follows the same shape:
//!
//! 1. Decompose the package identity into `(scope, name)`.
//! 2. Route the scope to a registry (scoped override, else default).
//! 3. Issue a content-negotiated `GET` through the resilient transport.
//! 4. Validate status, `Content-Type`, `Content-Version` and
//!    `Content-Length`, then decode the body.
//!
//! ## Archive Integrity
//!
//! Source archives are buffered in memory and hashed before anything is
//! written. When the caller supplies no checksum, the registry's release
//! metadata provides one; a download is never accepted without an expected
//! checksum. The `Digest` response header is logged but never trusted.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pkgreg_core::{
    Archiver, ChecksumAlgorithm, DefaultIdentityResolver, FileSystem, IdentityResolver, Manifest,
    ManifestLoader, PackageIdentity, Scope, Version, ZipArchiver,
};
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::{IdentifiersDocument, Problem, Release, ReleaseMetadata, ReleasesDocument};
use crate::config::{
    ClientConfig, ConfigError, Registry, RegistryConfiguration, DEFAULT_REGISTRY_KEY,
};
use crate::error::{RegistryError, ResponseFault};
use crate::negotiation::MediaType;
use crate::resilience::ResilientTransport;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

/// Longest response body excerpt carried in an error.
const MAX_ERROR_DETAIL: usize = 256;

/// Client for one registry configuration.
///
/// Cheap to share: configuration is immutable and collaborators are held
/// behind `Arc`, so concurrent calls are independent.
#[derive(Clone)]
pub struct RegistryClient {
    configuration: RegistryConfiguration,
    namespace: String,
    transport: Arc<dyn HttpTransport>,
    identity_resolver: Arc<dyn IdentityResolver>,
    archiver: Arc<dyn Archiver>,
}

impl std::fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClient")
            .field("configuration", &self.configuration)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl RegistryClient {
    /// Create a client backed by `reqwest`.
    pub fn new(config: ClientConfig) -> Result<Self, RegistryError> {
        let http = ReqwestTransport::new(Duration::from_secs(config.timeout_secs), &config.user_agent)
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Self::with_transport(config, http)
    }

    /// Create a client over a custom transport. The configured retry and
    /// circuit breaker strategies still apply.
    pub fn with_transport<T>(config: ClientConfig, transport: T) -> Result<Self, RegistryError>
    where
        T: HttpTransport + 'static,
    {
        config.registries.validate()?;
        let transport = ResilientTransport::new(transport, config.retry, config.circuit_breaker);
        Ok(Self {
            configuration: config.registries,
            namespace: config.api_namespace,
            transport: Arc::new(transport),
            identity_resolver: Arc::new(DefaultIdentityResolver),
            archiver: Arc::new(ZipArchiver),
        })
    }

    pub fn with_identity_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.identity_resolver = resolver;
        self
    }

    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    pub fn configuration(&self) -> &RegistryConfiguration {
        &self.configuration
    }

    pub fn api_namespace(&self) -> &str {
        &self.namespace
    }

    /// Every release the registry lists for `identity`, withdrawn ones
    /// included, in the order the registry reports them.
    pub async fn fetch_releases(
        &self,
        identity: &PackageIdentity,
    ) -> Result<Vec<Release>, RegistryError> {
        let (scope, name) = identity.scope_and_name()?;
        let url = self
            .registry_for(&scope)?
            .url_for(&[scope.as_str(), name.as_str()]);

        let (endpoint, response) = self.fetch(url, MediaType::Json).await?;
        let document: ReleasesDocument = decode_json(&endpoint, &response.body)?;

        let releases = document
            .releases
            .into_iter()
            .filter_map(|(raw, entry)| match Version::parse(&raw) {
                Ok(version) => Some(Release {
                    version,
                    status: entry.into_status(),
                }),
                Err(e) => {
                    tracing::warn!(%identity, version = %raw, "skipping unparsable release version: {e}");
                    None
                }
            })
            .collect();
        Ok(releases)
    }

    /// Available versions of `identity`, excluding withdrawn releases.
    pub async fn fetch_versions(
        &self,
        identity: &PackageIdentity,
    ) -> Result<Vec<Version>, RegistryError> {
        let releases = self.fetch_releases(identity).await?;
        Ok(releases
            .into_iter()
            .filter_map(|release| {
                if release.is_available() {
                    Some(release.version)
                } else {
                    tracing::debug!(%identity, version = %release.version, "release withdrawn");
                    None
                }
            })
            .collect())
    }

    /// Retrieve `Package.swift` for a release and load it.
    ///
    /// With `swift_version`, the registry is asked for the manifest variant
    /// targeting that language version.
    pub async fn fetch_manifest(
        &self,
        identity: &PackageIdentity,
        version: &Version,
        loader: &dyn ManifestLoader,
        swift_version: Option<&str>,
    ) -> Result<Manifest, RegistryError> {
        let url = self.manifest_url(identity, version, swift_version)?;
        let endpoint = url.to_string();
        let response = self.send(url, MediaType::Swift).await?;
        if response.status == 404 {
            return Err(RegistryError::ManifestNotFound { endpoint });
        }
        self.accept(&endpoint, &response, MediaType::Swift)?;

        let source = std::str::from_utf8(&response.body)
            .map_err(|_| RegistryError::malformed(&endpoint, ResponseFault::InvalidUtf8))?;
        Ok(loader.load(source, identity, version)?)
    }

    fn manifest_url(
        &self,
        identity: &PackageIdentity,
        version: &Version,
        swift_version: Option<&str>,
    ) -> Result<Url, RegistryError> {
        let (scope, name) = identity.scope_and_name()?;
        let mut url = self.registry_for(&scope)?.url_for(&[
            scope.as_str(),
            name.as_str(),
            &version.to_string(),
            "Package.swift",
        ]);
        if let Some(swift_version) = swift_version {
            url.query_pairs_mut()
                .append_pair("swift-version", swift_version);
        }
        Ok(url)
    }

    /// Registry record for one release.
    pub async fn fetch_release_metadata(
        &self,
        identity: &PackageIdentity,
        version: &Version,
    ) -> Result<ReleaseMetadata, RegistryError> {
        self.release_metadata(identity, version)
            .await
            .map(|(_, metadata)| metadata)
    }

    async fn release_metadata(
        &self,
        identity: &PackageIdentity,
        version: &Version,
    ) -> Result<(String, ReleaseMetadata), RegistryError> {
        let (scope, name) = identity.scope_and_name()?;
        let url = self.registry_for(&scope)?.url_for(&[
            scope.as_str(),
            name.as_str(),
            &version.to_string(),
        ]);
        let (endpoint, response) = self.fetch(url, MediaType::Json).await?;
        let metadata = decode_json(&endpoint, &response.body)?;
        Ok((endpoint, metadata))
    }

    /// Checksum the registry publishes for the release's source archive,
    /// returned exactly as reported.
    pub async fn fetch_source_archive_checksum(
        &self,
        identity: &PackageIdentity,
        version: &Version,
    ) -> Result<String, RegistryError> {
        let (endpoint, metadata) = self.release_metadata(identity, version).await?;
        metadata
            .source_archive()
            .map_err(|fault| RegistryError::malformed(&endpoint, fault))?
            .and_then(|resource| resource.checksum.clone())
            .ok_or_else(|| RegistryError::ChecksumUnavailable {
                identity: identity.to_string(),
                version: version.to_string(),
            })
    }

    /// The checksum a download is verified against: the caller's if given,
    /// otherwise the registry's.
    pub(crate) async fn resolve_expected_checksum(
        &self,
        identity: &PackageIdentity,
        version: &Version,
        provided: Option<&str>,
    ) -> Result<String, RegistryError> {
        match provided {
            Some(checksum) => Ok(checksum.to_string()),
            None => {
                tracing::debug!(%identity, %version, "no checksum supplied, asking the registry");
                self.fetch_source_archive_checksum(identity, version).await
            }
        }
    }

    /// Download the release's source archive, verify it against the
    /// expected checksum and write it to `destination` in `fs`.
    ///
    /// On any failure nothing is written.
    pub async fn download_source_archive(
        &self,
        identity: &PackageIdentity,
        version: &Version,
        fs: &dyn FileSystem,
        destination: &Path,
        expected_checksum: Option<&str>,
        algorithm: &dyn ChecksumAlgorithm,
    ) -> Result<PathBuf, RegistryError> {
        let (scope, name) = identity.scope_and_name()?;
        let registry = self.registry_for(&scope)?;
        let expected = self
            .resolve_expected_checksum(identity, version, expected_checksum)
            .await?;

        let url = registry.url_for(&[scope.as_str(), name.as_str(), &format!("{version}.zip")]);
        let (endpoint, response) = self.fetch(url, MediaType::Zip).await?;
        log_advisory_headers(&endpoint, &response);

        let actual = algorithm.hex_digest(&response.body);
        if actual != expected {
            tracing::warn!(
                %identity,
                %version,
                algorithm = algorithm.name(),
                %expected,
                %actual,
                "source archive checksum mismatch"
            );
            return Err(RegistryError::ChecksumMismatch { expected, actual });
        }

        fs.write_file(destination, &response.body)
            .await
            .map_err(|source| RegistryError::Storage {
                path: destination.to_path_buf(),
                source,
            })?;

        tracing::debug!(
            %identity,
            %version,
            bytes = response.body.len(),
            destination = %destination.display(),
            "stored verified source archive"
        );
        Ok(destination.to_path_buf())
    }

    /// Extract an archive previously stored by
    /// [`download_source_archive`](Self::download_source_archive).
    pub async fn extract_source_archive(
        &self,
        fs: &dyn FileSystem,
        archive_path: &Path,
        destination: &Path,
    ) -> Result<(), RegistryError> {
        self.archiver.extract(fs, archive_path, destination).await?;
        Ok(())
    }

    /// Registry identities published from the source repository at `source`.
    pub async fn lookup_identities(
        &self,
        source: &Url,
    ) -> Result<BTreeSet<PackageIdentity>, RegistryError> {
        let registry =
            self.configuration
                .default_registry()
                .ok_or_else(|| RegistryError::NoRegistryConfigured {
                    scope: DEFAULT_REGISTRY_KEY.to_string(),
                })?;
        let mut url = registry.url_for(&["identifiers"]);
        url.query_pairs_mut().append_pair("url", source.as_str());

        let (endpoint, response) = self.fetch(url, MediaType::Json).await?;
        let document: IdentifiersDocument = decode_json(&endpoint, &response.body)?;

        document
            .identifiers
            .into_iter()
            .map(|identifier| {
                self.identity_resolver
                    .resolve_registry_identifier(&identifier)
                    .map_err(|e| {
                        RegistryError::malformed(
                            &endpoint,
                            ResponseFault::InvalidIdentifier {
                                reason: e.to_string(),
                                identifier,
                            },
                        )
                    })
            })
            .collect()
    }

    fn registry_for(&self, scope: &Scope) -> Result<&Registry, RegistryError> {
        self.configuration
            .registry_for(scope)
            .ok_or_else(|| RegistryError::NoRegistryConfigured {
                scope: scope.to_string(),
            })
    }

    async fn send(&self, url: Url, media: MediaType) -> Result<HttpResponse, RegistryError> {
        let accept = media.accept_header(&self.namespace);
        tracing::debug!(%url, %accept, "registry request");

        let endpoint = url.to_string();
        let request = HttpRequest::get(url).header("Accept", accept);
        let response = self.transport.execute(request).await.map_err(|e| {
            RegistryError::RegistryCommunication {
                endpoint,
                status: None,
                detail: e.to_string(),
            }
        })?;

        tracing::debug!(
            status = response.status,
            bytes = response.body.len(),
            "registry response"
        );
        Ok(response)
    }

    /// Send, then require `200` and the negotiated representation.
    async fn fetch(
        &self,
        url: Url,
        media: MediaType,
    ) -> Result<(String, HttpResponse), RegistryError> {
        let endpoint = url.to_string();
        let response = self.send(url, media).await?;
        self.accept(&endpoint, &response, media)?;
        Ok((endpoint, response))
    }

    fn accept(
        &self,
        endpoint: &str,
        response: &HttpResponse,
        media: MediaType,
    ) -> Result<(), RegistryError> {
        if response.status != 200 {
            return Err(RegistryError::RegistryCommunication {
                endpoint: endpoint.to_string(),
                status: Some(response.status),
                detail: error_detail(response),
            });
        }
        media
            .check_response(&self.namespace, response)
            .map_err(|fault| RegistryError::malformed(endpoint, fault))
    }
}

fn decode_json<T: DeserializeOwned>(endpoint: &str, body: &[u8]) -> Result<T, RegistryError> {
    serde_json::from_slice(body)
        .map_err(|e| RegistryError::malformed(endpoint, ResponseFault::InvalidJson(e.to_string())))
}

/// Human-readable reason for an error status: problem details if the
/// registry sent them, else a body excerpt.
fn error_detail(response: &HttpResponse) -> String {
    if let Ok(problem) = serde_json::from_slice::<Problem>(&response.body) {
        if let Some(text) = problem.detail.or(problem.title) {
            return text;
        }
    }
    let body = String::from_utf8_lossy(&response.body);
    let body = body.trim();
    if body.is_empty() {
        return format!("unexpected status {}", response.status);
    }
    body.chars().take(MAX_ERROR_DETAIL).collect()
}

fn log_advisory_headers(endpoint: &str, response: &HttpResponse) {
    if let Some(disposition) = response.header("content-disposition") {
        tracing::debug!(endpoint, disposition, "archive Content-Disposition");
    }
    if let Some(digest) = response.header("digest") {
        tracing::debug!(endpoint, digest, "archive Digest header (not used for verification)");
    }
}
