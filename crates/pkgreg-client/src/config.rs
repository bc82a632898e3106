//! Registry client configuration.
//!
//! Routing is a default registry plus per-scope overrides. Configuration
//! comes from a `registries.json` document, from environment variables, or
//! from explicit construction in tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use pkgreg_core::{IdentityError, Scope};
use serde::Deserialize;
use url::Url;

use crate::resilience::{CircuitBreakerStrategy, RetryStrategy};

/// Key for the default registry in `registries.json`.
pub const DEFAULT_REGISTRY_KEY: &str = "[default]";

/// API namespace used in `Accept` media types.
pub const DEFAULT_API_NAMESPACE: &str = "swift";

/// Highest `registries.json` format version understood.
const CONFIGURATION_VERSION: u32 = 1;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A registry endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    url: Url,
}

impl Registry {
    /// Wrap an absolute base URL.
    pub fn new(url: Url) -> Result<Self, ConfigError> {
        if url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(
                url.to_string(),
                "registry URL cannot be used as a base".to_string(),
            ));
        }
        Ok(Self { url })
    }

    /// Parse and wrap a registry URL.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let url =
            Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(raw.to_string(), e.to_string()))?;
        Self::new(url)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_https(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// The registry URL with `segments` appended to its path.
    ///
    /// Segments are percent-encoded individually, so a segment never
    /// introduces extra path components.
    pub fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

impl std::fmt::Display for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Transport security requirements for configured registries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecurityPolicy {
    /// Reject registries that are not served over `https`.
    pub require_https: bool,
}

/// Which registry serves which scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryConfiguration {
    pub default_registry: Option<Registry>,
    pub scoped_registries: BTreeMap<Scope, Registry>,
    pub security: SecurityPolicy,
}

impl RegistryConfiguration {
    /// Configuration with only a default registry.
    pub fn with_default(registry: Registry) -> Self {
        Self {
            default_registry: Some(registry),
            ..Self::default()
        }
    }

    /// Add or replace the registry for `scope`.
    pub fn with_scoped(mut self, scope: Scope, registry: Registry) -> Self {
        self.scoped_registries.insert(scope, registry);
        self
    }

    /// The registry for `scope`: its override if any, else the default.
    pub fn registry_for(&self, scope: &Scope) -> Option<&Registry> {
        self.scoped_registries
            .get(scope)
            .or(self.default_registry.as_ref())
    }

    pub fn default_registry(&self) -> Option<&Registry> {
        self.default_registry.as_ref()
    }

    /// Check every registry against the security policy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.security.require_https {
            return Ok(());
        }
        let insecure = self
            .default_registry
            .iter()
            .chain(self.scoped_registries.values())
            .find(|r| !r.is_https());
        match insecure {
            Some(registry) => Err(ConfigError::InsecureRegistry(registry.to_string())),
            None => Ok(()),
        }
    }

    /// Parse a `registries.json` document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let document: RegistriesDocument =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if document.version > CONFIGURATION_VERSION {
            return Err(ConfigError::UnsupportedVersion(document.version));
        }

        let mut configuration = Self {
            security: SecurityPolicy {
                require_https: document.security.require_https,
            },
            ..Self::default()
        };
        for (key, entry) in document.registries {
            let registry = Registry::parse(&entry.url)?;
            if key == DEFAULT_REGISTRY_KEY {
                configuration.default_registry = Some(registry);
            } else {
                configuration
                    .scoped_registries
                    .insert(Scope::new(&key)?, registry);
            }
        }

        configuration.validate()?;
        Ok(configuration)
    }

    /// Read and parse a `registries.json` file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Load from environment variables.
    ///
    /// Variables:
    /// - `PKGREG_DEFAULT_REGISTRY` (optional default registry URL)
    /// - `PKGREG_REQUIRE_HTTPS` (`true`/`1` to require https, default off)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let default_registry = lookup("PKGREG_DEFAULT_REGISTRY")
            .map(|raw| Registry::parse(&raw))
            .transpose()?;
        let require_https = lookup("PKGREG_REQUIRE_HTTPS")
            .map(|raw| matches!(raw.trim(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false);

        let configuration = Self {
            default_registry,
            scoped_registries: BTreeMap::new(),
            security: SecurityPolicy { require_https },
        };
        configuration.validate()?;
        Ok(configuration)
    }
}

#[derive(Deserialize)]
struct RegistriesDocument {
    version: u32,
    #[serde(default)]
    registries: BTreeMap<String, RegistryEntry>,
    #[serde(default)]
    security: SecurityDocument,
}

#[derive(Deserialize)]
struct RegistryEntry {
    url: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SecurityDocument {
    #[serde(default)]
    require_https: bool,
}

/// Everything needed to build a [`crate::RegistryClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub registries: RegistryConfiguration,
    /// Namespace in `application/vnd.<namespace>.registry.v1+…`.
    pub api_namespace: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
    pub retry: RetryStrategy,
    pub circuit_breaker: CircuitBreakerStrategy,
}

impl ClientConfig {
    /// Configuration with default namespace, timeout and resilience policy.
    pub fn new(registries: RegistryConfiguration) -> Self {
        Self {
            registries,
            api_namespace: DEFAULT_API_NAMESPACE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: concat!("pkgreg/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetryStrategy::default(),
            circuit_breaker: CircuitBreakerStrategy::default(),
        }
    }

    /// Load registries and timeout from environment variables.
    ///
    /// In addition to [`RegistryConfiguration::from_env`]:
    /// - `PKGREG_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(RegistryConfiguration::from_env()?);
        config.timeout_secs = std::env::var("PKGREG_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Ok(config)
    }

    /// A configuration pointing at a local mock registry (for testing), with
    /// retries and circuit breaking disabled.
    pub fn local_mock(base_url: &str) -> Result<Self, ConfigError> {
        let mut config = Self::new(RegistryConfiguration::with_default(Registry::parse(
            base_url,
        )?));
        config.timeout_secs = 5;
        config.retry = RetryStrategy::None;
        config.circuit_breaker = CircuitBreakerStrategy::None;
        Ok(config)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL {0}: {1}")]
    InvalidUrl(String, String),
    #[error("registry {0} is not served over https")]
    InsecureRegistry(String),
    #[error("invalid scope in registry configuration: {0}")]
    InvalidScope(#[from] IdentityError),
    #[error("unsupported registries configuration version {0}")]
    UnsupportedVersion(u32),
    #[error("invalid registries configuration: {0}")]
    Parse(String),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}
