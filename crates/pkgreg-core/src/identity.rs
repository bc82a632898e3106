//! # Package Identity -- Registry-Addressable Names
//!
//! A [`PackageIdentity`] is the canonical name of a package. Identities used
//! against a registry are *scoped*: `<scope>.<name>`, e.g. `mona.linkedlist`.
//! Both components are case-insensitive and stored lowercase so that two
//! spellings of the same package compare equal and produce the same request
//! paths.
//!
//! ## Naming Rules
//!
//! - scope: 1–39 ASCII alphanumerics or hyphens, no leading, trailing, or
//!   consecutive hyphens.
//! - name: 1–100 ASCII alphanumerics, hyphens, or underscores, starting with
//!   an alphanumeric.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::IdentityError;

const MAX_SCOPE_LEN: usize = 39;
const MAX_NAME_LEN: usize = 100;

/// Scope component of a registry identity (the account or organization).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope(String);

/// Name component of a registry identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Name(String);

/// Canonical, lowercase identity of a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageIdentity(String);

impl Scope {
    /// Validate and normalize a scope.
    pub fn new(raw: &str) -> Result<Self, IdentityError> {
        let invalid = |reason| IdentityError::InvalidScope {
            scope: raw.to_string(),
            reason,
        };

        if raw.is_empty() {
            return Err(invalid("scope is empty"));
        }
        if raw.len() > MAX_SCOPE_LEN {
            return Err(invalid("scope is longer than 39 characters"));
        }
        if !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid("scope may only contain alphanumerics and hyphens"));
        }
        if raw.starts_with('-') || raw.ends_with('-') || raw.contains("--") {
            return Err(invalid(
                "scope may not start or end with a hyphen or contain consecutive hyphens",
            ));
        }

        Ok(Self(raw.to_ascii_lowercase()))
    }

    /// The normalized scope string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Name {
    /// Validate and normalize a package name.
    pub fn new(raw: &str) -> Result<Self, IdentityError> {
        let invalid = |reason| IdentityError::InvalidName {
            name: raw.to_string(),
            reason,
        };

        let Some(first) = raw.chars().next() else {
            return Err(invalid("name is empty"));
        };
        if raw.len() > MAX_NAME_LEN {
            return Err(invalid("name is longer than 100 characters"));
        }
        if !first.is_ascii_alphanumeric() {
            return Err(invalid("name must start with an alphanumeric character"));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid(
                "name may only contain alphanumerics, hyphens, and underscores",
            ));
        }

        Ok(Self(raw.to_ascii_lowercase()))
    }

    /// The normalized name string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PackageIdentity {
    /// Create an identity from an opaque string, normalizing case.
    ///
    /// No validation happens here; identities that are not scoped are still
    /// valid identities, they just cannot be used against a registry.
    pub fn plain(value: impl AsRef<str>) -> Self {
        Self(value.as_ref().to_lowercase())
    }

    /// Create a registry identity from its validated components.
    pub fn scoped(scope: &Scope, name: &Name) -> Self {
        Self(format!("{}.{}", scope.as_str(), name.as_str()))
    }

    /// The identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(scope, name)` at the first `.`.
    pub fn scope_and_name(&self) -> Result<(Scope, Name), IdentityError> {
        let (scope, name) = self
            .0
            .split_once('.')
            .ok_or_else(|| IdentityError::NotScoped(self.0.clone()))?;
        Ok((Scope::new(scope)?, Name::new(name)?))
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps source locations and registry identifiers onto package identities.
///
/// Implementations must be `Send + Sync` so a single resolver can be shared
/// across concurrent registry calls behind an `Arc`.
pub trait IdentityResolver: Send + Sync {
    /// Derive the identity of a package from its source repository URL.
    fn resolve_identity(&self, location: &Url) -> PackageIdentity;

    /// Parse a registry identifier (`scope.name`) returned by a registry.
    fn resolve_registry_identifier(&self, identifier: &str)
        -> Result<PackageIdentity, IdentityError>;
}

/// Resolver following the registry conventions: a source URL maps to its
/// last path component without a `.git` suffix, and registry identifiers
/// must decompose into a valid scope and name.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultIdentityResolver;

impl IdentityResolver for DefaultIdentityResolver {
    fn resolve_identity(&self, location: &Url) -> PackageIdentity {
        let last = location
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .unwrap_or_else(|| location.host_str().unwrap_or_default());
        PackageIdentity::plain(last.strip_suffix(".git").unwrap_or(last))
    }

    fn resolve_registry_identifier(
        &self,
        identifier: &str,
    ) -> Result<PackageIdentity, IdentityError> {
        let (scope, name) = PackageIdentity::plain(identifier).scope_and_name()?;
        Ok(PackageIdentity::scoped(&scope, &name))
    }
}
