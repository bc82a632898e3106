//! # pkgreg-client -- Package Registry Client
//!
//! Typed, verified access to a package registry speaking the v1 registry
//! protocol:
//! - **Releases** via `GET /{scope}/{name}`
//! - **Release metadata** and source archive checksums via
//!   `GET /{scope}/{name}/{version}`
//! - **Manifests** via `GET /{scope}/{name}/{version}/Package.swift`
//! - **Source archives** via `GET /{scope}/{name}/{version}.zip`
//! - **Identity lookup** via `GET /identifiers?url={source}`
//!
//! ## Architecture
//!
//! [`RegistryClient`] builds requests and interprets responses. Bytes move
//! through an [`HttpTransport`], which the client always wraps in a
//! [`ResilientTransport`] applying the configured [`RetryStrategy`] and
//! [`CircuitBreakerStrategy`]. Identity parsing, manifest loading, hashing,
//! storage and extraction are collaborators from `pkgreg-core`.
//!
//! ## Media Types
//!
//! Requests carry `Accept: application/vnd.<namespace>.registry.v1+<repr>`
//! with `<namespace>` defaulting to `swift`.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod negotiation;
pub mod resilience;
pub mod transport;

pub use api::{Problem, Release, ReleaseMetadata, ReleaseStatus, Resource};
pub use client::RegistryClient;
pub use config::{ClientConfig, ConfigError, Registry, RegistryConfiguration, SecurityPolicy};
pub use error::{RegistryError, ResponseFault};
pub use negotiation::MediaType;
pub use resilience::{CircuitBreakerStrategy, ResilientTransport, RetryStrategy};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
