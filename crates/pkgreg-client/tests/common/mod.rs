//! Shared fixtures for the wiremock contract tests.

#![allow(dead_code)]

use pkgreg_client::{ClientConfig, RegistryClient};
use wiremock::{MockServer, ResponseTemplate};

pub const JSON_ACCEPT: &str = "application/vnd.swift.registry.v1+json";
pub const SWIFT_ACCEPT: &str = "application/vnd.swift.registry.v1+swift";
pub const ZIP_ACCEPT: &str = "application/vnd.swift.registry.v1+zip";

/// An empty zip archive: just the end-of-central-directory record.
pub fn empty_zip() -> Vec<u8> {
    let mut bytes = b"PK\x05\x06".to_vec();
    bytes.extend_from_slice(&[0u8; 18]);
    bytes
}

/// Client for `server` with retries and circuit breaking disabled.
pub fn test_client(server: &MockServer) -> RegistryClient {
    let config = ClientConfig::local_mock(&server.uri()).unwrap();
    RegistryClient::new(config).unwrap()
}

/// A `200` with the given representation and `Content-Version: 1`.
pub fn registry_response(body: impl Into<Vec<u8>>, content_type: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_raw(body.into(), content_type)
        .insert_header("Content-Version", "1")
}

pub fn json_response(value: serde_json::Value) -> ResponseTemplate {
    registry_response(value.to_string(), "application/json")
}
