//! Contract tests for release listings.
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | GET    | `/{scope}/{name}` | `fetch_versions_*`, `fetch_releases_*` |

mod common;

use common::{json_response, registry_response, test_client, JSON_ACCEPT};
use pkgreg_client::{RegistryError, ReleaseStatus, ResponseFault};
use pkgreg_core::{PackageIdentity, Version};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn identity() -> PackageIdentity {
    PackageIdentity::plain("mona.LinkedList")
}

fn releases_body() -> serde_json::Value {
    serde_json::json!({
        "releases": {
            "1.1.1": {
                "url": "https://packages.example.com/mona/LinkedList/1.1.1"
            },
            "1.1.0": {
                "url": "https://packages.example.com/mona/LinkedList/1.1.0",
                "problem": {
                    "status": 410,
                    "title": "Gone",
                    "detail": "this release was removed from the registry"
                }
            },
            "1.0.0": {
                "url": "https://packages.example.com/mona/LinkedList/1.0.0"
            }
        }
    })
}

#[tokio::test]
async fn fetch_versions_excludes_withdrawn_releases() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/mona/linkedlist"))
        .and(header("Accept", JSON_ACCEPT))
        .respond_with(json_response(releases_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let versions = client.fetch_versions(&identity()).await.unwrap();
    assert_eq!(
        versions,
        vec![Version::new(1, 1, 1), Version::new(1, 0, 0)]
    );
}

#[tokio::test]
async fn fetch_versions_keeps_registry_order() {
    let mock_server = MockServer::start().await;

    // Raw body so key order is exactly what the registry sent.
    let body = r#"{"releases":{"1.0.0":{},"2.0.0":{},"1.5.0":{}}}"#;
    Mock::given(method("GET"))
        .and(path("/mona/linkedlist"))
        .respond_with(registry_response(body, "application/json"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let versions = client.fetch_versions(&identity()).await.unwrap();
    assert_eq!(
        versions,
        vec![
            Version::new(1, 0, 0),
            Version::new(2, 0, 0),
            Version::new(1, 5, 0)
        ]
    );
}

#[tokio::test]
async fn fetch_versions_empty_listing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/mona/linkedlist"))
        .respond_with(json_response(serde_json::json!({ "releases": {} })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    assert!(client.fetch_versions(&identity()).await.unwrap().is_empty());
}

#[tokio::test]
async fn fetch_releases_retains_withdrawn_problem() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/mona/linkedlist"))
        .respond_with(json_response(releases_body()))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let releases = client.fetch_releases(&identity()).await.unwrap();
    assert_eq!(releases.len(), 3);
    assert!(releases[0].is_available());

    match &releases[1].status {
        ReleaseStatus::Withdrawn { problem } => {
            assert_eq!(releases[1].version, Version::new(1, 1, 0));
            assert_eq!(problem.status, Some(410));
            assert_eq!(problem.title.as_deref(), Some("Gone"));
        }
        other => panic!("expected a withdrawn release, got {other:?}"),
    }
}

#[tokio::test]
async fn fetch_releases_skips_invalid_versions() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/mona/linkedlist"))
        .respond_with(json_response(serde_json::json!({
            "releases": { "not-a-version": {}, "1.0.0": {} }
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let releases = client.fetch_releases(&identity()).await.unwrap();
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].version, Version::new(1, 0, 0));
}

#[tokio::test]
async fn fetch_versions_handles_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/mona/linkedlist"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.fetch_versions(&identity()).await.unwrap_err();
    match err {
        RegistryError::RegistryCommunication { status, detail, .. } => {
            assert_eq!(status, Some(500));
            assert_eq!(detail, "Internal Server Error");
        }
        other => panic!("expected RegistryCommunication, got {other:?}"),
    }
}

#[tokio::test]
async fn fetch_versions_rejects_unexpected_content_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/mona/linkedlist"))
        .respond_with(registry_response("<html></html>", "text/html"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.fetch_versions(&identity()).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::MalformedRegistryResponse {
            fault: ResponseFault::UnexpectedContentType { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn fetch_versions_rejects_unsupported_content_version() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/mona/linkedlist"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(releases_body().to_string(), "application/json")
                .insert_header("Content-Version", "2"),
        )
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.fetch_versions(&identity()).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::MalformedRegistryResponse {
            fault: ResponseFault::UnsupportedContentVersion(ref v),
            ..
        } if v == "2"
    ));
}

#[tokio::test]
async fn fetch_versions_rejects_malformed_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/mona/linkedlist"))
        .respond_with(registry_response("{\"releases\": [", "application/json"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.fetch_versions(&identity()).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::MalformedRegistryResponse {
            fault: ResponseFault::InvalidJson(_),
            ..
        }
    ));
}

#[tokio::test]
async fn fetch_versions_transport_failure() {
    let config = pkgreg_client::ClientConfig::local_mock("http://127.0.0.1:1").unwrap();
    let client = pkgreg_client::RegistryClient::new(config).unwrap();

    let err = client.fetch_versions(&identity()).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::RegistryCommunication { status: None, .. }
    ));
}
