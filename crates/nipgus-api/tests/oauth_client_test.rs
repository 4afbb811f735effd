// Integration tests for `OAuthClient` using wiremock.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nipgus_api::{Error, HostResponse, OAuthClient, OrganizationField, ProxyMethod};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, OAuthClient) {
    let server = MockServer::start().await;
    let client = OAuthClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    (server, client)
}

fn token() -> SecretString {
    SecretString::from("tok-123".to_owned())
}

// ── Proxy ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_proxy_sends_envelope_with_bearer() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/pipedrive/proxy"))
        .and(header("authorization", "Bearer tok-123"))
        .and(body_json(json!({"method": "GET", "endpoint": "/organizationFields"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{"id": 1, "key": "abc", "name": "NIP", "field_type": "varchar"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp: HostResponse<Vec<OrganizationField>> = client
        .proxy(&token(), ProxyMethod::Get, "/organizationFields", None)
        .await
        .unwrap();

    let fields = resp.data.unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].key, "abc");
}

#[tokio::test]
async fn test_proxy_forwards_data() {
    let (server, client) = setup().await;
    let data = json!({"name": "Acme"});

    Mock::given(method("POST"))
        .and(path("/api/pipedrive/proxy"))
        .and(body_json(json!({
            "method": "PUT",
            "endpoint": "/organizations/7",
            "data": {"name": "Acme"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;

    let resp: Value = client
        .proxy(&token(), ProxyMethod::Put, "/organizations/7", Some(&data))
        .await
        .unwrap();
    assert_eq!(resp["success"], true);
}

#[tokio::test]
async fn test_unauthorized_maps_to_session_expired() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/pipedrive/proxy"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result: Result<Value, Error> = client
        .proxy(&token(), ProxyMethod::Get, "/organizations/1", None)
        .await;
    assert!(matches!(result, Err(Error::SessionExpired)));
}

#[tokio::test]
async fn test_error_body_message_is_surfaced() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/pipedrive/proxy"))
        .respond_with(
            ResponseTemplate::new(502).set_body_json(json!({"error": "upstream unavailable"})),
        )
        .mount(&server)
        .await;

    let err = client
        .proxy::<Value>(&token(), ProxyMethod::Get, "/organizations/1", None)
        .await
        .unwrap_err();
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 502);
            assert_eq!(message.as_deref(), Some("upstream unavailable"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ── Registry ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_company_data_posts_identifier_and_key() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/gus/company-data"))
        .and(body_json(json!({"nip": "5260001246", "license_key": "KEY-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"nip": "5260001246", "nazwa": "ACME SA"}
        })))
        .mount(&server)
        .await;

    let resp = client
        .company_data(&token(), "5260001246", "KEY-1")
        .await
        .unwrap();
    assert!(resp.success);
    assert_eq!(resp.data.unwrap().name.as_deref(), Some("ACME SA"));
}

#[tokio::test]
async fn test_company_data_timeout() {
    let (server, client) = setup().await;
    let client = client.with_timeouts(Duration::from_millis(50), Duration::from_millis(50));

    Mock::given(method("POST"))
        .and(path("/api/gus/company-data"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let result = client.company_data(&token(), "5260001246", "KEY-1").await;
    assert!(matches!(result, Err(Error::Timeout { timeout_ms: 50 })));
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/session/info"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let result = client.session_info(&token()).await;
    assert!(matches!(result, Err(Error::Deserialization { .. })));
}

// ── Session ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_session_info_and_logout() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/session/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "company_domain": "acme",
            "user_id": 42
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/session/logout"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let info = client.session_info(&token()).await.unwrap();
    assert_eq!(info.company_domain.as_deref(), Some("acme"));
    assert_eq!(info.extra["user_id"], 42);

    client.logout(&token()).await.unwrap();
}
