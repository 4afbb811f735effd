// Integration tests for the plugin services against a mocked session
// server and license proxy.
#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nipgus_core::storage::keys;
use nipgus_core::{CoreError, HostPage, KeyValueStore, MemoryStore, Plugin, PluginConfig};

const LICENSE_KEY: &str = "ABCD-EFGH-IJKL-MNOP";
const PROXY: &str = "/api/pipedrive/proxy";
const REGISTRY: &str = "/api/gus/company-data";

// ── Helpers ─────────────────────────────────────────────────────────

struct TestPage {
    url: Mutex<Url>,
    redirects: Mutex<Vec<Url>>,
}

impl TestPage {
    fn new(url: &str) -> Self {
        Self {
            url: Mutex::new(Url::parse(url).unwrap()),
            redirects: Mutex::new(Vec::new()),
        }
    }
}

impl HostPage for TestPage {
    fn location(&self) -> Url {
        self.url.lock().unwrap().clone()
    }
    fn replace_location(&self, url: Url) {
        *self.url.lock().unwrap() = url;
    }
    fn redirect(&self, url: Url) {
        self.redirects.lock().unwrap().push(url);
    }
}

fn config(server: &MockServer) -> PluginConfig {
    let mut cfg = PluginConfig::with_defaults(SecretString::from("secret".to_owned())).unwrap();
    cfg.oauth_url = Url::parse(&server.uri()).unwrap();
    cfg.license.proxy_url = Url::parse(&format!("{}/license", server.uri())).unwrap();
    cfg.host.requests_per_second = 1000;
    cfg
}

/// An authorized plugin on organization 7 of `acme`, with a stored key.
async fn setup() -> (MockServer, Plugin, Arc<MemoryStore>) {
    setup_with(|_| {}, true).await
}

async fn setup_with(
    adjust: impl FnOnce(&mut PluginConfig),
    with_key: bool,
) -> (MockServer, Plugin, Arc<MemoryStore>) {
    let server = MockServer::start().await;
    let mut cfg = config(&server);
    adjust(&mut cfg);

    let store = Arc::new(MemoryStore::new());
    if with_key {
        store.set(keys::LICENSE_KEY, LICENSE_KEY).unwrap();
    }
    let page = TestPage::new("https://acme.pipedrive.com/organization/7?nip_gus_session=tok-1");
    let plugin = Plugin::bootstrap(cfg, store.clone(), &page).unwrap();
    (server, plugin, store)
}

fn company_json() -> serde_json::Value {
    json!({
        "nip": "5260001246",
        "regon": "012345678",
        "nazwa": "EXAMPLE SPÓŁKA AKCYJNA",
        "adresUlica": "ul. Prosta",
        "adresNumerNieruchomosci": "1",
        "adresNumerLokalu": "2",
        "adresKodPocztowy": "00-001",
        "adresMiejscowosc": "Warszawa",
        "statusNip": "Czynny"
    })
}

async fn mount_registry_success(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path(REGISTRY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": company_json()
        })))
        .expect(times)
        .mount(server)
        .await;
}

// ── Session ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_token_param_is_adopted_and_stripped() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    let page = TestPage::new("https://acme.pipedrive.com/organization/7?nip_gus_session=tok-1&tab=notes");

    let plugin = Plugin::bootstrap(config(&server), store.clone(), &page).unwrap();

    assert!(plugin.session().is_authorized());
    assert_eq!(store.get(keys::SESSION).as_deref(), Some("tok-1"));
    assert_eq!(
        page.location().as_str(),
        "https://acme.pipedrive.com/organization/7?tab=notes"
    );
    assert_eq!(plugin.session().company_domain().as_deref(), Some("acme"));
}

#[tokio::test]
async fn test_stored_token_is_restored() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    store.set(keys::SESSION, "tok-stored").unwrap();
    let page = TestPage::new("https://acme.pipedrive.com/organization/7");

    let plugin = Plugin::bootstrap(config(&server), store, &page).unwrap();
    assert!(plugin.session().is_authorized());
    assert_eq!(
        page.location().as_str(),
        "https://acme.pipedrive.com/organization/7"
    );
}

#[tokio::test]
async fn test_unauthorized_response_clears_session() {
    let (server, plugin, store) = setup().await;

    Mock::given(method("POST"))
        .and(path(PROXY))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "expired"})))
        .mount(&server)
        .await;

    let err = plugin.host().get_organization(7).await.unwrap_err();
    assert!(matches!(err, CoreError::SessionExpired), "got {err:?}");
    assert!(!plugin.session().is_authorized());
    assert_eq!(store.get(keys::SESSION), None);

    let err = plugin.host().get_organization(7).await.unwrap_err();
    assert!(matches!(err, CoreError::NotAuthorized), "got {err:?}");

    let err = plugin.registry().get_company_data("5260001246").await.unwrap_err();
    assert!(matches!(err, CoreError::NotAuthorized), "got {err:?}");
    assert!(err.requires_reauthorization());
}

#[tokio::test]
async fn test_authorization_redirects_with_company_domain() {
    let server = MockServer::start().await;
    let page = TestPage::new("https://acme.pipedrive.com/organization/7");
    let plugin = Plugin::bootstrap(config(&server), Arc::new(MemoryStore::new()), &page).unwrap();

    plugin.session().start_authorization(&page).unwrap();

    let redirects = page.redirects.lock().unwrap();
    assert_eq!(
        redirects[0].as_str(),
        format!("{}/auth/authorize?company_domain=acme", server.uri())
    );
}

#[tokio::test]
async fn test_session_validation_and_logout() {
    let (server, plugin, store) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/session/info"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"company_domain": "acme"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/session/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    assert!(plugin.session().validate().await);

    plugin.session().logout().await;
    assert!(!plugin.session().is_authorized());
    assert_eq!(store.get(keys::SESSION), None);
}

// ── License ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_license_validation_is_cached_and_persisted() {
    let (server, plugin, store) = setup_with(|_| {}, false).await;

    Mock::given(method("POST"))
        .and(path("/license"))
        .and(body_partial_json(json!({
            "action": "validate",
            "license_key": LICENSE_KEY,
            "domain": "acme.pipedrive.com",
            "product_id": "pipedrive-plugin-uuid",
            "plugin_id": "pipedrive-nip-gus"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "activations_used": 1,
            "activations_limit": 3,
            "expiry_date": "2027-01-31"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let first = plugin.license().validate(LICENSE_KEY, None).await.unwrap();
    let second = plugin.license().validate(LICENSE_KEY, None).await.unwrap();

    assert_eq!(first, second);
    assert!(first.valid);
    assert_eq!(first.activations_limit, Some(3));
    assert_eq!(first.expiry_date.unwrap().to_string(), "2027-01-31");
    assert_eq!(store.get(keys::LICENSE_KEY).as_deref(), Some(LICENSE_KEY));
    assert!(store.get(keys::LAST_VALIDATION).is_some());

    let info = plugin.license().license_info().await;
    assert!(info.has_key);
    assert!(info.last_validation.is_some());
}

#[tokio::test]
async fn test_license_rejections_are_classified() {
    let (server, plugin, _store) = setup().await;

    Mock::given(method("POST"))
        .and(path("/license"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "License expired on 2025-01-01"
        })))
        .mount(&server)
        .await;

    let err = plugin.license().validate(LICENSE_KEY, None).await.unwrap_err();
    assert!(matches!(err, CoreError::LicenseExpired), "got {err:?}");
    assert!(!plugin.license().has_valid_license().await);
}

#[tokio::test]
async fn test_license_proxy_outage_is_network_error() {
    let (server, plugin, _store) = setup().await;

    Mock::given(method("POST"))
        .and(path("/license"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = plugin.license().validate(LICENSE_KEY, None).await.unwrap_err();
    assert!(matches!(err, CoreError::NetworkError { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_validate_or_activate_falls_back_to_activation() {
    let (server, plugin, store) = setup_with(|_| {}, false).await;

    Mock::given(method("POST"))
        .and(path("/license"))
        .and(body_partial_json(json!({"action": "validate"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "License is not active on this domain"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/license"))
        .and(body_partial_json(json!({"action": "activate"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "activations_used": 2,
            "activations_limit": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let status = plugin
        .license()
        .validate_or_activate(LICENSE_KEY)
        .await
        .unwrap();
    assert!(status.valid);
    assert_eq!(status.activations_used, Some(2));
    assert_eq!(status.domain, "acme.pipedrive.com");
    assert_eq!(store.get(keys::LICENSE_KEY).as_deref(), Some(LICENSE_KEY));
}

#[tokio::test]
async fn test_clear_forgets_license() {
    let (_server, plugin, store) = setup().await;
    store.set(keys::LAST_VALIDATION, "2026-01-01T00:00:00Z").unwrap();

    plugin.license().clear().unwrap();
    assert_eq!(plugin.license().stored_key(), None);
    assert_eq!(store.get(keys::LAST_VALIDATION), None);
}

// ── Registry ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_company_lookup_is_cached() {
    let (server, plugin, _store) = setup().await;

    Mock::given(method("POST"))
        .and(path(REGISTRY))
        .and(body_partial_json(json!({
            "nip": "5260001246",
            "license_key": LICENSE_KEY
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": company_json()
        })))
        .expect(1)
        .mount(&server)
        .await;

    let first = plugin.registry().get_company_data("526-000-12-46").await.unwrap();
    let second = plugin.registry().get_company_data("5260001246").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.display_name(), Some("EXAMPLE SPÓŁKA AKCYJNA"));

    let stats = plugin.registry().usage_stats();
    assert_eq!(stats.requests_in_window, 1);
    assert_eq!(stats.cached_entries, 1);
    assert!(stats.can_request);
}

#[tokio::test]
async fn test_lookup_after_cache_expiry_calls_again() {
    let (server, plugin, _store) =
        setup_with(|cfg| cfg.registry.cache_ttl = Duration::from_millis(50), true).await;
    mount_registry_success(&server, 2).await;

    plugin.registry().get_company_data("5260001246").await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    plugin.registry().get_company_data("5260001246").await.unwrap();

    assert_eq!(plugin.registry().usage_stats().requests_in_window, 2);
}

#[tokio::test]
async fn test_eleventh_lookup_in_window_is_refused_without_io() {
    let (server, plugin, _store) = setup().await;

    Mock::given(method("POST"))
        .and(path(REGISTRY))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "not found"})))
        .expect(10)
        .mount(&server)
        .await;

    for _ in 0..10 {
        let err = plugin.registry().get_company_data("5260001246").await.unwrap_err();
        assert!(matches!(err, CoreError::RegistryApiError { .. }), "got {err:?}");
    }

    let err = plugin.registry().get_company_data("5260001246").await.unwrap_err();
    match err {
        CoreError::RateLimited { retry_after } => {
            assert!(retry_after > Duration::ZERO);
            assert!(retry_after <= Duration::from_secs(60));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
    assert!(!plugin.registry().usage_stats().can_request);
}

#[tokio::test]
async fn test_rate_limit_applies_before_license_check() {
    let (server, plugin, _store) = setup_with(|cfg| cfg.registry.max_requests = 1, false).await;
    mount_registry_success(&server, 0).await;

    let err = plugin.registry().get_company_data("5260001246").await.unwrap_err();
    assert!(matches!(err, CoreError::LicenseInvalid { .. }), "got {err:?}");

    let err = plugin.registry().get_company_data("5260001246").await.unwrap_err();
    assert!(matches!(err, CoreError::RateLimited { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_invalid_input_never_reaches_the_registry() {
    let (server, plugin, _store) = setup().await;
    mount_registry_success(&server, 0).await;

    let err = plugin.registry().get_company_data("   ").await.unwrap_err();
    assert!(matches!(err, CoreError::EmptyInput));

    let err = plugin.registry().get_company_data("526-000-12-45").await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidIdentifier { .. }));
    assert_eq!(plugin.registry().usage_stats().requests_in_window, 0);
}

#[tokio::test]
async fn test_registry_license_refusal_maps_to_license_error() {
    let (server, plugin, _store) = setup().await;

    Mock::given(method("POST"))
        .and(path(REGISTRY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Nieprawidłowa licencja"
        })))
        .mount(&server)
        .await;

    let err = plugin.registry().get_company_data("5260001246").await.unwrap_err();
    assert!(err.is_license_problem(), "got {err:?}");
}

#[tokio::test]
async fn test_record_without_nip_is_invalid_data() {
    let (server, plugin, _store) = setup().await;

    Mock::given(method("POST"))
        .and(path(REGISTRY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"nazwa": "No identifier"}
        })))
        .mount(&server)
        .await;

    let err = plugin.registry().get_company_data("5260001246").await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidRegistryData), "got {err:?}");
}

#[tokio::test]
async fn test_nip_status_reports_active_taxpayer() {
    let (server, plugin, _store) = setup().await;
    mount_registry_success(&server, 1).await;

    let status = plugin.registry().check_nip_status("5260001246").await.unwrap();
    assert!(status.active);
    assert_eq!(status.status.as_deref(), Some("Czynny"));
    assert_eq!(status.nip, "5260001246");
}

// ── Host platform ───────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_nip_field_is_created_once() {
    let (server, plugin, store) = setup().await;

    Mock::given(method("POST"))
        .and(path(PROXY))
        .and(body_partial_json(json!({"method": "GET", "endpoint": "/organizationFields"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{"id": 1, "key": "name", "name": "Name", "field_type": "varchar"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PROXY))
        .and(body_partial_json(json!({
            "method": "POST",
            "endpoint": "/organizationFields",
            "data": {"name": "NIP", "field_type": "varchar"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"id": 42, "key": "nipkey", "name": "NIP", "field_type": "varchar"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let field = plugin.host().ensure_nip_field().await.unwrap();
    assert_eq!(field.id, 42);
    assert_eq!(field.key, "nipkey");
    assert_eq!(store.get(keys::NIP_FIELD_ID).as_deref(), Some("42"));
}

#[tokio::test]
async fn test_refused_field_creation_is_reported() {
    let (server, plugin, _store) = setup().await;

    Mock::given(method("POST"))
        .and(path(PROXY))
        .and(body_partial_json(json!({"method": "GET"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PROXY))
        .and(body_partial_json(json!({"method": "POST"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "Field limit reached"
        })))
        .mount(&server)
        .await;

    match plugin.host().ensure_nip_field().await.unwrap_err() {
        CoreError::FieldCreationError { message } => assert_eq!(message, "Field limit reached"),
        other => panic!("expected FieldCreationError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_company_record_is_written_to_organization() {
    let (server, plugin, _store) = setup().await;

    Mock::given(method("POST"))
        .and(path(PROXY))
        .and(body_partial_json(json!({"method": "GET", "endpoint": "/organizationFields"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [
                {"id": 1, "key": "nipkey", "name": "NIP"},
                {"id": 2, "key": "regonkey", "name": "REGON"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PROXY))
        .and(body_partial_json(json!({
            "method": "PUT",
            "endpoint": "/organizations/7",
            "data": {
                "name": "EXAMPLE SPÓŁKA AKCYJNA",
                "address": "ul. Prosta 1/2, 00-001 Warszawa",
                "custom_fields": {"nipkey": "5260001246", "regonkey": "012345678"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"id": 7, "name": "EXAMPLE SPÓŁKA AKCYJNA"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = serde_json::from_value(company_json()).unwrap();
    let update = plugin.host().apply_company_record(7, &record).await.unwrap();
    assert_eq!(update.custom_fields.len(), 2);
}

#[tokio::test]
async fn test_organization_nip_reads_custom_field() {
    let (server, plugin, _store) = setup().await;

    Mock::given(method("POST"))
        .and(path(PROXY))
        .and(body_partial_json(json!({"endpoint": "/organizationFields"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{"id": 1, "key": "nipkey", "name": "NIP"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PROXY))
        .and(body_partial_json(json!({"endpoint": "/organizations/7"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"id": 7, "name": "Acme", "nipkey": "7740001454"}
        })))
        .mount(&server)
        .await;

    let nip = plugin.host().organization_nip(7).await.unwrap();
    assert_eq!(nip.as_deref(), Some("7740001454"));
}
