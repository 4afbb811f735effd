// Async HTTP client for the OAuth session server.
//
// The server issues opaque session tokens, proxies host-platform API calls
// (`/api/pipedrive/proxy`) and registry lookups (`/api/gus/company-data`).
// Auth: `Authorization: Bearer <session token>` on every call.

use std::time::Duration;

use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    CompanyLookupRequest, CompanyLookupResponse, ProxyMethod, ProxyRequest, SessionInfo,
};
use crate::transport::TransportConfig;

const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REGISTRY_TIMEOUT: Duration = Duration::from_secs(15);

// ── Error response shape ─────────────────────────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the OAuth session server.
///
/// Stateless with respect to the session: the token is passed on every call
/// so that the owner can drop it the moment the server reports a 401.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    base_url: Url,
    api_timeout: Duration,
    registry_timeout: Duration,
}

impl OAuthClient {
    // ── Constructors ─────────────────────────────────────────────────

    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::from_reqwest(base_url, http)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            api_timeout: DEFAULT_API_TIMEOUT,
            registry_timeout: DEFAULT_REGISTRY_TIMEOUT,
        })
    }

    /// Override the per-call deadlines (general API, registry lookups).
    pub fn with_timeouts(mut self, api: Duration, registry: Duration) -> Self {
        self.api_timeout = api;
        self.registry_timeout = registry;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // ── Authorization ────────────────────────────────────────────────

    /// Where to send the browser to start the OAuth flow for a company.
    pub fn authorize_url(&self, company_domain: &str) -> Result<Url, Error> {
        let mut url = self.url("auth/authorize")?;
        url.query_pairs_mut()
            .append_pair("company_domain", company_domain);
        Ok(url)
    }

    /// `GET /api/session/info`. A 401 surfaces as [`Error::SessionExpired`].
    pub async fn session_info(&self, token: &SecretString) -> Result<SessionInfo, Error> {
        let url = self.url("api/session/info")?;
        debug!("GET {url}");

        let req = self.http.get(url).bearer_auth(token.expose_secret());
        let resp = self.send(req, self.api_timeout).await?;
        handle_response(resp).await
    }

    /// `DELETE /api/session/logout`.
    pub async fn logout(&self, token: &SecretString) -> Result<(), Error> {
        let url = self.url("api/session/logout")?;
        debug!("DELETE {url}");

        let req = self.http.delete(url).bearer_auth(token.expose_secret());
        let resp = self.send(req, self.api_timeout).await?;
        handle_empty(resp).await
    }

    // ── Host-platform proxy ──────────────────────────────────────────

    /// Forward a host-platform API call through the session server.
    pub async fn proxy<T: DeserializeOwned>(
        &self,
        token: &SecretString,
        method: ProxyMethod,
        endpoint: &str,
        data: Option<&Value>,
    ) -> Result<T, Error> {
        let url = self.url("api/pipedrive/proxy")?;
        debug!("POST {url} ({method} {endpoint})");

        let body = ProxyRequest {
            method,
            endpoint,
            data,
        };
        let req = self
            .http
            .post(url)
            .bearer_auth(token.expose_secret())
            .json(&body);
        let resp = self.send(req, self.api_timeout).await?;
        handle_response(resp).await
    }

    // ── Registry ─────────────────────────────────────────────────────

    /// `POST /api/gus/company-data` for one cleaned identifier.
    pub async fn company_data(
        &self,
        token: &SecretString,
        nip: &str,
        license_key: &str,
    ) -> Result<CompanyLookupResponse, Error> {
        let url = self.url("api/gus/company-data")?;
        debug!("POST {url} nip={nip}");

        let req = self
            .http
            .post(url)
            .bearer_auth(token.expose_secret())
            .json(&CompanyLookupRequest { nip, license_key });
        let resp = self.send(req, self.registry_timeout).await?;
        handle_response(resp).await
    }

    async fn send(
        &self,
        req: RequestBuilder,
        timeout: Duration,
    ) -> Result<reqwest::Response, Error> {
        req.timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::from_send(e, timeout))
    }
}

/// Ensure the base URL ends with `/` so relative joins keep its path.
fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

// ── Response handling ────────────────────────────────────────────────

pub(crate) async fn handle_response<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, Error> {
    let status = resp.status();
    if status.is_success() {
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    } else {
        Err(parse_error(status, resp).await)
    }
}

async fn handle_empty(resp: reqwest::Response) -> Result<(), Error> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(parse_error(status, resp).await)
    }
}

async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Error::SessionExpired;
    }

    Error::Api {
        status: status.as_u16(),
        message: error_message(resp).await,
    }
}

/// Pull a human-readable message out of an error body, if it has one.
pub(crate) async fn error_message(resp: reqwest::Response) -> Option<String> {
    let raw = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&raw) {
        Ok(err) => err.message.or(err.error),
        Err(_) if raw.trim().is_empty() => None,
        Err(_) => Some(raw),
    }
}
