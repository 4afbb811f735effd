// ── Session client ──
//
// Owns the opaque session token issued by the OAuth server and performs
// every authorized call made on the user's behalf. Any 401 drops the token
// (memory and storage) before the error reaches the caller.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use nipgus_api::{CompanyLookupResponse, OAuthClient, ProxyMethod, SessionInfo};

use crate::error::CoreError;
use crate::page::{self, HostPage};
use crate::registry;
use crate::storage::{KeyValueStore, keys};

/// Authorization state shared by the registry and host-platform clients.
pub struct Session {
    client: OAuthClient,
    store: Arc<dyn KeyValueStore>,
    token: ArcSwapOption<SecretString>,
    company_domain: ArcSwapOption<String>,
    domain_suffix: String,
    session_param: String,
}

impl Session {
    pub fn new(
        client: OAuthClient,
        store: Arc<dyn KeyValueStore>,
        domain_suffix: impl Into<String>,
        session_param: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            token: ArcSwapOption::empty(),
            company_domain: ArcSwapOption::empty(),
            domain_suffix: domain_suffix.into(),
            session_param: session_param.into(),
        }
    }

    // ── Initialization ───────────────────────────────────────────────

    /// Pick up a token from the page URL (persisting it and stripping the
    /// parameter from history) or restore the stored one, then derive the
    /// company domain from the page host.
    pub fn initialize(&self, page: &dyn HostPage) -> Result<(), CoreError> {
        let url = page.location();
        self.set_company_domain_from(&url);

        if let Some((token, stripped)) = self.take_token_param(&url) {
            info!("session token received via URL");
            self.store_token(&token)?;
            page.replace_location(stripped);
            return Ok(());
        }

        if let Some(stored) = self.store.get(keys::SESSION).filter(|t| !t.is_empty()) {
            debug!("session token restored from storage");
            self.token.store(Some(Arc::new(SecretString::from(stored))));
        }
        Ok(())
    }

    /// Adopt the token carried by an OAuth callback URL. Returns `false`
    /// when the URL carries none.
    pub fn adopt_from_url(&self, url: &Url) -> Result<bool, CoreError> {
        match self.take_token_param(url) {
            Some((token, _)) => {
                self.store_token(&token)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn take_token_param(&self, url: &Url) -> Option<(String, Url)> {
        let token = url
            .query_pairs()
            .find(|(k, _)| k == self.session_param.as_str())
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())?;

        let remaining: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != self.session_param.as_str())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let mut stripped = url.clone();
        if remaining.is_empty() {
            stripped.set_query(None);
        } else {
            stripped.query_pairs_mut().clear().extend_pairs(remaining);
        }
        Some((token, stripped))
    }

    fn store_token(&self, token: &str) -> Result<(), CoreError> {
        self.store.set(keys::SESSION, token)?;
        self.token
            .store(Some(Arc::new(SecretString::from(token.to_owned()))));
        Ok(())
    }

    fn set_company_domain_from(&self, url: &Url) {
        let domain = url
            .host_str()
            .and_then(|host| company_domain(host, &self.domain_suffix));
        self.company_domain.store(domain.map(Arc::new));
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn is_authorized(&self) -> bool {
        self.token.load().is_some()
    }

    pub fn company_domain(&self) -> Option<String> {
        self.company_domain.load_full().map(|d| (*d).clone())
    }

    /// Override the company domain (hosts without a platform host name).
    pub fn set_company_domain(&self, domain: impl Into<String>) {
        self.company_domain.store(Some(Arc::new(domain.into())));
    }

    pub fn current_organization_id(&self, page: &dyn HostPage) -> Option<u64> {
        page::current_organization_id(page)
    }

    fn token(&self) -> Result<Arc<SecretString>, CoreError> {
        self.token.load_full().ok_or(CoreError::NotAuthorized)
    }

    // ── Authorization flow ───────────────────────────────────────────

    pub fn authorization_url(&self) -> Result<Url, CoreError> {
        let domain = self.company_domain().ok_or_else(|| CoreError::Authorization {
            message: "cannot determine the CRM company domain from the page address".into(),
        })?;
        Ok(self.client.authorize_url(&domain)?)
    }

    /// Send the page to the OAuth authorize endpoint.
    pub fn start_authorization(&self, page: &dyn HostPage) -> Result<(), CoreError> {
        let url = self.authorization_url()?;
        info!(%url, "redirecting to authorization");
        page.redirect(url);
        Ok(())
    }

    /// Forget the token locally.
    pub fn clear(&self) {
        self.token.store(None);
        if let Err(e) = self.store.remove(keys::SESSION) {
            warn!(error = %e, "failed to remove stored session");
        }
    }

    /// Translate an API error, forgetting the token on 401.
    fn on_error(&self, err: nipgus_api::Error) -> nipgus_api::Error {
        if err.is_auth_expired() {
            warn!("session rejected by server, clearing");
            self.clear();
        }
        err
    }

    // ── Authorized calls ─────────────────────────────────────────────

    /// Host-platform API call through the session server's proxy.
    pub async fn authorized_request<T: DeserializeOwned>(
        &self,
        method: ProxyMethod,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<T, CoreError> {
        let token = self.token()?;
        self.client
            .proxy(&token, method, endpoint, body)
            .await
            .map_err(|e| CoreError::from(self.on_error(e)))
    }

    /// Registry lookup; a 401 clears the session like any proxy call.
    pub async fn lookup_company(
        &self,
        nip: &str,
        license_key: &str,
    ) -> Result<CompanyLookupResponse, CoreError> {
        let token = self.token()?;
        self.client
            .company_data(&token, nip, license_key)
            .await
            .map_err(|e| registry::lookup_error(self.on_error(e)))
    }

    /// Session details; `None` when there is no session or it was rejected.
    pub async fn session_info(&self) -> Result<Option<SessionInfo>, CoreError> {
        let Some(token) = self.token.load_full() else {
            return Ok(None);
        };
        match self.client.session_info(&token).await {
            Ok(info) => Ok(Some(info)),
            Err(e) if e.is_auth_expired() => {
                self.on_error(e);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `true` when the server still recognizes the session.
    pub async fn validate(&self) -> bool {
        match self.session_info().await {
            Ok(info) => info.is_some(),
            Err(e) => {
                warn!(error = %e, "session validation failed");
                false
            }
        }
    }

    /// Revoke the session server-side (best effort) and forget it locally.
    pub async fn logout(&self) {
        if let Some(token) = self.token.load_full() {
            if let Err(e) = self.client.logout(&token).await {
                warn!(error = %e, "logout request failed");
            }
        }
        self.clear();
    }
}

/// `acme` for `acme.pipedrive.com` with suffix `pipedrive.com`.
pub fn company_domain(host: &str, suffix: &str) -> Option<String> {
    host.strip_suffix(suffix)?
        .strip_suffix('.')
        .filter(|company| !company.is_empty())
        .map(str::to_owned)
}
