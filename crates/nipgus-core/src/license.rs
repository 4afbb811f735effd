// ── License client ──
//
// Validates and activates the paid-feature license against the license
// proxy. Successful validations are cached per (key, domain) for a few
// minutes; the key itself and the last validation time are persisted.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use nipgus_api::{LicenseClient, LicenseResponse};

use crate::cache::TtlCache;
use crate::error::CoreError;
use crate::storage::{KeyValueStore, keys};

/// Minimum length of a plausible license key.
pub const MIN_KEY_LENGTH: usize = 16;

/// Result of a successful validation or activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseStatus {
    pub valid: bool,
    pub activations_used: Option<u32>,
    pub activations_limit: Option<u32>,
    pub expiry_date: Option<NaiveDate>,
    pub domain: String,
}

impl LicenseStatus {
    fn from_response(resp: &LicenseResponse, domain: &str) -> Self {
        Self {
            valid: resp.success,
            activations_used: resp.activations_used,
            activations_limit: resp.activations_limit,
            expiry_date: resp.expiry_date.as_deref().and_then(parse_expiry),
            domain: domain.to_owned(),
        }
    }
}

/// Summary of the stored license, for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseInfo {
    pub has_key: bool,
    pub status: Option<LicenseStatus>,
    pub last_validation: Option<DateTime<Utc>>,
    /// Why the stored key did not validate, if it did not.
    pub error: Option<String>,
}

/// `true` for keys of at least 16 characters from `[A-Za-z0-9-]`.
pub fn is_plausible_key(key: &str) -> bool {
    key.len() >= MIN_KEY_LENGTH && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn parse_expiry(raw: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|dt| dt.date())
                .ok()
        })
}

/// Map a proxy rejection reason onto the license error kinds.
fn classify_rejection(message: Option<String>) -> CoreError {
    let lower = message.as_deref().unwrap_or_default().to_lowercase();
    if lower.contains("expired") {
        CoreError::LicenseExpired
    } else if lower.contains("limit") || lower.contains("activation") {
        CoreError::LicenseLimitExceeded
    } else {
        CoreError::LicenseInvalid { message }
    }
}

fn map_api_error(err: nipgus_api::Error) -> CoreError {
    match err {
        nipgus_api::Error::Rejected { message } => classify_rejection(message),
        other => CoreError::network(&other),
    }
}

pub struct LicenseService {
    client: LicenseClient,
    store: Arc<dyn KeyValueStore>,
    cache: TtlCache<(String, String), LicenseStatus>,
    default_domain: String,
}

impl LicenseService {
    pub fn new(
        client: LicenseClient,
        store: Arc<dyn KeyValueStore>,
        cache_ttl: std::time::Duration,
        default_domain: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            cache: TtlCache::new(cache_ttl),
            default_domain: default_domain.into(),
        }
    }

    /// Domain used when a call does not name one (the page host).
    pub fn default_domain(&self) -> &str {
        &self.default_domain
    }

    pub fn stored_key(&self) -> Option<String> {
        self.store
            .get(keys::LICENSE_KEY)
            .filter(|key| !key.trim().is_empty())
    }

    pub async fn validate(
        &self,
        key: &str,
        domain: Option<&str>,
    ) -> Result<LicenseStatus, CoreError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(CoreError::LicenseInvalid {
                message: Some("license key is empty".into()),
            });
        }
        let domain = domain.unwrap_or(&self.default_domain);
        let cache_key = (key.to_owned(), domain.to_owned());

        if let Some(status) = self.cache.get(&cache_key) {
            debug!(domain, "license validation served from cache");
            return Ok(status);
        }

        let resp = self
            .client
            .validate(key, domain)
            .await
            .map_err(map_api_error)?;
        let status = LicenseStatus::from_response(&resp, domain);

        self.persist(key)?;
        self.cache.insert(cache_key, status.clone());
        info!(domain, "license validated");
        Ok(status)
    }

    pub async fn activate(
        &self,
        key: &str,
        domain: Option<&str>,
    ) -> Result<LicenseStatus, CoreError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(CoreError::LicenseInvalid {
                message: Some("license key is empty".into()),
            });
        }
        let domain = domain.unwrap_or(&self.default_domain);

        let resp = self
            .client
            .activate(key, domain)
            .await
            .map_err(map_api_error)?;

        self.cache.clear();
        self.persist(key)?;
        info!(domain, "license activated");
        Ok(LicenseStatus::from_response(&resp, domain))
    }

    /// Validate, and when the key is merely not activated here, activate it.
    pub async fn validate_or_activate(&self, key: &str) -> Result<LicenseStatus, CoreError> {
        match self.validate(key, None).await {
            Err(CoreError::LicenseInvalid { .. }) => {
                debug!("validation refused, attempting activation");
                self.activate(key, None).await
            }
            other => other,
        }
    }

    /// `true` only for a stored key that validates right now.
    pub async fn has_valid_license(&self) -> bool {
        let Some(key) = self.stored_key() else {
            return false;
        };
        match self.validate(&key, None).await {
            Ok(status) => status.valid,
            Err(e) => {
                warn!(error = %e, "stored license did not validate");
                false
            }
        }
    }

    pub async fn license_info(&self) -> LicenseInfo {
        let Some(key) = self.stored_key() else {
            return LicenseInfo {
                has_key: false,
                status: None,
                last_validation: self.last_validation(),
                error: None,
            };
        };

        let (status, error) = match self.validate(&key, None).await {
            Ok(status) => (Some(status), None),
            Err(e) => (None, Some(e.to_string())),
        };
        LicenseInfo {
            has_key: true,
            status,
            last_validation: self.last_validation(),
            error,
        }
    }

    /// Forget the key, its validation timestamp and every cached result.
    pub fn clear(&self) -> Result<(), CoreError> {
        self.cache.clear();
        self.store.remove(keys::LICENSE_KEY)?;
        self.store.remove(keys::LAST_VALIDATION)
    }

    fn last_validation(&self) -> Option<DateTime<Utc>> {
        self.store
            .get(keys::LAST_VALIDATION)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn persist(&self, key: &str) -> Result<(), CoreError> {
        self.store.set(keys::LICENSE_KEY, key)?;
        self.store
            .set(keys::LAST_VALIDATION, &Utc::now().to_rfc3339())
    }
}
