// ── Registry client ──
//
// Company lookups against the business registry, routed through the
// session server. Admission order per lookup:
//   input check -> cache -> rate window (slot consumed) -> license key -> call
// A rate-limited caller is refused before the license is even looked at.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use nipgus_api::CompanyRecord;

use crate::cache::TtlCache;
use crate::config::RegistrySettings;
use crate::error::CoreError;
use crate::license::LicenseService;
use crate::nip;
use crate::rate_limit::SlidingWindow;
use crate::session::Session;

/// NIP status value the registry uses for an active taxpayer.
pub const ACTIVE_STATUS: &str = "Czynny";

/// Taxpayer status summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NipStatus {
    pub nip: String,
    pub active: bool,
    pub status: Option<String>,
    pub registration_date: Option<String>,
    pub end_date: Option<String>,
}

/// Lookup budget snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageStats {
    pub requests_in_window: usize,
    pub max_requests: usize,
    pub can_request: bool,
    pub cached_entries: usize,
}

pub struct RegistryService {
    session: Arc<Session>,
    license: Arc<LicenseService>,
    window: SlidingWindow,
    cache: TtlCache<String, CompanyRecord>,
}

impl RegistryService {
    pub fn new(
        session: Arc<Session>,
        license: Arc<LicenseService>,
        settings: &RegistrySettings,
    ) -> Self {
        Self {
            session,
            license,
            window: SlidingWindow::new(settings.max_requests, settings.window),
            cache: TtlCache::new(settings.cache_ttl),
        }
    }

    /// Company record for a NIP in any common notation.
    pub async fn get_company_data(&self, raw: &str) -> Result<CompanyRecord, CoreError> {
        if raw.trim().is_empty() {
            return Err(CoreError::EmptyInput);
        }
        let digits = nip::clean(raw);
        if !nip::validate(&digits) {
            return Err(CoreError::InvalidIdentifier {
                input: raw.to_owned(),
            });
        }

        if let Some(record) = self.cache.get(&digits) {
            debug!(nip = %digits, "registry record served from cache");
            return Ok(record);
        }

        self.window
            .try_acquire()
            .map_err(|retry_after| CoreError::RateLimited { retry_after })?;

        let license_key = self
            .license
            .stored_key()
            .ok_or(CoreError::LicenseInvalid { message: None })?;

        let resp = self
            .session
            .lookup_company(&digits, &license_key)
            .await?;

        if !resp.success {
            return Err(classify_message(resp.message));
        }
        let record = resp
            .data
            .filter(|r| r.nip.as_deref().is_some_and(|n| !n.is_empty()))
            .ok_or(CoreError::InvalidRegistryData)?;

        info!(nip = %digits, "registry record fetched");
        self.cache.insert(digits, record.clone());
        Ok(record)
    }

    /// Whether the taxpayer is currently active.
    pub async fn check_nip_status(&self, raw: &str) -> Result<NipStatus, CoreError> {
        let record = self.get_company_data(raw).await?;
        Ok(NipStatus {
            nip: record.nip.clone().unwrap_or_else(|| nip::clean(raw)),
            active: record.nip_status.as_deref() == Some(ACTIVE_STATUS),
            status: record.nip_status,
            registration_date: record.registration_date,
            end_date: record.end_date,
        })
    }

    /// Declared business activities of the company.
    pub async fn company_activities(&self, raw: &str) -> Result<Vec<Value>, CoreError> {
        Ok(self.get_company_data(raw).await?.activities)
    }

    pub fn usage_stats(&self) -> UsageStats {
        let requests_in_window = self.window.in_window();
        UsageStats {
            requests_in_window,
            max_requests: self.window.max(),
            can_request: requests_in_window < self.window.max(),
            cached_entries: self.cache.len(),
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

/// Registry-specific reading of a failed company lookup.
pub(crate) fn lookup_error(err: nipgus_api::Error) -> CoreError {
    match err {
        nipgus_api::Error::SessionExpired => CoreError::SessionExpired,
        ref e if e.is_network() => CoreError::network(e),
        nipgus_api::Error::Api { status: 404, .. } => CoreError::RegistryApiError {
            message: "no company is registered under this NIP".into(),
        },
        nipgus_api::Error::Api { status: 429, .. } => CoreError::RateLimited {
            retry_after: std::time::Duration::from_secs(60),
        },
        nipgus_api::Error::Api { message, .. } | nipgus_api::Error::Rejected { message } => {
            classify_message(message)
        }
        other => CoreError::RegistryApiError {
            message: other.to_string(),
        },
    }
}

/// Server-side refusals that concern the license send the user back to the
/// license gate; everything else is a registry error.
fn classify_message(message: Option<String>) -> CoreError {
    match message {
        Some(m) if m.to_lowercase().contains("licen") => CoreError::LicenseInvalid {
            message: Some(m),
        },
        Some(m) if !m.trim().is_empty() => CoreError::RegistryApiError { message: m },
        _ => CoreError::RegistryApiError {
            message: "the registry lookup failed".into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn license_messages_route_to_license_gate() {
        assert!(matches!(
            classify_message(Some("Nieprawidłowa licencja".into())),
            CoreError::LicenseInvalid { .. }
        ));
        assert!(matches!(
            classify_message(Some("License revoked".into())),
            CoreError::LicenseInvalid { .. }
        ));
    }

    #[test]
    fn other_messages_are_registry_errors() {
        match classify_message(Some("GUS unavailable".into())) {
            CoreError::RegistryApiError { message } => assert_eq!(message, "GUS unavailable"),
            other => panic!("unexpected: {other:?}"),
        }
        match classify_message(None) {
            CoreError::RegistryApiError { message } => {
                assert_eq!(message, "the registry lookup failed");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn status_codes_map() {
        assert!(matches!(
            lookup_error(nipgus_api::Error::Api {
                status: 429,
                message: None
            }),
            CoreError::RateLimited { .. }
        ));
        assert!(matches!(
            lookup_error(nipgus_api::Error::Timeout { timeout_ms: 15_000 }),
            CoreError::NetworkError { .. }
        ));
        assert!(matches!(
            lookup_error(nipgus_api::Error::SessionExpired),
            CoreError::SessionExpired
        ));
    }
}
