// ── Core error types ──
//
// Domain errors surfaced to the plugin UI and the CLI. Consumers never see
// HTTP status codes or JSON parse failures directly; the services translate
// `nipgus_api::Error` into the variant that fits the call that failed.
// The blanket `From` impl below covers the context-free cases.

use std::time::Duration;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input ────────────────────────────────────────────────────────
    #[error("Enter a NIP")]
    EmptyInput,

    #[error("Invalid NIP: {input}")]
    InvalidIdentifier { input: String },

    // ── Rate limiting ────────────────────────────────────────────────
    #[error("Too many registry requests -- try again in {}s", .retry_after.as_secs().max(1))]
    RateLimited { retry_after: Duration },

    // ── License ──────────────────────────────────────────────────────
    #[error("License is invalid{}", detail(.message.as_deref()))]
    LicenseInvalid { message: Option<String> },

    #[error("License has expired")]
    LicenseExpired,

    #[error("License activation limit reached")]
    LicenseLimitExceeded,

    // ── Session ──────────────────────────────────────────────────────
    #[error("Session expired -- authorize the plugin again")]
    SessionExpired,

    #[error("Plugin is not authorized with the CRM")]
    NotAuthorized,

    #[error("Authorization failed: {message}")]
    Authorization { message: String },

    // ── Remote services ──────────────────────────────────────────────
    #[error("Network error: {reason}")]
    NetworkError { reason: String },

    #[error("Registry lookup failed: {message}")]
    RegistryApiError { message: String },

    #[error("Registry returned incomplete company data")]
    InvalidRegistryData,

    #[error("CRM API error: {message}")]
    HostApiError { message: String },

    #[error("Could not create the NIP field: {message}")]
    FieldCreationError { message: String },

    #[error("Could not update the organization: {message}")]
    DataUpdateError { message: String },

    #[error("Cannot determine the current organization")]
    MissingOrganization,

    // ── Local ────────────────────────────────────────────────────────
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

fn detail(message: Option<&str>) -> String {
    message.map(|m| format!(": {m}")).unwrap_or_default()
}

impl CoreError {
    /// `true` when the plugin should fall back to the license gate.
    pub fn is_license_problem(&self) -> bool {
        matches!(
            self,
            Self::LicenseInvalid { .. } | Self::LicenseExpired | Self::LicenseLimitExceeded
        )
    }

    /// `true` when the user has to go through authorization again.
    pub fn requires_reauthorization(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::NotAuthorized)
    }

    pub(crate) fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }

    pub(crate) fn network(err: &nipgus_api::Error) -> Self {
        Self::NetworkError {
            reason: err.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<nipgus_api::Error> for CoreError {
    fn from(err: nipgus_api::Error) -> Self {
        match err {
            nipgus_api::Error::SessionExpired => CoreError::SessionExpired,
            nipgus_api::Error::Transport(_) | nipgus_api::Error::Timeout { .. } => {
                CoreError::network(&err)
            }
            nipgus_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            nipgus_api::Error::Tls(message) | nipgus_api::Error::Signing(message) => {
                CoreError::Config { message }
            }
            nipgus_api::Error::Api { status, message } => CoreError::HostApiError {
                message: message.unwrap_or_else(|| format!("HTTP {status}")),
            },
            nipgus_api::Error::Rejected { message } => CoreError::HostApiError {
                message: message.unwrap_or_else(|| "request rejected".into()),
            },
            nipgus_api::Error::Deserialization { message, .. } => {
                CoreError::HostApiError { message }
            }
        }
    }
}
