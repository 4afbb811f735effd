//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use nipgus_config::ConfigError;
use nipgus_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const LICENSE: i32 = 5;
    pub const RATE_LIMITED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Input ────────────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(nipgus::validation))]
    Validation { field: String, reason: String },

    // ── Session ──────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(nipgus::auth_required),
        help(
            "Authorize the plugin:\n  \
             nipgus --company <subdomain> session authorize\n\
             then pass the URL you land on to: nipgus session login <url>"
        )
    )]
    AuthRequired { message: String },

    // ── License ──────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(nipgus::license),
        help("Check the key with: nipgus license status\nOr activate it: nipgus license activate <key>")
    )]
    License { message: String },

    #[error("No license key stored")]
    #[diagnostic(
        code(nipgus::no_license_key),
        help("Pass the key as an argument, or store one with: nipgus license activate <key>")
    )]
    NoLicenseKey,

    // ── Registry ─────────────────────────────────────────────────────
    #[error("Registry request limit reached")]
    #[diagnostic(
        code(nipgus::rate_limited),
        help("Try again in {retry_after_secs}s.")
    )]
    RateLimited { retry_after_secs: u64 },

    #[error("{resource} not found: {identifier}")]
    #[diagnostic(code(nipgus::not_found))]
    NotFound {
        resource: String,
        identifier: String,
    },

    // ── Remote ───────────────────────────────────────────────────────
    #[error("Could not reach the service: {reason}")]
    #[diagnostic(
        code(nipgus::connection_failed),
        help("Check your network connection and the service URLs in: nipgus config show")
    )]
    ConnectionFailed { reason: String },

    #[error("Request timed out: {reason}")]
    #[diagnostic(code(nipgus::timeout))]
    Timeout { reason: String },

    #[error("{message}")]
    #[diagnostic(code(nipgus::api_error))]
    Api { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No {what} configured")]
    #[diagnostic(
        code(nipgus::no_credentials),
        help(
            "Store it with: nipgus config set-secret <kind>\n\
             Or set the corresponding NIPGUS_* environment variable."
        )
    )]
    NoCredentials { what: String },

    #[error("Company domain unknown")]
    #[diagnostic(
        code(nipgus::no_company),
        help("Pass --company <subdomain> or set NIPGUS_COMPANY.")
    )]
    NoCompany,

    #[error("Configuration error: {message}")]
    #[diagnostic(code(nipgus::config))]
    Config { message: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Operation '{action}' requires confirmation")]
    #[diagnostic(
        code(nipgus::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } | Self::NoCompany => {
                exit_code::USAGE
            }
            Self::AuthRequired { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::License { .. } | Self::NoLicenseKey => exit_code::LICENSE,
            Self::RateLimited { .. } => exit_code::RATE_LIMITED,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Api { .. } | Self::Config { .. } | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::EmptyInput => CliError::Validation {
                field: "nip".into(),
                reason: message,
            },
            CoreError::InvalidIdentifier { input } => CliError::Validation {
                field: "nip".into(),
                reason: format!("'{input}' is not a valid NIP"),
            },

            CoreError::RateLimited { retry_after } => CliError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            },

            CoreError::LicenseInvalid { .. }
            | CoreError::LicenseExpired
            | CoreError::LicenseLimitExceeded => CliError::License { message },

            CoreError::SessionExpired
            | CoreError::NotAuthorized
            | CoreError::Authorization { .. } => CliError::AuthRequired { message },

            CoreError::NetworkError { reason } if reason.contains("timed out") => {
                CliError::Timeout { reason }
            }
            CoreError::NetworkError { reason } => CliError::ConnectionFailed { reason },

            CoreError::MissingOrganization => CliError::NotFound {
                resource: "organization".into(),
                identifier: "(current page)".into(),
            },

            CoreError::RegistryApiError { .. }
            | CoreError::InvalidRegistryData
            | CoreError::HostApiError { .. }
            | CoreError::FieldCreationError { .. }
            | CoreError::DataUpdateError { .. } => CliError::Api { message },

            CoreError::Storage { message } | CoreError::Config { message } => {
                CliError::Config { message }
            }
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { what } => CliError::NoCredentials { what },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
