//! Shared configuration for the nipgus CLI and server.
//!
//! A TOML file at the platform config path, overridden by `NIPGUS_*`
//! environment variables (`__` separates sections), with secrets resolved
//! through env, then the system keyring, then plaintext config. Translates
//! into `nipgus_core::PluginConfig`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use nipgus_core::{HostSettings, LicenseSettings, PluginConfig, RegistrySettings, UiSettings};

/// Keyring service name all secrets are stored under.
pub const KEYRING_SERVICE: &str = "nipgus";
pub const AUTH_SECRET_ENTRY: &str = "license/auth-secret";
pub const PANEL_PASSWORD_ENTRY: &str = "server/panel-password";

pub const AUTH_SECRET_ENV: &str = "NIPGUS_AUTH_SECRET";
pub const PANEL_PASSWORD_ENV: &str = "NIPGUS_PANEL_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {what} configured")]
    NoCredentials { what: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub oauth: OAuthSection,

    #[serde(default)]
    pub license: LicenseSection,

    #[serde(default)]
    pub registry: RegistrySection,

    #[serde(default)]
    pub host: HostSection,

    #[serde(default)]
    pub ui: UiSection,

    #[serde(default)]
    pub server: ServerSection,

    /// Local key/value store file. Defaults to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// General API deadline in seconds.
    #[serde(default = "default_api_timeout")]
    pub api_timeout: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            api_timeout: default_api_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_api_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    nipgus_api::DEFAULT_USER_AGENT.into()
}

/// OAuth session server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OAuthSection {
    #[serde(default = "default_oauth_url")]
    pub url: String,

    /// Query parameter carrying a new session token.
    #[serde(default = "default_session_param")]
    pub session_param: String,
}

impl Default for OAuthSection {
    fn default() -> Self {
        Self {
            url: default_oauth_url(),
            session_param: default_session_param(),
        }
    }
}

fn default_oauth_url() -> String {
    "https://pipedrive-oauth-server.devikit.pl".into()
}
fn default_session_param() -> String {
    "nip_gus_session".into()
}

/// License proxy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LicenseSection {
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,

    /// Signing secret (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<String>,

    #[serde(default = "default_product_id")]
    pub product_id: String,

    #[serde(default = "default_plugin_id")]
    pub plugin_id: String,

    /// Seconds.
    #[serde(default = "default_license_timeout")]
    pub timeout: u64,

    /// Seconds a successful validation is reused.
    #[serde(default = "default_license_cache_ttl")]
    pub cache_ttl: u64,
}

impl Default for LicenseSection {
    fn default() -> Self {
        Self {
            proxy_url: default_proxy_url(),
            auth_secret: None,
            product_id: default_product_id(),
            plugin_id: default_plugin_id(),
            timeout: default_license_timeout(),
            cache_ttl: default_license_cache_ttl(),
        }
    }
}

fn default_proxy_url() -> String {
    "https://proxy.devikit.pl/wp-json/devikit-license/v1/license".into()
}
fn default_product_id() -> String {
    "pipedrive-plugin-uuid".into()
}
fn default_plugin_id() -> String {
    "pipedrive-nip-gus".into()
}
fn default_license_timeout() -> u64 {
    5
}
fn default_license_cache_ttl() -> u64 {
    300
}

/// Registry lookup limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegistrySection {
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    /// Seconds.
    #[serde(default = "default_window")]
    pub window: u64,

    /// Seconds.
    #[serde(default = "default_registry_cache_ttl")]
    pub cache_ttl: u64,

    /// Seconds.
    #[serde(default = "default_registry_timeout")]
    pub timeout: u64,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window: default_window(),
            cache_ttl: default_registry_cache_ttl(),
            timeout: default_registry_timeout(),
        }
    }
}

fn default_max_requests() -> usize {
    10
}
fn default_window() -> u64 {
    60
}
fn default_registry_cache_ttl() -> u64 {
    120
}
fn default_registry_timeout() -> u64 {
    15
}

/// Host platform (CRM).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostSection {
    #[serde(default = "default_domain_suffix")]
    pub domain_suffix: String,

    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Seconds.
    #[serde(default = "default_field_cache_ttl")]
    pub field_cache_ttl: u64,

    #[serde(default = "default_nip_field_name")]
    pub nip_field_name: String,

    #[serde(default = "default_regon_field_name")]
    pub regon_field_name: String,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            domain_suffix: default_domain_suffix(),
            requests_per_second: default_requests_per_second(),
            field_cache_ttl: default_field_cache_ttl(),
            nip_field_name: default_nip_field_name(),
            regon_field_name: default_regon_field_name(),
        }
    }
}

fn default_domain_suffix() -> String {
    "pipedrive.com".into()
}
fn default_requests_per_second() -> u32 {
    10
}
fn default_field_cache_ttl() -> u64 {
    300
}
fn default_nip_field_name() -> String {
    "NIP".into()
}
fn default_regon_field_name() -> String {
    "REGON".into()
}

/// Coordinator timings, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UiSection {
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,

    #[serde(default = "default_success_display")]
    pub success_display_ms: u64,

    #[serde(default = "default_error_display")]
    pub error_display_ms: u64,

    #[serde(default = "default_navigation_poll")]
    pub navigation_poll_ms: u64,
}

impl Default for UiSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
            success_display_ms: default_success_display(),
            error_display_ms: default_error_display(),
            navigation_poll_ms: default_navigation_poll(),
        }
    }
}

fn default_debounce() -> u64 {
    500
}
fn default_success_display() -> u64 {
    3000
}
fn default_error_display() -> u64 {
    5000
}
fn default_navigation_poll() -> u64 {
    1000
}

/// Static bundle server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,

    /// Directory holding the panel schema; kept apart from `public_dir`.
    #[serde(default = "default_panel_dir")]
    pub panel_dir: PathBuf,

    #[serde(default = "default_panel_username")]
    pub panel_username: String,

    /// JSON panel password (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_password: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_dir: default_public_dir(),
            panel_dir: default_panel_dir(),
            panel_username: default_panel_username(),
            panel_password: None,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:3000".into()
}
fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}
fn default_panel_dir() -> PathBuf {
    PathBuf::from("panel")
}
fn default_panel_username() -> String {
    "pipedrive-plugin".into()
}

impl ServerSection {
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind.parse().map_err(|_| ConfigError::Validation {
            field: "server.bind".into(),
            reason: format!("expected host:port, got '{}'", self.bind),
        })
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("pl", "devikit", "nipgus")
}

fn home_fallback(kind: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(kind);
    p.push("nipgus");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of the local key/value store.
pub fn default_storage_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".local/share").join("storage.json"),
        |dirs| dirs.data_dir().join("storage.json"),
    )
}

impl Config {
    pub fn storage_path(&self) -> PathBuf {
        self.storage_path
            .clone()
            .unwrap_or_else(default_storage_path)
    }
}

// ── Loading and saving ──────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the Config from `path` (which need not exist) + environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("NIPGUS_").split("__"));

    Ok(figment.extract()?)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write it to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_secret(entry_name: &str) -> Option<SecretString> {
    keyring::Entry::new(KEYRING_SERVICE, entry_name)
        .and_then(|entry| entry.get_password())
        .ok()
        .map(SecretString::from)
}

fn resolve_secret(
    env_name: &str,
    entry_name: &str,
    plaintext: Option<&str>,
    what: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Env var
    if let Ok(val) = std::env::var(env_name) {
        if !val.is_empty() {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Some(secret) = keyring_secret(entry_name) {
        return Ok(secret);
    }

    // 3. Plaintext in config
    if let Some(val) = plaintext.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(val.to_owned()));
    }

    Err(ConfigError::NoCredentials { what: what.into() })
}

/// License signing secret: env, keyring, then `license.auth_secret`.
pub fn resolve_auth_secret(cfg: &Config) -> Result<SecretString, ConfigError> {
    resolve_secret(
        AUTH_SECRET_ENV,
        AUTH_SECRET_ENTRY,
        cfg.license.auth_secret.as_deref(),
        "license auth secret",
    )
}

/// JSON panel password: env, keyring, then `server.panel_password`.
pub fn resolve_panel_password(cfg: &Config) -> Result<SecretString, ConfigError> {
    resolve_secret(
        PANEL_PASSWORD_ENV,
        PANEL_PASSWORD_ENTRY,
        cfg.server.panel_password.as_deref(),
        "panel password",
    )
}

/// Store a secret in the system keyring under the nipgus service.
pub fn store_secret(entry_name: &str, secret: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, entry_name)?.set_password(secret)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

fn parse_url(raw: &str, field: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

/// Build a `PluginConfig` with an already resolved signing secret.
pub fn to_plugin_config_with(
    cfg: &Config,
    auth_secret: SecretString,
) -> Result<PluginConfig, ConfigError> {
    if cfg.registry.max_requests == 0 {
        return Err(ConfigError::Validation {
            field: "registry.max_requests".into(),
            reason: "must be at least 1".into(),
        });
    }

    Ok(PluginConfig {
        oauth_url: parse_url(&cfg.oauth.url, "oauth.url")?,
        session_param: cfg.oauth.session_param.clone(),
        user_agent: cfg.defaults.user_agent.clone(),
        api_timeout: Duration::from_secs(cfg.defaults.api_timeout),
        license: LicenseSettings {
            proxy_url: parse_url(&cfg.license.proxy_url, "license.proxy_url")?,
            auth_secret,
            product_id: cfg.license.product_id.clone(),
            plugin_id: cfg.license.plugin_id.clone(),
            timeout: Duration::from_secs(cfg.license.timeout),
            cache_ttl: Duration::from_secs(cfg.license.cache_ttl),
        },
        registry: RegistrySettings {
            max_requests: cfg.registry.max_requests,
            window: Duration::from_secs(cfg.registry.window),
            cache_ttl: Duration::from_secs(cfg.registry.cache_ttl),
            timeout: Duration::from_secs(cfg.registry.timeout),
        },
        host: HostSettings {
            domain_suffix: cfg.host.domain_suffix.clone(),
            requests_per_second: cfg.host.requests_per_second,
            field_cache_ttl: Duration::from_secs(cfg.host.field_cache_ttl),
            nip_field_name: cfg.host.nip_field_name.clone(),
            regon_field_name: cfg.host.regon_field_name.clone(),
        },
        ui: UiSettings {
            debounce: Duration::from_millis(cfg.ui.debounce_ms),
            success_display: Duration::from_millis(cfg.ui.success_display_ms),
            error_display: Duration::from_millis(cfg.ui.error_display_ms),
            navigation_poll: Duration::from_millis(cfg.ui.navigation_poll_ms),
        },
    })
}

/// Build a `PluginConfig`, resolving the signing secret from the chain.
pub fn to_plugin_config(cfg: &Config) -> Result<PluginConfig, ConfigError> {
    let secret = resolve_auth_secret(cfg)?;
    to_plugin_config_with(cfg, secret)
}
