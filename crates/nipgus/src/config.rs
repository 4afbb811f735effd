//! CLI wiring on top of `nipgus-config`: `GlobalOpts`-aware loading, the
//! local store, and the page stand-in the core services run against.

use std::sync::{Arc, Mutex, PoisonError};

use secrecy::SecretString;
use tracing::debug;
use url::Url;

use nipgus_config::Config;
use nipgus_core::{HostPage, JsonFileStore, Plugin};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use nipgus_config::config_path;

/// Load the config from `--config` or the canonical path, plus env.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = global.config.clone().unwrap_or_else(config_path);
    debug!(path = %path.display(), "loading config");
    Ok(nipgus_config::load_config_from(&path)?)
}

pub fn open_store(global: &GlobalOpts, cfg: &Config) -> Result<Arc<JsonFileStore>, CliError> {
    let path = global.storage.clone().unwrap_or_else(|| cfg.storage_path());
    Ok(Arc::new(JsonFileStore::open(path)?))
}

// ── Page stand-in ───────────────────────────────────────────────────

/// The CRM page as the CLI sees it: an address synthesized from the
/// company subdomain, with redirects printed for the user to open.
pub struct CliPage {
    url: Mutex<Url>,
    quiet: bool,
}

impl CliPage {
    pub fn new(url: Url, quiet: bool) -> Arc<Self> {
        Arc::new(Self {
            url: Mutex::new(url),
            quiet,
        })
    }
}

impl HostPage for CliPage {
    fn location(&self) -> Url {
        self.url
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_location(&self, url: Url) {
        *self.url.lock().unwrap_or_else(PoisonError::into_inner) = url;
    }

    fn redirect(&self, url: Url) {
        if !self.quiet {
            eprintln!("Open in your browser:\n  {url}");
        }
    }
}

/// `https://<company>.<suffix>/[organization/<id>]`.
pub fn page_url(
    global: &GlobalOpts,
    cfg: &Config,
    organization: Option<u64>,
) -> Result<Url, CliError> {
    let host = match global.company.as_deref().map(str::trim) {
        Some(company) if !company.is_empty() => format!("{company}.{}", cfg.host.domain_suffix),
        _ => cfg.host.domain_suffix.clone(),
    };
    let path = organization.map_or_else(String::new, |id| format!("organization/{id}"));
    format!("https://{host}/{path}")
        .parse()
        .map_err(|_| CliError::Validation {
            field: "company".into(),
            reason: format!("'{host}' is not a valid host name"),
        })
}

// ── Plugin construction ─────────────────────────────────────────────

/// What a command needs from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Needs {
    /// Only the session (no license calls).
    Session,
    /// License signing as well.
    License,
}

pub struct Context {
    pub plugin: Plugin,
    pub page: Arc<CliPage>,
    pub config: Config,
}

/// Bootstrap the plugin services against a synthesized page.
pub fn bootstrap(
    global: &GlobalOpts,
    needs: Needs,
    organization: Option<u64>,
) -> Result<Context, CliError> {
    let cfg = load(global)?;
    let secret = match needs {
        Needs::License => nipgus_config::resolve_auth_secret(&cfg)?,
        // Signing is never exercised; any key keeps the client constructible.
        Needs::Session => nipgus_config::resolve_auth_secret(&cfg)
            .unwrap_or_else(|_| SecretString::from(String::new())),
    };
    let plugin_config = nipgus_config::to_plugin_config_with(&cfg, secret)?;

    let store = open_store(global, &cfg)?;
    let page = CliPage::new(page_url(global, &cfg, organization)?, global.quiet);
    let plugin = Plugin::bootstrap(plugin_config, store, page.as_ref())?;

    Ok(Context {
        plugin,
        page,
        config: cfg,
    })
}

