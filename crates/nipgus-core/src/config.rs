// ── Runtime plugin configuration ──
//
// These types describe the endpoints, credentials and timings the plugin
// runs with. They never touch disk: `nipgus-config` (or a test) builds a
// `PluginConfig` and hands it to `Plugin::bootstrap`.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// Where and how to reach the license proxy.
#[derive(Debug, Clone)]
pub struct LicenseSettings {
    pub proxy_url: Url,
    /// Shared secret used to sign license requests.
    pub auth_secret: SecretString,
    pub product_id: String,
    pub plugin_id: String,
    pub timeout: Duration,
    pub cache_ttl: Duration,
}

/// Registry lookup limits.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub max_requests: usize,
    pub window: Duration,
    pub cache_ttl: Duration,
    pub timeout: Duration,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(120),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Host-platform (CRM) settings.
#[derive(Debug, Clone)]
pub struct HostSettings {
    /// Suffix that, stripped from the page host, yields the company domain.
    pub domain_suffix: String,
    pub requests_per_second: u32,
    pub field_cache_ttl: Duration,
    /// Name of the custom field holding the NIP.
    pub nip_field_name: String,
    /// Name of the optional custom field receiving the REGON.
    pub regon_field_name: String,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            domain_suffix: "pipedrive.com".into(),
            requests_per_second: 10,
            field_cache_ttl: Duration::from_secs(300),
            nip_field_name: "NIP".into(),
            regon_field_name: "REGON".into(),
        }
    }
}

impl HostSettings {
    /// Fixed delay kept between consecutive host-platform calls.
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.requests_per_second.max(1)))
    }
}

/// UI timings of the coordinator.
#[derive(Debug, Clone)]
pub struct UiSettings {
    pub debounce: Duration,
    pub success_display: Duration,
    pub error_display: Duration,
    /// How often the polling navigation watcher samples the page URL.
    pub navigation_poll: Duration,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            success_display: Duration::from_secs(3),
            error_display: Duration::from_secs(5),
            navigation_poll: Duration::from_secs(1),
        }
    }
}

/// Complete configuration for one plugin instance.
#[derive(Debug, Clone)]
pub struct PluginConfig {
    /// Base URL of the OAuth session server.
    pub oauth_url: Url,
    /// Query parameter carrying a freshly issued session token.
    pub session_param: String,
    pub user_agent: String,
    /// General API deadline.
    pub api_timeout: Duration,
    pub license: LicenseSettings,
    pub registry: RegistrySettings,
    pub host: HostSettings,
    pub ui: UiSettings,
}

impl PluginConfig {
    /// Production endpoints and limits around the given license secret.
    pub fn with_defaults(auth_secret: SecretString) -> Result<Self, url::ParseError> {
        Ok(Self {
            oauth_url: Url::parse("https://pipedrive-oauth-server.devikit.pl")?,
            session_param: "nip_gus_session".into(),
            user_agent: nipgus_api::DEFAULT_USER_AGENT.into(),
            api_timeout: Duration::from_secs(10),
            license: LicenseSettings {
                proxy_url: Url::parse(
                    "https://proxy.devikit.pl/wp-json/devikit-license/v1/license",
                )?,
                auth_secret,
                product_id: "pipedrive-plugin-uuid".into(),
                plugin_id: "pipedrive-nip-gus".into(),
                timeout: Duration::from_secs(5),
                cache_ttl: Duration::from_secs(300),
            },
            registry: RegistrySettings::default(),
            host: HostSettings::default(),
            ui: UiSettings::default(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn host_interval_follows_rate() {
        let mut host = HostSettings::default();
        assert_eq!(host.request_interval(), Duration::from_millis(100));
        host.requests_per_second = 0;
        assert_eq!(host.request_interval(), Duration::from_secs(1));
    }

    #[test]
    fn defaults_match_production_limits() {
        let cfg = PluginConfig::with_defaults(SecretString::from("x".to_owned())).unwrap();
        assert_eq!(cfg.registry.max_requests, 10);
        assert_eq!(cfg.registry.window, Duration::from_secs(60));
        assert_eq!(cfg.license.timeout, Duration::from_secs(5));
        assert_eq!(cfg.session_param, "nip_gus_session");
    }
}
