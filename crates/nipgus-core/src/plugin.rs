// ── Application object ──
//
// `Plugin::bootstrap` wires one instance of every service from a
// `PluginConfig`, a storage backend and the host page. Front ends hold the
// resulting `Plugin` (or clones of its `PluginServices`) for the lifetime of
// the page.

use std::sync::Arc;

use tracing::{info, warn};

use nipgus_api::{LicenseClient, OAuthClient, ProductIdentity, TransportConfig};

use crate::config::PluginConfig;
use crate::error::CoreError;
use crate::host::HostService;
use crate::license::LicenseService;
use crate::page::HostPage;
use crate::registry::RegistryService;
use crate::session::Session;
use crate::storage::KeyValueStore;

/// Shared handles to the plugin's services.
#[derive(Clone)]
pub struct PluginServices {
    pub session: Arc<Session>,
    pub license: Arc<LicenseService>,
    pub registry: Arc<RegistryService>,
    pub host: Arc<HostService>,
}

pub struct Plugin {
    config: PluginConfig,
    store: Arc<dyn KeyValueStore>,
    services: PluginServices,
}

impl Plugin {
    /// Build every service and initialize the session from the page.
    pub fn bootstrap(
        config: PluginConfig,
        store: Arc<dyn KeyValueStore>,
        page: &dyn HostPage,
    ) -> Result<Self, CoreError> {
        let transport = TransportConfig::default().with_user_agent(config.user_agent.clone());

        let oauth = OAuthClient::new(config.oauth_url.as_str(), &transport)?
            .with_timeouts(config.api_timeout, config.registry.timeout);
        let license_client = LicenseClient::new(
            config.license.proxy_url.as_str(),
            ProductIdentity {
                product_id: config.license.product_id.clone(),
                plugin_id: config.license.plugin_id.clone(),
            },
            config.license.auth_secret.clone(),
            &transport,
        )?
        .with_timeout(config.license.timeout);

        let session = Arc::new(Session::new(
            oauth,
            Arc::clone(&store),
            config.host.domain_suffix.clone(),
            config.session_param.clone(),
        ));
        if let Err(e) = session.initialize(page) {
            warn!(error = %e, "session initialization failed");
        }

        let page_host = page.location().host_str().unwrap_or_default().to_owned();
        let license = Arc::new(LicenseService::new(
            license_client,
            Arc::clone(&store),
            config.license.cache_ttl,
            page_host,
        ));
        let registry = Arc::new(RegistryService::new(
            Arc::clone(&session),
            Arc::clone(&license),
            &config.registry,
        ));
        let host = Arc::new(HostService::new(
            Arc::clone(&session),
            Arc::clone(&store),
            &config.host,
        ));

        info!(
            oauth = %config.oauth_url,
            authorized = session.is_authorized(),
            "plugin bootstrapped"
        );

        Ok(Self {
            config,
            store,
            services: PluginServices {
                session,
                license,
                registry,
                host,
            },
        })
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn services(&self) -> &PluginServices {
        &self.services
    }

    pub fn session(&self) -> &Session {
        &self.services.session
    }

    pub fn license(&self) -> &LicenseService {
        &self.services.license
    }

    pub fn registry(&self) -> &RegistryService {
        &self.services.registry
    }

    pub fn host(&self) -> &HostService {
        &self.services.host
    }
}
