// ── Host page abstraction ──
//
// The plugin runs inside a CRM page it does not own. Everything it needs
// from that page (current URL, history replacement, redirects, the host's
// context API, navigation notifications) goes through `HostPage` and
// `NavigationWatcher`, so the core stays independent of any front end.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

const ORGANIZATION_SEGMENT: &str = "organization";

/// What the host's context API reports about the current view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostContext {
    pub organization_id: Option<u64>,
}

/// The page hosting the plugin.
pub trait HostPage: Send + Sync {
    /// Current page URL.
    fn location(&self) -> Url;

    /// Replace the current history entry without navigating.
    fn replace_location(&self, url: Url);

    /// Navigate away (used for the OAuth authorize redirect).
    fn redirect(&self, url: Url);

    /// The host's context API, when it is available.
    fn context(&self) -> Option<HostContext> {
        None
    }

    /// Ask the host to re-render its own view after we changed data.
    /// Returns `false` when the host offers no such hook.
    fn refresh_view(&self) -> bool {
        false
    }
}

/// Navigation notifications delivered to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    UrlChanged(Url),
    OrganizationChanged { id: u64 },
}

/// Organization id from an `/organization/<id>` path segment.
pub fn organization_id_from_path(url: &Url) -> Option<u64> {
    let mut segments = url.path_segments()?;
    segments.find(|s| *s == ORGANIZATION_SEGMENT)?;
    segments.next()?.parse().ok()
}

/// `true` when the page shows an organization.
pub fn is_organization_context(page: &dyn HostPage) -> bool {
    let url = page.location();
    url.path().contains("/organization/")
        || page
            .context()
            .is_some_and(|ctx| ctx.organization_id.is_some())
}

/// Organization id: host context API first, URL path as fallback.
pub fn current_organization_id(page: &dyn HostPage) -> Option<u64> {
    page.context()
        .and_then(|ctx| ctx.organization_id)
        .or_else(|| organization_id_from_path(&page.location()))
}

// ── Navigation watching ──────────────────────────────────────────────

/// Source of [`HostEvent`]s for hosts that cannot push them themselves.
pub trait NavigationWatcher: Send + Sync {
    fn spawn(
        &self,
        page: Arc<dyn HostPage>,
        events: mpsc::UnboundedSender<HostEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()>;
}

/// Samples the page URL on a fixed interval and reports changes.
#[derive(Debug, Clone)]
pub struct PollingWatcher {
    interval: Duration,
}

impl PollingWatcher {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl NavigationWatcher for PollingWatcher {
    fn spawn(
        &self,
        page: Arc<dyn HostPage>,
        events: mpsc::UnboundedSender<HostEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let period = self.interval;
        tokio::spawn(async move {
            let mut last = page.location();
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let now = page.location();
                        if now != last {
                            debug!(url = %now, "page URL changed");
                            last = now.clone();
                            if events.send(HostEvent::UrlChanged(now)).is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        })
    }
}
