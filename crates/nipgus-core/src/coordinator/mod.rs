//! Plugin coordinator: the UI state machine.
//!
//! ```text
//! Uninitialized ──► LicenseGate ──► Authorizing ──► Ready
//!       │               ▲                ▲            │
//!       ▼               └── license err ─┴─ 401 ──────┘
//!    Dormant (not an organization page)
//! ```
//!
//! In `Ready` each fetch cycles `Idle → Loading → Success|Error → Idle`.
//! The coordinator runs as one task that drains a single message channel;
//! it alone mutates plugin state and publishes [`ViewState`] snapshots.

mod event;
mod field;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use event::{FieldValidation, PluginEvent, UserAction};
pub use field::{NipField, check as check_field};
pub use state::{FetchState, FetchView, FieldView, LicenseView, Phase, ViewState};

use event::Message;

use crate::config::UiSettings;
use crate::error::CoreError;
use crate::license;
use crate::page::{self, HostEvent, HostPage, NavigationWatcher, PollingWatcher};
use crate::plugin::PluginServices;

// ── Handle ───────────────────────────────────────────────────────────

/// Front-end side of a running coordinator.
#[derive(Clone)]
pub struct PluginHandle {
    tx: mpsc::UnboundedSender<Message>,
    host_tx: mpsc::UnboundedSender<HostEvent>,
    view: watch::Receiver<ViewState>,
    cancel: CancellationToken,
}

impl PluginHandle {
    pub fn send(&self, action: UserAction) {
        if self.tx.send(Message::User(action)).is_err() {
            debug!("coordinator gone, action dropped");
        }
    }

    pub fn input(&self, text: impl Into<String>) {
        self.send(UserAction::Input(text.into()));
    }

    pub fn focus(&self) {
        self.send(UserAction::Focus);
    }

    pub fn blur(&self) {
        self.send(UserAction::Blur);
    }

    pub fn fetch(&self) {
        self.send(UserAction::Fetch);
    }

    pub fn submit_license(&self, key: impl Into<String>) {
        self.send(UserAction::SubmitLicense(key.into()));
    }

    pub fn authorize(&self) {
        self.send(UserAction::Authorize);
    }

    /// Deliver a navigation notification pushed by the host.
    pub fn host_event(&self, event: HostEvent) {
        let _ = self.host_tx.send(event);
    }

    pub fn view(&self) -> watch::Receiver<ViewState> {
        self.view.clone()
    }

    pub fn snapshot(&self) -> ViewState {
        self.view.borrow().clone()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Coordinator ──────────────────────────────────────────────────────

pub struct Coordinator {
    services: PluginServices,
    page: Arc<dyn HostPage>,
    ui: UiSettings,
    view: watch::Sender<ViewState>,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    host_tx: mpsc::UnboundedSender<HostEvent>,
    host_rx: mpsc::UnboundedReceiver<HostEvent>,
    field: NipField,
    watcher: Option<Box<dyn NavigationWatcher>>,
    cancel: CancellationToken,
    /// Bumped on every fetch display change; revert timers carry it.
    generation: u64,
    organization_id: Option<u64>,
}

impl Coordinator {
    pub fn new(
        services: PluginServices,
        page: Arc<dyn HostPage>,
        ui: UiSettings,
    ) -> (Self, PluginHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let (view, view_rx) = watch::channel(ViewState::default());
        let cancel = CancellationToken::new();

        let handle = PluginHandle {
            tx: tx.clone(),
            host_tx: host_tx.clone(),
            view: view_rx,
            cancel: cancel.clone(),
        };
        let coordinator = Self {
            services,
            page,
            field: NipField::new(ui.debounce, tx.clone()),
            ui,
            view,
            tx,
            rx,
            host_tx,
            host_rx,
            watcher: None,
            cancel,
            generation: 0,
            organization_id: None,
        };
        (coordinator, handle)
    }

    /// Watch navigation with `watcher` for hosts that cannot push events.
    pub fn with_watcher(mut self, watcher: impl NavigationWatcher + 'static) -> Self {
        self.watcher = Some(Box::new(watcher));
        self
    }

    /// Poll the page URL every `ui.navigation_poll`.
    pub fn with_polling(self) -> Self {
        let watcher = PollingWatcher::new(self.ui.navigation_poll);
        self.with_watcher(watcher)
    }

    /// Run until shut down.
    pub async fn run(mut self) {
        let watcher_task = self.watcher.take().map(|w| {
            w.spawn(
                Arc::clone(&self.page),
                self.host_tx.clone(),
                self.cancel.child_token(),
            )
        });

        self.start().await;

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                Some(event) = self.host_rx.recv() => self.handle_host_event(event).await,
                Some(msg) = self.rx.recv() => match msg {
                    Message::User(UserAction::Shutdown) => break,
                    Message::User(action) => self.handle_action(action).await,
                    Message::Plugin(event) => self.handle_event(event).await,
                },
            }
        }

        self.field.cancel_pending();
        self.cancel.cancel();
        if let Some(task) = watcher_task {
            let _ = task.await;
        }
        info!("coordinator stopped");
    }

    // ── Phase transitions ────────────────────────────────────────────

    async fn start(&mut self) {
        if !page::is_organization_context(self.page.as_ref()) {
            debug!("not an organization page, staying dormant");
            self.update(|v| {
                v.phase = Phase::Dormant;
                v.visible = false;
            });
            return;
        }

        self.organization_id = page::current_organization_id(self.page.as_ref());
        let organization_id = self.organization_id;
        self.update(|v| {
            v.visible = true;
            v.organization_id = organization_id;
        });
        self.check_license().await;
    }

    async fn check_license(&mut self) {
        if self.services.license.has_valid_license().await {
            self.check_authorization().await;
        } else {
            self.enter_license_gate(None);
        }
    }

    fn enter_license_gate(&mut self, error: Option<String>) {
        info!("entering license gate");
        let prefill = self.services.license.stored_key();
        self.update(|v| {
            v.phase = Phase::LicenseGate;
            v.license.prefill = prefill;
            v.license.submitting = false;
            v.license.error = error;
        });
    }

    async fn check_authorization(&mut self) {
        let session = &self.services.session;
        if session.is_authorized() && session.validate().await {
            self.enter_ready().await;
            return;
        }

        info!("authorization required");
        let (url, notice) = match self.services.session.authorization_url() {
            Ok(url) => (Some(url), None),
            Err(e) => (None, Some(e.to_string())),
        };
        self.update(|v| {
            v.phase = Phase::Authorizing;
            v.authorization_url = url;
            v.notice = notice;
        });
    }

    async fn enter_ready(&mut self) {
        info!("plugin ready");
        self.update(|v| {
            v.phase = Phase::Ready;
            v.authorization_url = None;
            v.notice = None;
        });

        if let Err(e) = self.services.host.ensure_nip_field().await {
            warn!(error = %e, "NIP field setup failed");
            self.handle_side_error(&e);
            return;
        }
        self.load_value().await;
    }

    async fn load_value(&mut self) {
        let Some(id) = self.organization_id else {
            self.field.set_value("");
            return;
        };
        match self.services.host.organization_nip(id).await {
            Ok(value) => self.field.set_value(value.as_deref().unwrap_or_default()),
            Err(e) => {
                warn!(organization = id, error = %e, "loading NIP failed");
                self.handle_side_error(&e);
            }
        }
    }

    /// Errors outside the fetch cycle: shown as a notice, and routed back
    /// to the gate or the authorization prompt when they call for it.
    fn handle_side_error(&mut self, error: &CoreError) {
        if error.requires_reauthorization() {
            self.update(|v| {
                v.phase = Phase::Authorizing;
                v.notice = Some(error.to_string());
            });
            self.refresh_authorization_url();
        } else if error.is_license_problem() {
            self.enter_license_gate(Some(error.to_string()));
        } else {
            let notice = error.to_string();
            self.update(|v| v.notice = Some(notice));
        }
    }

    fn refresh_authorization_url(&mut self) {
        let url = self.services.session.authorization_url().ok();
        self.update(|v| v.authorization_url = url);
    }

    // ── User actions ─────────────────────────────────────────────────

    async fn handle_action(&mut self, action: UserAction) {
        let phase = self.view.borrow().phase;
        match action {
            UserAction::Input(text) if phase == Phase::Ready => self.field.input(&text),
            UserAction::Focus if phase == Phase::Ready => {
                self.update(|v| v.field.error = None);
            }
            UserAction::Blur if phase == Phase::Ready => self.field.blur(),
            UserAction::Fetch if phase == Phase::Ready => self.start_fetch(),
            UserAction::SubmitLicense(key) if phase == Phase::LicenseGate => {
                self.submit_license(&key).await;
            }
            UserAction::Authorize if phase == Phase::Authorizing => {
                if let Err(e) = self.services.session.start_authorization(self.page.as_ref()) {
                    let notice = e.to_string();
                    self.update(|v| v.notice = Some(notice));
                }
            }
            other => debug!(?other, %phase, "action ignored in current phase"),
        }
    }

    async fn submit_license(&mut self, key: &str) {
        let key = key.trim();
        if !license::is_plausible_key(key) {
            self.update(|v| {
                v.license.error = Some(format!(
                    "A license key has at least {} letters, digits or dashes",
                    license::MIN_KEY_LENGTH
                ));
            });
            return;
        }

        self.update(|v| {
            v.license.submitting = true;
            v.license.error = None;
        });
        match self.services.license.validate_or_activate(key).await {
            Ok(status) => {
                let valid = status.valid;
                self.update(|v| {
                    v.license.submitting = false;
                    v.license.status = Some(status);
                });
                self.emit(PluginEvent::LicenseChanged { valid });
            }
            Err(e) => {
                let error = e.to_string();
                self.update(|v| {
                    v.license.submitting = false;
                    v.license.error = Some(error);
                });
            }
        }
    }

    fn start_fetch(&mut self) {
        let (loading, valid) = {
            let view = self.view.borrow();
            (view.fetch.state == FetchState::Loading, view.field.valid)
        };
        if loading || !valid {
            return;
        }

        self.generation += 1;
        self.update(|v| {
            v.fetch.state = FetchState::Loading;
            v.fetch.enabled = false;
            v.fetch.message = None;
        });

        let digits = self.field.digits();
        let organization_id = self.organization_id;
        let services = self.services.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let event = match fetch_and_apply(&services, &digits, organization_id).await {
                Ok((organization_id, record)) => PluginEvent::DataFetched {
                    organization_id,
                    record: Box::new(record),
                },
                Err(e) => PluginEvent::Error(e),
            };
            let _ = tx.send(Message::Plugin(event));
        });
    }

    // ── Component events ─────────────────────────────────────────────

    async fn handle_event(&mut self, event: PluginEvent) {
        match event {
            PluginEvent::ValueChanged { revision, display } => {
                if revision != self.field.revision() {
                    return;
                }
                self.update(|v| {
                    v.field.text = display;
                    v.field.valid = false;
                    v.field.error = None;
                    if v.fetch.state != FetchState::Loading {
                        v.fetch.enabled = false;
                    }
                });
            }
            PluginEvent::ValidationChanged(result) => {
                if result.revision != self.field.revision() {
                    return;
                }
                self.update(|v| {
                    v.field.valid = result.valid;
                    v.field.error = result.error;
                    v.fetch.enabled = result.valid && v.fetch.state != FetchState::Loading;
                });
            }
            PluginEvent::DataFetched {
                organization_id,
                record,
            } => {
                let name = record.display_name().unwrap_or("company").to_owned();
                info!(organization = organization_id, %name, "organization filled from registry");
                self.finish_fetch(
                    FetchState::Success,
                    format!("Saved registry data for {name}"),
                    self.ui.success_display,
                );
                if let Some(nip) = record.nip.as_deref() {
                    self.field.set_value(nip);
                }
                if !self.page.refresh_view() {
                    debug!("host offers no view refresh");
                }
            }
            PluginEvent::Error(error) => {
                warn!(%error, "fetch failed");
                self.finish_fetch(FetchState::Error, error.to_string(), self.ui.error_display);
                if error.is_license_problem() {
                    self.enter_license_gate(Some(error.to_string()));
                } else if error.requires_reauthorization() {
                    self.update(|v| v.phase = Phase::Authorizing);
                    self.refresh_authorization_url();
                }
            }
            PluginEvent::LicenseChanged { valid: true } => {
                let phase = self.view.borrow().phase;
                if phase == Phase::LicenseGate {
                    self.check_authorization().await;
                }
            }
            PluginEvent::LicenseChanged { valid: false } => self.enter_license_gate(None),
            PluginEvent::FetchStateExpired { generation } => {
                if generation != self.generation {
                    return;
                }
                self.update(|v| {
                    if v.fetch.state != FetchState::Loading {
                        v.fetch.state = FetchState::Idle;
                        v.fetch.message = None;
                        v.fetch.enabled = v.field.valid;
                    }
                });
            }
        }
    }

    fn finish_fetch(&mut self, state: FetchState, message: String, display_for: Duration) {
        self.generation += 1;
        let generation = self.generation;
        self.update(|v| {
            v.fetch.state = state;
            v.fetch.message = Some(message);
            v.fetch.enabled = v.field.valid;
        });

        let tx = self.tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(display_for) => {
                    let _ = tx.send(Message::Plugin(PluginEvent::FetchStateExpired { generation }));
                }
            }
        });
    }

    // ── Host navigation ──────────────────────────────────────────────

    async fn handle_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::UrlChanged(url) => {
                debug!(%url, "navigation");
                if !page::is_organization_context(self.page.as_ref()) {
                    self.update(|v| v.visible = false);
                    return;
                }
                let phase = self.view.borrow().phase;
                if phase == Phase::Dormant {
                    self.start().await;
                    return;
                }
                self.update(|v| v.visible = true);
                let id = page::current_organization_id(self.page.as_ref());
                self.organization_changed(id).await;
            }
            HostEvent::OrganizationChanged { id } => self.organization_changed(Some(id)).await,
        }
    }

    async fn organization_changed(&mut self, id: Option<u64>) {
        if id == self.organization_id {
            return;
        }
        info!(?id, "organization changed");
        self.organization_id = id;
        self.generation += 1;
        self.update(|v| {
            v.organization_id = id;
            if v.fetch.state != FetchState::Loading {
                v.fetch.state = FetchState::Idle;
                v.fetch.message = None;
            }
        });
        let phase = self.view.borrow().phase;
        if phase == Phase::Ready {
            self.load_value().await;
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn update(&self, mutate: impl FnOnce(&mut ViewState)) {
        self.view.send_modify(mutate);
    }

    fn emit(&self, event: PluginEvent) {
        let _ = self.tx.send(Message::Plugin(event));
    }
}

/// Registry lookup followed by the organization write-back.
async fn fetch_and_apply(
    services: &PluginServices,
    digits: &str,
    organization_id: Option<u64>,
) -> Result<(u64, nipgus_api::CompanyRecord), CoreError> {
    let record = services.registry.get_company_data(digits).await?;
    let id = organization_id.ok_or(CoreError::MissingOrganization)?;
    services.host.apply_company_record(id, &record).await?;
    Ok((id, record))
}
