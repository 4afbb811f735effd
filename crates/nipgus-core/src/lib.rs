//! Business logic of the NIP/GUS organization plugin.
//!
//! - **[`nip`]**: NIP cleaning, formatting and checksum validation.
//! - **[`Session`]**: the OAuth session with the CRM, restored from the page
//!   URL or storage; every host and registry call goes through it.
//! - **[`LicenseService`]**: signed license validation and activation with a
//!   short-lived result cache.
//! - **[`RegistryService`]**: rate-limited, cached GUS company lookups.
//! - **[`HostService`]**: organization fields and records in the CRM, paced
//!   to the host's request budget.
//! - **[`Coordinator`]**: the plugin's UI state machine, driven by
//!   [`PluginHandle`] actions and host navigation events, publishing
//!   [`ViewState`] snapshots.
//!
//! [`Plugin::bootstrap`] wires all of it from a [`PluginConfig`].

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod host;
pub mod license;
pub mod nip;
pub mod page;
pub mod plugin;
pub mod rate_limit;
pub mod registry;
pub mod session;
pub mod storage;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{HostSettings, LicenseSettings, PluginConfig, RegistrySettings, UiSettings};
pub use coordinator::{
    Coordinator, FetchState, FetchView, FieldView, LicenseView, Phase, PluginEvent, PluginHandle,
    UserAction, ViewState,
};
pub use error::CoreError;
pub use host::HostService;
pub use license::{LicenseInfo, LicenseService, LicenseStatus};
pub use nip::{Nip, NipError};
pub use page::{HostContext, HostEvent, HostPage, NavigationWatcher, PollingWatcher};
pub use plugin::{Plugin, PluginServices};
pub use registry::{NipStatus, RegistryService, UsageStats};
pub use session::Session;
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};

// Wire types callers need alongside the services.
pub use nipgus_api::{CompanyRecord, Organization, OrganizationField, SessionInfo};
