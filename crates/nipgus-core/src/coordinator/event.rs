//! Messages flowing into the coordinator.
//!
//! `UserAction`s come from the front end, `PluginEvent`s from the plugin's
//! own components and background tasks. Both travel on one channel so the
//! coordinator handles them strictly in arrival order.

use nipgus_api::CompanyRecord;

use crate::error::CoreError;

/// Something the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    /// The NIP input's raw text changed.
    Input(String),
    Focus,
    Blur,
    /// The fetch button was pressed.
    Fetch,
    /// A license key was submitted at the license gate.
    SubmitLicense(String),
    /// The "authorize" button was pressed.
    Authorize,
    Shutdown,
}

/// Outcome of validating the field's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValidation {
    /// Field revision the check ran against; stale results are dropped.
    pub revision: u64,
    pub digits: String,
    pub valid: bool,
    pub error: Option<String>,
}

/// Upward notifications from components and tasks.
#[derive(Debug)]
pub enum PluginEvent {
    ValueChanged { revision: u64, display: String },
    ValidationChanged(FieldValidation),
    /// A fetch finished and the organization was updated.
    DataFetched {
        organization_id: u64,
        record: Box<CompanyRecord>,
    },
    /// A fetch failed.
    Error(CoreError),
    LicenseChanged { valid: bool },
    /// The success/error display of fetch `generation` timed out.
    FetchStateExpired { generation: u64 },
}

#[derive(Debug)]
pub(crate) enum Message {
    User(UserAction),
    Plugin(PluginEvent),
}
