//! View state published by the coordinator.
//!
//! Front ends render this snapshot; they never mutate it. A fresh value is
//! published through a `watch` channel after every handled message.

use serde::Serialize;
use url::Url;

use crate::license::LicenseStatus;

/// Top-level plugin phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Uninitialized,
    /// The page is not an organization view; the plugin stays hidden.
    Dormant,
    LicenseGate,
    /// Waiting for the user to authorize the plugin with the CRM.
    Authorizing,
    Ready,
}

/// Per-fetch state of the fetch button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FetchState {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldView {
    /// Formatted text shown in the input.
    pub text: String,
    pub valid: bool,
    /// Inline validation error, shown after blur.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchView {
    pub state: FetchState,
    pub enabled: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LicenseView {
    /// Stored key to prefill the gate's input with.
    pub prefill: Option<String>,
    pub submitting: bool,
    pub error: Option<String>,
    pub status: Option<LicenseStatus>,
}

/// Everything a front end needs to render the plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub phase: Phase,
    pub visible: bool,
    pub organization_id: Option<u64>,
    pub field: FieldView,
    pub fetch: FetchView,
    pub license: LicenseView,
    /// Target of the authorize button while in [`Phase::Authorizing`].
    pub authorization_url: Option<Url>,
    /// Non-fatal problem worth showing (field setup, value loading, ...).
    pub notice: Option<String>,
}
