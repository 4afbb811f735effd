//! Wire types for the session server and the license proxy.
//!
//! Registry records keep the registry's Polish field names on the wire
//! (`nazwa`, `adresUlica`, ...) and expose English names in Rust.
//! Host-platform payloads use the platform's snake_case names.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Host-platform proxy ──────────────────────────────────────────────

/// HTTP method forwarded through the host-platform proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ProxyMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// Envelope posted to `/api/pipedrive/proxy`.
#[derive(Debug, Serialize)]
pub struct ProxyRequest<'a> {
    pub method: ProxyMethod,
    pub endpoint: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a Value>,
}

/// Standard `{success, data}` envelope returned by the host platform.
#[derive(Debug, Clone, Deserialize)]
pub struct HostResponse<T> {
    #[serde(default = "default_true")]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

const fn default_true() -> bool {
    true
}

/// Organization custom field definition, from `GET /organizationFields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationField {
    pub id: u64,
    /// Hash key under which values of this field are stored.
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub field_type: Option<String>,
}

/// Body for `POST /organizationFields`.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrganizationField<'a> {
    pub name: &'a str,
    pub field_type: &'a str,
    pub add_visible_flag: bool,
    pub options: Vec<String>,
}

impl<'a> NewOrganizationField<'a> {
    /// A visible free-text field.
    pub fn text(name: &'a str) -> Self {
        Self {
            name,
            field_type: "varchar",
            add_visible_flag: true,
            options: Vec::new(),
        }
    }
}

/// Organization record, from `GET /organizations/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub custom_fields: Option<HashMap<String, Value>>,
    /// The platform also inlines custom field values as top-level keys.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl Organization {
    /// Read a custom field value by its hash key.
    pub fn field_value(&self, key: &str) -> Option<&str> {
        self.custom_fields
            .as_ref()
            .and_then(|fields| fields.get(key))
            .or_else(|| self.extra.get(key))
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Body for `PUT /organizations/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrganizationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub custom_fields: HashMap<String, String>,
}

// ── Registry ─────────────────────────────────────────────────────────

/// Body for `POST /api/gus/company-data`.
#[derive(Debug, Serialize)]
pub struct CompanyLookupRequest<'a> {
    pub nip: &'a str,
    pub license_key: &'a str,
}

/// Response of the registry lookup endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CompanyLookupResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<CompanyRecord>,
}

/// Structured address of a registered company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "adresUlica", default)]
    pub street: Option<String>,
    #[serde(rename = "adresNumerNieruchomosci", default)]
    pub building_number: Option<String>,
    #[serde(rename = "adresNumerLokalu", default)]
    pub unit_number: Option<String>,
    #[serde(rename = "adresKodPocztowy", default)]
    pub postal_code: Option<String>,
    #[serde(rename = "adresMiejscowosc", default)]
    pub city: Option<String>,
    #[serde(rename = "adresPoczta", default)]
    pub post_office: Option<String>,
    #[serde(rename = "adresGmina", default)]
    pub municipality: Option<String>,
    #[serde(rename = "adresPowiat", default)]
    pub district: Option<String>,
    #[serde(rename = "adresWojewodztwo", default)]
    pub region: Option<String>,
}

/// Company data as returned by the business registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    #[serde(default)]
    pub nip: Option<String>,
    #[serde(default)]
    pub regon: Option<String>,
    #[serde(rename = "nazwa", default)]
    pub name: Option<String>,
    #[serde(rename = "nazwaSkrocona", default)]
    pub short_name: Option<String>,
    #[serde(flatten)]
    pub address: Address,
    /// `Czynny` for an active taxpayer.
    #[serde(rename = "statusNip", default)]
    pub nip_status: Option<String>,
    #[serde(rename = "dataRejestracjiDzialalnosci", default)]
    pub registration_date: Option<String>,
    #[serde(rename = "dataZakonczeniaDzialalnosci", default)]
    pub end_date: Option<String>,
    #[serde(rename = "rodzajRejestracji", default)]
    pub registration_kind: Option<String>,
    #[serde(rename = "formaFinansowania", default)]
    pub financing_form: Option<String>,
    #[serde(rename = "formaWlasnosci", default)]
    pub ownership_form: Option<String>,
    /// Declared business activities, opaque.
    #[serde(rename = "dzialalnosci", default)]
    pub activities: Vec<Value>,
}

impl CompanyRecord {
    /// Legal name, falling back to the short name.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.short_name.as_deref())
            .filter(|name| !name.is_empty())
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// Response of `GET /api/session/info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub company_domain: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

// ── License ──────────────────────────────────────────────────────────

/// Operation requested from the license proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LicenseAction {
    Validate,
    Activate,
}

/// Body posted to the license proxy.
#[derive(Debug, Serialize)]
pub struct LicenseRequest<'a> {
    pub action: LicenseAction,
    pub license_key: &'a str,
    pub product_id: &'a str,
    pub plugin_id: &'a str,
    pub domain: &'a str,
    pub auth_signature: String,
}

/// Response of the license proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LicenseResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub activations_used: Option<u32>,
    #[serde(default)]
    pub activations_limit: Option<u32>,
    #[serde(default)]
    pub expiry_date: Option<String>,
}
