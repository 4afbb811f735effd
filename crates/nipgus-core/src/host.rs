// ── Host-platform client ──
//
// Organization fields and records on the CRM, reached through the session
// server's proxy. Calls are spaced by a fixed interval; the custom field
// list is cached for a few minutes.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use nipgus_api::{
    CompanyRecord, HostResponse, NewOrganizationField, Organization, OrganizationField,
    OrganizationUpdate, ProxyMethod,
};

use crate::cache::TtlCache;
use crate::config::HostSettings;
use crate::error::CoreError;
use crate::rate_limit::Pacer;
use crate::session::Session;
use crate::storage::{KeyValueStore, keys};

const FIELDS_ENDPOINT: &str = "/organizationFields";

pub struct HostService {
    session: Arc<Session>,
    store: Arc<dyn KeyValueStore>,
    pacer: Pacer,
    fields: TtlCache<(), Vec<OrganizationField>>,
    nip_field_name: String,
    regon_field_name: String,
}

impl HostService {
    pub fn new(
        session: Arc<Session>,
        store: Arc<dyn KeyValueStore>,
        settings: &HostSettings,
    ) -> Self {
        Self {
            session,
            store,
            pacer: Pacer::new(settings.request_interval()),
            fields: TtlCache::new(settings.field_cache_ttl),
            nip_field_name: settings.nip_field_name.clone(),
            regon_field_name: settings.regon_field_name.clone(),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: ProxyMethod,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Option<T>, CoreError> {
        self.pacer.wait().await;
        let resp: HostResponse<T> = self
            .session
            .authorized_request(method, endpoint, body)
            .await?;
        if resp.success {
            Ok(resp.data)
        } else {
            Err(CoreError::HostApiError {
                message: resp
                    .error
                    .unwrap_or_else(|| format!("{method} {endpoint} was refused")),
            })
        }
    }

    // ── Fields ───────────────────────────────────────────────────────

    pub async fn organization_fields(
        &self,
        force_refresh: bool,
    ) -> Result<Vec<OrganizationField>, CoreError> {
        if !force_refresh {
            if let Some(fields) = self.fields.get(&()) {
                return Ok(fields);
            }
        }
        let fields: Vec<OrganizationField> = self
            .call(ProxyMethod::Get, FIELDS_ENDPOINT, None)
            .await?
            .unwrap_or_default();
        debug!(count = fields.len(), "organization fields loaded");
        self.fields.insert((), fields.clone());
        Ok(fields)
    }

    /// Field whose name or key equals `name`.
    pub async fn find_field(&self, name: &str) -> Result<Option<OrganizationField>, CoreError> {
        Ok(self
            .organization_fields(false)
            .await?
            .into_iter()
            .find(|f| f.name == name || f.key == name))
    }

    /// The NIP custom field, if it exists. Remembers its id.
    pub async fn find_nip_field(&self) -> Result<Option<OrganizationField>, CoreError> {
        let field = self.find_field(&self.nip_field_name).await?;
        if let Some(ref f) = field {
            self.store.set(keys::NIP_FIELD_ID, &f.id.to_string())?;
        }
        Ok(field)
    }

    pub async fn create_nip_field(&self) -> Result<OrganizationField, CoreError> {
        let body = serde_json::to_value(NewOrganizationField::text(&self.nip_field_name))
            .map_err(|e| CoreError::FieldCreationError {
                message: e.to_string(),
            })?;

        let created: Option<OrganizationField> = self
            .call(ProxyMethod::Post, FIELDS_ENDPOINT, Some(&body))
            .await
            .map_err(field_creation)?;
        let field = created.ok_or_else(|| CoreError::FieldCreationError {
            message: "the CRM did not return the new field".into(),
        })?;

        info!(id = field.id, key = %field.key, "NIP field created");
        self.fields.clear();
        self.store.set(keys::NIP_FIELD_ID, &field.id.to_string())?;
        Ok(field)
    }

    /// Existing NIP field, created on first use.
    pub async fn ensure_nip_field(&self) -> Result<OrganizationField, CoreError> {
        match self.find_nip_field().await? {
            Some(field) => Ok(field),
            None => self.create_nip_field().await,
        }
    }

    // ── Organizations ────────────────────────────────────────────────

    pub async fn get_organization(&self, id: u64) -> Result<Organization, CoreError> {
        self.call(ProxyMethod::Get, &format!("/organizations/{id}"), None)
            .await?
            .ok_or_else(|| CoreError::HostApiError {
                message: format!("organization {id} not found"),
            })
    }

    pub async fn update_organization(
        &self,
        id: u64,
        update: &OrganizationUpdate,
    ) -> Result<Option<Organization>, CoreError> {
        let body = serde_json::to_value(update).map_err(|e| CoreError::DataUpdateError {
            message: e.to_string(),
        })?;
        self.call(ProxyMethod::Put, &format!("/organizations/{id}"), Some(&body))
            .await
            .map_err(data_update)
    }

    /// Current NIP value stored on an organization.
    pub async fn organization_nip(&self, id: u64) -> Result<Option<String>, CoreError> {
        let field = self.ensure_nip_field().await?;
        let org = self.get_organization(id).await?;
        Ok(org.field_value(&field.key).map(str::to_owned))
    }

    /// Write a registry record back onto an organization: name, formatted
    /// address, the NIP (creating its field on first use) and, when such a
    /// field exists, the REGON.
    pub async fn apply_company_record(
        &self,
        id: u64,
        record: &CompanyRecord,
    ) -> Result<OrganizationUpdate, CoreError> {
        let nip_field = self.ensure_nip_field().await?;
        let regon_field = self.find_field(&self.regon_field_name).await?;

        let update = build_update(record, &nip_field, regon_field.as_ref());
        self.update_organization(id, &update).await?;
        info!(organization = id, "organization updated from registry");
        Ok(update)
    }
}

fn field_creation(err: CoreError) -> CoreError {
    match err {
        CoreError::HostApiError { message } => CoreError::FieldCreationError { message },
        other => other,
    }
}

fn data_update(err: CoreError) -> CoreError {
    match err {
        CoreError::HostApiError { message } => CoreError::DataUpdateError { message },
        other => other,
    }
}

fn build_update(
    record: &CompanyRecord,
    nip_field: &OrganizationField,
    regon_field: Option<&OrganizationField>,
) -> OrganizationUpdate {
    let mut custom_fields = HashMap::new();
    if let Some(nip) = record.nip.as_deref().filter(|n| !n.is_empty()) {
        custom_fields.insert(nip_field.key.clone(), nip.to_owned());
    }
    if let (Some(field), Some(regon)) = (regon_field, record.regon.as_deref()) {
        if !regon.is_empty() {
            custom_fields.insert(field.key.clone(), regon.to_owned());
        }
    }

    let address = format_address(record);
    OrganizationUpdate {
        name: record.display_name().map(str::to_owned),
        address: (!address.is_empty()).then_some(address),
        custom_fields,
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// `street number[/unit], postal city`, skipping absent parts.
pub fn format_address(record: &CompanyRecord) -> String {
    let addr = &record.address;

    let mut street_line = [
        present(addr.street.as_deref()),
        present(addr.building_number.as_deref()),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");
    if let Some(unit) = present(addr.unit_number.as_deref()) {
        if !street_line.is_empty() {
            street_line.push('/');
        }
        street_line.push_str(unit);
    }

    let city_line = [
        present(addr.postal_code.as_deref()),
        present(addr.city.as_deref()),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");

    [street_line, city_line]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use nipgus_api::Address;
    use pretty_assertions::assert_eq;

    use super::*;

    fn record(address: Address) -> CompanyRecord {
        CompanyRecord {
            nip: Some("5260001246".into()),
            regon: Some("012100784".into()),
            name: Some("ACME SA".into()),
            address,
            ..CompanyRecord::default()
        }
    }

    fn field(key: &str, name: &str) -> OrganizationField {
        OrganizationField {
            id: 1,
            key: key.into(),
            name: name.into(),
            field_type: Some("varchar".into()),
        }
    }

    #[test]
    fn full_address() {
        let r = record(Address {
            street: Some("ul. Prosta".into()),
            building_number: Some("20".into()),
            unit_number: Some("4".into()),
            postal_code: Some("00-850".into()),
            city: Some("Warszawa".into()),
            ..Address::default()
        });
        assert_eq!(format_address(&r), "ul. Prosta 20/4, 00-850 Warszawa");
    }

    #[test]
    fn partial_addresses() {
        let village = record(Address {
            building_number: Some("12".into()),
            postal_code: Some("34-100".into()),
            city: Some("Wadowice".into()),
            ..Address::default()
        });
        assert_eq!(format_address(&village), "12, 34-100 Wadowice");

        let city_only = record(Address {
            city: Some("Kraków".into()),
            street: Some("  ".into()),
            ..Address::default()
        });
        assert_eq!(format_address(&city_only), "Kraków");

        assert_eq!(format_address(&record(Address::default())), "");
    }

    #[test]
    fn update_carries_name_address_and_identifiers() {
        let r = record(Address {
            city: Some("Warszawa".into()),
            ..Address::default()
        });
        let update = build_update(&r, &field("nipkey", "NIP"), Some(&field("regonkey", "REGON")));

        assert_eq!(update.name.as_deref(), Some("ACME SA"));
        assert_eq!(update.address.as_deref(), Some("Warszawa"));
        assert_eq!(update.custom_fields["nipkey"], "5260001246");
        assert_eq!(update.custom_fields["regonkey"], "012100784");
    }

    #[test]
    fn update_without_regon_field_or_address() {
        let update = build_update(&record(Address::default()), &field("nipkey", "NIP"), None);
        assert_eq!(update.address, None);
        assert_eq!(update.custom_fields.len(), 1);
    }
}
