//! JSON panel data endpoint.
//!
//! The CRM's JSON panel renders whatever this returns against the schema in
//! `nip-gus-panel.json`. The payload is a fixed example: live data is filled
//! in by the plugin itself.

use axum::Json;
use axum::extract::Query;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

/// Context the CRM appends to panel requests.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelQuery {
    pub resource: Option<String>,
    pub selected_ids: Option<String>,
    pub user_id: Option<String>,
    pub company_id: Option<String>,
}

pub fn example_payload() -> Value {
    json!({
        "data": {
            "id": 1,
            "header": "🏛️ NIP Field z GUS",
            "description": "Automatyczne pobieranie danych firmy z rejestru GUS na podstawie numeru NIP",
            "nip_field": "Wprowadź numer NIP organizacji",
            "status": "Gotowy do pobierania danych",
            "company_name": "Przykładowa firma",
            "address": "ul. Przykładowa 1, 00-000 Warszawa"
        }
    })
}

pub async fn panel_data(Query(query): Query<PanelQuery>) -> Json<Value> {
    debug!(
        resource = query.resource.as_deref(),
        selected_ids = query.selected_ids.as_deref(),
        user_id = query.user_id.as_deref(),
        company_id = query.company_id.as_deref(),
        "json panel data requested"
    );
    Json(example_payload())
}
