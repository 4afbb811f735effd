//! Static bundle server for the NIP/GUS plugin.
//!
//! Serves the plugin's public directory with CORS and iframe-embedding
//! headers on every response, a health endpoint, and the CRM JSON panel
//! endpoints behind HTTP Basic auth.

pub mod auth;
pub mod error;
pub mod panel;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN, X_FRAME_OPTIONS};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, get_service};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub use auth::PanelCredentials;
pub use error::ServerError;

/// JSON panel schema, relative to the panel directory.
pub const PANEL_SCHEMA: &str = "nip-gus-panel.json";

#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Served to anyone.
    pub public_dir: PathBuf,
    /// Holds the panel schema. Must not lie under `public_dir`, or the
    /// fallback would serve the schema without credentials.
    pub panel_dir: PathBuf,
    pub panel: PanelCredentials,
}

/// Build the application router.
pub fn router(settings: ServerSettings) -> Router {
    let panel = Arc::new(settings.panel);

    let protected = Router::new()
        .route(
            "/nip-gus-panel.json",
            get_service(ServeFile::new(settings.panel_dir.join(PANEL_SCHEMA))),
        )
        .route("/api/json-panel/data", get(panel::panel_data))
        .route_layer(middleware::from_fn_with_state(
            panel,
            auth::require_basic_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .fallback_service(ServeDir::new(&settings.public_dir))
        .layer(middleware::from_fn(answer_options))
        .layer(cors())
        // Outside CORS so preflight answers carry it too
        .layer(SetResponseHeaderLayer::overriding(
            X_FRAME_OPTIONS,
            HeaderValue::from_static("ALLOWALL"),
        ))
        .layer(TraceLayer::new_for_http())
}

/// Serve `app` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)
}

// ── Layers ──────────────────────────────────────────────────────────

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            ORIGIN,
            HeaderName::from_static("x-requested-with"),
            CONTENT_TYPE,
            ACCEPT,
            AUTHORIZATION,
        ])
}

/// Any `OPTIONS` request is answered 200 before routing.
async fn answer_options(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(req).await
    }
}

// ── Handlers ────────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}
