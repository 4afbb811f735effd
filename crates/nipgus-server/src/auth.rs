//! HTTP Basic authentication for the JSON panel endpoints.

use std::fmt;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

/// Challenge sent with every 401.
pub const CHALLENGE: &str = r#"Basic realm="JSON Panel""#;

/// Username and password the panel endpoints accept. Without a password
/// the panel is locked and every request is refused.
#[derive(Clone)]
pub struct PanelCredentials {
    username: String,
    password: Option<SecretString>,
}

impl PanelCredentials {
    pub fn new(username: impl Into<String>, password: Option<SecretString>) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.password.is_none()
    }

    fn accepts(&self, username: &str, password: &str) -> bool {
        self.password
            .as_ref()
            .is_some_and(|expected| username == self.username && password == expected.expose_secret())
    }
}

impl fmt::Debug for PanelCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelCredentials")
            .field("username", &self.username)
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// `user:password` from a `Basic <base64>` header value.
fn decode(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?;
    let raw = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(raw).ok()?;
    let (username, password) = text.split_once(':')?;
    Some((username.to_owned(), password.to_owned()))
}

fn challenge(message: &'static str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, CHALLENGE)],
        message,
    )
        .into_response()
}

pub async fn require_basic_auth(
    State(credentials): State<Arc<PanelCredentials>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(value) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.starts_with("Basic "))
    else {
        return challenge("Authentication required");
    };

    match decode(value) {
        Some((username, password)) if credentials.accepts(&username, &password) => {
            next.run(req).await
        }
        _ => {
            debug!(path = %req.uri().path(), "panel credentials rejected");
            challenge("Invalid credentials")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_splits_at_first_colon() {
        let header = format!("Basic {}", STANDARD.encode("pipedrive-plugin:a:b"));
        assert_eq!(
            decode(&header),
            Some(("pipedrive-plugin".into(), "a:b".into()))
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(decode("Basic !!!"), None);
        assert_eq!(decode(&format!("Basic {}", STANDARD.encode("nocolon"))), None);
    }

    #[test]
    fn locked_panel_accepts_nobody() {
        let creds = PanelCredentials::new("pipedrive-plugin", None);
        assert!(creds.is_locked());
        assert!(!creds.accepts("pipedrive-plugin", ""));
    }
}
