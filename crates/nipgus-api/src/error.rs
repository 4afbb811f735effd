use thiserror::Error;

/// Top-level error type for the `nipgus-api` crate.
///
/// Covers every failure mode of the two remote surfaces the plugin talks to:
/// the OAuth session server (host-platform proxy, registry lookups, session
/// management) and the license proxy. `nipgus-core` maps these into the
/// domain error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Session ─────────────────────────────────────────────────────
    /// The session server rejected the bearer token (HTTP 401).
    #[error("Session expired -- re-authorization required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request exceeded its per-call deadline.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// TLS setup or HTTP client construction failed.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Remote API ──────────────────────────────────────────────────
    /// Non-success HTTP status. `message` carries the server-provided
    /// message when the body had one.
    #[error("API error (HTTP {status}): {}", .message.as_deref().unwrap_or("no message"))]
    Api { status: u16, message: Option<String> },

    /// The response envelope reported `success: false`.
    #[error("Request rejected: {}", .message.as_deref().unwrap_or("no reason given"))]
    Rejected { message: Option<String> },

    // ── Data ────────────────────────────────────────────────────────
    /// The license request signature could not be computed.
    #[error("Request signing failed: {0}")]
    Signing(String),

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if re-authorizing the session might resolve this error.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if the failure happened below HTTP: no response arrived.
    pub fn is_network(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// HTTP status of a non-success response, if that is what this is.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::SessionExpired => Some(401),
            _ => None,
        }
    }

    /// Server-provided message, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Api { message, .. } | Self::Rejected { message } => message.as_deref(),
            _ => None,
        }
    }

    /// Translate a reqwest error, recognizing deadline expiry.
    pub(crate) fn from_send(err: reqwest::Error, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            Self::Transport(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_message_accessors() {
        let err = Error::Api {
            status: 404,
            message: Some("not found".into()),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.server_message(), Some("not found"));
        assert!(!err.is_network());

        assert_eq!(Error::SessionExpired.status(), Some(401));
        assert!(Error::SessionExpired.is_auth_expired());
    }

    #[test]
    fn timeout_counts_as_network_failure() {
        assert!(Error::Timeout { timeout_ms: 5000 }.is_network());
        assert_eq!(
            Error::Timeout { timeout_ms: 5000 }.to_string(),
            "Request timed out after 5000ms"
        );
    }
}
