// Async client for the license proxy.
//
// Every request is signed: hex(HMAC-SHA256(key = auth secret,
// message = domain || auth secret)). The proxy answers 2xx with a
// `{success, ...}` envelope; `success: false` carries the rejection reason.

use std::time::Duration;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{LicenseAction, LicenseRequest, LicenseResponse};
use crate::oauth::{error_message, handle_response};
use crate::transport::TransportConfig;

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_LICENSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Product identity sent with every license request.
#[derive(Debug, Clone)]
pub struct ProductIdentity {
    pub product_id: String,
    pub plugin_id: String,
}

/// Compute the request signature for `domain`.
pub fn sign_domain(domain: &str, secret: &SecretString) -> Result<String, Error> {
    let secret = secret.expose_secret();
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Signing(e.to_string()))?;
    mac.update(domain.as_bytes());
    mac.update(secret.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Async client for the license proxy endpoint.
#[derive(Debug, Clone)]
pub struct LicenseClient {
    http: reqwest::Client,
    endpoint: Url,
    identity: ProductIdentity,
    auth_secret: SecretString,
    timeout: Duration,
}

impl LicenseClient {
    pub fn new(
        endpoint: &str,
        identity: ProductIdentity,
        auth_secret: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            endpoint: Url::parse(endpoint)?,
            identity,
            auth_secret,
            timeout: DEFAULT_LICENSE_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn validate(&self, key: &str, domain: &str) -> Result<LicenseResponse, Error> {
        self.send(LicenseAction::Validate, key, domain).await
    }

    pub async fn activate(&self, key: &str, domain: &str) -> Result<LicenseResponse, Error> {
        self.send(LicenseAction::Activate, key, domain).await
    }

    async fn send(
        &self,
        action: LicenseAction,
        key: &str,
        domain: &str,
    ) -> Result<LicenseResponse, Error> {
        debug!("POST {} action={action} domain={domain}", self.endpoint);

        let body = LicenseRequest {
            action,
            license_key: key,
            product_id: &self.identity.product_id,
            plugin_id: &self.identity.plugin_id,
            domain,
            auth_signature: sign_domain(domain, &self.auth_secret)?,
        };

        let resp = self
            .http
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::from_send(e, self.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: error_message(resp).await,
            });
        }

        let parsed: LicenseResponse = handle_response(resp).await?;
        if parsed.success {
            Ok(parsed)
        } else {
            Err(Error::Rejected {
                message: parsed.message,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_stable_hex() {
        let secret = SecretString::from("s3cret".to_owned());
        let a = sign_domain("acme.pipedrive.com", &secret).unwrap();
        let b = sign_domain("acme.pipedrive.com", &secret).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_depends_on_domain() {
        let secret = SecretString::from("s3cret".to_owned());
        assert_ne!(
            sign_domain("acme.pipedrive.com", &secret).unwrap(),
            sign_domain("other.pipedrive.com", &secret).unwrap()
        );
    }

    #[test]
    fn signature_is_hmac_of_domain_then_secret() {
        let secret = SecretString::from("key".to_owned());
        let mut mac = HmacSha256::new_from_slice(b"key").unwrap();
        mac.update(b"acmekey");
        let expected = hex::encode(mac.finalize().into_bytes());
        assert_eq!(sign_domain("acme", &secret).unwrap(), expected);
    }
}
