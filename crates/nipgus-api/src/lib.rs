// nipgus-api: async HTTP clients for the NIP/GUS plugin's remote services
//
// `OAuthClient` talks to the OAuth session server (host-platform proxy,
// registry lookups, session info/logout). `LicenseClient` talks to the
// license proxy. Both are stateless; session and cache state live in
// `nipgus-core`.

pub mod error;
pub mod license;
pub mod models;
pub mod oauth;
pub mod transport;

pub use error::Error;
pub use license::{LicenseClient, ProductIdentity, sign_domain};
pub use models::{
    Address, CompanyLookupResponse, CompanyRecord, HostResponse, LicenseAction, LicenseResponse,
    NewOrganizationField, Organization, OrganizationField, OrganizationUpdate, ProxyMethod,
    SessionInfo,
};
pub use oauth::OAuthClient;
pub use transport::{DEFAULT_USER_AGENT, TlsMode, TransportConfig};
