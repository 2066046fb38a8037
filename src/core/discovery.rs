//! OIDC Discovery
//!
//! Fetches the tenant policy's OpenID configuration document. The document is
//! fetched once per login attempt and never cached.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::core::transport::{HttpRequest, HttpTransport};
use crate::error::AuthError;
use crate::types::B2cSettings;

/// Provider endpoints resolved from discovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub authorization_endpoint: String,
    pub issuer: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

impl ProviderConfig {
    /// Issuer with its last two path segments removed.
    ///
    /// `https://host/tenant/v2.0/` becomes `https://host/tenant`; the
    /// self-asserted and confirm endpoints live under this base.
    pub fn issuer_base(&self) -> &str {
        self.issuer.rsplitn(3, '/').last().unwrap_or(&self.issuer)
    }

    pub fn policy_url(&self, policy: &str, endpoint: &str) -> String {
        format!("{}/{}/{}", self.issuer_base(), policy, endpoint)
    }
}

/// GET the discovery document.
pub async fn fetch_provider_config(
    transport: &dyn HttpTransport,
    settings: &B2cSettings,
) -> Result<ProviderConfig, AuthError> {
    let url = settings.discovery_url();
    debug!(url = %url, "Fetching OpenID configuration");

    let response = transport
        .send(
            HttpRequest::get(url)
                .header("Accept", "application/json")
                .timeout(settings.timeout),
        )
        .await?;

    if response.status != 200 || response.body.is_empty() {
        error!(status = response.status, "Failed to get configuration");
        return Err(AuthError::cannot_connect(format!(
            "Failed to get configuration (status {})",
            response.status
        )));
    }

    serde_json::from_str(&response.body)
        .map_err(|e| AuthError::cannot_connect_with("Invalid OpenID configuration document", e))
}
