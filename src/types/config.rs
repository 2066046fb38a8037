//! Configuration Types
//!
//! Client configuration and identity-provider settings.

use secrecy::SecretString;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::error::ConfigurationError;
use crate::resilience::RetryConfig;

pub const DEFAULT_ENDPOINT: &str = "https://myaccount.nationalgrid.com/api/user-cu-uwp-gql";
pub const DEFAULT_REST_BASE_URL: &str = "https://myaccount.nationalgrid.com/api";
pub const DEFAULT_SUBSCRIPTION_KEY: &str = "e674f89d7ed9417194de894b701333dd";
pub const SUBSCRIPTION_KEY_HEADER: &str = "ocp-apim-subscription-key";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Account credentials used for the hosted sign-in.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &"[REDACTED]")
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Azure AD B2C tenant and application settings for the hosted login.
#[derive(Clone, Debug)]
pub struct B2cSettings {
    pub base_url: String,
    pub tenant_id: String,
    pub policy: String,
    pub client_id: String,
    pub redirect_uri: String,
    /// Scopes requested at the authorization endpoint.
    pub scope_auth: String,
    /// Scopes requested at the token endpoint.
    pub scope_access: String,
    pub self_asserted_endpoint: String,
    pub policy_confirm_endpoint: String,
    pub response_type: String,
    /// Sent as `response_mode` when set.
    pub response_mode: Option<String>,
    /// Sent as `nonce` when set.
    pub nonce: Option<String>,
    /// Per-request timeout for every login step.
    pub timeout: Duration,
}

impl Default for B2cSettings {
    fn default() -> Self {
        let client_id = "36488660-e86a-4a0d-8316-3df49af8d06d".to_string();
        Self {
            base_url: "https://login.nationalgrid.com".to_string(),
            tenant_id: "0e1366c5-731c-42b3-90d3-508039d9e70f".to_string(),
            policy: "B2C_1A_UWP_NationalGrid_convert_merge_signin".to_string(),
            scope_access: format!("{} openid profile offline_access", client_id),
            client_id,
            redirect_uri: "https://myaccount.nationalgrid.com/auth-landing".to_string(),
            scope_auth: "openid profile offline_access".to_string(),
            self_asserted_endpoint: "SelfAsserted".to_string(),
            policy_confirm_endpoint: "api/CombinedSigninAndSignup/confirmed".to_string(),
            response_type: "code".to_string(),
            response_mode: None,
            nonce: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl B2cSettings {
    /// Well-known OpenID configuration document for the tenant policy.
    pub fn discovery_url(&self) -> String {
        format!(
            "{}/{}/{}/v2.0/.well-known/openid-configuration",
            self.base_url.trim_end_matches('/'),
            self.tenant_id,
            self.policy
        )
    }
}

/// Client configuration.
#[derive(Clone, Debug)]
pub struct NationalGridConfig {
    /// Default GraphQL endpoint, used when a request names none.
    pub endpoint: String,
    /// Base URL that relative REST paths are joined onto.
    pub rest_base_url: String,
    /// Sign-in credentials; anonymous calls are made without them.
    pub credentials: Option<Credentials>,
    pub subscription_key: Option<String>,
    /// Applied after the built-in headers, in insertion order.
    pub default_headers: Vec<(String, String)>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub verify_ssl: bool,
    pub retry: RetryConfig,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
    pub b2c: B2cSettings,
}

impl Default for NationalGridConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            rest_base_url: DEFAULT_REST_BASE_URL.to_string(),
            credentials: None,
            subscription_key: Some(DEFAULT_SUBSCRIPTION_KEY.to_string()),
            default_headers: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: Duration::from_secs(10),
            verify_ssl: true,
            retry: RetryConfig::default(),
            pool_max_idle_per_host: 30,
            pool_idle_timeout: Duration::from_secs(90),
            b2c: B2cSettings::default(),
        }
    }
}

impl NationalGridConfig {
    /// Combine the fixed headers, authentication, default headers and
    /// per-call overrides. Later entries replace earlier ones with the same
    /// (case-insensitive) name.
    pub fn build_headers(
        &self,
        extra_headers: &[(String, String)],
        access_token: Option<&str>,
        content_type: Option<&str>,
    ) -> Vec<(String, String)> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(content_type) = content_type {
            set_header(&mut headers, "Content-Type", content_type);
        }
        if let Some(token) = access_token {
            set_header(&mut headers, "Authorization", &format!("Bearer {}", token));
        }
        if let Some(key) = self.subscription_key.as_deref().filter(|k| !k.is_empty()) {
            set_header(&mut headers, SUBSCRIPTION_KEY_HEADER, key);
        }
        for (name, value) in self.default_headers.iter().chain(extra_headers) {
            set_header(&mut headers, name, value);
        }
        headers
    }

    /// Whether sign-in credentials are configured.
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (field, value) in [
            ("endpoint", &self.endpoint),
            ("rest_base_url", &self.rest_base_url),
            ("b2c.base_url", &self.b2c.base_url),
            ("b2c.redirect_uri", &self.b2c.redirect_uri),
        ] {
            if value.is_empty() {
                return Err(ConfigurationError::MissingRequired {
                    field: field.to_string(),
                });
            }
            Url::parse(value).map_err(|_| ConfigurationError::InvalidEndpoint {
                url: value.clone(),
            })?;
        }

        for (field, value) in [
            ("b2c.tenant_id", &self.b2c.tenant_id),
            ("b2c.policy", &self.b2c.policy),
            ("b2c.client_id", &self.b2c.client_id),
        ] {
            if value.is_empty() {
                return Err(ConfigurationError::MissingRequired {
                    field: field.to_string(),
                });
            }
        }

        if let Some(credentials) = &self.credentials {
            if credentials.username.is_empty() {
                return Err(ConfigurationError::MissingRequired {
                    field: "username".to_string(),
                });
            }
        }

        self.retry.validate()
    }
}

/// Insert or replace a header, matching names case-insensitively.
pub(crate) fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers
        .iter_mut()
        .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
    {
        Some(slot) => *slot = (name.to_string(), value.to_string()),
        None => headers.push((name.to_string(), value.to_string())),
    }
}
