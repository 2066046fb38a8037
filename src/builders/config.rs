//! Configuration Builder
//!
//! Fluent builder for the client configuration, with an environment loader.

use std::time::Duration;

use crate::error::{ConfigurationError, NationalGridError};
use crate::resilience::RetryConfig;
use crate::types::{B2cSettings, Credentials, NationalGridConfig};

pub const ENV_ENDPOINT: &str = "NATIONALGRID_ENDPOINT";
pub const ENV_REST_BASE_URL: &str = "NATIONALGRID_REST_BASE_URL";
pub const ENV_USERNAME: &str = "NATIONALGRID_USERNAME";
pub const ENV_PASSWORD: &str = "NATIONALGRID_PASSWORD";
pub const ENV_SUBSCRIPTION_KEY: &str = "NATIONALGRID_SUBSCRIPTION_KEY";
pub const ENV_TIMEOUT_SECS: &str = "NATIONALGRID_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "NATIONALGRID_MAX_RETRIES";

/// National Grid configuration builder.
pub struct NationalGridConfigBuilder {
    config: NationalGridConfig,
    username: Option<String>,
    password: Option<String>,
}

impl Default for NationalGridConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NationalGridConfigBuilder {
    /// Start from the provider defaults.
    pub fn new() -> Self {
        Self {
            config: NationalGridConfig::default(),
            username: None,
            password: None,
        }
    }

    /// Start from the defaults, overridden by `NATIONALGRID_*` variables.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigurationError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut builder = Self::new();

        if let Some(endpoint) = get(ENV_ENDPOINT) {
            builder = builder.endpoint(endpoint);
        }
        if let Some(url) = get(ENV_REST_BASE_URL) {
            builder = builder.rest_base_url(url);
        }
        if let Some(username) = get(ENV_USERNAME) {
            builder = builder.username(username);
        }
        if let Some(password) = get(ENV_PASSWORD) {
            builder = builder.password(password);
        }
        if let Some(key) = get(ENV_SUBSCRIPTION_KEY) {
            builder = builder.subscription_key(key);
        }
        if let Some(value) = get(ENV_TIMEOUT_SECS) {
            let secs: u64 = parse_env(ENV_TIMEOUT_SECS, &value)?;
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(value) = get(ENV_MAX_RETRIES) {
            let attempts: u32 = parse_env(ENV_MAX_RETRIES, &value)?;
            builder.config.retry.max_attempts = attempts;
        }
        Ok(builder)
    }

    /// Set the default GraphQL endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Set the base URL relative REST paths are joined onto.
    pub fn rest_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.rest_base_url = url.into();
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set username and password together.
    pub fn credentials(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username(username).password(password)
    }

    pub fn subscription_key(mut self, key: impl Into<String>) -> Self {
        self.config.subscription_key = Some(key.into());
        self
    }

    /// Send no subscription key header.
    pub fn without_subscription_key(mut self) -> Self {
        self.config.subscription_key = None;
        self
    }

    /// Add a header sent with every API call.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.push((name.into(), value.into()));
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Enable or disable TLS certificate verification.
    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.config.verify_ssl = verify;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the total attempts per call.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Replace the identity-provider settings.
    pub fn b2c(mut self, settings: B2cSettings) -> Self {
        self.config.b2c = settings;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<NationalGridConfig, NationalGridError> {
        let mut config = self.config;
        config.credentials = match (self.username, self.password) {
            (Some(username), Some(password)) => Some(Credentials::new(username, password)),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigurationError::MissingRequired {
                    field: "password".to_string(),
                }
                .into())
            }
            (None, Some(_)) => {
                return Err(ConfigurationError::MissingRequired {
                    field: "username".to_string(),
                }
                .into())
            }
        };

        config.validate()?;
        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigurationError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigurationError::InvalidEnvironment {
            name: name.to_string(),
            value: value.to_string(),
        })
}

/// Create a new National Grid configuration builder.
pub fn nationalgrid_config() -> NationalGridConfigBuilder {
    NationalGridConfigBuilder::new()
}
