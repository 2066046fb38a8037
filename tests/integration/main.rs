//! Integration tests using WireMock
//!
//! These tests drive the client against a mock HTTP server through the real
//! reqwest transport: the hosted sign-in, token reuse, retries and the
//! GraphQL/REST envelopes.

pub mod login;
pub mod requests;

use async_trait::async_trait;
use integrations_nationalgrid::{
    AuthError, Authenticator, B2cSettings, Credentials, HttpTransport, InvalidAuthReason,
    LoginData, NationalGridConfig, RetryConfig,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use wiremock::{MockServer, ResponseTemplate};

pub const POLICY: &str = "B2C_1A_UWP_NationalGrid_convert_merge_signin";

/// Helper to create a mock server
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Retry policy with millisecond delays so tests stay fast.
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        ..RetryConfig::default()
    }
}

/// B2C settings pointing every login step at the mock server.
pub fn b2c_settings(server: &MockServer) -> B2cSettings {
    B2cSettings {
        base_url: server.uri(),
        tenant_id: "tenant".to_string(),
        redirect_uri: format!("{}/auth-landing", server.uri()),
        timeout: Duration::from_secs(5),
        ..B2cSettings::default()
    }
}

/// Client configuration with GraphQL and REST routed to the mock server.
pub fn test_config(server: &MockServer, credentials: bool) -> NationalGridConfig {
    NationalGridConfig {
        endpoint: format!("{}/graphql", server.uri()),
        rest_base_url: format!("{}/api", server.uri()),
        credentials: credentials.then(|| Credentials::new("user@example.com", "correct horse")),
        timeout: Duration::from_secs(5),
        retry: fast_retry(3),
        b2c: b2c_settings(server),
        ..NationalGridConfig::default()
    }
}

/// Helper to create success response templates
pub fn success_response(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

/// Hands out `token-N` and counts how often it was asked.
pub struct CountingAuthenticator {
    pub logins: AtomicU32,
    pub delay: Duration,
    pub reject: bool,
}

impl CountingAuthenticator {
    pub fn new() -> Self {
        Self {
            logins: AtomicU32::new(0),
            delay: Duration::ZERO,
            reject: false,
        }
    }

    pub fn count(&self) -> u32 {
        self.logins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for CountingAuthenticator {
    async fn login(
        &self,
        _transport: &dyn HttpTransport,
        _credentials: &Credentials,
        login_data: &mut LoginData,
    ) -> Result<(String, u64), AuthError> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.reject {
            return Err(AuthError::invalid_auth(
                "Invalid username or password",
                InvalidAuthReason::InvalidCredentials,
            ));
        }
        login_data.sub = Some("user-123".to_string());
        Ok((format!("token-{}", n), 3600))
    }
}
