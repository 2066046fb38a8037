//! B2C Login Flow
//!
//! Emulates the browser side of the hosted Azure AD B2C sign-in with
//! Authorization Code + PKCE:
//!
//! 1. discovery of the tenant policy endpoints
//! 2. authorization request (may short-circuit on an existing session cookie)
//! 3. credential POST to the self-asserted endpoint
//! 4. policy confirmation, following redirects back to the application
//! 5. extraction of `code` / `id_token` from the final redirect
//! 6. code exchange at the token endpoint
//!
//! Each attempt is single-shot; retrying is the caller's concern.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::core::discovery::{fetch_provider_config, ProviderConfig};
use crate::core::jwks::{fetch_and_verify_id_token, unverified_subject};
use crate::core::pkce::{DefaultPkceGenerator, PkcePair, PkceGenerator};
use crate::core::transport::{HttpRequest, HttpTransport};
use crate::error::{AuthError, InvalidAuthReason};
use crate::flows::challenge::{extract_settings, ChallengeSettings, SoftError, SoftErrorDetector};
use crate::types::{
    B2cSettings, Credentials, LoginData, RedirectParams, TokenResponse, DEFAULT_EXPIRES_IN,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Login interface (for dependency injection).
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Run one login attempt, returning `(access_token, expires_in_secs)`.
    ///
    /// The subject of the signed-in user is written to `login_data`.
    async fn login(
        &self,
        transport: &dyn HttpTransport,
        credentials: &Credentials,
        login_data: &mut LoginData,
    ) -> Result<(String, u64), AuthError>;
}

/// Authorization outcome: code and verified subject, either may be absent.
type AuthResult = (Option<String>, Option<String>);

/// Authenticator for the hosted B2C sign-in.
pub struct B2cAuthenticator {
    settings: B2cSettings,
    pkce: Arc<dyn PkceGenerator>,
    detector: SoftErrorDetector,
}

impl B2cAuthenticator {
    pub fn new(settings: B2cSettings) -> Self {
        Self {
            settings,
            pkce: Arc::new(DefaultPkceGenerator::new()),
            detector: SoftErrorDetector::default(),
        }
    }

    pub fn with_pkce_generator(mut self, pkce: Arc<dyn PkceGenerator>) -> Self {
        self.pkce = pkce;
        self
    }

    pub fn with_detector(mut self, detector: SoftErrorDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn settings(&self) -> &B2cSettings {
        &self.settings
    }

    fn form(pairs: &[(&str, &str)]) -> Result<String, AuthError> {
        serde_urlencoded::to_string(pairs)
            .map_err(|e| AuthError::cannot_connect_with("Failed to encode form body", e))
    }

    fn url_with_params(base: &str, params: &[(&str, &str)]) -> Result<Url, AuthError> {
        Url::parse_with_params(base, params).map_err(|e| {
            AuthError::cannot_connect_with(format!("Invalid endpoint URL: {}", base), e)
        })
    }

    async fn authorize(
        &self,
        transport: &dyn HttpTransport,
        provider: &ProviderConfig,
        pkce: &PkcePair,
        credentials: &Credentials,
    ) -> Result<AuthResult, AuthError> {
        let s = &self.settings;
        let mut params = vec![
            ("client_id", s.client_id.as_str()),
            ("response_type", s.response_type.as_str()),
            ("redirect_uri", s.redirect_uri.as_str()),
            ("scope", s.scope_auth.as_str()),
            ("code_challenge", pkce.code_challenge.as_str()),
            ("code_challenge_method", "S256"),
        ];
        if let Some(mode) = s.response_mode.as_deref() {
            params.push(("response_mode", mode));
        }
        if let Some(nonce) = s.nonce.as_deref() {
            params.push(("nonce", nonce));
        }

        debug!("Requesting authorization code");
        let url = Self::url_with_params(&provider.authorization_endpoint, &params)?;
        let response = transport
            .send(HttpRequest::get(url.as_str()).timeout(s.timeout))
            .await?;

        if response.url.starts_with(&s.redirect_uri) {
            debug!("Authorization short-circuited by an existing session");
            return self.extract_result(transport, provider, &response.url).await;
        }

        if response.status != 200 || response.body.is_empty() {
            error!(status = response.status, "Failed to get authorization");
            return Err(AuthError::cannot_connect(format!(
                "Failed to get authorization (status {})",
                response.status
            )));
        }

        let Some(settings) = extract_settings(&response.body) else {
            debug!("No settings extracted, checking for direct authorization code");
            return self.extract_result(transport, provider, &response.url).await;
        };

        self.post_credentials(transport, provider, &settings, credentials)
            .await?;
        self.confirm_signin(transport, provider, &settings).await
    }

    async fn post_credentials(
        &self,
        transport: &dyn HttpTransport,
        provider: &ProviderConfig,
        settings: &ChallengeSettings,
        credentials: &Credentials,
    ) -> Result<(), AuthError> {
        let s = &self.settings;
        let url = provider.policy_url(&s.policy, &s.self_asserted_endpoint);
        debug!(url = %url, "Posting credentials");

        let body = Self::form(&[
            ("tx", settings.trans_id.as_str()),
            ("p", s.policy.as_str()),
            ("request_type", "RESPONSE"),
            ("signInName", credentials.username.as_str()),
            ("password", credentials.password.expose_secret().as_str()),
        ])?;

        let response = transport
            .send(
                HttpRequest::post(url, body)
                    .header("Content-Type", FORM_CONTENT_TYPE)
                    .header("X-CSRF-TOKEN", settings.csrf.as_str())
                    .timeout(s.timeout),
            )
            .await?;

        if response.status != 200 {
            error!(status = response.status, "Failed to post credentials");
            return Err(AuthError::invalid_auth(
                "Invalid username or password",
                InvalidAuthReason::InvalidCredentials,
            ));
        }

        match self.detector.detect(&response.body) {
            Some(soft) => {
                error!(code = %soft.code, detail = %soft.detail, "B2C authentication error");
                Err(classify_soft_error(soft))
            }
            None => {
                debug!("Credentials posted successfully");
                Ok(())
            }
        }
    }

    async fn confirm_signin(
        &self,
        transport: &dyn HttpTransport,
        provider: &ProviderConfig,
        settings: &ChallengeSettings,
    ) -> Result<AuthResult, AuthError> {
        let s = &self.settings;
        let base = provider.policy_url(&s.policy, &s.policy_confirm_endpoint);
        let url = Self::url_with_params(
            &base,
            &[
                ("rememberMe", "false"),
                ("csrf_token", settings.csrf.as_str()),
                ("tx", settings.trans_id.as_str()),
                ("p", s.policy.as_str()),
            ],
        )?;

        debug!(url = %base, "Confirming sign-in");
        let response = transport
            .send(HttpRequest::get(url.as_str()).timeout(s.timeout))
            .await?;

        match response.status {
            200 => self.extract_result(transport, provider, &response.url).await,
            403 => {
                error!(status = 403, "Sign-in confirmation rejected");
                Err(AuthError::invalid_auth(
                    "Invalid username or password",
                    InvalidAuthReason::InvalidCredentials,
                ))
            }
            status => {
                error!(status, "Failed to confirm signin");
                Err(AuthError::cannot_connect(format!(
                    "Failed to confirm signin (status {})",
                    status
                )))
            }
        }
    }

    async fn extract_result(
        &self,
        transport: &dyn HttpTransport,
        provider: &ProviderConfig,
        final_url: &str,
    ) -> Result<AuthResult, AuthError> {
        let redirect_uri = &self.settings.redirect_uri;
        let Some(params) = RedirectParams::from_redirect(final_url, redirect_uri) else {
            warn!("Sign-in did not land on the redirect URI");
            return Ok((None, None));
        };

        let sub = match params.id_token.as_deref() {
            Some(id_token) => self.verified_subject(transport, provider, id_token).await,
            None => None,
        };

        if params.code.is_none() {
            if let Some(err) = params.error.as_deref() {
                error!(
                    error = err,
                    description = params.error_description.as_deref().unwrap_or(""),
                    "Sign-in failed"
                );
                return Err(AuthError::invalid_auth(
                    match params.error_description.as_deref() {
                        Some(desc) => format!("Sign-in failed: {}: {}", err, desc),
                        None => format!("Sign-in failed: {}", err),
                    },
                    InvalidAuthReason::SignInRejected,
                ));
            }
            warn!("Sign-in completed, but no authorization code found");
        }

        Ok((params.code, sub))
    }

    async fn verified_subject(
        &self,
        transport: &dyn HttpTransport,
        provider: &ProviderConfig,
        id_token: &str,
    ) -> Option<String> {
        match fetch_and_verify_id_token(
            transport,
            provider,
            id_token,
            &self.settings.client_id,
            self.settings.timeout,
        )
        .await
        {
            Ok(sub) => {
                debug!("Extracted and verified sub from id_token");
                Some(sub)
            }
            Err(e) => {
                error!(error = %e, "id_token validation failed");
                None
            }
        }
    }

    async fn exchange_code(
        &self,
        transport: &dyn HttpTransport,
        provider: &ProviderConfig,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, AuthError> {
        let s = &self.settings;
        let body = Self::form(&[
            ("client_id", s.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", s.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
            ("scope", s.scope_access.as_str()),
        ])?;

        debug!("Requesting access token");
        let response = transport
            .send(
                HttpRequest::post(&provider.token_endpoint, body)
                    .header("Content-Type", FORM_CONTENT_TYPE)
                    .header("Accept", "application/json")
                    .timeout(s.timeout),
            )
            .await?;

        if response.status != 200 || response.body.is_empty() {
            error!(status = response.status, "Failed to get access token");
            return Err(AuthError::cannot_connect(format!(
                "Failed to get access token (status {})",
                response.status
            )));
        }

        serde_json::from_str(&response.body)
            .map_err(|e| AuthError::cannot_connect_with("Invalid token response", e))
    }
}

#[async_trait]
impl Authenticator for B2cAuthenticator {
    async fn login(
        &self,
        transport: &dyn HttpTransport,
        credentials: &Credentials,
        login_data: &mut LoginData,
    ) -> Result<(String, u64), AuthError> {
        debug!("Starting login process for National Grid");
        let pkce = self.pkce.generate();

        let provider = fetch_provider_config(transport, &self.settings).await?;
        debug!("Retrieved OpenID configuration");

        let (code, sub) = self.authorize(transport, &provider, &pkce, credentials).await?;
        if let Some(sub) = sub {
            login_data.sub = Some(sub);
        }
        let Some(code) = code else {
            error!("Failed to obtain authorization code");
            return Err(AuthError::cannot_connect("Failed to obtain authorization code"));
        };
        debug!("Obtained authorization code");

        let tokens = self
            .exchange_code(transport, &provider, &code, &pkce.code_verifier)
            .await?;
        let Some(access_token) = tokens.access_token.filter(|t| !t.is_empty()) else {
            error!("Token response did not contain an access token");
            return Err(AuthError::cannot_connect("Failed to obtain access token"));
        };
        let expires_in = tokens.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);

        if login_data.sub.is_none() {
            if let Some(sub) = unverified_subject(&access_token) {
                debug!("Extracted sub from access token");
                login_data.sub = Some(sub);
            }
        }

        info!(expires_in, "Login succeeded");
        Ok((access_token, expires_in))
    }
}

/// Wording that identifies a missing account, whatever wrapper carried it.
const ACCOUNT_NOT_FOUND_WORDING: [&str; 4] = [
    "find an account",
    "account with that email",
    "account not found",
    "user not found",
];

/// Reason implied by the provider's message text.
fn reason_from_detail(detail: &str) -> Option<InvalidAuthReason> {
    let detail = detail.to_lowercase();
    if detail.contains("password") || detail.contains("credential") {
        Some(InvalidAuthReason::InvalidCredentials)
    } else if detail.contains("locked") {
        Some(InvalidAuthReason::AccountLocked)
    } else if ACCOUNT_NOT_FOUND_WORDING.iter().any(|w| detail.contains(w)) {
        Some(InvalidAuthReason::AccountNotFound)
    } else {
        None
    }
}

/// Map a detected soft error onto the login failure taxonomy.
///
/// Error codes and exception pages carry the provider's message as their
/// detail, so the wording decides the reason for those too.
fn classify_soft_error(soft: SoftError) -> AuthError {
    let reason = match soft.code.as_str() {
        "INVALID_PASSWORD" => Some(InvalidAuthReason::InvalidCredentials),
        "ACCOUNT_NOT_FOUND" => Some(InvalidAuthReason::AccountNotFound),
        "ACCOUNT_LOCKED" => Some(InvalidAuthReason::AccountLocked),
        _ => reason_from_detail(&soft.detail),
    };

    match reason {
        Some(InvalidAuthReason::InvalidCredentials) => AuthError::invalid_auth(
            format!("Invalid username or password: {}", soft.detail),
            InvalidAuthReason::InvalidCredentials,
        ),
        Some(reason) => AuthError::invalid_auth(soft.detail, reason),
        None => AuthError::cannot_connect(format!("Authentication failed: {}", soft.detail)),
    }
}
