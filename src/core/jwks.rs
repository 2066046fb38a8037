//! JWT Claims
//!
//! Two ways of reading the `sub` claim:
//!
//! - ID tokens are verified against the issuer's JSON Web Key Set (RS256,
//!   issuer, audience and expiry checked) before the claim is trusted.
//! - Access tokens are read WITHOUT signature verification. The token was
//!   just returned by the token endpoint over TLS in the same login round
//!   trip, and the claim is only used as an account key. Anything that
//!   cannot make that assumption must use the verified path instead.

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::core::discovery::ProviderConfig;
use crate::core::transport::{HttpRequest, HttpTransport};
use crate::error::NetworkError;

/// ID token could not be verified.
#[derive(Error, Debug)]
pub enum IdTokenError {
    #[error("JWKS fetch failed: {0}")]
    Fetch(#[from] NetworkError),

    #[error("JWKS request returned status {status}")]
    Status { status: u16 },

    #[error("Invalid JWKS document: {0}")]
    Document(#[from] serde_json::Error),

    #[error("No signing key matches kid {kid:?}")]
    NoMatchingKey { kid: Option<String> },

    #[error("Token validation failed: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("sub claim not found in verified id_token")]
    MissingSubject,
}

#[derive(Debug, Deserialize)]
struct SubjectClaims {
    #[serde(default)]
    sub: Option<serde_json::Value>,
}

impl SubjectClaims {
    fn subject(self) -> Option<String> {
        match self.sub? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Verify `id_token` against a key set and return its subject.
pub fn verify_id_token(
    jwks: &JwkSet,
    id_token: &str,
    issuer: &str,
    client_id: &str,
) -> Result<String, IdTokenError> {
    let header = decode_header(id_token)?;
    let jwk = match header.kid.as_deref() {
        Some(kid) => jwks.find(kid),
        None => jwks.keys.first(),
    }
    .ok_or_else(|| IdTokenError::NoMatchingKey {
        kid: header.kid.clone(),
    })?;

    let key = DecodingKey::from_jwk(jwk)?;
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[client_id]);
    validation.validate_exp = true;

    let data = decode::<SubjectClaims>(id_token, &key, &validation)?;
    data.claims.subject().ok_or(IdTokenError::MissingSubject)
}

/// Fetch the provider's key set and verify `id_token`.
pub async fn fetch_and_verify_id_token(
    transport: &dyn HttpTransport,
    provider: &ProviderConfig,
    id_token: &str,
    client_id: &str,
    timeout: Duration,
) -> Result<String, IdTokenError> {
    let response = transport
        .send(
            HttpRequest::get(&provider.jwks_uri)
                .header("Accept", "application/json")
                .timeout(timeout),
        )
        .await?;

    if response.status != 200 {
        return Err(IdTokenError::Status {
            status: response.status,
        });
    }

    let jwks: JwkSet = serde_json::from_str(&response.body)?;
    verify_id_token(&jwks, id_token, &provider.issuer, client_id)
}

/// Read `sub` from a JWT without verifying its signature or expiry.
pub fn unverified_subject(token: &str) -> Option<String> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    match decode::<SubjectClaims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => data.claims.subject(),
        Err(e) => {
            warn!(error = %e, "Failed to decode token for sub extraction");
            None
        }
    }
}
