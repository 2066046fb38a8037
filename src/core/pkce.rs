//! PKCE Generator
//!
//! RFC 7636 Proof Key for Code Exchange, S256 only.

use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Mutex;

/// Random bytes behind each verifier (43 characters once encoded).
const VERIFIER_BYTES: usize = 32;

/// Verifier and challenge for one login attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct PkcePair {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkcePair")
            .field("code_verifier", &"[REDACTED]")
            .field("code_challenge", &self.code_challenge)
            .finish()
    }
}

/// `BASE64URL(SHA256(verifier))` without padding.
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hash)
}

/// PKCE generator interface (for dependency injection).
pub trait PkceGenerator: Send + Sync {
    fn generate(&self) -> PkcePair;
}

/// Default PKCE generator implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPkceGenerator;

impl DefaultPkceGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl PkceGenerator for DefaultPkceGenerator {
    fn generate(&self) -> PkcePair {
        let mut bytes = [0u8; VERIFIER_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);

        let code_verifier = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
        let code_challenge = compute_challenge(&code_verifier);
        PkcePair {
            code_verifier,
            code_challenge,
        }
    }
}

/// Mock PKCE generator returning a fixed verifier.
pub struct MockPkceGenerator {
    verifier: String,
    generated: Mutex<Vec<PkcePair>>,
}

impl MockPkceGenerator {
    pub fn new(verifier: impl Into<String>) -> Self {
        Self {
            verifier: verifier.into(),
            generated: Mutex::new(Vec::new()),
        }
    }

    pub fn get_generate_history(&self) -> Vec<PkcePair> {
        self.generated
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }
}

impl PkceGenerator for MockPkceGenerator {
    fn generate(&self) -> PkcePair {
        let pair = PkcePair {
            code_verifier: self.verifier.clone(),
            code_challenge: compute_challenge(&self.verifier),
        };
        if let Ok(mut history) = self.generated.lock() {
            history.push(pair.clone());
        }
        pair
    }
}
