//! Login Flows
//!
//! The hosted B2C sign-in, split into challenge-page parsing and the
//! request sequence that drives it.

pub mod challenge;
pub mod login;

pub use challenge::{
    extract_settings, ChallengeSettings, SoftError, SoftErrorDetector, SoftErrorRule,
};
pub use login::{Authenticator, B2cAuthenticator};
