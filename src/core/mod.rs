//! Core Components
//!
//! HTTP transport, PKCE, discovery and token verification used by the login
//! flow and the request executor.

pub mod discovery;
pub mod jwks;
pub mod pkce;
pub mod transport;

pub use discovery::*;
pub use pkce::*;
pub use transport::*;
