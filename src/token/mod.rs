//! Token Management
//!
//! Bearer token caching with proactive refresh and 401 invalidation.

pub mod manager;

pub use manager::{TokenManager, TokenManagerConfig};
