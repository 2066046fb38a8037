//! Builders
//!
//! Fluent builder for the client configuration.

pub mod config;

pub use config::{nationalgrid_config, NationalGridConfigBuilder};
