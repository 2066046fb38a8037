//! Query Scaffolding
//!
//! Ready-made GraphQL and REST requests for the provider's account, billing
//! and usage APIs.

pub mod graphql;
pub mod rest;

pub use graphql::*;
pub use rest::*;
