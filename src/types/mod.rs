//! National Grid Types
//!
//! Configuration, token, request and response types.

pub mod config;
pub mod graphql;
pub mod models;
pub mod redirect;
pub mod rest;
pub mod token;

pub use config::*;
pub use graphql::*;
pub use models::*;
pub use redirect::*;
pub use rest::*;
pub use token::*;
