//! National Grid Integration Module
//!
//! Async client for the National Grid customer account APIs.
//!
//! # Features
//!
//! - Azure AD B2C sign-in (Authorization Code + PKCE) driven without a browser
//! - ID token verification against the provider JWKS
//! - Bearer token caching with early refresh and single-flight login
//! - GraphQL and REST execution with retry, backoff and jitter
//! - Re-authentication on `401 Unauthorized`
//! - Typed queries and extractors for accounts, billing and usage data
//!
//! # Example
//!
//! ```rust,ignore
//! use integrations_nationalgrid::{nationalgrid_config, NationalGridClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = nationalgrid_config()
//!         .username("user@example.com")
//!         .password("secret")
//!         .max_attempts(5)
//!         .build()?;
//!
//!     let client = NationalGridClient::new(config)?;
//!
//!     for link in client.get_linked_accounts().await? {
//!         let account = client.get_billing_account(&link.billing_account_id).await?;
//!         println!("{} {:?}", link.billing_account_id, account.status);
//!     }
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: configuration, tokens, request/response envelopes and records
//! - `error`: error hierarchy and failure classification
//! - `core`: HTTP transport, PKCE, discovery and JWKS verification
//! - `flows`: the hosted sign-in (challenge parsing and login sequence)
//! - `token`: bearer token cache
//! - `resilience`: retry policy and executor
//! - `queries`: GraphQL query builders and the interval-reads REST request
//! - `extractors`: typed extraction from responses
//! - `builders`: fluent configuration builder
//! - `client`: the request executor tying it together

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod extractors;
pub mod flows;
pub mod queries;
pub mod resilience;
pub mod token;
pub mod types;

// Re-export main client
pub use client::NationalGridClient;

// Re-export builders
pub use builders::{nationalgrid_config, NationalGridConfigBuilder};

// Re-export errors
pub use error::{
    AuthError, ConfigurationError, DataExtractionError, FailureKind, GraphQLError,
    InvalidAuthReason, NationalGridError, NationalGridResult, NetworkError,
    RequestValidationError, RestApiError, RetryExhaustedError,
};

// Re-export types
pub use types::{
    // Config
    B2cSettings, Credentials, NationalGridConfig, DEFAULT_ENDPOINT, DEFAULT_REST_BASE_URL,
    DEFAULT_SUBSCRIPTION_KEY,
    // Token
    AccessToken, LoginData, TokenResponse,
    // Envelopes
    compose_query, GraphQLRequest, GraphQLResponse, RestData, RestRequest, RestResponse,
    // Records
    AccountLink, AmiEnergyUsage, BillingAccount, EnergyUsage, EnergyUsageCost, IntervalRead,
};

// Re-export core components
pub use core::{
    // Transport
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport,
    ReqwestHttpTransport,
    // PKCE
    DefaultPkceGenerator, MockPkceGenerator, PkceGenerator, PkcePair,
    // Discovery
    ProviderConfig,
};

// Re-export flows
pub use flows::{Authenticator, B2cAuthenticator, SoftErrorDetector, SoftErrorRule};

// Re-export token management
pub use token::{TokenManager, TokenManagerConfig};

// Re-export resilience
pub use resilience::{RetryConfig, RetryExecutor, RetryStats, DEFAULT_RETRYABLE_STATUS_CODES};

// Re-export queries
pub use queries::{interval_reads_request, IntervalReadsQuery, StandardQuery};
