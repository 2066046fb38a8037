//! National Grid Error Types
//!
//! Error hierarchy for the login flow and the resilient call layer. Every
//! call-level error carries a [`FailureKind`] tag so that retry decisions are a
//! pure function of the tag.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Boxed underlying cause kept for diagnostics.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Longest query excerpt rendered in a [`GraphQLError`].
const QUERY_PREVIEW_LEN: usize = 200;
/// Longest response excerpt rendered in a [`RestApiError`].
const RESPONSE_PREVIEW_LEN: usize = 500;
/// Longest payload excerpt kept by a [`DataExtractionError`].
const PAYLOAD_PREVIEW_LEN: usize = 300;

/// Root error type for the National Grid client.
#[derive(Error, Debug)]
pub enum NationalGridError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    GraphQL(#[from] GraphQLError),

    #[error("{0}")]
    Rest(#[from] RestApiError),

    #[error("{0}")]
    RetryExhausted(#[from] RetryExhaustedError),

    #[error("{0}")]
    DataExtraction(#[from] DataExtractionError),

    #[error("GraphQL errors encountered: {}", render_errors(.errors))]
    GraphQLErrors { errors: Vec<serde_json::Value> },

    #[error("Invalid request: {0}")]
    Validation(#[from] RequestValidationError),
}

impl NationalGridError {
    /// Get error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "NATGRID_CONFIG",
            Self::Network(_) => "NATGRID_NETWORK",
            Self::Auth(AuthError::CannotConnect { .. }) => "NATGRID_CANNOT_CONNECT",
            Self::Auth(AuthError::InvalidAuth { .. }) => "NATGRID_INVALID_AUTH",
            Self::GraphQL(_) => "NATGRID_GRAPHQL",
            Self::Rest(_) => "NATGRID_REST",
            Self::RetryExhausted(_) => "NATGRID_RETRY_EXHAUSTED",
            Self::DataExtraction(_) => "NATGRID_DATA_EXTRACTION",
            Self::GraphQLErrors { .. } => "NATGRID_GRAPHQL_ERRORS",
            Self::Validation(_) => "NATGRID_VALIDATION",
        }
    }

    /// Classification used by the retry policy.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Network(e) => e.failure_kind(),
            Self::Auth(_) => FailureKind::Auth,
            Self::GraphQL(e) => e.kind,
            Self::Rest(e) => e.kind,
            Self::RetryExhausted(e) => e.last_error.failure_kind(),
            Self::Configuration(_)
            | Self::DataExtraction(_)
            | Self::GraphQLErrors { .. }
            | Self::Validation(_) => FailureKind::Invalid,
        }
    }

    /// HTTP status attached to a call-level error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::GraphQL(e) => e.status,
            Self::Rest(e) => e.status,
            Self::RetryExhausted(e) => e.last_error.status(),
            _ => None,
        }
    }

    /// Check if the caller should ask for new credentials.
    pub fn is_invalid_auth(&self) -> bool {
        match self {
            Self::Auth(AuthError::InvalidAuth { .. }) => true,
            Self::RetryExhausted(e) => e.last_error.is_invalid_auth(),
            _ => false,
        }
    }
}

/// Tag describing how a call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection refused, reset or dropped mid-flight.
    Connection,
    /// Per-attempt timeout elapsed.
    Timeout,
    /// Non-2xx HTTP status.
    Status(u16),
    /// Body could not be read or parsed.
    Decode,
    /// Login failed while acquiring a token.
    Auth,
    /// Caller-side problem, never worth retrying.
    Invalid,
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },

    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvironment { name: String, value: String },

    #[error("Failed to build HTTP client: {message}")]
    HttpClient { message: String },
}

/// Network/transport error.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Server disconnected: {message}")]
    Disconnected { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Request failed: {message}")]
    Request { message: String },

    #[error("Failed to read response body: {message}")]
    Body { message: String },
}

impl NetworkError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::ConnectionFailed { .. } | Self::Disconnected { .. } => FailureKind::Connection,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Body { .. } => FailureKind::Decode,
            Self::Request { .. } => FailureKind::Invalid,
        }
    }
}

/// Why the provider rejected a sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidAuthReason {
    /// Wrong username or password.
    InvalidCredentials,
    /// The provider reports the account as locked.
    AccountLocked,
    /// No account matches the username.
    AccountNotFound,
    /// The redirect carried an explicit `error` parameter.
    SignInRejected,
}

impl fmt::Display for InvalidAuthReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidCredentials => "invalid credentials",
            Self::AccountLocked => "account locked",
            Self::AccountNotFound => "account not found",
            Self::SignInRejected => "sign-in rejected",
        };
        f.write_str(s)
    }
}

/// Login failure.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Transport failure or an unexpected provider response.
    #[error("Cannot connect: {message}")]
    CannotConnect {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The provider rejected the credentials or the account.
    #[error("Invalid authentication ({reason}): {message}")]
    InvalidAuth {
        message: String,
        reason: InvalidAuthReason,
    },
}

impl AuthError {
    pub fn cannot_connect(message: impl Into<String>) -> Self {
        Self::CannotConnect {
            message: message.into(),
            source: None,
        }
    }

    pub fn cannot_connect_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::CannotConnect {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn invalid_auth(message: impl Into<String>, reason: InvalidAuthReason) -> Self {
        Self::InvalidAuth {
            message: message.into(),
            reason,
        }
    }

    /// Copy suitable for handing to callers that waited on the same login.
    ///
    /// The underlying cause is flattened into the message because boxed
    /// sources cannot be cloned.
    pub fn replay(&self) -> Self {
        match self {
            Self::CannotConnect { message, source } => Self::CannotConnect {
                message: match source {
                    Some(s) => format!("{}: {}", message, s),
                    None => message.clone(),
                },
                source: None,
            },
            Self::InvalidAuth { message, reason } => Self::InvalidAuth {
                message: message.clone(),
                reason: *reason,
            },
        }
    }
}

impl From<NetworkError> for AuthError {
    fn from(err: NetworkError) -> Self {
        AuthError::cannot_connect_with(format!("Connection error: {}", err), err)
    }
}

/// GraphQL call failure with request context.
#[derive(Debug)]
pub struct GraphQLError {
    pub message: String,
    pub kind: FailureKind,
    pub endpoint: String,
    pub query: Option<String>,
    pub variables: Option<serde_json::Value>,
    pub status: Option<u16>,
    pub response_body: Option<String>,
    pub source: Option<BoxError>,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>, kind: FailureKind, endpoint: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            endpoint: endpoint.into(),
            query: None,
            variables: None,
            status: match kind {
                FailureKind::Status(code) => Some(code),
                _ => None,
            },
            response_body: None,
            source: None,
        }
    }

    pub fn with_request(mut self, query: &str, variables: Option<&serde_json::Value>) -> Self {
        self.query = Some(query.to_string());
        self.variables = variables.cloned();
        self
    }

    pub fn with_response_body(mut self, body: impl Into<String>) -> Self {
        self.response_body = Some(body.into());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        write!(f, "\nEndpoint: {}", self.endpoint)?;
        if let Some(status) = self.status {
            write!(f, "\nStatus: {}", status)?;
        }
        if let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) {
            write!(f, "\nQuery: {}", preview(query, QUERY_PREVIEW_LEN))?;
        }
        if let Some(variables) = &self.variables {
            write!(f, "\nVariables: {}", variables)?;
        }
        if let Some(source) = &self.source {
            write!(f, "\nCaused by: {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for GraphQLError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// REST call failure with request context.
#[derive(Debug)]
pub struct RestApiError {
    pub message: String,
    pub kind: FailureKind,
    pub url: String,
    pub method: String,
    pub status: Option<u16>,
    pub response_text: Option<String>,
    pub source: Option<BoxError>,
}

impl RestApiError {
    pub fn new(
        message: impl Into<String>,
        kind: FailureKind,
        method: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            kind,
            url: url.into(),
            method: method.into(),
            status: match kind {
                FailureKind::Status(code) => Some(code),
                _ => None,
            },
            response_text: None,
            source: None,
        }
    }

    pub fn with_response_text(mut self, text: impl Into<String>) -> Self {
        self.response_text = Some(text.into());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for RestApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        write!(f, "\nRequest: {} {}", self.method, self.url)?;
        if let Some(status) = self.status {
            write!(f, "\nStatus: {}", status)?;
        }
        if let Some(text) = self.response_text.as_deref().filter(|t| !t.is_empty()) {
            write!(f, "\nResponse: {}", preview(text, RESPONSE_PREVIEW_LEN))?;
        }
        if let Some(source) = &self.source {
            write!(f, "\nCaused by: {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for RestApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Terminal wrapper raised once the retry budget is spent.
#[derive(Error, Debug)]
#[error("{message} (after {attempts} attempts)\nLast error: {last_error}")]
pub struct RetryExhaustedError {
    pub message: String,
    pub attempts: u32,
    #[source]
    pub last_error: Box<NationalGridError>,
}

/// An expected field path is missing from a response payload.
#[derive(Error, Debug)]
#[error("{message}\nPath: {path}")]
pub struct DataExtractionError {
    pub message: String,
    pub path: String,
    pub response_data: Option<serde_json::Value>,
}

impl DataExtractionError {
    pub fn new(
        message: impl Into<String>,
        path: impl Into<String>,
        response_data: Option<&serde_json::Value>,
    ) -> Self {
        Self {
            message: message.into(),
            path: path.into(),
            response_data: response_data.cloned(),
        }
    }

    /// Truncated rendering of the offending payload.
    pub fn preview(&self) -> Option<String> {
        self.response_data
            .as_ref()
            .map(|data| preview(&data.to_string(), PAYLOAD_PREVIEW_LEN))
    }
}

/// Request rejected before any network call.
#[derive(Error, Debug)]
pub enum RequestValidationError {
    #[error("StartDateTime is required and must be YYYY-MM-DD hh:mm:ss.")]
    MissingStartDateTime,

    #[error("StartDateTime must be YYYY-MM-DD hh:mm:ss, e.g. 2024-01-01 00:00:00 (got {value:?})")]
    InvalidStartDateTime { value: String },

    #[error("{field} is required")]
    MissingField { field: String },
}

/// Result type for National Grid operations.
pub type NationalGridResult<T> = Result<T, NationalGridError>;

/// Cut `text` to `max` characters, marking the cut with an ellipsis.
pub(crate) fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn render_errors(errors: &[serde_json::Value]) -> String {
    serde_json::Value::Array(errors.to_vec()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_error_display_truncates_query() {
        let query = "q".repeat(250);
        let err = GraphQLError::new(
            "GraphQL request failed",
            FailureKind::Status(500),
            "https://gql",
        )
        .with_request(&query, Some(&serde_json::json!({"accountNumber": "1"})));

        let rendered = err.to_string();
        assert!(rendered.contains("Endpoint: https://gql"));
        assert!(rendered.contains("Status: 500"));
        assert!(rendered.contains(&format!("Query: {}...", "q".repeat(200))));
        assert!(!rendered.contains(&"q".repeat(201)));
        assert!(rendered.contains("accountNumber"));
    }

    #[test]
    fn test_rest_error_display_truncates_response() {
        let err = RestApiError::new(
            "REST request failed",
            FailureKind::Status(404),
            "GET",
            "https://api/x",
        )
        .with_response_text("x".repeat(600));

        let rendered = err.to_string();
        assert!(rendered.contains("Request: GET https://api/x"));
        assert!(rendered.contains("Status: 404"));
        assert!(rendered.contains(&format!("{}...", "x".repeat(500))));
    }

    #[test]
    fn test_retry_exhausted_exposes_last_status() {
        let inner =
            GraphQLError::new("GraphQL request failed", FailureKind::Status(503), "https://gql");
        let err = NationalGridError::from(RetryExhaustedError {
            message: "GraphQL request failed".to_string(),
            attempts: 2,
            last_error: Box::new(inner.into()),
        });

        assert_eq!(err.status(), Some(503));
        assert_eq!(err.error_code(), "NATGRID_RETRY_EXHAUSTED");
        assert!(err.to_string().contains("after 2 attempts"));
    }

    #[test]
    fn test_network_error_classification() {
        assert_eq!(
            NetworkError::ConnectionFailed { message: "refused".into() }.failure_kind(),
            FailureKind::Connection
        );
        assert_eq!(
            NetworkError::Disconnected { message: "reset".into() }.failure_kind(),
            FailureKind::Connection
        );
        assert_eq!(
            NetworkError::Timeout { timeout: Duration::from_secs(1) }.failure_kind(),
            FailureKind::Timeout
        );
    }

    #[test]
    fn test_auth_replay_flattens_source() {
        let err = AuthError::cannot_connect_with(
            "Connection error",
            NetworkError::ConnectionFailed { message: "refused".into() },
        );
        match err.replay() {
            AuthError::CannotConnect { message, source } => {
                assert!(message.contains("refused"));
                assert!(source.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_data_extraction_display_includes_path() {
        let err = DataExtractionError::new(
            "Missing 'accountLinks' field in response",
            "data.user.accountLinks",
            Some(&serde_json::json!({"user": {}})),
        );
        assert!(err.to_string().contains("Path: data.user.accountLinks"));
        assert_eq!(err.preview().as_deref(), Some(r#"{"user":{}}"#));
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("héllo", 2), "hé...");
        assert_eq!(preview("short", 10), "short");
    }
}
