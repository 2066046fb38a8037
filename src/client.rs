//! National Grid Client
//!
//! Request executor for the provider's GraphQL and REST APIs. Each call:
//!
//! 1. makes sure an HTTP session exists (created lazily, once)
//! 2. obtains a bearer token, logging in when none is cached
//! 3. merges headers and sends the request
//! 4. on a 401 clears the cached token so the retry logs in again
//! 5. retries or fails according to the [`RetryConfig`](crate::resilience::RetryConfig)
//!
//! A GraphQL envelope carrying `errors` is returned, not raised.

use chrono::NaiveDate;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::{HttpRequest, HttpResponse, HttpTransport, ReqwestHttpTransport};
use crate::error::{
    FailureKind, GraphQLError, NationalGridResult, RequestValidationError, RestApiError,
};
use crate::extractors;
use crate::flows::{Authenticator, B2cAuthenticator};
use crate::queries::{self, IntervalReadsQuery};
use crate::resilience::{RetryExecutor, RetryStats};
use crate::token::{TokenManager, TokenManagerConfig};
use crate::types::{
    AccountLink, BillingAccount, EnergyUsage, EnergyUsageCost, GraphQLRequest, GraphQLResponse,
    IntervalRead, LoginData, NationalGridConfig, RestData, RestRequest, RestResponse,
};

const JSON_CONTENT_TYPE: &str = "application/json";
const PING_QUERY: &str = "query Ping { __typename }";

/// Client for the National Grid customer APIs.
pub struct NationalGridClient {
    config: NationalGridConfig,
    session: RwLock<Option<Arc<dyn HttpTransport>>>,
    session_lock: tokio::sync::Mutex<()>,
    /// Injected transports belong to the caller and survive [`close`](Self::close).
    owns_transport: bool,
    tokens: TokenManager,
    retry: RetryExecutor,
}

impl NationalGridClient {
    /// Create a client that opens its own HTTP session on first use.
    pub fn new(config: NationalGridConfig) -> NationalGridResult<Self> {
        Self::build(config, None)
    }

    /// Create a client on top of a caller-provided transport.
    pub fn with_transport(
        config: NationalGridConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> NationalGridResult<Self> {
        Self::build(config, Some(transport))
    }

    fn build(
        config: NationalGridConfig,
        transport: Option<Arc<dyn HttpTransport>>,
    ) -> NationalGridResult<Self> {
        config.validate()?;

        let authenticator = Arc::new(B2cAuthenticator::new(config.b2c.clone()));
        let tokens = TokenManager::new(
            TokenManagerConfig::default(),
            config.credentials.clone(),
            authenticator,
        );
        let retry = RetryExecutor::new(config.retry.clone());
        let owns_transport = transport.is_none();

        debug!(
            endpoint = %config.endpoint,
            authenticated = config.has_credentials(),
            owns_transport,
            "Created National Grid client"
        );

        Ok(Self {
            config,
            session: RwLock::new(transport),
            session_lock: tokio::sync::Mutex::new(()),
            owns_transport,
            tokens,
            retry,
        })
    }

    /// Replace the login implementation.
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        let login_data = self.tokens.login_data();
        self.tokens = TokenManager::new(
            TokenManagerConfig::default(),
            self.config.credentials.clone(),
            authenticator,
        )
        .with_login_data(login_data);
        self
    }

    /// Seed the login data (for example a `sub` persisted from an earlier run).
    pub fn with_login_data(mut self, login_data: LoginData) -> Self {
        self.tokens = self.tokens.with_login_data(login_data);
        self
    }

    pub fn config(&self) -> &NationalGridConfig {
        &self.config
    }

    /// Data recorded by the most recent login.
    pub fn login_data(&self) -> LoginData {
        self.tokens.login_data()
    }

    pub fn retry_stats(&self) -> RetryStats {
        self.retry.get_stats()
    }

    /// Forget the cached bearer token.
    pub fn invalidate_token(&self) {
        self.tokens.invalidate();
    }

    fn current_session(&self) -> Option<Arc<dyn HttpTransport>> {
        self.session.read().ok().and_then(|guard| guard.clone())
    }

    /// Live transport, created on first use.
    pub(crate) async fn session(&self) -> NationalGridResult<Arc<dyn HttpTransport>> {
        if let Some(transport) = self.current_session() {
            return Ok(transport);
        }

        let _guard = self.session_lock.lock().await;
        if let Some(transport) = self.current_session() {
            return Ok(transport);
        }

        debug!("Opening HTTP session");
        let transport: Arc<dyn HttpTransport> =
            Arc::new(ReqwestHttpTransport::from_config(&self.config)?);
        match self.session.write() {
            Ok(mut guard) => *guard = Some(transport.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(transport.clone()),
        }
        Ok(transport)
    }

    /// Release the HTTP session if this client opened it.
    ///
    /// A later call opens a fresh session. Injected transports are left alone.
    pub async fn close(&self) {
        if !self.owns_transport {
            return;
        }
        let _guard = self.session_lock.lock().await;
        match self.session.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        debug!("Closed HTTP session");
    }

    async fn access_token(
        &self,
        transport: &dyn HttpTransport,
    ) -> NationalGridResult<Option<String>> {
        Ok(self.tokens.get_access_token(transport).await?)
    }

    /// Execute a GraphQL request with the default headers and timeout.
    pub async fn execute(&self, request: &GraphQLRequest) -> NationalGridResult<GraphQLResponse> {
        self.execute_with(request, &[], None).await
    }

    /// Execute a GraphQL request with extra headers and an optional timeout.
    pub async fn execute_with(
        &self,
        request: &GraphQLRequest,
        headers: &[(String, String)],
        timeout: Option<Duration>,
    ) -> NationalGridResult<GraphQLResponse> {
        let endpoint = request
            .endpoint
            .as_deref()
            .unwrap_or(self.config.endpoint.as_str());
        let body = request.to_payload().to_string();
        let body = body.as_str();
        let timeout = timeout.unwrap_or(self.config.timeout);

        self.retry
            .execute("GraphQL request", move || {
                self.graphql_attempt(request, endpoint, body, headers, timeout)
            })
            .await
    }

    async fn graphql_attempt(
        &self,
        request: &GraphQLRequest,
        endpoint: &str,
        body: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> NationalGridResult<GraphQLResponse> {
        let transport = self.session().await?;
        let access_token = self.access_token(transport.as_ref()).await?;
        let variables = request.variables_value();
        let call_error = |message: String, kind: FailureKind| {
            GraphQLError::new(message, kind, endpoint)
                .with_request(&request.query, variables.as_ref())
        };

        let mut http = HttpRequest::post(endpoint, body).timeout(timeout);
        http.headers = self
            .config
            .build_headers(headers, access_token.as_deref(), Some(JSON_CONTENT_TYPE));

        let operation = request.operation_name.as_deref().unwrap_or("");
        debug!(endpoint, operation, "POST GraphQL");
        let response = transport.send(http).await.map_err(|e| {
            call_error(format!("GraphQL request failed: {}", e), e.failure_kind()).with_source(e)
        })?;

        if !response.is_success() {
            self.on_error_status(&response, access_token.as_deref());
            return Err(call_error(
                format!(
                    "GraphQL request failed with HTTP {} {}",
                    response.status, response.status_text
                ),
                FailureKind::Status(response.status),
            )
            .with_response_body(response.body)
            .into());
        }

        let payload: Value = serde_json::from_str(&response.body).map_err(|e| {
            call_error("Invalid JSON in GraphQL response".to_string(), FailureKind::Decode)
                .with_response_body(response.body.clone())
                .with_source(e)
        })?;

        let result = GraphQLResponse::from_payload(payload);
        if let Some(errors) = result.errors.as_ref().filter(|e| !e.is_empty()) {
            warn!(endpoint, count = errors.len(), errors = ?errors, "GraphQL errors returned");
        }
        Ok(result)
    }

    fn on_error_status(&self, response: &HttpResponse, access_token: Option<&str>) {
        if response.status != 401 {
            return;
        }
        if let Some(used) = access_token {
            if self.tokens.invalidate_if_current(used) {
                info!("Received 401, cleared cached access token");
            }
        }
    }

    /// Execute a REST request with the default timeout.
    pub async fn execute_rest(&self, request: &RestRequest) -> NationalGridResult<RestResponse> {
        self.execute_rest_with(request, None).await
    }

    /// Execute a REST request with an optional timeout.
    pub async fn execute_rest_with(
        &self,
        request: &RestRequest,
        timeout: Option<Duration>,
    ) -> NationalGridResult<RestResponse> {
        let url = self.rest_url(request)?;
        let url = url.as_str();
        let body = request.body.as_ref().map(Value::to_string);
        let body = body.as_deref();
        let timeout = timeout.unwrap_or(self.config.timeout);

        self.retry
            .execute("REST request", move || self.rest_attempt(request, url, body, timeout))
            .await
    }

    /// Join relative paths onto the REST base URL and append the query.
    fn rest_url(&self, request: &RestRequest) -> NationalGridResult<Url> {
        let path = &request.path_or_url;
        let raw = if path.starts_with("http://") || path.starts_with("https://") {
            path.clone()
        } else {
            format!(
                "{}/{}",
                self.config.rest_base_url.trim_end_matches('/'),
                request.path_or_url.trim_start_matches('/')
            )
        };

        let mut url = Url::parse(&raw).map_err(|e| {
            let method = request.method.as_str();
            RestApiError::new("Invalid request URL", FailureKind::Invalid, method, &raw)
                .with_source(e)
        })?;
        if !request.params.is_empty() {
            url.query_pairs_mut().extend_pairs(request.params.iter());
        }
        Ok(url)
    }

    async fn rest_attempt(
        &self,
        request: &RestRequest,
        url: &str,
        body: Option<&str>,
        timeout: Duration,
    ) -> NationalGridResult<RestResponse> {
        let transport = self.session().await?;
        let access_token = self.access_token(transport.as_ref()).await?;
        let method = request.method.as_str();

        let content_type = body.map(|_| JSON_CONTENT_TYPE);
        let http = HttpRequest {
            method: request.method,
            url: url.to_string(),
            headers: self
                .config
                .build_headers(&request.headers, access_token.as_deref(), content_type),
            body: body.map(str::to_string),
            timeout: Some(timeout),
        };

        debug!(method, url, "REST request");
        let response = transport.send(http).await.map_err(|e| {
            RestApiError::new(format!("REST request failed: {}", e), e.failure_kind(), method, url)
                .with_source(e)
        })?;

        if !response.is_success() {
            self.on_error_status(&response, access_token.as_deref());
            return Err(RestApiError::new(
                format!(
                    "REST request failed with HTTP {} {}",
                    response.status, response.status_text
                ),
                FailureKind::Status(response.status),
                method,
                url,
            )
            .with_response_text(response.body)
            .into());
        }

        let data = if response.content_type().to_ascii_lowercase().contains("json") {
            if response.body.trim().is_empty() {
                RestData::Json(Value::Null)
            } else {
                let value = serde_json::from_str(&response.body).map_err(|e| {
                    let message = "Invalid JSON in REST response";
                    RestApiError::new(message, FailureKind::Decode, method, url)
                        .with_response_text(response.body.clone())
                        .with_source(e)
                })?;
                RestData::Json(value)
            }
        } else {
            RestData::Text(response.body)
        };

        Ok(RestResponse {
            status: response.status,
            headers: response.headers,
            data,
        })
    }

    /// Health check; true when the GraphQL endpoint returned data.
    pub async fn ping(&self) -> NationalGridResult<bool> {
        let response = self.execute(&GraphQLRequest::new(PING_QUERY)).await?;
        Ok(response.data.is_some())
    }

    /// Billing accounts linked to the signed-in user.
    ///
    /// The user id is the `sub` recorded at login; a login is forced when it
    /// is not known yet.
    pub async fn get_linked_accounts(&self) -> NationalGridResult<Vec<AccountLink>> {
        let user_id = match self.login_data().sub {
            Some(sub) => sub,
            None => {
                let transport = self.session().await?;
                self.access_token(transport.as_ref()).await?;
                self.login_data()
                    .sub
                    .ok_or_else(|| RequestValidationError::MissingField {
                        field: "sub".to_string(),
                    })?
            }
        };

        let request = queries::linked_billing_accounts_query(&user_id).to_request();
        let response = self.execute(&request).await?;
        extractors::extract_linked_accounts(&response)
    }

    pub async fn get_billing_account(
        &self,
        account_number: &str,
    ) -> NationalGridResult<BillingAccount> {
        let request = queries::billing_account_info_query(account_number).to_request();
        let response = self.execute(&request).await?;
        extractors::extract_billing_account(&response)
    }

    pub async fn get_energy_usage_costs(
        &self,
        account_number: &str,
        date: NaiveDate,
        company_code: &str,
    ) -> NationalGridResult<Vec<EnergyUsageCost>> {
        let request =
            queries::energy_usage_costs_query(account_number, date, company_code).to_request();
        let response = self.execute(&request).await?;
        extractors::extract_energy_usage_costs(&response)
    }

    /// Monthly usage from `from_month` (`YYYYMM`), at most `first` records.
    pub async fn get_energy_usages(
        &self,
        account_number: &str,
        from_month: u32,
        first: u32,
    ) -> NationalGridResult<Vec<EnergyUsage>> {
        let request = queries::energy_usages_query(account_number, from_month, first).to_request();
        let response = self.execute(&request).await?;
        extractors::extract_energy_usages(&response)
    }

    /// Interval reads since `start_datetime` (`YYYY-MM-DD hh:mm:ss`).
    pub async fn get_interval_reads(
        &self,
        premise_number: &str,
        service_point_number: &str,
        start_datetime: &str,
    ) -> NationalGridResult<Vec<IntervalRead>> {
        let query = IntervalReadsQuery::new(premise_number, service_point_number, start_datetime);
        let request = query.to_request()?;
        let response = self.execute_rest(&request).await?;
        extractors::extract_interval_reads(&response)
    }
}

impl std::fmt::Debug for NationalGridClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NationalGridClient")
            .field("endpoint", &self.config.endpoint)
            .field("owns_transport", &self.owns_transport)
            .finish_non_exhaustive()
    }
}
