//! HTTP Transport
//!
//! HTTP client interface and implementations. The production transport keeps
//! a cookie jar and follows redirects, reporting the final URL, which is what
//! the hosted sign-in pages require.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::warn;

use crate::error::{ConfigurationError, NetworkError};
use crate::types::NationalGridConfig;

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 10;

/// HTTP request definition.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Fully-built URL, query string included.
    pub url: String,
    /// Sent in order; names are not normalized.
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body.into()),
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP response definition.
#[derive(Clone, Debug, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    /// Lower-cased header names.
    pub headers: HashMap<String, String>,
    pub body: String,
    /// URL after following redirects.
    pub url: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("")
    }
}

/// HTTP transport interface (for dependency injection).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send an HTTP request. Non-2xx statuses are returned, not raised.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NetworkError>;
}

/// Default reqwest-based HTTP transport.
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl ReqwestHttpTransport {
    /// Create a transport with default settings.
    pub fn new() -> Result<Self, ConfigurationError> {
        Self::from_config(&NationalGridConfig::default())
    }

    /// Create a transport honouring the client's TLS, timeout and pool settings.
    pub fn from_config(config: &NationalGridConfig) -> Result<Self, ConfigurationError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| ConfigurationError::HttpClient {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            default_timeout: config.timeout,
        })
    }

    fn map_send_error(err: reqwest::Error, timeout: Duration) -> NetworkError {
        if err.is_timeout() {
            NetworkError::Timeout { timeout }
        } else if err.is_connect() {
            NetworkError::ConnectionFailed {
                message: err.to_string(),
            }
        } else if err.is_builder() || err.is_redirect() {
            NetworkError::Request {
                message: err.to_string(),
            }
        } else {
            NetworkError::Disconnected {
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NetworkError> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut req_builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
            HttpMethod::Patch => self.client.patch(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key, value);
        }

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        let response = req_builder
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, timeout))?;

        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("")
            .to_string();
        let url = response.url().to_string();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.as_str().to_lowercase(), v.to_string());
            }
        }

        let body = settle_body(status, response.text().await, |e| {
            if e.is_timeout() {
                NetworkError::Timeout { timeout }
            } else {
                NetworkError::Body {
                    message: e.to_string(),
                }
            }
        })?;

        Ok(HttpResponse {
            status,
            status_text,
            headers,
            body,
            url,
        })
    }
}

/// Resolve a body read. A non-2xx status is kept with an empty body so the
/// caller still classifies by status; only successful responses fail.
fn settle_body<E: std::fmt::Display>(
    status: u16,
    body: Result<String, E>,
    on_error: impl FnOnce(E) -> NetworkError,
) -> Result<String, NetworkError> {
    match body {
        Ok(body) => Ok(body),
        Err(e) if !(200..300).contains(&status) => {
            warn!(status, error = %e, "Failed to read error response body");
            Ok(String::new())
        }
        Err(e) => Err(on_error(e)),
    }
}

enum MockReply {
    Response(HttpResponse),
    Failure(NetworkError),
}

/// Mock HTTP transport for testing. Replies are served in queue order.
#[derive(Default)]
pub struct MockHttpTransport {
    replies: Mutex<VecDeque<MockReply>>,
    request_history: Mutex<Vec<HttpRequest>>,
    default_response: Mutex<Option<HttpResponse>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockHttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to return.
    pub fn queue_response(&self, response: HttpResponse) -> &Self {
        lock(&self.replies).push_back(MockReply::Response(response));
        self
    }

    /// Queue a JSON response.
    pub fn queue_json_response<T: serde::Serialize>(&self, status: u16, body: &T) -> &Self {
        self.queue_response(HttpResponse {
            status,
            status_text: status_text(status),
            headers: [("content-type".to_string(), "application/json".to_string())]
                .into_iter()
                .collect(),
            body: serde_json::to_string(body).unwrap_or_default(),
            url: String::new(),
        })
    }

    /// Queue an HTML response that ended at `final_url` after redirects.
    pub fn queue_page(
        &self,
        status: u16,
        body: impl Into<String>,
        final_url: impl Into<String>,
    ) -> &Self {
        self.queue_response(HttpResponse {
            status,
            status_text: status_text(status),
            headers: [("content-type".to_string(), "text/html".to_string())]
                .into_iter()
                .collect(),
            body: body.into(),
            url: final_url.into(),
        })
    }

    /// Queue a transport failure.
    pub fn queue_failure(&self, error: NetworkError) -> &Self {
        lock(&self.replies).push_back(MockReply::Failure(error));
        self
    }

    /// Set default response when queue is empty.
    pub fn set_default_response(&self, response: HttpResponse) -> &Self {
        *lock(&self.default_response) = Some(response);
        self
    }

    pub fn get_requests(&self) -> Vec<HttpRequest> {
        lock(&self.request_history).clone()
    }

    pub fn get_last_request(&self) -> Option<HttpRequest> {
        lock(&self.request_history).last().cloned()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.request_history).len()
    }

    pub fn clear_history(&self) {
        lock(&self.request_history).clear();
    }
}

fn status_text(status: u16) -> String {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        403 => "Forbidden",
        500 => "Internal Server Error",
        _ => "",
    }
    .to_string()
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NetworkError> {
        let request_url = request.url.clone();
        lock(&self.request_history).push(request);

        let reply = lock(&self.replies)
            .pop_front()
            .or_else(|| lock(&self.default_response).clone().map(MockReply::Response));

        match reply {
            Some(MockReply::Response(mut response)) => {
                if response.url.is_empty() {
                    response.url = request_url;
                }
                Ok(response)
            }
            Some(MockReply::Failure(error)) => Err(error),
            None => Err(NetworkError::ConnectionFailed {
                message: "No mock response available".to_string(),
            }),
        }
    }
}
