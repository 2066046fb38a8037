//! REST Types

use serde_json::Value;
use std::collections::HashMap;

use crate::core::HttpMethod;

/// A REST call against the provider API.
#[derive(Clone, Debug, PartialEq)]
pub struct RestRequest {
    pub method: HttpMethod,
    /// Path relative to the REST base URL, or an absolute URL.
    pub path_or_url: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl RestRequest {
    pub fn new(method: HttpMethod, path_or_url: impl Into<String>) -> Self {
        Self {
            method,
            path_or_url: path_or_url.into(),
            params: Vec::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get(path_or_url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path_or_url)
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Decoded REST body.
#[derive(Clone, Debug, PartialEq)]
pub enum RestData {
    Json(Value),
    Text(String),
}

impl RestData {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(_) => None,
        }
    }
}

/// Normalized REST response envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct RestResponse {
    pub status: u16,
    /// Lower-cased header names.
    pub headers: HashMap<String, String>,
    pub data: RestData,
}
