//! GraphQL Types
//!
//! Request payloads and the normalized response envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::NationalGridError;

/// A reusable GraphQL request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphQLRequest {
    pub query: String,
    pub variables: Option<Map<String, Value>>,
    pub operation_name: Option<String>,
    /// Endpoint override; the client default is used when absent.
    pub endpoint: Option<String>,
}

/// Wire body posted to a GraphQL endpoint.
#[derive(Debug, Serialize)]
struct GraphQLPayload<'a> {
    query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<&'a Map<String, Value>>,
    #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
    operation_name: Option<&'a str>,
}

impl GraphQLRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables
            .get_or_insert_with(Map::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// JSON body: dedented query, plus `variables`/`operationName` when set.
    pub fn to_payload(&self) -> Value {
        let payload = GraphQLPayload {
            query: dedent(&self.query).trim().to_string(),
            variables: self.variables.as_ref().filter(|v| !v.is_empty()),
            operation_name: self.operation_name.as_deref().filter(|n| !n.is_empty()),
        };
        serde_json::to_value(payload).unwrap_or(Value::Null)
    }

    /// Variables rendered for diagnostics.
    pub(crate) fn variables_value(&self) -> Option<Value> {
        self.variables.clone().map(Value::Object)
    }
}

/// Normalized GraphQL response envelope.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct GraphQLResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<Value>>,
    #[serde(default)]
    pub extensions: Option<Value>,
}

impl GraphQLResponse {
    /// Build from an arbitrary JSON body; non-object bodies yield an empty envelope.
    pub fn from_payload(payload: Value) -> Self {
        match payload {
            Value::Object(mut map) => Self {
                data: map.remove("data").filter(|v| !v.is_null()),
                errors: match map.remove("errors") {
                    Some(Value::Array(errors)) => Some(errors),
                    _ => None,
                },
                extensions: map.remove("extensions").filter(|v| !v.is_null()),
            },
            _ => Self::default(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Turn application-level errors into a failure.
    pub fn raise_on_errors(&self) -> Result<(), NationalGridError> {
        match &self.errors {
            Some(errors) if !errors.is_empty() => Err(NationalGridError::GraphQLErrors {
                errors: errors.clone(),
            }),
            _ => Ok(()),
        }
    }
}

/// Build `query Operation($vars) { ... }` around a selection.
pub fn compose_query(operation: &str, selection_set: &str, variables: Option<&str>) -> String {
    let header = match variables.filter(|v| !v.is_empty()) {
        Some(vars) => format!("{}({})", operation, vars),
        None => operation.to_string(),
    };
    format!("query {} {{\n{}\n}}", header, selection_set.trim())
}

/// Remove the whitespace prefix shared by every non-blank line.
pub(crate) fn dedent(text: &str) -> String {
    let margin = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    text.lines()
        .map(|line| if line.trim().is_empty() { "" } else { &line[margin..] })
        .collect::<Vec<_>>()
        .join("\n")
}
