//! Response Extractors
//!
//! Pull typed records out of raw responses. A missing or null field along
//! the expected path raises [`DataExtractionError`] naming the dotted path;
//! GraphQL envelopes carrying errors fail with
//! [`NationalGridError::GraphQLErrors`] first.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{DataExtractionError, NationalGridError, NationalGridResult};
use crate::types::{
    AccountLink, AmiEnergyUsage, BillingAccount, EnergyUsage, EnergyUsageCost, GraphQLResponse,
    IntervalRead, RestData, RestResponse,
};

fn graphql_data(response: &GraphQLResponse) -> NationalGridResult<&Value> {
    response.raise_on_errors()?;
    response
        .data
        .as_ref()
        .filter(|data| !data.is_null())
        .ok_or_else(|| DataExtractionError::new("Response data is null", "data", None).into())
}

/// Follow `fields` from `data`, treating null like absent.
fn walk<'a>(data: &'a Value, fields: &[&str]) -> NationalGridResult<&'a Value> {
    let mut current = data;
    let mut path = String::from("data");
    for (i, field) in fields.iter().enumerate() {
        path.push('.');
        path.push_str(field);
        current = match current.get(field).filter(|v| !v.is_null()) {
            Some(value) => value,
            None => {
                let message = match i.checked_sub(1).map(|p| fields[p]) {
                    Some(parent) if *field == "nodes" => {
                        format!("Missing 'nodes' field in {}", parent)
                    }
                    _ => format!("Missing '{}' field in response", field),
                };
                return Err(DataExtractionError::new(message, path, Some(data)).into());
            }
        };
    }
    Ok(current)
}

fn decode<T: DeserializeOwned>(value: &Value, path: &str, data: &Value) -> NationalGridResult<T> {
    serde_json::from_value(value.clone()).map_err(|e| {
        NationalGridError::from(DataExtractionError::new(
            format!("Unexpected shape at {}: {}", path, e),
            path,
            Some(data),
        ))
    })
}

fn extract<T: DeserializeOwned>(
    response: &GraphQLResponse,
    fields: &[&str],
) -> NationalGridResult<T> {
    let data = graphql_data(response)?;
    let value = walk(data, fields)?;
    decode(value, &format!("data.{}", fields.join(".")), data)
}

pub fn extract_linked_accounts(response: &GraphQLResponse) -> NationalGridResult<Vec<AccountLink>> {
    extract(response, &["user", "accountLinks", "nodes"])
}

pub fn extract_billing_account(response: &GraphQLResponse) -> NationalGridResult<BillingAccount> {
    extract(response, &["billingAccount"])
}

pub fn extract_energy_usage_costs(
    response: &GraphQLResponse,
) -> NationalGridResult<Vec<EnergyUsageCost>> {
    extract(response, &["energyUsageCosts", "nodes"])
}

pub fn extract_energy_usages(response: &GraphQLResponse) -> NationalGridResult<Vec<EnergyUsage>> {
    extract(response, &["energyUsages", "nodes"])
}

pub fn extract_ami_energy_usages(
    response: &GraphQLResponse,
) -> NationalGridResult<Vec<AmiEnergyUsage>> {
    extract(response, &["amiEnergyUsages", "nodes"])
}

/// Interval reads arrive as a bare JSON array.
pub fn extract_interval_reads(response: &RestResponse) -> NationalGridResult<Vec<IntervalRead>> {
    match &response.data {
        RestData::Json(Value::Null) => {
            Err(DataExtractionError::new("Response data is null", "data", None).into())
        }
        RestData::Json(data @ Value::Array(_)) => decode(data, "data", data),
        RestData::Json(other) => Err(DataExtractionError::new(
            "Expected list of interval reads",
            "data",
            Some(other),
        )
        .into()),
        RestData::Text(text) => Err(DataExtractionError::new(
            "Expected list of interval reads",
            "data",
            Some(&Value::String(text.clone())),
        )
        .into()),
    }
}
