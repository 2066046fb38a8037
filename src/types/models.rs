//! Response Models
//!
//! Typed shapes of the provider's GraphQL and REST payloads.

use serde::{Deserialize, Deserializer, Serialize};

/// A linked billing account identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLink {
    #[serde(deserialize_with = "string_or_number")]
    pub account_link_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub billing_account_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuelType {
    #[serde(rename = "type")]
    pub fuel_type: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAddress {
    pub service_address_compressed: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub customer_type: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meter {
    #[serde(default)]
    pub is_smart_meter: bool,
    #[serde(default)]
    pub has_ami_smart_meter: bool,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub device_code: Option<String>,
    #[serde(default)]
    pub fuel_type: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub meter_point_type_code: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub meter_point_number: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub service_point_number: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub meter_number: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeterConnection {
    #[serde(default)]
    pub nodes: Vec<Meter>,
}

/// Billing account information.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingAccount {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_abbreviation: Option<String>,
    #[serde(default, rename = "type")]
    pub account_type: Option<String>,
    #[serde(default)]
    pub fuel_types: Vec<FuelType>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub service_address: Option<ServiceAddress>,
    #[serde(default)]
    pub customer_info: Option<CustomerInfo>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub customer_number: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub premise_number: Option<String>,
    #[serde(default)]
    pub meter: MeterConnection,
}

/// Energy usage cost for one billing period.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyUsageCost {
    pub date: String,
    pub fuel_type: String,
    pub amount: f64,
    #[serde(deserialize_with = "string_or_number")]
    pub month: String,
}

/// Historical monthly usage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyUsage {
    pub usage: f64,
    pub usage_type: String,
    /// `YYYYMM`.
    pub usage_year_month: u32,
}

/// Daily AMI usage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmiEnergyUsage {
    pub date: String,
    pub fuel_type: String,
    pub quantity: f64,
}

/// One 15-minute meter interval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalRead {
    pub start_time: String,
    pub end_time: String,
    pub value: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(i64),
    Float(f64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Int(n) => n.to_string(),
            StringOrNumber::Float(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(String::from))
}
