//! GraphQL Query Scaffolds
//!
//! [`StandardQuery`] renders `query Op($vars) { root(args) { selection } }`.
//! The builder functions below fill it in for the three provider endpoints;
//! every part can be overridden before calling [`StandardQuery::to_request`].

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::types::graphql::dedent;
use crate::types::{compose_query, GraphQLRequest};

pub const DEFAULT_SELECTION_SET: &str = "__typename";

pub const LINKED_BILLING_ENDPOINT: &str = "https://myaccount.nationalgrid.com/api/user-cu-uwp-gql";
pub const BILLING_ACCOUNT_INFO_ENDPOINT: &str =
    "https://myaccount.nationalgrid.com/api/billingaccount-cu-uwp-gql";
pub const ENERGY_USAGE_ENDPOINT: &str = "https://myaccount.nationalgrid.com/api/energyusage-cu-uwp-gql";

pub const LINKED_BILLING_SELECTION_SET: &str = "
accountLinks {
    totalCount
    nodes {
        accountLinkId
        billingAccountId
    }
}
";

pub const BILLING_ACCOUNT_INFO_SELECTION_SET: &str = "
region
regionAbbreviation
type
fuelTypes {
    type
}
status
serviceAddress {
    serviceAddressCompressed
}
customerInfo {
    customerType
}
customerNumber
premiseNumber
meter {
    nodes {
        isSmartMeter
        hasAmiSmartMeter
        deviceCode
        fuelType
        meterPointTypeCode
        meterPointNumber
        servicePointNumber
        meterNumber
    }
}
";

pub const ENERGY_USAGE_COSTS_SELECTION_SET: &str = "
nodes {
    date
    fuelType
    amount
    month
}
";

pub const ENERGY_USAGES_SELECTION_SET: &str = "
nodes {
    usage
    usageType
    usageYearMonth
}
";

/// Generic single-root query definition.
#[derive(Clone, Debug, PartialEq)]
pub struct StandardQuery {
    pub operation_name: String,
    pub root_field: String,
    pub selection_set: String,
    pub variables: Option<Map<String, Value>>,
    /// Entries such as `$userId: String!`; blanks are dropped.
    pub variable_definitions: Vec<String>,
    pub field_arguments: Option<String>,
    pub endpoint: Option<String>,
}

impl StandardQuery {
    pub fn new(operation_name: impl Into<String>, root_field: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            root_field: root_field.into(),
            selection_set: DEFAULT_SELECTION_SET.to_string(),
            variables: None,
            variable_definitions: Vec::new(),
            field_arguments: None,
            endpoint: None,
        }
    }

    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = name.into();
        self
    }

    pub fn selection_set(mut self, selection_set: impl Into<String>) -> Self {
        self.selection_set = selection_set.into();
        self
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

    pub fn variable_definitions<I, S>(mut self, definitions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variable_definitions = definitions.into_iter().map(Into::into).collect();
        self
    }

    pub fn field_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.field_arguments = Some(arguments.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    fn rendered_variable_definitions(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .variable_definitions
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }

    pub fn to_query(&self) -> String {
        let dedented = dedent(&self.selection_set);
        let selection_set = match dedented.trim() {
            "" => DEFAULT_SELECTION_SET,
            s => s,
        };
        let block = selection_set
            .lines()
            .map(|line| if line.trim().is_empty() { String::new() } else { format!("  {}", line) })
            .collect::<Vec<_>>()
            .join("\n");
        let arguments = self
            .field_arguments
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(|a| format!("({})", a))
            .unwrap_or_default();

        let selection = format!("{}{} {{\n{}\n}}", self.root_field, arguments, block);
        compose_query(
            &self.operation_name,
            &selection,
            self.rendered_variable_definitions().as_deref(),
        )
    }

    pub fn to_request(&self) -> GraphQLRequest {
        GraphQLRequest {
            query: self.to_query(),
            variables: self.variables.clone(),
            operation_name: Some(self.operation_name.clone()),
            endpoint: self.endpoint.clone(),
        }
    }
}

impl From<StandardQuery> for GraphQLRequest {
    fn from(query: StandardQuery) -> Self {
        query.to_request()
    }
}

/// Billing accounts linked to a user (`user-cu-uwp-gql`).
pub fn linked_billing_accounts_query(user_id: &str) -> StandardQuery {
    StandardQuery::new("AccountIdentifiers", "user")
        .selection_set(LINKED_BILLING_SELECTION_SET)
        .variable_definitions(["$userId: String!"])
        .field_arguments("userId: $userId")
        .variable("userId", user_id)
        .endpoint(LINKED_BILLING_ENDPOINT)
}

/// Billing account details (`billingaccount-cu-uwp-gql`).
pub fn billing_account_info_query(account_number: &str) -> StandardQuery {
    StandardQuery::new("OpowerAccount", "billingAccount")
        .selection_set(BILLING_ACCOUNT_INFO_SELECTION_SET)
        .variable_definitions(["$accountNumber: String!"])
        .field_arguments("accountNumber: $accountNumber")
        .variable("accountNumber", account_number)
        .endpoint(BILLING_ACCOUNT_INFO_ENDPOINT)
}

/// Energy costs for the billing period containing `date` (`energyusage-cu-uwp-gql`).
pub fn energy_usage_costs_query(
    account_number: &str,
    date: NaiveDate,
    company_code: &str,
) -> StandardQuery {
    StandardQuery::new("EnergyUsageCosts", "energyUsageCosts")
        .selection_set(ENERGY_USAGE_COSTS_SELECTION_SET)
        .variable_definitions([
            "$accountNumber: String!",
            "$date: Date!",
            "$companyCode: CompanyCodeValue!",
        ])
        .field_arguments("accountNumber: $accountNumber, date: $date, companyCode: $companyCode")
        .variable("accountNumber", account_number)
        .variable("date", date.format("%Y-%m-%d").to_string())
        .variable("companyCode", company_code)
        .endpoint(ENERGY_USAGE_ENDPOINT)
}

/// Monthly usage from `from_month` (`YYYYMM`), newest first (`energyusage-cu-uwp-gql`).
pub fn energy_usages_query(account_number: &str, from_month: u32, first: u32) -> StandardQuery {
    StandardQuery::new("EnergyUsages", "energyUsages")
        .selection_set(ENERGY_USAGES_SELECTION_SET)
        .variable_definitions(["$accountNumber: String!", "$from: Int!", "$first: Int!"])
        .field_arguments(
            "accountNumber: $accountNumber, \
             where: {usageYearMonth: {gte: $from}}, \
             order: [{usageYearMonth: DESC}], \
             first: $first",
        )
        .variable("accountNumber", account_number)
        .variable("from", from_month)
        .variable("first", first)
        .endpoint(ENERGY_USAGE_ENDPOINT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_query_rendering() {
        let query = StandardQuery::new("Lookup", "thing")
            .selection_set("\n    id\n    child {\n        name\n    }\n")
            .variable_definitions(["$id: ID!", "  ", "$n: Int"])
            .field_arguments("id: $id, n: $n")
            .to_query();

        assert_eq!(
            query,
            "query Lookup($id: ID!, $n: Int) {\nthing(id: $id, n: $n) {\n  id\n  child {\n      name\n  }\n}\n}"
        );
    }

    #[test]
    fn test_standard_query_defaults() {
        let request = StandardQuery::new("Ping", "viewer")
            .selection_set("   ")
            .to_request();
        assert_eq!(request.query, "query Ping {\nviewer {\n  __typename\n}\n}");
        assert_eq!(request.operation_name.as_deref(), Some("Ping"));
        assert!(request.variables.is_none());
        assert!(request.endpoint.is_none());
    }

    #[test]
    fn test_linked_billing_accounts_query() {
        let request = linked_billing_accounts_query("sub-123").to_request();
        assert!(request
            .query
            .starts_with("query AccountIdentifiers($userId: String!) {\nuser(userId: $userId) {"));
        assert!(request.query.contains("billingAccountId"));
        assert_eq!(request.endpoint.as_deref(), Some(LINKED_BILLING_ENDPOINT));
        assert_eq!(request.to_payload()["variables"], json!({"userId": "sub-123"}));
    }

    #[test]
    fn test_billing_account_query() {
        let request = billing_account_info_query("1234567890").to_request();
        assert!(request.query.contains("billingAccount(accountNumber: $accountNumber)"));
        assert!(request.query.contains("servicePointNumber"));
        assert_eq!(request.endpoint.as_deref(), Some(BILLING_ACCOUNT_INFO_ENDPOINT));
    }

    #[test]
    fn test_energy_queries() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let costs = energy_usage_costs_query("42", date, "NECO").to_request();
        assert!(costs.query.starts_with(
            "query EnergyUsageCosts($accountNumber: String!, $date: Date!, $companyCode: CompanyCodeValue!)"
        ));
        assert_eq!(
            costs.to_payload()["variables"],
            json!({"accountNumber": "42", "date": "2024-03-01", "companyCode": "NECO"})
        );

        let usages = energy_usages_query("42", 202401, 12).to_request();
        assert!(usages.query.contains("where: {usageYearMonth: {gte: $from}}"));
        assert!(usages.query.contains("order: [{usageYearMonth: DESC}]"));
        assert_eq!(usages.to_payload()["variables"]["first"], json!(12));
        assert_eq!(usages.endpoint.as_deref(), Some(ENERGY_USAGE_ENDPOINT));
    }

    #[test]
    fn test_selection_override() {
        let request = billing_account_info_query("1")
            .selection_set("premiseNumber")
            .operation_name("PremiseOnly")
            .to_request();
        assert_eq!(
            request.query,
            "query PremiseOnly($accountNumber: String!) {\nbillingAccount(accountNumber: $accountNumber) {\n  premiseNumber\n}\n}"
        );
    }
}
