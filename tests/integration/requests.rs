//! Integration tests for GraphQL and REST execution

use super::*;
use integrations_nationalgrid::{
    nationalgrid_config, FailureKind, GraphQLRequest, NationalGridClient, NationalGridError,
    RestData, RestRequest,
};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn anonymous_client(server: &MockServer) -> NationalGridClient {
    NationalGridClient::new(test_config(server, false)).unwrap()
}

fn client_with(server: &MockServer, auth: &Arc<CountingAuthenticator>) -> NationalGridClient {
    NationalGridClient::new(test_config(server, true))
        .unwrap()
        .with_authenticator(auth.clone())
}

async fn graphql_calls(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/graphql")
        .count()
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(success_response(json!({"data": {"__typename": "Query"}})))
        .mount(&server)
        .await;

    let client = anonymous_client(&server);
    assert!(client.ping().await.unwrap());
    assert_eq!(graphql_calls(&server).await, 2);

    let stats = client.retry_stats();
    assert_eq!(stats.total_attempts, 2);
}

#[tokio::test]
async fn test_client_error_fails_without_retry() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad query"))
        .mount(&server)
        .await;

    let client = anonymous_client(&server);
    let err = client.execute(&GraphQLRequest::new("query { broken }")).await.unwrap_err();

    match err {
        NationalGridError::GraphQL(e) => {
            assert_eq!(e.status, Some(400));
            assert_eq!(e.response_body.as_deref(), Some("bad query"));
            assert_eq!(e.query.as_deref(), Some("query { broken }"));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(graphql_calls(&server).await, 1);
}

#[tokio::test]
async fn test_retries_exhausted() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut config = test_config(&server, false);
    config.retry = fast_retry(2);
    let client = NationalGridClient::new(config).unwrap();

    let err = client.ping().await.unwrap_err();
    match err {
        NationalGridError::RetryExhausted(e) => {
            assert_eq!(e.attempts, 2);
            assert_eq!(e.last_error.status(), Some(503));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(graphql_calls(&server).await, 2);
}

#[tokio::test]
async fn test_unauthorized_reauthenticates_once() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("Authorization", "Bearer token-2"))
        .respond_with(success_response(json!({"data": {"__typename": "Query"}})))
        .mount(&server)
        .await;

    let auth = Arc::new(CountingAuthenticator::new());
    let client = client_with(&server, &auth);

    assert!(client.ping().await.unwrap());
    assert_eq!(auth.count(), 2);
    assert_eq!(graphql_calls(&server).await, 2);
}

#[tokio::test]
async fn test_rejected_login_is_not_retried() {
    let server = setup_mock_server().await;
    let auth = Arc::new(CountingAuthenticator {
        reject: true,
        ..CountingAuthenticator::new()
    });
    let client = client_with(&server, &auth);

    let err = assert_err!(client.ping().await);
    assert!(err.is_invalid_auth());
    assert_eq!(err.failure_kind(), FailureKind::Auth);
    assert_eq!(auth.count(), 1);
    assert_eq!(graphql_calls(&server).await, 0);
}

#[tokio::test]
async fn test_concurrent_calls_share_one_login() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(success_response(json!({"data": {"__typename": "Query"}})))
        .mount(&server)
        .await;

    let auth = Arc::new(CountingAuthenticator {
        delay: Duration::from_millis(50),
        ..CountingAuthenticator::new()
    });
    let client = Arc::new(client_with(&server, &auth));

    let handles = (0..10).map(|_| {
        let client = client.clone();
        tokio::spawn(async move { client.ping().await })
    });

    for result in join_all(handles).await {
        assert!(assert_ok!(result.unwrap()));
    }
    assert_eq!(auth.count(), 1);
    assert_eq!(graphql_calls(&server).await, 10);
}

#[tokio::test]
async fn test_headers_and_variables_reach_server() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("ocp-apim-subscription-key", "custom-key"))
        .and(header("X-Client", "per-call"))
        .and(header("X-Tenant", "default"))
        .and(body_partial_json(json!({
            "operationName": "BillingAccountInfo",
            "variables": {"accountNumber": "1234567890"}
        })))
        .respond_with(success_response(json!({"data": {"billingAccount": {
            "region": "NY",
            "status": "ACTIVE",
            "premiseNumber": "P1",
            "fuelTypes": [{"type": "ELECTRIC"}],
            "meter": {"nodes": []}
        }}})))
        .mount(&server)
        .await;

    let config = nationalgrid_config()
        .endpoint(format!("{}/graphql", server.uri()))
        .subscription_key("custom-key")
        .default_header("X-Tenant", "default")
        .default_header("X-Client", "from-config")
        .retry(fast_retry(1))
        .build()
        .unwrap();
    let client = NationalGridClient::new(config).unwrap();

    let request = GraphQLRequest::new(
        "query BillingAccountInfo($accountNumber: String!) { billingAccount(accountNumber: $accountNumber) { region } }",
    )
    .operation_name("BillingAccountInfo")
    .variable("accountNumber", "1234567890");
    let headers = vec![("X-Client".to_string(), "per-call".to_string())];

    let response = client.execute_with(&request, &headers, None).await.unwrap();
    assert!(!response.has_errors());
    assert_eq!(response.data.unwrap()["billingAccount"]["region"], "NY");
}

#[tokio::test]
async fn test_graphql_errors_surface_in_envelope() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(success_response(json!({
            "data": null,
            "errors": [{"message": "Field 'x' is not defined"}]
        })))
        .mount(&server)
        .await;

    let client = anonymous_client(&server);
    let response = client.execute(&GraphQLRequest::new("query { x }")).await.unwrap();
    assert!(response.has_errors());
    assert!(!client.ping().await.unwrap());
    assert_eq!(graphql_calls(&server).await, 2);
}

#[tokio::test]
async fn test_rest_json_and_text_bodies() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .and(query_param("verbose", "true"))
        .respond_with(success_response(json!({"ok": true})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/banner"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("Scheduled maintenance"),
        )
        .mount(&server)
        .await;

    let client = anonymous_client(&server);

    let json = client
        .execute_rest(&RestRequest::get("status").param("verbose", "true"))
        .await
        .unwrap();
    assert_eq!(json.status, 200);
    assert_eq!(json.data, RestData::Json(json!({"ok": true})));

    let text = client.execute_rest(&RestRequest::get("/banner")).await.unwrap();
    assert_eq!(text.data.as_text(), Some("Scheduled maintenance"));
}

#[tokio::test]
async fn test_interval_reads() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/amiadapter-cu-uwp-sys/v1/interval/reads/P100/SP200"))
        .and(query_param("StartDateTime", "2024-01-01 00:00:00"))
        .respond_with(success_response(json!([
            {"startTime": "2024-01-01T00:00:00", "endTime": "2024-01-01T00:15:00", "value": 0.31},
            {"startTime": "2024-01-01T00:15:00", "endTime": "2024-01-01T00:30:00", "value": 0.27}
        ])))
        .mount(&server)
        .await;

    let client = anonymous_client(&server);
    let reads = client
        .get_interval_reads("P100", "SP200", "2024-01-01 00:00:00")
        .await
        .unwrap();
    assert_eq!(reads.len(), 2);
    assert_eq!(reads[1].value, 0.27);

    let err = client.get_interval_reads("P100", "SP200", "").await.unwrap_err();
    assert!(matches!(err, NationalGridError::Validation(_)));
}
