//! Integration tests for the hosted sign-in

use super::*;
use integrations_nationalgrid::{NationalGridClient, NationalGridError};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHALLENGE: &str = r#"<html><head><script>var SETTINGS = {"transId":"StateProperties=abc","csrf":"csrf-token","api":"CombinedSigninAndSignup"};</script></head></html>"#;

fn access_token(sub: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    encode(
        &Header::default(),
        &json!({"sub": sub, "exp": exp}),
        &EncodingKey::from_secret(b"provider-secret"),
    )
    .unwrap()
}

async fn mount_discovery(server: &MockServer) {
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path(format!("/tenant/{}/v2.0/.well-known/openid-configuration", POLICY)))
        .respond_with(success_response(json!({
            "authorization_endpoint": format!("{}/tenant/oauth2/v2.0/authorize", uri),
            "issuer": format!("{}/tenant/v2.0/", uri),
            "token_endpoint": format!("{}/tenant/oauth2/v2.0/token", uri),
            "jwks_uri": format!("{}/tenant/discovery/v2.0/keys", uri)
        })))
        .mount(server)
        .await;
}

async fn mount_challenge(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/tenant/oauth2/v2.0/authorize"))
        .and(query_param("code_challenge_method", "S256"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(CHALLENGE),
        )
        .mount(server)
        .await;
}

/// Discovery, challenge page, credential post, confirm redirect, landing
/// page and token endpoint.
async fn mount_sign_in(server: &MockServer, token: &str) {
    mount_discovery(server).await;
    mount_challenge(server).await;

    Mock::given(method("POST"))
        .and(path(format!("/tenant/{}/SelfAsserted", POLICY)))
        .and(header("X-CSRF-TOKEN", "csrf-token"))
        .and(body_string_contains("signInName=user%40example.com"))
        .respond_with(success_response(json!({"status": "200"})))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/tenant/{}/api/CombinedSigninAndSignup/confirmed", POLICY)))
        .and(query_param("csrf_token", "csrf-token"))
        .and(query_param("tx", "StateProperties=abc"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/auth-landing?code=auth-code", server.uri())),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth-landing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code"))
        .respond_with(success_response(json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_sign_in_then_authorized_graphql() {
    let server = setup_mock_server().await;
    let token = access_token("user-42");
    mount_sign_in(&server, &token).await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("Authorization", format!("Bearer {}", token).as_str()))
        .respond_with(success_response(json!({"data": {"__typename": "Query"}})))
        .mount(&server)
        .await;

    let client = NationalGridClient::new(test_config(&server, true)).unwrap();

    assert!(client.ping().await.unwrap());
    assert!(client.ping().await.unwrap());
    assert_eq!(client.login_data().sub.as_deref(), Some("user-42"));

    let requests = server.received_requests().await.unwrap();
    let token_calls = requests
        .iter()
        .filter(|r| r.url.path() == "/tenant/oauth2/v2.0/token")
        .count();
    assert_eq!(token_calls, 1);

    client.close().await;
}

#[tokio::test]
async fn test_wrong_password_is_invalid_auth() {
    let server = setup_mock_server().await;
    mount_discovery(&server).await;
    mount_challenge(&server).await;

    Mock::given(method("POST"))
        .and(path(format!("/tenant/{}/SelfAsserted", POLICY)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"status":"400","message":"Your password is incorrect"}"#),
        )
        .mount(&server)
        .await;

    let client = NationalGridClient::new(test_config(&server, true)).unwrap();
    let err = client.ping().await.unwrap_err();

    assert!(err.is_invalid_auth());
    assert!(matches!(err, NationalGridError::Auth(_)));
    let graphql_calls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/graphql")
        .count();
    assert_eq!(graphql_calls, 0);
}

#[tokio::test]
async fn test_discovery_failure_is_not_retried() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path(format!("/tenant/{}/v2.0/.well-known/openid-configuration", POLICY)))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = NationalGridClient::new(test_config(&server, true)).unwrap();
    let err = client.ping().await.unwrap_err();

    match err {
        NationalGridError::Auth(AuthError::CannotConnect { .. }) => {}
        other => panic!("unexpected {:?}", other),
    }
}
