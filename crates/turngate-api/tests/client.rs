//! Controller client protocol tests against a mock HTTP server.

use std::time::Duration;

use secrecy::SecretString;
use turngate_api::{DoorClient, DoorError};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> DoorClient {
    DoorClient::new(
        &server.uri(),
        7,
        "api",
        SecretString::from("secret".to_string()),
        Duration::from_secs(5),
    )
    .expect("mock server URI is valid")
}

fn token_response(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": token }))
}

fn pass_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": "ok" }))
}

#[tokio::test]
async fn pass_succeeds_with_current_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/system/auth"))
        .respond_with(token_response("t1"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/devices/7/pass"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(pass_ok())
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.authenticate().await.unwrap();
    client.open_pass(103, 2, "camera exit").await.unwrap();
}

#[tokio::test]
async fn unauthorized_pass_refreshes_token_and_retries_once() {
    let server = MockServer::start().await;

    // First pass attempt: the stale token is rejected.
    Mock::given(method("POST"))
        .and(path("/api/devices/7/pass"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    // Exactly one re-authentication...
    Mock::given(method("POST"))
        .and(path("/api/system/auth"))
        .respond_with(token_response("fresh"))
        .expect(1)
        .mount(&server)
        .await;
    // ...and the retry carries the fresh token.
    Mock::given(method("POST"))
        .and(path("/api/devices/7/pass"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(pass_ok())
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.open_pass(103, 1, "camera entrance").await.unwrap();
}

#[tokio::test]
async fn second_unauthorized_does_not_trigger_third_attempt() {
    let server = MockServer::start().await;

    // The pass endpoint rejects every attempt: exactly two, no more.
    Mock::given(method("POST"))
        .and(path("/api/devices/7/pass"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/system/auth"))
        .respond_with(token_response("fresh"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.open_pass(103, 2, "camera exit").await.unwrap_err();
    assert!(matches!(err, DoorError::Unauthorized));
}

#[tokio::test]
async fn failed_reauthentication_drops_the_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/devices/7/pass"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/system/auth"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.open_pass(103, 2, "camera exit").await.unwrap_err();
    assert!(matches!(err, DoorError::Unauthorized));
}

#[tokio::test]
async fn non_ok_result_is_a_rejection_not_an_auth_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/system/auth"))
        .respond_with(token_response("t1"))
        .expect(1)
        .mount(&server)
        .await;
    // HTTP 200 but the controller declines: no re-auth, no retry.
    Mock::given(method("POST"))
        .and(path("/api/devices/7/pass"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": "denied" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.authenticate().await.unwrap();
    let err = client.open_pass(103, 2, "camera exit").await.unwrap_err();
    match err {
        DoorError::Rejected(reason) => assert_eq!(reason, "denied"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn staff_list_parses_roster() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/system/auth"))
        .respond_with(token_response("t1"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/staff/list"))
        .and(query_param("withPhone", "true"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": 1, "name": "Alice", "phone": "+100" },
            { "id": 2, "name": "Bob" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.authenticate().await.unwrap();
    let staff = client.staff_list().await.unwrap();
    assert_eq!(staff.len(), 2);
    assert_eq!(staff[0].id, 1);
    assert_eq!(staff[0].name, "Alice");
    assert_eq!(staff[1].name, "Bob");
}

#[tokio::test]
async fn transport_error_is_not_unauthorized() {
    // Nothing listening on this port.
    let client = DoorClient::new(
        "http://127.0.0.1:1",
        7,
        "api",
        SecretString::from("secret".to_string()),
        Duration::from_millis(200),
    )
    .unwrap();

    let err = client.open_pass(103, 2, "camera exit").await.unwrap_err();
    assert!(matches!(err, DoorError::Transport(_)));
}
