use super::*;
use httpmock::prelude::*;
use serde_json::json;

#[tokio::test]
async fn test_api_client_appends_key_and_bearer() {
    let server = MockServer::start();
    let client = ApiClients::new("test-api-key", Some("user-token")).retrying;

    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/ping")
            .query_param("key", "test-api-key")
            .header("authorization", "Bearer user-token");
        then.status(200);
    });

    let response = client.get(server.url("/ping")).send().await.unwrap();
    assert!(response.status().is_success());

    mock.assert();
}

#[tokio::test]
async fn test_api_client_without_key_sends_no_query() {
    let server = MockServer::start();
    let client = ApiClients::new("", None).retrying;

    let mock = server.mock(|when, then| {
        when.method(GET).path("/ping").query_param_missing("key");
        then.status(204);
    });

    client.get(server.url("/ping")).send().await.unwrap();

    mock.assert();
}

#[tokio::test]
async fn test_single_attempt_client_does_not_retry_server_errors() {
    let server = MockServer::start();
    let clients = ApiClients::new("test-api-key", None);

    let mock = server.mock(|when, then| {
        when.method(POST).path("/create").query_param("key", "test-api-key");
        then.status(500);
    });

    let response = clients
        .single_attempt
        .post(server.url("/create"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);

    mock.assert_calls(1);
}

#[tokio::test]
async fn test_parse_error_response_uses_google_envelope() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/fail");
        then.status(400)
            .header("content-type", "application/json")
            .json_body(json!({
                "error": {
                    "code": 400,
                    "message": "INVALID_API_KEY",
                    "status": "INVALID_ARGUMENT"
                }
            }));
    });

    let response = reqwest::get(server.url("/fail")).await.unwrap();
    let message = parse_error_response(response, "Request failed").await;
    assert_eq!(message, "INVALID_API_KEY (code: 400)");
}

#[tokio::test]
async fn test_parse_error_response_falls_back_to_status() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/fail");
        then.status(404).body("not json");
    });

    let response = reqwest::get(server.url("/fail")).await.unwrap();
    let message = parse_error_response(response, "Request failed").await;
    assert_eq!(message, "Request failed: 404 Not Found");
}
