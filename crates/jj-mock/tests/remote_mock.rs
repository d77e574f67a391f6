//! End-to-end tests: an in-process server on an ephemeral port, driven over
//! HTTP by `reqwest` and the remote client.

use jj_mock::config::ServerConfig;
use jj_mock::remote::RemoteError;
use jj_mock::server::{start, RunningServer};
use jj_mock::{
    AttributeMatcher, ExpirationPolicy, RelayResponse, RemoteMock, RequestMatcher,
    StaticResponse, TemplateResponse,
};
use reqwest::Client;
use serde_json::json;

async fn start_server() -> RunningServer {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    };
    start(&config).await.expect("server should start")
}

fn post_users() -> RequestMatcher {
    RequestMatcher::all(vec![
        RequestMatcher::method("POST"),
        RequestMatcher::path("/users").unwrap(),
    ])
    .unwrap()
}

#[tokio::test]
async fn test_register_serve_and_history() {
    let server = start_server().await;
    let mock = RemoteMock::new(server.base_url());
    let handler = mock.create_handler(post_users(), StaticResponse::json(&json!([])));
    handler.register().await.unwrap();

    let client = Client::new();
    let response = client
        .post(format!("{}/users", server.base_url()))
        .json(&json!({"name": "alice"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.json::<serde_json::Value>().await.unwrap(), json!([]));

    let history = handler.fetch_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].request.method, "POST");
    assert_eq!(history[0].request.path, "/users");
    assert_eq!(history[0].response.status, 200);
    assert!(history[0].has_tag(&handler.id().to_string()));

    // Unmatched traffic falls through to 404 and is not recorded
    let response = client
        .get(format!("{}/other", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(handler.fetch_history().await.unwrap().len(), 1);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_last_registered_wins() {
    let server = start_server().await;
    let mock = RemoteMock::new(server.base_url());
    let matcher = RequestMatcher::method("GET");
    mock.create_handler(matcher.clone(), StaticResponse::text("text1"))
        .register()
        .await
        .unwrap();
    mock.create_handler(matcher, StaticResponse::text("text2"))
        .register()
        .await
        .unwrap();

    let body = reqwest::get(format!("{}/anything", server.base_url()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "text2");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_expiration_after_requests() {
    let server = start_server().await;
    let mock = RemoteMock::new(server.base_url());
    let handler = mock
        .create_handler(RequestMatcher::method("GET"), StaticResponse::text("once"))
        .with_expiration(ExpirationPolicy::after_requests(1).unwrap());
    handler.register().await.unwrap();

    let url = format!("{}/", server.base_url());
    assert_eq!(reqwest::get(&url).await.unwrap().status(), 200);
    assert_eq!(reqwest::get(&url).await.unwrap().status(), 404);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_deregister_and_unknown_history() {
    let server = start_server().await;
    let mock = RemoteMock::new(server.base_url());
    let handler = mock.create_handler(post_users(), StaticResponse::new(201));
    handler.register().await.unwrap();
    Client::new()
        .post(format!("{}/users", server.base_url()))
        .send()
        .await
        .unwrap();

    handler.deregister().await.unwrap();
    // Deregistering twice is fine
    handler.deregister().await.unwrap();

    match handler.fetch_history().await {
        Err(RemoteError::Server { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "Handler not found");
        }
        other => panic!("expected a server error, got {other:?}"),
    }
    assert!(server.service().history().is_empty());

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reset() {
    let server = start_server().await;
    let mock = RemoteMock::new(server.base_url());
    mock.create_handler(RequestMatcher::method("GET"), StaticResponse::text("a"))
        .register()
        .await
        .unwrap();
    mock.reset().await.unwrap();

    let status = reqwest::get(format!("{}/", server.base_url()))
        .await
        .unwrap()
        .status();
    assert_eq!(status, 404);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_payload_is_rejected() {
    let server = start_server().await;
    let response = Client::new()
        .post(format!("{}/__jj__/register", server.base_url()))
        .header("x-jj-remote-mock", "1")
        .json(&json!({"request": {"UnknownMatcher": {}}}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], 400);
    assert_eq!(body["error"].as_array().unwrap().len(), 3);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_template_response_uses_request() {
    let server = start_server().await;
    let mock = RemoteMock::new(server.base_url());
    let handler = mock.create_handler(
        RequestMatcher::all(vec![
            RequestMatcher::path("/users/{id}").unwrap(),
            RequestMatcher::param([("verbose", AttributeMatcher::Exists)]),
        ])
        .unwrap(),
        TemplateResponse::new("user ${request.segments.id} via ${request.method}")
            .with_status("202"),
    );
    handler.register().await.unwrap();

    let response = reqwest::get(format!("{}/users/7?verbose=1", server.base_url()))
        .await
        .unwrap();
    assert_eq!(response.status(), 202);
    assert_eq!(response.text().await.unwrap(), "user 7 via GET");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_percent_encoded_path_is_decoded() {
    let server = start_server().await;
    let mock = RemoteMock::new(server.base_url());
    let handler = mock.create_handler(
        RequestMatcher::path("/users/{name}").unwrap(),
        TemplateResponse::new("${request.segments.name}"),
    );
    handler.register().await.unwrap();

    let response = reqwest::get(format!("{}/users/a%20b", server.base_url()))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "a b");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_relay_to_another_server() {
    let upstream = start_server().await;
    RemoteMock::new(upstream.base_url())
        .create_handler(
            RequestMatcher::path("/ping").unwrap(),
            StaticResponse::text("pong").with_header("x-upstream", "yes"),
        )
        .register()
        .await
        .unwrap();

    let front = start_server().await;
    RemoteMock::new(front.base_url())
        .create_handler(
            RequestMatcher::method("GET"),
            RelayResponse::new(upstream.base_url()),
        )
        .register()
        .await
        .unwrap();

    let response = reqwest::get(format!("{}/ping", front.base_url()))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-upstream"], "yes");
    assert_eq!(response.text().await.unwrap(), "pong");

    front.shutdown().await.unwrap();
    upstream.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_mocked_guard_deregisters_on_drop() {
    let server = start_server().await;
    let mock = RemoteMock::new(server.base_url());
    let url = format!("{}/guarded", server.base_url());
    let handler = mock.create_handler(
        RequestMatcher::path("/guarded").unwrap(),
        StaticResponse::text("ok"),
    );

    // The guard blocks on its own runtime, so keep it off the server's thread
    let guard = tokio::task::spawn_blocking(move || handler.mocked())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reqwest::get(&url).await.unwrap().status(), 200);
    assert_eq!(guard.fetch_history().await.unwrap().len(), 1);

    tokio::task::spawn_blocking(move || drop(guard)).await.unwrap();
    assert_eq!(reqwest::get(&url).await.unwrap().status(), 404);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_introspection_and_metrics() {
    let server = start_server().await;
    let mock = RemoteMock::new(server.base_url());
    let handler = mock.create_handler(post_users(), StaticResponse::text("ok"));
    handler.register().await.unwrap();

    let client = Client::new();
    let summary: serde_json::Value = client
        .get(format!("{}/__jj__", server.base_url()))
        .header("x-jj-remote-mock", "1")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["handlers"], 1);
    assert_eq!(summary["items"][0]["id"], handler.id().to_string());

    let metrics = client
        .get(format!("{}/__jj__/metrics", server.base_url()))
        .header("x-jj-remote-mock", "1")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("jj_registrations_total"));

    server.shutdown().await.unwrap();
}
