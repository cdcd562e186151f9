#![allow(clippy::unwrap_used)]
// Integration tests for `LocalSession` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tellstick_api::{Error, LocalSession, Params, REQUEST_TIMEOUT, Session};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, LocalSession) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let session =
        LocalSession::with_client(reqwest::Client::new(), base_url, "tellstick-rs".into(), None);
    (server, session)
}

async fn mount_request_token(server: &MockServer) {
    Mock::given(method("PUT"))
        .and(path("/api/token"))
        .and(body_string_contains("app=tellstick-rs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "req-token",
            "authUrl": "http://192.168.1.20/api/authorize?token=req-token"
        })))
        .expect(1)
        .mount(server)
        .await;
}

// ── Authorization flow ──────────────────────────────────────────────

#[tokio::test]
async fn test_authorize_stores_bearer_token() {
    let (server, session) = setup().await;
    mount_request_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/token"))
        .and(query_param("token", "req-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "bearer",
            "expires": 1_700_000_000,
            "allowRenew": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let url = session.authorize_url().await.unwrap();
    assert_eq!(
        url.as_str(),
        "http://192.168.1.20/api/authorize?token=req-token"
    );

    assert!(session.authorize().await.unwrap());
    assert!(session.is_authorized());
    assert_eq!(session.access_token().as_deref(), Some("bearer"));
    assert!(session.token_issued_at().is_some());
}

#[tokio::test]
async fn test_authorize_pending_approval_is_false() {
    let (server, session) = setup().await;
    mount_request_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": "User has not authorized"})),
        )
        .mount(&server)
        .await;

    let session = Session::from(session);
    assert!(session.authorize_url().await.is_some());
    assert!(!session.authorize().await);
    assert!(!session.is_authorized());
}

// ── Bearer requests ─────────────────────────────────────────────────

#[tokio::test]
async fn test_request_carries_bearer_token() {
    let server = MockServer::start().await;
    let session = LocalSession::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        "tellstick-rs".into(),
        Some("bearer".to_owned().into()),
    );

    Mock::given(method("GET"))
        .and(path("/api/device/turnOn"))
        .and(query_param("id", "3"))
        .and(header("authorization", "Bearer bearer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    let params = Params::from([("id".to_owned(), "3".to_owned())]);
    let reply = session
        .request("device/turnOn", &params, REQUEST_TIMEOUT)
        .await
        .unwrap();
    assert_eq!(reply["status"], "success");
}

#[tokio::test]
async fn test_request_without_token_is_refused() {
    let (_server, session) = setup().await;
    let result = session
        .request("devices/list", &Params::new(), REQUEST_TIMEOUT)
        .await;
    assert!(matches!(result, Err(Error::NotAuthorized)));
}

#[tokio::test]
async fn test_new_builds_plain_http_base_url() {
    let session = LocalSession::new(
        "192.168.1.20",
        "tellstick-rs".into(),
        None,
        &tellstick_api::TransportConfig::default(),
    )
    .unwrap();
    assert_eq!(session.base_url().as_str(), "http://192.168.1.20/");
}
