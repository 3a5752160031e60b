mod common;

use area_frontend::models::TokenPair;
use area_frontend::services::{ErrorKind, MemoryTokenStore};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn stale_tokens() -> TokenPair {
    TokenPair {
        access_token: "old-access".into(),
        refresh_token: "refresh-1".into(),
    }
}

async fn mount_areas(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/areas"))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(ResponseTemplate::new(401))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/areas"))
        .and(header("authorization", "Bearer new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn expired_access_token_is_refreshed_and_request_replayed() {
    let server = MockServer::start().await;
    mount_areas(&server).await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(serde_json::json!({ "refreshToken": "refresh-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": "new-access",
            "refreshToken": "refresh-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::authed_client(&server.uri());
    let store = MemoryTokenStore::new(stale_tokens());

    let areas = client.list_areas(&store).await.unwrap();

    assert!(areas.is_empty());
    assert_eq!(
        store.current(),
        Some(TokenPair {
            access_token: "new-access".into(),
            refresh_token: "refresh-2".into(),
        })
    );
}

#[tokio::test]
async fn refresh_without_rotation_keeps_refresh_token() {
    let server = MockServer::start().await;
    mount_areas(&server).await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "accessToken": "new-access" })),
        )
        .mount(&server)
        .await;

    let client = common::authed_client(&server.uri());
    let store = MemoryTokenStore::new(stale_tokens());

    client.list_areas(&store).await.unwrap();

    let tokens = store.current().unwrap();
    assert_eq!(tokens.access_token, "new-access");
    assert_eq!(tokens.refresh_token, "refresh-1");
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let server = MockServer::start().await;
    mount_areas(&server).await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({
                    "accessToken": "new-access",
                    "refreshToken": "refresh-2"
                }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = common::authed_client(&server.uri());
    let store = MemoryTokenStore::new(stale_tokens());

    let (first, second, third) = tokio::join!(
        client.list_areas(&store),
        client.list_areas(&store),
        client.list_areas(&store)
    );

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert!(third.is_ok());
    assert_eq!(store.current().unwrap().access_token, "new-access");
}

#[tokio::test]
async fn second_unauthorized_ends_the_session() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/areas"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": "new-access",
            "refreshToken": "refresh-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::authed_client(&server.uri());
    let store = MemoryTokenStore::new(stale_tokens());

    let err = client.list_areas(&store).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unauthorized);
    assert!(store.current().is_none());
}

#[tokio::test]
async fn rejected_refresh_ends_the_session_without_replay() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/areas"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(serde_json::json!({ "message": "refresh token revoked" })),
        )
        .mount(&server)
        .await;

    let client = common::authed_client(&server.uri());
    let store = MemoryTokenStore::new(stale_tokens());

    let err = client.list_areas(&store).await.unwrap_err();

    assert!(err.is_unauthorized());
    assert!(store.current().is_none());
}

#[tokio::test]
async fn backend_outage_during_refresh_keeps_the_session() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/areas"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = common::authed_client(&server.uri());
    let store = MemoryTokenStore::new(stale_tokens());

    let err = client.list_areas(&store).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Server);
    assert_eq!(store.current(), Some(stale_tokens()));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/areas/a1"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({ "message": "Area not found" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = common::authed_client(&server.uri());
    let store = MemoryTokenStore::new(stale_tokens());

    let err = client.delete_area(&store, "a1").await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Client);
    assert_eq!(err.message, "Area not found");
    assert_eq!(store.current(), Some(stale_tokens()));
}

#[tokio::test]
async fn missing_tokens_fail_without_calling_backend() {
    let server = MockServer::start().await;
    let client = common::authed_client(&server.uri());
    let store = MemoryTokenStore::default();

    let err = client.list_areas(&store).await.unwrap_err();

    assert!(err.is_unauthorized());
    assert!(server.received_requests().await.unwrap().is_empty());
}
