mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::util::ServiceExt;
use wiremock::matchers::{body_json, body_string, header as header_eq, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn proxy_relays_status_body_and_every_set_cookie() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/session"))
        .and(header_eq("content-type", "application/json"))
        .and(header_eq("x-area-origin", common::PUBLIC_ORIGIN))
        .and(body_string(r#"{"ping":true}"#))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("content-type", "application/json")
                .append_header("set-cookie", "a=1; Path=/")
                .append_header("set-cookie", "b=2; Path=/")
                .insert_header("x-internal", "secret")
                .set_body_string(r#"{"created":true}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let app = common::test_app(&server.uri());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/session")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"ping":true}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let cookies: Vec<_> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| !v.starts_with("id="))
        .map(str::to_string)
        .collect();
    assert_eq!(cookies, vec!["a=1; Path=/", "b=2; Path=/"]);
    assert!(!response.headers().contains_key("x-internal"));
    assert_eq!(common::body_string(response).await, r#"{"created":true}"#);
}

#[tokio::test]
async fn proxy_keeps_query_and_error_statuses() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/areas"))
        .and(query_param("enabled", "true"))
        .and(header_eq("authorization", "Bearer browser-token"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({ "message": "nope" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let app = common::test_app(&server.uri());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/areas?enabled=true")
                .header(header::AUTHORIZATION, "Bearer browser-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value =
        serde_json::from_str(&common::body_string(response).await).unwrap();
    assert_eq!(body["message"], "nope");
}

#[tokio::test]
async fn proxy_attaches_session_token_when_browser_sends_none() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::login_body("session-access", "r1")),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/services"))
        .and(header_eq("authorization", "Bearer session-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let app = common::test_app(&server.uri());

    let login = app
        .clone()
        .oneshot(common::form_request(
            "/login",
            "email=ada%40example.com&password=hunter22",
            None,
        ))
        .await
        .unwrap();
    let cookie = common::session_cookie(&login).expect("session cookie");

    let response = app
        .oneshot(common::get_request("/api/services", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn proxy_refreshes_an_expired_session_token_and_replays_the_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::login_body("stale", "r1")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(serde_json::json!({ "refreshToken": "r1" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "accessToken": "fresh" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/areas"))
        .and(header_eq("authorization", "Bearer stale"))
        .and(body_string(r#"{"name":"Nightly"}"#))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/areas"))
        .and(header_eq("authorization", "Bearer fresh"))
        .and(body_string(r#"{"name":"Nightly"}"#))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({ "id": "area-9" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let app = common::test_app(&server.uri());

    let login = app
        .clone()
        .oneshot(common::form_request(
            "/login",
            "email=ada%40example.com&password=hunter22",
            None,
        ))
        .await
        .unwrap();
    let cookie = common::session_cookie(&login).expect("session cookie");

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/areas")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, &cookie)
                .body(Body::from(r#"{"name":"Nightly"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value =
        serde_json::from_str(&common::body_string(response).await).unwrap();
    assert_eq!(body["id"], "area-9");
}

#[tokio::test]
async fn proxy_does_not_leak_the_frontend_session_cookie() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/areas"))
        .and(header_eq("cookie", "theme=dark"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let app = common::test_app(&server.uri());

    let response = app
        .oneshot(common::get_request(
            "/api/areas",
            Some("id=frontend-session; theme=dark"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unreachable_backend_is_a_bad_gateway() {
    let app = common::test_app("http://127.0.0.1:9");

    let response = app
        .oneshot(common::get_request("/api/areas", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
