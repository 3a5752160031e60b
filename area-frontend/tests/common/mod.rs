#![allow(dead_code)]

use area_frontend::config::{BackendSettings, Settings};
use area_frontend::services::{AuthedClient, BackendClient};
use area_frontend::startup::build_router;
use area_frontend::AppState;
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use http_body_util::BodyExt;
use std::sync::Arc;

pub const PUBLIC_ORIGIN: &str = "http://area.test";

pub fn test_settings(backend_url: &str) -> Settings {
    serde_json::from_value(serde_json::json!({
        "server": { "host": "127.0.0.1", "port": 0, "public_origin": PUBLIC_ORIGIN },
        "backend": { "url": backend_url, "timeout_seconds": 5 },
        "session": { "secure_cookies": false, "remember_me_days": 30 },
        "oauth": { "popup_close_delay_ms": 0 }
    }))
    .expect("valid test settings")
}

/// Full router talking to `backend_url`, without a metrics recorder.
pub fn test_app(backend_url: &str) -> Router {
    test_app_with(test_settings(backend_url))
}

pub fn test_app_with(settings: Settings) -> Router {
    let state = AppState::new(settings, None).expect("app state");
    build_router(state)
}

/// Router with Google sign-in enabled for `client-1`.
pub fn google_app(backend_url: &str) -> Router {
    let mut settings = test_settings(backend_url);
    settings.oauth.google_client_id = Some("client-1".to_string());
    test_app_with(settings)
}

pub fn authed_client(backend_url: &str) -> AuthedClient {
    let settings = BackendSettings {
        url: backend_url.to_string(),
        timeout_seconds: 5,
        max_proxy_body_bytes: 1024 * 1024,
    };
    let backend = BackendClient::new(&settings, PUBLIC_ORIGIN).expect("backend client");
    AuthedClient::new(Arc::new(backend))
}

pub fn login_body(access: &str, refresh: &str) -> serde_json::Value {
    serde_json::json!({
        "accessToken": access,
        "refreshToken": refresh,
        "user": { "id": "u1", "email": "ada@example.com", "roles": ["user"] }
    })
}

/// `name=value` of the session cookie set by `response`, if any.
pub fn session_cookie<B>(response: &Response<B>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("id="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub fn raw_session_cookie<B>(response: &Response<B>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("id="))
        .map(str::to_string)
}

pub fn form_request(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
