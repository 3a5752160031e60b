//! Pass-through proxy from `/api/*` to the backend.
//!
//! Status codes and bodies are relayed unchanged (bodies are streamed), a
//! fixed allow-list of headers crosses in each direction, and every
//! `set-cookie` is appended rather than collapsed.

use crate::services::authed_client::{AuthedClient, TokenStore};
use crate::services::backend_client::{BackendClient, ORIGIN_HEADER};
use crate::services::error::ApiError;
use crate::startup::SESSION_COOKIE_NAME;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use axum::response::Response;
use metrics::counter;
use service_core::error::AppError;
use service_core::observability::TracedRequestExt;
use std::sync::Arc;

const FORWARDED_REQUEST_HEADERS: [HeaderName; 4] = [
    header::CONTENT_TYPE,
    header::AUTHORIZATION,
    header::COOKIE,
    header::ACCEPT,
];

const FORWARDED_RESPONSE_HEADERS: [HeaderName; 5] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_DISPOSITION,
    header::CACHE_CONTROL,
    header::LOCATION,
];

/// A browser request, already read off the wire.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Backend path without leading slash, e.g. `areas/42`.
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub request_id: Option<String>,
}

impl ProxyRequest {
    fn target(&self) -> String {
        match self.query.as_deref().filter(|q| !q.is_empty()) {
            Some(query) => format!("/{}?{}", self.path, query),
            None => format!("/{}", self.path),
        }
    }
}

pub struct ProxyClient {
    authed: Arc<AuthedClient>,
}

/// Copy the allow-listed request headers and stamp the origin header. The
/// frontend's session cookie stays behind.
pub fn forwarded_request_headers(incoming: &HeaderMap, origin: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in FORWARDED_REQUEST_HEADERS.iter() {
        for value in incoming.get_all(name) {
            if *name == header::COOKIE {
                if let Some(value) = without_session_cookie(value) {
                    headers.append(header::COOKIE, value);
                }
            } else {
                headers.append(name.clone(), value.clone());
            }
        }
    }
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(HeaderName::from_static(ORIGIN_HEADER), value);
    }
    headers
}

fn without_session_cookie(value: &HeaderValue) -> Option<HeaderValue> {
    let Ok(raw) = value.to_str() else {
        return Some(value.clone());
    };
    let kept: Vec<&str> = raw
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next().map(str::trim) != Some(SESSION_COOKIE_NAME))
        .collect();
    if kept.is_empty() {
        return None;
    }
    HeaderValue::from_str(&kept.join("; ")).ok()
}

/// Relay an upstream response: same status, allow-listed headers, every
/// `set-cookie`, streamed body.
pub fn relay_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut response = Response::builder().status(status);

    if let Some(headers) = response.headers_mut() {
        for name in FORWARDED_RESPONSE_HEADERS.iter() {
            if let Some(value) = upstream.headers().get(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
        for cookie in upstream.headers().get_all(header::SET_COOKIE) {
            headers.append(header::SET_COOKIE, cookie.clone());
        }
    }

    let body = Body::from_stream(upstream.bytes_stream());
    response.body(body).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to assemble proxied response");
        Response::new(Body::empty())
    })
}

impl ProxyClient {
    pub fn new(authed: Arc<AuthedClient>) -> Self {
        Self { authed }
    }

    fn backend(&self) -> &BackendClient {
        self.authed.backend()
    }

    fn build(&self, backend: &BackendClient, request: &ProxyRequest) -> reqwest::RequestBuilder {
        let headers = forwarded_request_headers(&request.headers, backend.origin());
        let mut builder = backend
            .request(request.method.clone(), &request.target())
            .headers(headers)
            .with_request_id(request.request_id.as_deref());
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }
        builder
    }

    /// Forward `request` to the backend.
    ///
    /// When the browser sent its own `Authorization` header, or no session
    /// tokens exist, the request is relayed as-is. Otherwise the session's
    /// bearer token is attached and a `401` triggers one refresh and replay.
    pub async fn forward(
        &self,
        request: ProxyRequest,
        store: Option<&dyn TokenStore>,
    ) -> Result<Response, AppError> {
        let has_authorization = request.headers.contains_key(header::AUTHORIZATION);
        let target = request.target();

        let session_store = match store {
            Some(store) if !has_authorization => {
                store.tokens().await?.is_some().then_some(store)
            }
            _ => None,
        };

        let result = match session_store {
            Some(store) => {
                self.authed
                    .send(store, |backend| self.build(backend, &request))
                    .await
            }
            None => self
                .build(self.backend(), &request)
                .send()
                .await
                .map_err(ApiError::from),
        };

        match result {
            Ok(upstream) => {
                let status = upstream.status();
                counter!("proxy_requests_total", "outcome" => "relayed").increment(1);
                tracing::debug!(
                    method = %request.method,
                    target = %target,
                    status = %status,
                    "Proxied request"
                );
                Ok(relay_response(upstream))
            }
            Err(e) => {
                counter!("proxy_requests_total", "outcome" => "failed").increment(1);
                tracing::warn!(
                    method = %request.method,
                    target = %target,
                    error = %e,
                    "Proxy request failed"
                );
                Err(e.into())
            }
        }
    }
}
