use crate::services::proxy::ProxyRequest;
use crate::services::SessionTokenStore;
use crate::AppState;
use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::Request,
    response::Response,
};
use service_core::error::AppError;
use service_core::middleware::tracing::RequestId;
use tower_sessions::Session;

const API_PREFIX: &str = "/api/";

/// `/api/*` pass-through to the backend.
///
/// The raw path is used instead of the matched segment so that percent
/// escapes reach the backend untouched.
pub async fn proxy_handler(
    State(state): State<AppState>,
    session: Session,
    request: Request<Body>,
) -> Result<Response, AppError> {
    let (parts, body) = request.into_parts();

    let path = parts
        .uri
        .path()
        .strip_prefix(API_PREFIX)
        .unwrap_or_default()
        .to_string();
    if path.split('/').any(|segment| segment == "..") {
        return Err(AppError::BadRequest(anyhow::anyhow!("Invalid proxy path")));
    }

    let body = to_bytes(body, state.settings.backend.max_proxy_body_bytes)
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Request body rejected: {}", e)))?;

    let request = ProxyRequest {
        method: parts.method,
        path,
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
        request_id: parts.extensions.get::<RequestId>().map(|id| id.0.clone()),
    };

    let store = SessionTokenStore::new(session);
    state.proxy.forward(request, Some(&store)).await
}
