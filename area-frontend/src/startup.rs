use axum::{
    handler::Handler,
    middleware::{from_fn, from_fn_with_state},
    routing::{any, get, post},
    Router,
};
use service_core::middleware::{
    create_ip_rate_limiter, ip_rate_limit_middleware, metrics::metrics_middleware,
    security_headers_middleware, tracing::request_id_middleware,
};
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

use crate::handlers::{
    app::{health_check, index},
    areas::{create_area, delete_area, edit_area_page, new_area_page, toggle_area, update_area},
    auth::{
        google_callback, google_login, login_handler, login_page, logout_handler,
        register_handler, register_page,
    },
    connections::{connection_callback, connections_page, discord_channels, start_connection},
    dashboard::dashboard_handler,
    metrics::metrics,
    proxy::proxy_handler,
};
use crate::middleware::auth::require_login;
use crate::AppState;

/// Name of the frontend's own session cookie.
pub const SESSION_COOKIE_NAME: &str = "id";

pub fn build_router(state: AppState) -> Router {
    // Anonymous sessions only carry OAuth state; a login sets its own expiry.
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_name(SESSION_COOKIE_NAME)
        .with_secure(state.settings.session.secure_cookies)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnSessionEnd);

    let limiter = create_ip_rate_limiter(
        state.settings.rate_limit.credential_attempts,
        state.settings.rate_limit.window_seconds,
    );
    let credential_limit = from_fn_with_state(limiter, ip_rate_limit_middleware);

    let pages = Router::new()
        .route("/dashboard", get(dashboard_handler))
        .route("/areas", post(create_area))
        .route("/areas/new", get(new_area_page))
        .route("/areas/:id", post(update_area))
        .route("/areas/:id/edit", get(edit_area_page))
        .route("/areas/:id/toggle", post(toggle_area))
        .route("/areas/:id/delete", post(delete_area))
        .route("/connections", get(connections_page))
        .route_layer(from_fn(require_login));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route(
            "/login",
            get(login_page).post(login_handler.layer(credential_limit.clone())),
        )
        .route(
            "/register",
            get(register_page).post(register_handler.layer(credential_limit)),
        )
        .route("/logout", post(logout_handler))
        .route("/auth/google", get(google_login))
        .route("/auth/google/callback", get(google_callback))
        // Popup endpoints answer unauthenticated visitors with a popup page.
        .route("/connections/:provider/start", get(start_connection))
        .route("/connections/:provider/callback", get(connection_callback))
        .route("/discord/guilds/:guild_id/channels", get(discord_channels))
        .route("/api/*path", any(proxy_handler))
        .merge(pages)
        .nest_service(
            "/static",
            ServeDir::new(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
        )
        .layer(from_fn(security_headers_middleware))
        .layer(CompressionLayer::new())
        .layer(session_layer)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
