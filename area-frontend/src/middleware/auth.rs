use crate::models::user::{login_redirect_target, SESSION_TOKENS_KEY};
use crate::models::TokenPair;
use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

/// Send anonymous visitors of page routes to the login form.
pub async fn require_login(session: Session, request: Request<Body>, next: Next) -> Response {
    let tokens: Option<TokenPair> = session.get(SESSION_TOKENS_KEY).await.unwrap_or(None);

    if tokens.is_none() {
        let target = login_redirect_target(request.uri().path());
        return Redirect::to(&target).into_response();
    }

    next.run(request).await
}
