use crate::handlers::safe_next;
use crate::models::user::{persist_login, SESSION_TOKENS_KEY};
use crate::models::{StorageScope, TokenPair, UserRecord};
use crate::services::backend_client::LoginResponse;
use crate::services::oauth::{consume_state, issue_state};
use crate::services::{ApiError, ErrorKind};
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use reqwest::Url;
use serde::Deserialize;
use service_core::error::AppError;
use tower_sessions::Session;
use validator::Validate;

const GOOGLE_FLOW: &str = "google";

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub user: Option<UserRecord>,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub email: String,
    pub next: String,
    pub google_enabled: bool,
}

#[derive(Template)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate {
    pub user: Option<UserRecord>,
    pub errors: Vec<String>,
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    /// Checkbox: present when ticked.
    #[serde(default)]
    pub remember_me: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterForm {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password_confirmation: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
    pub next: Option<String>,
    pub registered: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Banner text for the `?error=` codes other handlers redirect with.
pub fn login_error_message(code: &str) -> &'static str {
    match code {
        "session_expired" => "Your session has expired. Please log in again.",
        "state_mismatch" => "The sign-in attempt expired or was tampered with. Please retry.",
        "provider_denied" => "Google sign-in was cancelled.",
        "missing_code" => "Google did not return an authorization code.",
        "oauth_failed" => "Google sign-in failed. Please try again.",
        _ => "Something went wrong. Please try again.",
    }
}

/// Flatten validator output into banner lines.
pub fn validation_messages(errors: &validator::ValidationErrors) -> Vec<String> {
    let mut messages: Vec<String> = errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .map(|e| {
            e.message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("Invalid value ({})", e.code))
        })
        .collect();
    messages.sort();
    messages
}

fn google_enabled(state: &AppState) -> bool {
    state.settings.oauth.google_client_id.is_some()
}

pub async fn login_page(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> impl IntoResponse {
    LoginTemplate {
        user: None,
        error: query
            .error
            .as_deref()
            .map(|code| login_error_message(code).to_string()),
        notice: query
            .registered
            .map(|_| "Account created. You can log in now.".to_string()),
        email: String::new(),
        next: safe_next(query.next.as_deref()),
        google_enabled: google_enabled(&state),
    }
}

pub async fn register_page() -> impl IntoResponse {
    RegisterTemplate {
        user: None,
        errors: Vec::new(),
        email: String::new(),
    }
}

/// Store a backend login in the session, honouring the requested scope.
async fn start_session(
    state: &AppState,
    session: &Session,
    login: LoginResponse,
    scope: StorageScope,
) -> Result<UserRecord, ApiError> {
    let (user, tokens) = login.into_parts()?;
    persist_login(
        session,
        &user,
        &tokens,
        scope,
        state.settings.session.remember_me_days,
    )
    .await?;
    Ok(user)
}

pub async fn login_handler(
    State(state): State<AppState>,
    session: Session,
    Form(payload): Form<LoginForm>,
) -> Response {
    let next = safe_next(payload.next.as_deref());
    let render_error = |status: StatusCode, message: String| {
        (
            status,
            LoginTemplate {
                user: None,
                error: Some(message),
                notice: None,
                email: payload.email.clone(),
                next: next.clone(),
                google_enabled: google_enabled(&state),
            },
        )
            .into_response()
    };

    if let Err(errors) = payload.validate() {
        return render_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            validation_messages(&errors).join(" "),
        );
    }

    let login = match state.backend().login(&payload.email, &payload.password).await {
        Ok(login) => login,
        Err(e) if matches!(e.kind, ErrorKind::Unauthorized | ErrorKind::Client) => {
            tracing::info!(status = ?e.status, "Login rejected by backend");
            return render_error(
                StatusCode::UNAUTHORIZED,
                "Invalid email or password".to_string(),
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Login failed");
            return render_error(StatusCode::BAD_GATEWAY, e.user_message());
        }
    };

    let scope = StorageScope::from_remember_me(payload.remember_me.is_some());
    match start_session(&state, &session, login, scope).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, scope = ?scope, "User logged in");
            Redirect::to(&next).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to start session");
            render_error(StatusCode::INTERNAL_SERVER_ERROR, e.user_message())
        }
    }
}

pub async fn register_handler(
    State(state): State<AppState>,
    Form(payload): Form<RegisterForm>,
) -> Response {
    let render_errors = |status: StatusCode, errors: Vec<String>| {
        (
            status,
            RegisterTemplate {
                user: None,
                errors,
                email: payload.email.clone(),
            },
        )
            .into_response()
    };

    if let Err(errors) = payload.validate() {
        return render_errors(
            StatusCode::UNPROCESSABLE_ENTITY,
            validation_messages(&errors),
        );
    }

    match state
        .backend()
        .register(&payload.email, &payload.password)
        .await
    {
        Ok(()) => {
            tracing::info!("User registered");
            Redirect::to("/login?registered=1").into_response()
        }
        Err(e) if e.kind == ErrorKind::Client => {
            render_errors(StatusCode::UNPROCESSABLE_ENTITY, vec![e.message])
        }
        Err(e) => {
            tracing::error!(error = %e, "Registration failed");
            render_errors(StatusCode::BAD_GATEWAY, vec![e.user_message()])
        }
    }
}

pub async fn logout_handler(State(state): State<AppState>, session: Session) -> Response {
    let tokens: Option<TokenPair> = session.get(SESSION_TOKENS_KEY).await.unwrap_or(None);

    // Revocation is best effort; the local session goes regardless.
    if let Some(tokens) = tokens {
        if let Err(e) = state.backend().logout(&tokens).await {
            tracing::warn!(error = %e, "Failed to revoke tokens during logout");
        }
    }

    if let Err(e) = session.flush().await {
        tracing::error!(error = %e, "Failed to delete session");
    }

    Redirect::to("/").into_response()
}

/// Start Google sign-in: remember a state and send the browser to Google.
pub async fn google_login(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, AppError> {
    let client_id = state
        .settings
        .oauth
        .google_client_id
        .as_deref()
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Google sign-in is disabled")))?;

    let oauth_state = issue_state(&session, GOOGLE_FLOW)
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Session store error: {}", e)))?;

    let redirect_uri = state.settings.google_redirect_uri();
    let url = Url::parse_with_params(
        &state.settings.oauth.google_authorize_url,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("state", oauth_state.as_str()),
        ],
    )
    .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid Google authorize URL: {}", e)))?;

    tracing::info!("Redirecting to Google sign-in");
    Ok(Redirect::to(url.as_str()).into_response())
}

pub async fn google_callback(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<OAuthCallbackParams>,
) -> Response {
    let state_ok = consume_state(&session, GOOGLE_FLOW, params.state.as_deref())
        .await
        .unwrap_or(false);

    if !state_ok {
        tracing::warn!("Google callback with invalid state");
        return Redirect::to("/login?error=state_mismatch").into_response();
    }
    if params.error.is_some() {
        return Redirect::to("/login?error=provider_denied").into_response();
    }
    let (Some(code), Some(oauth_state)) = (params.code.as_deref(), params.state.as_deref()) else {
        return Redirect::to("/login?error=missing_code").into_response();
    };

    let redirect_uri = state.settings.google_redirect_uri();
    let result = match state
        .backend()
        .google_sign_in(code, oauth_state, &redirect_uri)
        .await
    {
        Ok(login) => start_session(&state, &session, login, StorageScope::Session).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "User logged in with Google");
            Redirect::to("/dashboard").into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Google sign-in failed");
            Redirect::to("/login?error=oauth_failed").into_response()
        }
    }
}
