use crate::handlers::{path_id, take_flash, Flash};
use crate::models::user::{AuthUser, SESSION_TOKENS_KEY};
use crate::models::{ConnectionCard, DiscordChannel, Provider, TokenPair, UserRecord};
use crate::services::oauth::{consume_state, issue_state, PopupOutcome, PopupReason};
use crate::services::SessionTokenStore;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use metrics::counter;
use serde::Deserialize;
use service_core::error::AppError;
use tower_sessions::Session;

#[derive(Template)]
#[template(path = "pages/connections.html")]
pub struct ConnectionsTemplate {
    pub user: Option<UserRecord>,
    pub current_page: &'static str,
    pub flash: Option<Flash>,
    pub cards: Vec<ConnectionCard>,
    pub load_error: Option<String>,
}

/// Page rendered inside the popup once a provider flow ends. It posts the
/// outcome to the opener (same origin only) and closes itself.
#[derive(Template)]
#[template(path = "pages/oauth_popup.html")]
pub struct OAuthPopupTemplate {
    pub provider_name: String,
    pub success: bool,
    pub message: &'static str,
    pub outcome_json: String,
    pub target_origin: String,
    pub close_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct ConnectionCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

fn parse_provider(slug: &str) -> Result<Provider, AppError> {
    slug.parse::<Provider>()
        .map_err(|e| AppError::NotFound(anyhow::anyhow!(e)))
}

fn state_flow(provider: Provider) -> String {
    format!("connection:{}", provider.slug())
}

fn popup(state: &AppState, provider: Provider, reason: PopupReason) -> Response {
    let outcome = PopupOutcome::new(provider.slug(), reason);
    counter!(
        "oauth_connections_total",
        "provider" => provider.slug(),
        "success" => outcome.success.to_string()
    )
    .increment(1);

    let status = match reason {
        PopupReason::Connected => StatusCode::OK,
        PopupReason::NotAuthenticated => StatusCode::UNAUTHORIZED,
        PopupReason::BackendError => StatusCode::BAD_GATEWAY,
        _ => StatusCode::BAD_REQUEST,
    };

    (
        status,
        OAuthPopupTemplate {
            provider_name: provider.display_name().to_string(),
            success: outcome.success,
            message: reason.message(),
            outcome_json: outcome.to_script_json(),
            target_origin: state.settings.server.public_origin.clone(),
            close_delay_ms: state.settings.oauth.popup_close_delay_ms,
        },
    )
        .into_response()
}

async fn has_tokens(session: &Session) -> bool {
    session
        .get::<TokenPair>(SESSION_TOKENS_KEY)
        .await
        .unwrap_or(None)
        .is_some()
}

pub async fn connections_page(State(state): State<AppState>, auth_user: AuthUser) -> Response {
    let store = SessionTokenStore::new(auth_user.session.clone());

    let (statuses, load_error) = match state.authed.list_connections(&store).await {
        Ok(statuses) => (statuses, None),
        Err(e) if e.is_unauthorized() => {
            return Redirect::to("/login?error=session_expired").into_response();
        }
        Err(e) => {
            tracing::error!(user_id = %auth_user.id(), error = %e, "Failed to list connections");
            (Vec::new(), Some(e.user_message()))
        }
    };

    ConnectionsTemplate {
        flash: take_flash(&auth_user.session).await,
        user: Some(auth_user.user),
        current_page: "connections",
        cards: ConnectionCard::for_all(&statuses),
        load_error,
    }
    .into_response()
}

/// Opened in the popup: bind a fresh state to the session and send the
/// browser to the provider's consent page.
pub async fn start_connection(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let provider = parse_provider(&slug)?;

    if !has_tokens(&session).await {
        return Ok(popup(&state, provider, PopupReason::NotAuthenticated));
    }

    let oauth_state = issue_state(&session, &state_flow(provider))
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Session store error: {}", e)))?;
    let redirect_uri = state.settings.connection_redirect_uri(provider.slug());
    let store = SessionTokenStore::new(session);

    let url = match state
        .authed
        .start_connection(&store, provider, &oauth_state, &redirect_uri)
        .await
    {
        Ok(url) => url,
        Err(e) if e.is_unauthorized() => {
            return Ok(popup(&state, provider, PopupReason::NotAuthenticated));
        }
        Err(e) => {
            tracing::error!(provider = %provider, error = %e, "Failed to start connection");
            return Ok(popup(&state, provider, PopupReason::BackendError));
        }
    };

    match reqwest::Url::parse(&url) {
        Ok(parsed) if matches!(parsed.scheme(), "https" | "http") => {
            tracing::info!(provider = %provider, "Redirecting popup to provider");
            Ok(Redirect::to(parsed.as_str()).into_response())
        }
        _ => {
            tracing::error!(provider = %provider, "Backend returned an unusable authorization URL");
            Ok(popup(&state, provider, PopupReason::BackendError))
        }
    }
}

/// Provider redirect target. The stored state is checked (and discarded)
/// before anything else; the backend is only asked to complete the link when
/// it matches.
pub async fn connection_callback(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
    Query(params): Query<ConnectionCallbackParams>,
) -> Result<Response, AppError> {
    let provider = parse_provider(&slug)?;

    let state_ok = consume_state(&session, &state_flow(provider), params.state.as_deref())
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to read OAuth state from session");
            false
        });
    if !state_ok {
        tracing::warn!(provider = %provider, "Connection callback with invalid state");
        return Ok(popup(&state, provider, PopupReason::StateMismatch));
    }

    if let Some(error) = params.error.as_deref() {
        tracing::info!(
            provider = %provider,
            error = %error,
            description = params.error_description.as_deref().unwrap_or(""),
            "Provider denied the connection"
        );
        return Ok(popup(&state, provider, PopupReason::ProviderDenied));
    }

    let (Some(code), Some(oauth_state)) = (
        params.code.as_deref().filter(|c| !c.is_empty()),
        params.state.as_deref(),
    ) else {
        return Ok(popup(&state, provider, PopupReason::MissingCode));
    };

    if !has_tokens(&session).await {
        return Ok(popup(&state, provider, PopupReason::NotAuthenticated));
    }

    let redirect_uri = state.settings.connection_redirect_uri(provider.slug());
    let store = SessionTokenStore::new(session);
    let reason = match state
        .authed
        .complete_connection(&store, provider, code, oauth_state, &redirect_uri)
        .await
    {
        Ok(()) => {
            tracing::info!(provider = %provider, "Account connected");
            PopupReason::Connected
        }
        Err(e) if e.is_unauthorized() => PopupReason::NotAuthenticated,
        Err(e) => {
            tracing::error!(provider = %provider, error = %e, "Failed to complete connection");
            PopupReason::BackendError
        }
    };

    Ok(popup(&state, provider, reason))
}

/// Channels of a Discord guild, for the reaction channel picker.
pub async fn discord_channels(
    State(state): State<AppState>,
    session: Session,
    Path(guild_id): Path<String>,
) -> Result<Json<Vec<DiscordChannel>>, AppError> {
    let guild_id = path_id(&guild_id)?;
    let store = SessionTokenStore::new(session);
    let channels = state.authed.discord_channels(&store, guild_id).await?;
    Ok(Json(channels))
}
