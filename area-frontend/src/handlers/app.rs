use crate::models::user::SESSION_USER_KEY;
use crate::models::UserRecord;
use crate::AppState;
use askama::Template;
use axum::{extract::State, response::IntoResponse};
use tower_sessions::Session;

#[derive(Template)]
#[template(path = "pages/index.html")]
pub struct IndexTemplate {
    pub user: Option<UserRecord>,
    pub google_enabled: bool,
}

/// Marketing landing page.
pub async fn index(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    let user: Option<UserRecord> = session.get(SESSION_USER_KEY).await.unwrap_or(None);

    IndexTemplate {
        user,
        google_enabled: state.settings.oauth.google_client_id.is_some(),
    }
}

pub async fn health_check() -> &'static str {
    "OK"
}
