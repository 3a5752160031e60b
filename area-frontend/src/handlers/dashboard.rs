use crate::handlers::{take_flash, Flash};
use crate::models::user::AuthUser;
use crate::models::{Area, ConnectionCard, UserRecord};
use crate::services::SessionTokenStore;
use crate::AppState;
use askama::Template;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};

#[derive(Template)]
#[template(path = "pages/dashboard.html")]
pub struct DashboardTemplate {
    pub user: Option<UserRecord>,
    pub current_page: &'static str,
    pub flash: Option<Flash>,
    pub areas: Vec<Area>,
    pub connections: Vec<ConnectionCard>,
    /// Set when one of the listings could not be loaded.
    pub load_error: Option<String>,
}

impl DashboardTemplate {
    pub fn enabled_count(&self) -> usize {
        self.areas.iter().filter(|a| a.enabled).count()
    }

    pub fn connected_count(&self) -> usize {
        self.connections.iter().filter(|c| c.status.connected).count()
    }
}

pub async fn dashboard_handler(State(state): State<AppState>, auth_user: AuthUser) -> Response {
    let store = SessionTokenStore::new(auth_user.session.clone());

    let (areas, connections) = tokio::join!(
        state.authed.list_areas(&store),
        state.authed.list_connections(&store)
    );

    if [areas.as_ref().err(), connections.as_ref().err()]
        .into_iter()
        .flatten()
        .any(|e| e.is_unauthorized())
    {
        return Redirect::to("/login?error=session_expired").into_response();
    }

    let mut load_error = None;
    let areas = areas.unwrap_or_else(|e| {
        tracing::error!(user_id = %auth_user.id(), error = %e, "Failed to list areas");
        load_error = Some(e.user_message());
        Vec::new()
    });
    let connections = connections.unwrap_or_else(|e| {
        tracing::error!(user_id = %auth_user.id(), error = %e, "Failed to list connections");
        load_error.get_or_insert_with(|| e.user_message());
        Vec::new()
    });

    DashboardTemplate {
        flash: take_flash(&auth_user.session).await,
        user: Some(auth_user.user),
        current_page: "dashboard",
        areas,
        connections: ConnectionCard::for_all(&connections),
        load_error,
    }
    .into_response()
}
