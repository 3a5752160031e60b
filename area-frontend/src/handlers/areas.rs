use crate::handlers::auth::validation_messages;
use crate::handlers::{path_id, redirect_on_error, set_flash, FlashLevel};
use crate::models::user::AuthUser;
use crate::models::{AreaForm, AreaPatch, ServiceInfo, UserRecord};
use crate::services::{ApiError, SessionTokenStore};
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use service_core::error::AppError;
use validator::Validate;

#[derive(Template)]
#[template(path = "pages/area_form.html")]
pub struct AreaFormTemplate {
    pub user: Option<UserRecord>,
    pub current_page: &'static str,
    /// `None` on the create screen.
    pub area_id: Option<String>,
    pub form: AreaForm,
    pub services: Vec<ServiceInfo>,
    pub errors: Vec<String>,
}

impl AreaFormTemplate {
    pub fn action_url(&self) -> String {
        match &self.area_id {
            Some(id) => format!("/areas/{}", id),
            None => "/areas".to_string(),
        }
    }

    pub fn title(&self) -> &'static str {
        if self.area_id.is_some() {
            "Edit Area"
        } else {
            "New Area"
        }
    }

    pub fn action_services(&self) -> Vec<&ServiceInfo> {
        self.services.iter().filter(|s| s.has_actions()).collect()
    }

    pub fn reaction_services(&self) -> Vec<&ServiceInfo> {
        self.services.iter().filter(|s| s.has_reactions()).collect()
    }
}

/// Services feed the pickers; the form stays usable with free text when the
/// catalogue is unavailable.
async fn load_services(
    state: &AppState,
    store: &SessionTokenStore,
) -> Result<Vec<ServiceInfo>, ApiError> {
    match state.authed.list_services(store).await {
        Ok(services) => Ok(services),
        Err(e) if e.is_unauthorized() => Err(e),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load service catalogue");
            Ok(Vec::new())
        }
    }
}

async fn render_form(
    state: &AppState,
    auth_user: AuthUser,
    area_id: Option<String>,
    form: AreaForm,
    status: StatusCode,
    errors: Vec<String>,
) -> Response {
    let store = SessionTokenStore::new(auth_user.session.clone());
    let services = match load_services(state, &store).await {
        Ok(services) => services,
        Err(e) => return redirect_on_error(&auth_user.session, e, "/dashboard").await,
    };

    (
        status,
        AreaFormTemplate {
            user: Some(auth_user.user),
            current_page: "areas",
            area_id,
            form,
            services,
            errors,
        },
    )
        .into_response()
}

pub async fn new_area_page(State(state): State<AppState>, auth_user: AuthUser) -> Response {
    render_form(
        &state,
        auth_user,
        None,
        AreaForm {
            enabled: Some("on".to_string()),
            ..Default::default()
        },
        StatusCode::OK,
        Vec::new(),
    )
    .await
}

pub async fn create_area(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Form(form): Form<AreaForm>,
) -> Response {
    let form = form.normalized();
    if let Err(errors) = form.validate() {
        let messages = validation_messages(&errors);
        return render_form(
            &state,
            auth_user,
            None,
            form,
            StatusCode::UNPROCESSABLE_ENTITY,
            messages,
        )
        .await;
    }

    let store = SessionTokenStore::new(auth_user.session.clone());
    match state
        .authed
        .create_area(&store, &form.clone().into_new_area())
        .await
    {
        Ok(area) => {
            tracing::info!(user_id = %auth_user.id(), area_id = %area.id, "Area created");
            set_flash(
                &auth_user.session,
                FlashLevel::Notice,
                format!("Area \"{}\" created", area.name),
            )
            .await;
            Redirect::to("/dashboard").into_response()
        }
        Err(e) if e.is_unauthorized() => {
            redirect_on_error(&auth_user.session, e, "/dashboard").await
        }
        Err(e) => {
            tracing::warn!(user_id = %auth_user.id(), error = %e, "Failed to create area");
            let messages = vec![e.user_message()];
            render_form(
                &state,
                auth_user,
                None,
                form,
                StatusCode::UNPROCESSABLE_ENTITY,
                messages,
            )
            .await
        }
    }
}

pub async fn edit_area_page(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = path_id(&id)?.to_string();
    let store = SessionTokenStore::new(auth_user.session.clone());

    let area = match state.authed.get_area(&store, &id).await {
        Ok(area) => area,
        Err(e) => return Ok(redirect_on_error(&auth_user.session, e, "/dashboard").await),
    };

    Ok(render_form(
        &state,
        auth_user,
        Some(id),
        AreaForm::from_area(&area),
        StatusCode::OK,
        Vec::new(),
    )
    .await)
}

pub async fn update_area(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Form(form): Form<AreaForm>,
) -> Result<Response, AppError> {
    let id = path_id(&id)?.to_string();

    let form = form.normalized();
    if let Err(errors) = form.validate() {
        let messages = validation_messages(&errors);
        return Ok(render_form(
            &state,
            auth_user,
            Some(id),
            form,
            StatusCode::UNPROCESSABLE_ENTITY,
            messages,
        )
        .await);
    }

    let store = SessionTokenStore::new(auth_user.session.clone());
    let current = match state.authed.get_area(&store, &id).await {
        Ok(area) => area,
        Err(e) => return Ok(redirect_on_error(&auth_user.session, e, "/dashboard").await),
    };

    let response = match state
        .authed
        .update_area(&store, &id, &form.clone().into_patch(&current))
        .await
    {
        Ok(area) => {
            tracing::info!(user_id = %auth_user.id(), area_id = %area.id, "Area updated");
            set_flash(&auth_user.session, FlashLevel::Notice, "Area saved").await;
            Redirect::to("/dashboard").into_response()
        }
        Err(e) if e.is_unauthorized() => {
            redirect_on_error(&auth_user.session, e, "/dashboard").await
        }
        Err(e) => {
            tracing::warn!(user_id = %auth_user.id(), area_id = %id, error = %e, "Failed to update area");
            let messages = vec![e.user_message()];
            render_form(
                &state,
                auth_user,
                Some(id),
                form,
                StatusCode::UNPROCESSABLE_ENTITY,
                messages,
            )
            .await
        }
    };
    Ok(response)
}

/// Flip `enabled` on an Area from the dashboard list.
pub async fn toggle_area(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = path_id(&id)?;
    let store = SessionTokenStore::new(auth_user.session.clone());

    let area = match state.authed.get_area(&store, id).await {
        Ok(area) => area,
        Err(e) => return Ok(redirect_on_error(&auth_user.session, e, "/dashboard").await),
    };

    let response = match state
        .authed
        .update_area(&store, id, &AreaPatch::toggle(&area))
        .await
    {
        Ok(updated) => {
            let word = if updated.enabled { "enabled" } else { "disabled" };
            tracing::info!(user_id = %auth_user.id(), area_id = %id, enabled = updated.enabled, "Area toggled");
            set_flash(
                &auth_user.session,
                FlashLevel::Notice,
                format!("Area \"{}\" {}", updated.name, word),
            )
            .await;
            Redirect::to("/dashboard").into_response()
        }
        Err(e) => redirect_on_error(&auth_user.session, e, "/dashboard").await,
    };
    Ok(response)
}

pub async fn delete_area(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = path_id(&id)?;
    let store = SessionTokenStore::new(auth_user.session.clone());

    let response = match state.authed.delete_area(&store, id).await {
        Ok(()) => {
            tracing::info!(user_id = %auth_user.id(), area_id = %id, "Area deleted");
            set_flash(&auth_user.session, FlashLevel::Notice, "Area deleted").await;
            Redirect::to("/dashboard").into_response()
        }
        Err(e) => redirect_on_error(&auth_user.session, e, "/dashboard").await,
    };
    Ok(response)
}
