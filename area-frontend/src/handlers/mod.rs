pub mod app;
pub mod areas;
pub mod auth;
pub mod connections;
pub mod dashboard;
pub mod metrics;
pub mod proxy;

use crate::services::ApiError;
use axum::response::{IntoResponse, Redirect, Response};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use tower_sessions::Session;

const FLASH_KEY: &str = "flash";

/// One-shot banner shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Notice,
    Error,
}

impl Flash {
    pub fn is_error(&self) -> bool {
        self.level == FlashLevel::Error
    }
}

pub async fn set_flash(session: &Session, level: FlashLevel, message: impl Into<String>) {
    let flash = Flash {
        level,
        message: message.into(),
    };
    if let Err(e) = session.insert(FLASH_KEY, flash).await {
        tracing::warn!(error = %e, "Failed to store flash message");
    }
}

pub async fn take_flash(session: &Session) -> Option<Flash> {
    session.remove(FLASH_KEY).await.unwrap_or(None)
}

/// Where a page goes when its backend call failed: the login form when the
/// session is gone, otherwise back to `fallback` with an error banner.
pub async fn redirect_on_error(session: &Session, err: ApiError, fallback: &str) -> Response {
    if err.is_unauthorized() {
        return Redirect::to("/login?error=session_expired").into_response();
    }
    tracing::warn!(error = %err, kind = ?err.kind, "Backend call failed");
    set_flash(session, FlashLevel::Error, err.user_message()).await;
    Redirect::to(fallback).into_response()
}

/// Identifiers taken from the URL are interpolated into backend paths.
pub fn path_id(id: &str) -> Result<&str, AppError> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(id)
    } else {
        Err(AppError::BadRequest(anyhow::anyhow!("Invalid identifier")))
    }
}

/// Only same-site relative paths are followed after login.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => "/dashboard".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_ids_reject_traversal() {
        assert!(path_id("a1b2-c3_d4").is_ok());
        assert!(path_id("../admin").is_err());
        assert!(path_id("1/2").is_err());
        assert!(path_id("").is_err());
    }

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(Some("/areas/new")), "/areas/new");
        assert_eq!(safe_next(Some("//evil.example")), "/dashboard");
        assert_eq!(safe_next(Some("https://evil.example")), "/dashboard");
        assert_eq!(safe_next(Some("/\\evil.example")), "/dashboard");
        assert_eq!(safe_next(None), "/dashboard");
    }
}
