use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::{Expiry, Session};

pub const SESSION_USER_KEY: &str = "user";
pub const SESSION_TOKENS_KEY: &str = "tokens";
pub const SESSION_SCOPE_KEY: &str = "storage_scope";

/// Where the login lives: a long-lived cookie ("remember me") or a cookie
/// that ends with the browser session. A session carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageScope {
    Persistent,
    Session,
}

impl StorageScope {
    pub fn from_remember_me(remember_me: bool) -> Self {
        if remember_me {
            StorageScope::Persistent
        } else {
            StorageScope::Session
        }
    }

    pub fn expiry(&self, remember_me_days: i64) -> Expiry {
        match self {
            StorageScope::Persistent => {
                Expiry::OnInactivity(time::Duration::days(remember_me_days.max(1)))
            }
            StorageScope::Session => Expiry::OnSessionEnd,
        }
    }
}

/// Signed-in user as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl UserRecord {
    pub fn display_name(&self) -> &str {
        self.email.split('@').next().unwrap_or("User")
    }

    pub fn initials(&self) -> String {
        let initials: String = self
            .display_name()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .take(2)
            .collect::<String>()
            .to_uppercase();
        if initials.is_empty() {
            "U".to_string()
        } else {
            initials
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case("admin"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Authenticated user context extracted from the session.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: UserRecord,
    pub scope: StorageScope,
    pub session: Session,
}

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn email(&self) -> &str {
        &self.user.email
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to extract session",
                )
                    .into_response()
            })?;

        let user: Option<UserRecord> = session.get(SESSION_USER_KEY).await.unwrap_or(None);
        let has_tokens = session
            .get::<TokenPair>(SESSION_TOKENS_KEY)
            .await
            .unwrap_or(None)
            .is_some();

        match user {
            Some(user) if has_tokens => {
                let scope = session
                    .get(SESSION_SCOPE_KEY)
                    .await
                    .unwrap_or(None)
                    .unwrap_or(StorageScope::Session);
                Ok(AuthUser {
                    user,
                    scope,
                    session,
                })
            }
            _ => Err(Redirect::to(&login_redirect_target(parts.uri.path())).into_response()),
        }
    }
}

/// `/login?next=<path>` for local paths, plain `/login` otherwise.
pub fn login_redirect_target(path: &str) -> String {
    if path.starts_with('/') && !path.starts_with("//") && path != "/login" {
        format!("/login?next={}", path)
    } else {
        "/login".to_string()
    }
}

/// Replace whatever the session held with a fresh login.
///
/// The session id is rotated and the previous scope is dropped, so a login
/// is never stored both persistently and per-browser-session.
pub async fn persist_login(
    session: &Session,
    user: &UserRecord,
    tokens: &TokenPair,
    scope: StorageScope,
    remember_me_days: i64,
) -> Result<(), tower_sessions::session::Error> {
    session.clear().await;
    session.cycle_id().await?;
    session.set_expiry(Some(scope.expiry(remember_me_days)));
    session.insert(SESSION_USER_KEY, user).await?;
    session.insert(SESSION_TOKENS_KEY, tokens).await?;
    session.insert(SESSION_SCOPE_KEY, scope).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initials_use_local_part() {
        let user = UserRecord {
            id: "u1".into(),
            email: "ada.lovelace@example.com".into(),
            roles: vec!["user".into()],
        };
        assert_eq!(user.display_name(), "ada.lovelace");
        assert_eq!(user.initials(), "AD");
        assert!(!user.is_admin());
    }

    #[test]
    fn scope_maps_to_cookie_expiry() {
        assert!(matches!(
            StorageScope::Session.expiry(30),
            Expiry::OnSessionEnd
        ));
        assert!(matches!(
            StorageScope::Persistent.expiry(30),
            Expiry::OnInactivity(d) if d == time::Duration::days(30)
        ));
        assert_eq!(StorageScope::from_remember_me(true), StorageScope::Persistent);
    }

    #[test]
    fn login_redirect_keeps_only_local_paths() {
        assert_eq!(login_redirect_target("/areas/new"), "/login?next=/areas/new");
        assert_eq!(login_redirect_target("//evil.example"), "/login");
        assert_eq!(login_redirect_target("/login"), "/login");
    }
}
