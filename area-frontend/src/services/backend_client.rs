//! HTTP client for the automation backend REST API.
//!
//! Unauthenticated calls (login, registration, token refresh) live here;
//! calls made on behalf of a signed-in user go through
//! [`AuthedClient`](super::authed_client::AuthedClient).

use crate::config::BackendSettings;
use crate::models::{TokenPair, UserRecord};
use crate::services::error::ApiError;
use crate::utils::jwt::decode_jwt_claims;
use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use service_core::observability::TracedRequestExt;
use std::time::Duration;

/// Header carrying the browser-facing origin to the backend, which uses it to
/// build links and validate OAuth redirect URIs.
pub const ORIGIN_HEADER: &str = "x-area-origin";

pub struct BackendClient {
    client: Client,
    base_url: String,
    origin: String,
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleSignInRequest<'a> {
    code: &'a str,
    state: &'a str,
    redirect_uri: &'a str,
}

/// Answer of `/auth/login` and `/auth/oauth2/google`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user: Option<UserRecord>,
}

impl LoginResponse {
    /// Split into the session records, reading the user from the access
    /// token claims when the backend did not embed it.
    pub fn into_parts(self) -> Result<(UserRecord, TokenPair), ApiError> {
        let user = match self.user {
            Some(user) => user,
            None => {
                let claims = decode_jwt_claims(&self.access_token).map_err(|e| {
                    tracing::error!(error = %e, "Failed to decode access token claims");
                    ApiError::internal("Malformed access token")
                })?;
                UserRecord {
                    id: claims.sub,
                    email: claims.email,
                    roles: claims.roles,
                }
            }
        };

        Ok((
            user,
            TokenPair {
                access_token: self.access_token,
                refresh_token: self.refresh_token,
            },
        ))
    }
}

impl BackendClient {
    pub fn new(settings: &BackendSettings, public_origin: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build backend HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            origin: public_origin.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Start a request with trace context and the origin header attached.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .with_trace_context()
            .header(ORIGIN_HEADER, &self.origin)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let response = self
            .request(Method::POST, "/auth/login")
            .json(&Credentials { email, password })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Login request failed");
                ApiError::from(e)
            })?;

        decode_json(response).await
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let response = self
            .request(Method::POST, "/auth/register")
            .json(&Credentials { email, password })
            .send()
            .await?;

        expect_success(response).await
    }

    /// Exchange a refresh token for a new pair. The old refresh token is kept
    /// when the backend does not rotate it.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let response = self
            .request(Method::POST, "/auth/refresh")
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let refreshed: RefreshResponse = decode_json(response).await?;

        Ok(TokenPair {
            access_token: refreshed.access_token,
            refresh_token: refreshed
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
        })
    }

    /// Revoke the refresh token.
    pub async fn logout(&self, tokens: &TokenPair) -> Result<(), ApiError> {
        let response = self
            .request(Method::POST, "/auth/logout")
            .bearer_auth(&tokens.access_token)
            .json(&RefreshRequest {
                refresh_token: &tokens.refresh_token,
            })
            .send()
            .await?;

        expect_success(response).await
    }

    /// Finish Google sign-in: the backend trades the code for a session.
    pub async fn google_sign_in(
        &self,
        code: &str,
        state: &str,
        redirect_uri: &str,
    ) -> Result<LoginResponse, ApiError> {
        let response = self
            .request(Method::POST, "/auth/oauth2/google")
            .json(&GoogleSignInRequest {
                code,
                state,
                redirect_uri,
            })
            .send()
            .await?;

        decode_json(response).await
    }
}

/// Decode a JSON body from a successful response, or turn the failure into
/// an [`ApiError`].
pub async fn decode_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    if !response.status().is_success() {
        return Err(ApiError::from_response(response).await);
    }
    response.json::<T>().await.map_err(ApiError::from)
}

pub async fn expect_success(response: reqwest::Response) -> Result<(), ApiError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(ApiError::from_response(response).await)
    }
}
