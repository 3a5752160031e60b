//! Authenticated calls to the backend with refresh-and-retry-once.
//!
//! A request is sent with the stored access token. On `401` the refresh token
//! is exchanged (at most once, coalesced with any refresh already in flight
//! for the same token) and the request is replayed exactly once. A failed
//! refresh or a second `401` ends the session.

use crate::models::user::SESSION_TOKENS_KEY;
use crate::models::TokenPair;
use crate::services::backend_client::BackendClient;
use crate::services::error::{ApiError, ErrorKind};
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use futures::future::{BoxFuture, FutureExt, Shared};
use metrics::counter;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::sync::{Arc, Mutex};
use tower_sessions::Session;

/// Where a caller's tokens live.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn tokens(&self) -> Result<Option<TokenPair>, ApiError>;
    async fn store(&self, tokens: &TokenPair) -> Result<(), ApiError>;
    async fn clear(&self) -> Result<(), ApiError>;
}

/// Tokens kept in the caller's server-side session.
pub struct SessionTokenStore {
    session: Session,
}

impl SessionTokenStore {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl TokenStore for SessionTokenStore {
    async fn tokens(&self) -> Result<Option<TokenPair>, ApiError> {
        Ok(self.session.get(SESSION_TOKENS_KEY).await?)
    }

    async fn store(&self, tokens: &TokenPair) -> Result<(), ApiError> {
        Ok(self.session.insert(SESSION_TOKENS_KEY, tokens).await?)
    }

    async fn clear(&self) -> Result<(), ApiError> {
        // The whole login goes: user record and scope are useless without tokens.
        self.session.flush().await?;
        Ok(())
    }
}

/// Process-local token store, for tooling and tests.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new(tokens: TokenPair) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }

    pub fn current(&self) -> Option<TokenPair> {
        self.tokens.lock().map(|t| t.clone()).unwrap_or(None)
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn tokens(&self) -> Result<Option<TokenPair>, ApiError> {
        Ok(self.current())
    }

    async fn store(&self, tokens: &TokenPair) -> Result<(), ApiError> {
        let mut guard = self
            .tokens
            .lock()
            .map_err(|_| ApiError::internal("Token store poisoned"))?;
        *guard = Some(tokens.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), ApiError> {
        let mut guard = self
            .tokens
            .lock()
            .map_err(|_| ApiError::internal("Token store poisoned"))?;
        *guard = None;
        Ok(())
    }
}

type SharedRefresh = Shared<BoxFuture<'static, Result<TokenPair, ApiError>>>;

pub struct AuthedClient {
    backend: Arc<BackendClient>,
    /// Refreshes in flight, keyed by the refresh token being exchanged.
    in_flight: DashMap<String, SharedRefresh>,
}

impl AuthedClient {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self {
            backend,
            in_flight: DashMap::new(),
        }
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    /// Send a request built by `build` with the caller's bearer token.
    ///
    /// `build` runs once per attempt, so it must be able to rebuild the same
    /// request (including its body). Non-401 responses are returned as-is.
    pub async fn send<F>(&self, store: &dyn TokenStore, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&BackendClient) -> RequestBuilder + Send + Sync,
    {
        let tokens = store
            .tokens()
            .await?
            .ok_or_else(|| ApiError::unauthorized("Not signed in"))?;

        let response = self.dispatch(&build, &tokens.access_token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::info!("Access token rejected, refreshing");
        let refreshed = self.refresh_for(store, &tokens).await?;

        let retry = self.dispatch(&build, &refreshed.access_token).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            counter!("auth_retry_rejected_total").increment(1);
            tracing::warn!("Request still unauthorized after token refresh");
            store.clear().await?;
            return Err(ApiError::unauthorized("Session expired"));
        }

        Ok(retry)
    }

    async fn dispatch<F>(&self, build: &F, access_token: &str) -> Result<Response, ApiError>
    where
        F: Fn(&BackendClient) -> RequestBuilder,
    {
        build(&self.backend)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Backend request failed");
                ApiError::from(e)
            })
    }

    /// Obtain fresh tokens after `stale` was rejected, and persist them.
    async fn refresh_for(
        &self,
        store: &dyn TokenStore,
        stale: &TokenPair,
    ) -> Result<TokenPair, ApiError> {
        // Another request of this caller may have refreshed in the meantime.
        if let Some(current) = store.tokens().await? {
            if current.access_token != stale.access_token {
                return Ok(current);
            }
        }

        match self.refresh(&stale.refresh_token).await {
            Ok(tokens) => {
                store.store(&tokens).await?;
                Ok(tokens)
            }
            Err(e) if matches!(e.kind, ErrorKind::Network | ErrorKind::Server) => {
                // Transient: keep the session, surface the outage.
                Err(e)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh rejected, ending session");
                store.clear().await?;
                Err(ApiError::unauthorized("Session expired"))
            }
        }
    }

    /// Exchange `refresh_token`, joining a refresh already in flight for it.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let shared = match self.in_flight.entry(refresh_token.to_string()) {
            Entry::Occupied(entry) => {
                counter!("auth_refresh_coalesced_total").increment(1);
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                counter!("auth_refresh_attempts_total").increment(1);
                let backend = self.backend.clone();
                let token = refresh_token.to_string();
                let refresh = async move { backend.refresh(&token).await }
                    .boxed()
                    .shared();
                entry.insert(refresh.clone());
                refresh
            }
        };

        let result = shared.clone().await;
        self.in_flight
            .remove_if(refresh_token, |_, pending| pending.ptr_eq(&shared));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryTokenStore::default();
        assert!(store.tokens().await.unwrap().is_none());

        let pair = TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
        };
        store.store(&pair).await.unwrap();
        assert_eq!(store.current(), Some(pair));

        store.clear().await.unwrap();
        assert!(store.current().is_none());
    }
}
